//! # Record Types
//!
//! Serializable records held in the in-memory stores and persisted as
//! JSON documents. Each record type names its collection through
//! [`Document`](crate::db::documents::Document).
//!
//! - `catalog`: the twenty-two reference catalogs, generic over their extra fields.
//! - `warehouse`: articles and stock movements.
//! - `assets`: fixed assets, asset movements, current locations.
//! - `equipment`: workshop equipment and maintenance records.
//! - `purchasing`: suppliers, purchase orders, receptions.
//! - `requests`: material requests with lines and status history.
//! - `profiles`: system-access profile requests.
//! - `personnel`: staff members and fingerprint enrollments.
//! - `write_offs`: inventory write-offs with lines and status history.

pub mod assets;
pub mod catalog;
pub mod equipment;
pub mod personnel;
pub mod profiles;
pub mod purchasing;
pub mod requests;
pub mod warehouse;
pub mod write_offs;
