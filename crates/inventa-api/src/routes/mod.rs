//! # API Route Modules
//!
//! - `catalog`: Generic CRUD for the twenty-two reference catalogs plus the
//!   brand → models lookup.
//! - `warehouse`: Articles, stock movements, low-stock and reorder views.
//! - `assets`: Asset items, asset movements and current placement.
//! - `equipment`: Workshop equipment and its maintenance schedule.
//! - `purchasing`: Suppliers, purchase orders and their lines.
//! - `receptions`: Article and asset receptions against orders.
//! - `requests`: Material requests and their approval workflow.
//! - `profiles`: System-access profile requests.
//! - `personnel`: Staff members and fingerprint enrollment.
//! - `write_offs`: Inventory write-offs, their authorization and stock exit.

pub mod assets;
pub mod catalog;
pub mod equipment;
pub mod personnel;
pub mod profiles;
pub mod purchasing;
pub mod receptions;
pub mod requests;
pub mod warehouse;
pub mod write_offs;
