#![deny(missing_docs)]

//! # inventa-core: Domain Rules for Inventa
//!
//! Pure, I/O-free building blocks shared by the API service and the CLI.
//! Ecosystem crates: `serde`, `thiserror`, `chrono`, `rust_decimal`, and
//! `utoipa` for the schema derives.
//!
//! ## Contents
//!
//! - [`Audit`]: activity, soft-delete and timestamp fields carried by every record.
//! - [`Rut`] and [`Email`]: validated newtypes. Construction is the only
//!   way to obtain one, so a value in hand is always well-formed.
//! - [`numbering`]: sequential document numbers (`OC-00000001`, `SOL-2026-000001`).
//! - [`stock`]: entry/exit arithmetic with min/max/reorder rules.
//! - [`totals`]: purchase line subtotals and order totals with 19% VAT.
//! - [`text`]: code normalization and truncation helpers.
//!
//! Errors are structured `thiserror` enums. No `.unwrap()` outside tests.

pub mod audit;
pub mod error;
pub mod identity;
pub mod numbering;
pub mod stock;
pub mod text;
pub mod totals;

pub use audit::Audit;
pub use error::{FieldErrors, StockError, ValidationError, WorkflowError};
pub use identity::{Email, Rut};
pub use stock::{Operation, StockLevels};
pub use totals::{line_subtotal, OrderTotals, VAT_RATE};
