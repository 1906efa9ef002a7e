//! # Error Hierarchy
//!
//! Structured errors for domain validation, stock arithmetic and
//! document workflows. Each variant carries the values an operator
//! needs to understand the rejection.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

/// Validation errors for domain newtypes and single fields.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// RUT check digit or structure is wrong.
    #[error("invalid RUT: \"{0}\"")]
    InvalidRut(String),

    /// Email does not look like `local@domain.tld`.
    #[error("invalid email: \"{0}\"")]
    InvalidEmail(String),

    /// A required field was empty after trimming.
    #[error("{0} must not be empty")]
    Required(&'static str),

    /// Stock thresholds are inconsistent with each other.
    #[error("invalid stock levels: {0}")]
    StockLevels(String),

    /// A quantity or amount was zero or negative where it must be positive.
    #[error("{field} must be greater than zero, got {value}")]
    NotPositive {
        /// Field name.
        field: &'static str,
        /// Offending value.
        value: Decimal,
    },

    /// A quantity or amount was negative.
    #[error("{field} must not be negative, got {value}")]
    Negative {
        /// Field name.
        field: &'static str,
        /// Offending value.
        value: Decimal,
    },

    /// An order-level discount larger than the amount it discounts.
    #[error("discount {discount} exceeds the order subtotal {subtotal}")]
    DiscountExceedsSubtotal {
        /// Requested discount.
        discount: Decimal,
        /// Sum of line subtotals.
        subtotal: Decimal,
    },
}

/// Stock movement rejections.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StockError {
    /// Quantity must be strictly positive.
    #[error("quantity must be greater than zero, got {0}")]
    NonPositiveQuantity(Decimal),

    /// An exit would leave stock below zero.
    #[error("insufficient stock: available {available}, requested {requested}")]
    Insufficient {
        /// Stock on hand before the exit.
        available: Decimal,
        /// Quantity requested.
        requested: Decimal,
    },

    /// An entry would push stock over the configured maximum.
    #[error("stock would exceed maximum {maximum}: resulting stock {resulting}")]
    ExceedsMaximum {
        /// Configured maximum.
        maximum: Decimal,
        /// Stock that the entry would produce.
        resulting: Decimal,
    },
}

/// Rejections of document state transitions (orders, receptions, requests).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorkflowError {
    /// The document is in a final status and cannot change.
    #[error("{document} is in final status {status} and cannot be modified")]
    Final {
        /// Human label of the document, e.g. "purchase order OC-00000001".
        document: String,
        /// Code of the current status.
        status: String,
    },

    /// The transition is not allowed from the current state.
    #[error("{0}")]
    NotAllowed(String),
}

/// Field-keyed validation errors, collected so that all problems in a
/// submission are reported at once.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, String>);

impl FieldErrors {
    /// Create an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an error for a field. A later error for the same field replaces the earlier one.
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.insert(field.into(), message.into());
    }

    /// Record an error when `condition` holds.
    pub fn require(&mut self, condition: bool, field: &str, message: &str) {
        if condition {
            self.add(field, message);
        }
    }

    /// Whether no errors have been recorded.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Look up the error recorded for a field.
    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    /// Number of fields with errors.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// `Ok(())` when empty, otherwise `Err(self)`.
    pub fn into_result(self) -> Result<(), FieldErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl std::fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|(k, v)| format!("{k}: {v}")).collect();
        write!(f, "{}", parts.join("; "))
    }
}

impl std::error::Error for FieldErrors {}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn field_errors_collect_and_report() {
        let mut errors = FieldErrors::new();
        assert!(errors.is_empty());
        errors.add("serial_number", "this asset requires a serial number");
        errors.require(true, "lot", "this asset requires a lot");
        errors.require(false, "expiry_date", "never recorded");
        assert_eq!(errors.len(), 2);
        assert_eq!(errors.get("lot"), Some("this asset requires a lot"));
        assert!(errors.get("expiry_date").is_none());
        let msg = errors.to_string();
        assert!(msg.contains("lot: this asset requires a lot"));
        assert!(errors.into_result().is_err());
    }

    #[test]
    fn field_errors_serialize_as_map() {
        let mut errors = FieldErrors::new();
        errors.add("rut", "invalid");
        let json = serde_json::to_value(&errors).unwrap();
        assert_eq!(json, serde_json::json!({"rut": "invalid"}));
    }

    #[test]
    fn stock_error_messages_carry_values() {
        let err = StockError::Insufficient {
            available: dec!(3),
            requested: dec!(5),
        };
        let msg = err.to_string();
        assert!(msg.contains("available 3"));
        assert!(msg.contains("requested 5"));
    }

    #[test]
    fn workflow_final_message() {
        let err = WorkflowError::Final {
            document: "purchase order OC-00000001".into(),
            status: "CLOSED".into(),
        };
        assert!(err.to_string().contains("OC-00000001"));
        assert!(err.to_string().contains("CLOSED"));
    }
}
