//! # Stock Arithmetic
//!
//! Pure rules for warehouse stock: threshold consistency, entries, exits,
//! and the low-stock / reorder predicates. Callers apply the returned
//! balance together with the movement record in one transaction.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::{StockError, ValidationError};

/// Direction of a stock movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Operation {
    /// Goods in.
    Entry,
    /// Goods out.
    Exit,
}

impl Operation {
    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Entry => "ENTRY",
            Self::Exit => "EXIT",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Operation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ENTRY" => Ok(Self::Entry),
            "EXIT" => Ok(Self::Exit),
            other => Err(format!("invalid operation \"{other}\" (expected ENTRY or EXIT)")),
        }
    }
}

/// Stock thresholds of an article or asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StockLevels {
    /// Minimum desired stock.
    pub minimum: Decimal,
    /// Upper bound on stock, if any.
    pub maximum: Option<Decimal>,
    /// Stock at which a new purchase should be triggered, if any.
    pub reorder_point: Option<Decimal>,
}

impl StockLevels {
    /// Check that the thresholds are consistent.
    ///
    /// The minimum must not be negative. The maximum, when set, must not be below
    /// the minimum. The reorder point, when set, must not be below the minimum.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.minimum < Decimal::ZERO {
            return Err(ValidationError::Negative {
                field: "minimum_stock",
                value: self.minimum,
            });
        }
        if let Some(max) = self.maximum {
            if max < self.minimum {
                return Err(ValidationError::StockLevels(format!(
                    "maximum stock {max} must be greater than or equal to minimum stock {}",
                    self.minimum
                )));
            }
        }
        if let Some(reorder) = self.reorder_point {
            if reorder < self.minimum {
                return Err(ValidationError::StockLevels(format!(
                    "reorder point {reorder} must be greater than or equal to minimum stock {}",
                    self.minimum
                )));
            }
        }
        Ok(())
    }

    /// Stock at or below the minimum.
    pub fn is_low(&self, current: Decimal) -> bool {
        current <= self.minimum
    }

    /// Stock at or below the reorder point. Always false without one.
    pub fn needs_reorder(&self, current: Decimal) -> bool {
        self.reorder_point.is_some_and(|r| current <= r)
    }

    /// Balance after an entry of `quantity`.
    pub fn enter(&self, current: Decimal, quantity: Decimal) -> Result<Decimal, StockError> {
        if quantity <= Decimal::ZERO {
            return Err(StockError::NonPositiveQuantity(quantity));
        }
        let resulting = current + quantity;
        if let Some(maximum) = self.maximum {
            if resulting > maximum {
                return Err(StockError::ExceedsMaximum { maximum, resulting });
            }
        }
        Ok(resulting)
    }

    /// Balance after an exit of `quantity`.
    pub fn exit(&self, current: Decimal, quantity: Decimal) -> Result<Decimal, StockError> {
        if quantity <= Decimal::ZERO {
            return Err(StockError::NonPositiveQuantity(quantity));
        }
        if current < quantity {
            return Err(StockError::Insufficient {
                available: current,
                requested: quantity,
            });
        }
        Ok(current - quantity)
    }

    /// Dispatch on `operation`.
    pub fn apply(
        &self,
        operation: Operation,
        current: Decimal,
        quantity: Decimal,
    ) -> Result<Decimal, StockError> {
        match operation {
            Operation::Entry => self.enter(current, quantity),
            Operation::Exit => self.exit(current, quantity),
        }
    }
}
