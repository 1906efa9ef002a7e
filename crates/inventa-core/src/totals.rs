//! # Purchase Totals
//!
//! Line subtotals and order totals. Tax is Chilean VAT (IVA) at 19%,
//! applied after the order-level discount.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::ValidationError;

/// VAT rate applied to the discounted subtotal.
pub const VAT_RATE: Decimal = Decimal::from_parts(19, 0, 0, false, 2);

fn money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Subtotal of one order line: `quantity × unit_price − discount`.
///
/// # Errors
///
/// Quantity must be positive. Price and discount must not be negative,
/// and the discount cannot exceed the gross line amount.
pub fn line_subtotal(
    quantity: Decimal,
    unit_price: Decimal,
    discount: Decimal,
) -> Result<Decimal, ValidationError> {
    if quantity <= Decimal::ZERO {
        return Err(ValidationError::NotPositive {
            field: "quantity",
            value: quantity,
        });
    }
    if unit_price < Decimal::ZERO {
        return Err(ValidationError::Negative {
            field: "unit_price",
            value: unit_price,
        });
    }
    if discount < Decimal::ZERO {
        return Err(ValidationError::Negative {
            field: "discount",
            value: discount,
        });
    }
    let subtotal = quantity * unit_price - discount;
    if subtotal < Decimal::ZERO {
        return Err(ValidationError::Negative {
            field: "subtotal",
            value: subtotal,
        });
    }
    Ok(money(subtotal))
}

/// Monetary summary of a purchase order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
pub struct OrderTotals {
    /// Sum of line subtotals.
    pub subtotal: Decimal,
    /// Order-level discount.
    pub discount: Decimal,
    /// VAT on `subtotal - discount`.
    pub tax: Decimal,
    /// `subtotal - discount + tax`.
    pub total: Decimal,
}

impl OrderTotals {
    /// Compute totals from a subtotal and an order-level discount.
    ///
    /// # Errors
    ///
    /// The discount must not be negative and must not exceed the subtotal,
    /// so tax and total are never negative.
    pub fn compute(subtotal: Decimal, discount: Decimal) -> Result<Self, ValidationError> {
        if discount < Decimal::ZERO {
            return Err(ValidationError::Negative {
                field: "discount",
                value: discount,
            });
        }
        if discount > subtotal {
            return Err(ValidationError::DiscountExceedsSubtotal { discount, subtotal });
        }
        let taxable = subtotal - discount;
        let tax = money(taxable * VAT_RATE);
        Ok(Self {
            subtotal: money(subtotal),
            discount: money(discount),
            tax,
            total: money(taxable + tax),
        })
    }

    /// Compute totals from line subtotals and an order-level discount.
    pub fn from_lines(
        lines: impl IntoIterator<Item = Decimal>,
        discount: Decimal,
    ) -> Result<Self, ValidationError> {
        Self::compute(lines.into_iter().sum(), discount)
    }
}
