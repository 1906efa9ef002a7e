//! Suppliers, purchase orders and goods receptions.

use chrono::{DateTime, NaiveDate, Utc};
use inventa_core::{Audit, OrderTotals, ValidationError};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::db::documents::Document;

fn default_payment_terms() -> String {
    "Contado".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Supplier {
    pub id: Uuid,
    /// Formatted RUT, e.g. `76.000.000-0`.
    pub rut: String,
    pub business_name: String,
    #[serde(default)]
    pub trade_name: Option<String>,
    #[serde(default)]
    pub line_of_business: Option<String>,
    pub address: String,
    #[serde(default)]
    pub commune: Option<String>,
    pub city: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default = "default_payment_terms")]
    pub payment_terms: String,
    #[serde(default)]
    pub credit_days: u32,
    #[serde(flatten)]
    pub audit: Audit,
}

impl Document for Supplier {
    const COLLECTION: &'static str = "suppliers";
    fn id(&self) -> Uuid {
        self.id
    }
}

/// One purchase order line. Exactly one of `article_id` / `asset_id` is set.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderLine {
    pub id: Uuid,
    #[serde(default)]
    pub article_id: Option<Uuid>,
    #[serde(default)]
    pub asset_id: Option<Uuid>,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub discount: Decimal,
    pub subtotal: Decimal,
    pub received_quantity: Decimal,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PurchaseOrder {
    pub id: Uuid,
    pub number: String,
    pub order_date: NaiveDate,
    #[serde(default)]
    pub expected_delivery: Option<NaiveDate>,
    #[serde(default)]
    pub actual_delivery: Option<NaiveDate>,
    pub supplier_id: Uuid,
    #[serde(default)]
    pub warehouse_id: Option<Uuid>,
    pub status_id: Uuid,
    pub requested_by: Option<Uuid>,
    #[serde(default)]
    pub approved_by: Option<Uuid>,
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub discount: Decimal,
    pub total: Decimal,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub internal_notes: Option<String>,
    #[serde(default)]
    pub lines: Vec<OrderLine>,
    #[serde(flatten)]
    pub audit: Audit,
}

impl PurchaseOrder {
    /// Recompute subtotal, tax and total from the lines and order discount.
    ///
    /// Leaves the order untouched when the discount exceeds the new subtotal.
    pub fn recalculate(&mut self) -> Result<(), ValidationError> {
        let totals =
            OrderTotals::from_lines(self.lines.iter().map(|l| l.subtotal), self.discount)?;
        self.subtotal = totals.subtotal;
        self.discount = totals.discount;
        self.tax = totals.tax;
        self.total = totals.total;
        Ok(())
    }
}

impl Document for PurchaseOrder {
    const COLLECTION: &'static str = "purchase_orders";
    fn id(&self) -> Uuid {
        self.id
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ArticleReceptionLine {
    pub id: Uuid,
    pub article_id: Uuid,
    pub quantity: Decimal,
    #[serde(default)]
    pub lot: Option<String>,
    #[serde(default)]
    pub expiry_date: Option<NaiveDate>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AssetReceptionLine {
    pub id: Uuid,
    pub asset_id: Uuid,
    pub quantity: Decimal,
    #[serde(default)]
    pub serial_number: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Goods received into a warehouse, optionally against a purchase order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reception<L> {
    pub id: Uuid,
    pub number: String,
    #[serde(default)]
    pub order_id: Option<Uuid>,
    pub warehouse_id: Uuid,
    pub status_id: Uuid,
    pub received_by: Option<Uuid>,
    #[serde(default)]
    pub document_reference: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    pub received_at: DateTime<Utc>,
    #[serde(default = "Vec::new")]
    pub lines: Vec<L>,
    #[serde(flatten)]
    pub audit: Audit,
}

pub type ArticleReception = Reception<ArticleReceptionLine>;
pub type AssetReception = Reception<AssetReceptionLine>;

/// Line types a [`Reception`] can hold; each kind has its own collection.
pub trait ReceptionLine: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {
    const COLLECTION: &'static str;
}

impl ReceptionLine for ArticleReceptionLine {
    const COLLECTION: &'static str = "article_receptions";
}

impl ReceptionLine for AssetReceptionLine {
    const COLLECTION: &'static str = "asset_receptions";
}

impl<L: ReceptionLine> Document for Reception<L> {
    const COLLECTION: &'static str = L::COLLECTION;
    fn id(&self) -> Uuid {
        self.id
    }
}
