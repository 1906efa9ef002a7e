//! Warehouse articles and their stock movements.

use chrono::{DateTime, Utc};
use inventa_core::{Audit, Operation, StockLevels};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::db::documents::Document;

/// A consumable stocked in a warehouse.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Article {
    pub id: Uuid,
    pub sku: String,
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub brand: Option<String>,
    pub category_id: Uuid,
    pub warehouse_id: Uuid,
    pub stock: Decimal,
    pub minimum_stock: Decimal,
    #[serde(default)]
    pub maximum_stock: Option<Decimal>,
    #[serde(default)]
    pub reorder_point: Option<Decimal>,
    pub unit: String,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(flatten)]
    pub audit: Audit,
}

impl Article {
    pub fn levels(&self) -> StockLevels {
        StockLevels {
            minimum: self.minimum_stock,
            maximum: self.maximum_stock,
            reorder_point: self.reorder_point,
        }
    }

    pub fn is_low_stock(&self) -> bool {
        self.levels().is_low(self.stock)
    }

    pub fn needs_reorder(&self) -> bool {
        self.levels().needs_reorder(self.stock)
    }
}

impl Document for Article {
    const COLLECTION: &'static str = "articles";
    fn id(&self) -> Uuid {
        self.id
    }
}

/// An immutable record of one stock change.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Movement {
    pub id: Uuid,
    pub article_id: Uuid,
    pub movement_type_id: Uuid,
    pub operation: Operation,
    pub quantity: Decimal,
    pub reason: String,
    pub recorded_by: Option<Uuid>,
    pub stock_before: Decimal,
    pub stock_after: Decimal,
    pub created_at: DateTime<Utc>,
}

impl Document for Movement {
    const COLLECTION: &'static str = "movements";
    fn id(&self) -> Uuid {
        self.id
    }
}
