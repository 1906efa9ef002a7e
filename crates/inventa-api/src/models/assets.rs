//! Fixed assets, their movements and where each one currently is.

use chrono::{DateTime, NaiveDate, Utc};
use inventa_core::{Audit, StockLevels};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::db::documents::Document;

const BARCODE_PREFIX: &str = "COD";
const BARCODE_CODE_CHARS: usize = 12;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Asset {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub category_id: Uuid,
    pub unit_id: Uuid,
    pub state_id: Uuid,
    #[serde(default)]
    pub article_name_id: Option<Uuid>,
    #[serde(default)]
    pub sector_id: Option<Uuid>,
    #[serde(default)]
    pub brand_id: Option<Uuid>,
    #[serde(default)]
    pub model_id: Option<Uuid>,
    #[serde(default)]
    pub serial_number: Option<String>,
    pub barcode: String,
    pub minimum_stock: Decimal,
    #[serde(default)]
    pub maximum_stock: Option<Decimal>,
    #[serde(default)]
    pub reorder_point: Option<Decimal>,
    pub unit_price: Decimal,
    pub average_cost: Decimal,
    #[serde(default)]
    pub requires_serial: bool,
    #[serde(default)]
    pub requires_lot: bool,
    #[serde(default)]
    pub requires_expiry: bool,
    #[serde(flatten)]
    pub audit: Audit,
}

impl Asset {
    pub fn levels(&self) -> StockLevels {
        StockLevels {
            minimum: self.minimum_stock,
            maximum: self.maximum_stock,
            reorder_point: self.reorder_point,
        }
    }
}

impl Document for Asset {
    const COLLECTION: &'static str = "assets";
    fn id(&self) -> Uuid {
        self.id
    }
}

/// Barcode assigned when none is given: `COD` plus the first twelve
/// characters of the code with `-` and `_` removed.
pub fn default_barcode(code: &str) -> String {
    let cleaned: String = code
        .chars()
        .filter(|c| *c != '-' && *c != '_')
        .flat_map(char::to_uppercase)
        .take(BARCODE_CODE_CHARS)
        .collect();
    format!("{BARCODE_PREFIX}{cleaned}")
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AssetMovement {
    pub id: Uuid,
    pub asset_id: Uuid,
    pub movement_type_id: Uuid,
    pub quantity: Decimal,
    #[serde(default)]
    pub destination_location_id: Option<Uuid>,
    #[serde(default)]
    pub responsible: Option<String>,
    #[serde(default)]
    pub serial_number: Option<String>,
    #[serde(default)]
    pub lot: Option<String>,
    #[serde(default)]
    pub expiry_date: Option<NaiveDate>,
    #[serde(default)]
    pub entry_date: Option<NaiveDate>,
    #[serde(default)]
    pub invoice_number: Option<String>,
    #[serde(default)]
    pub provenance_id: Option<Uuid>,
    #[serde(default)]
    pub disposal_date: Option<NaiveDate>,
    #[serde(default)]
    pub disposal_reason: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    pub recorded_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Document for AssetMovement {
    const COLLECTION: &'static str = "asset_movements";
    fn id(&self) -> Uuid {
        self.id
    }
}

/// Where an asset is now and who holds it. Keyed by the asset id.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CurrentLocation {
    pub asset_id: Uuid,
    pub location_id: Option<Uuid>,
    pub responsible: Option<String>,
    pub last_movement_id: Uuid,
    pub updated_at: DateTime<Utc>,
}

impl Document for CurrentLocation {
    const COLLECTION: &'static str = "current_locations";
    fn id(&self) -> Uuid {
        self.asset_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn barcode_strips_separators_and_uppercases() {
        assert_eq!(default_barcode("nb-dell_01"), "CODNBDELL01");
    }

    #[test]
    fn barcode_keeps_twelve_code_characters() {
        assert_eq!(default_barcode("ABCDEFGHIJKLMNOP"), "CODABCDEFGHIJKL");
        assert_eq!(default_barcode("AB-CD-EF-GH-IJ-KL-MN"), "CODABCDEFGHIJKL");
    }
}
