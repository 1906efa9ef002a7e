//! Workshop equipment and maintenance history.

use chrono::{DateTime, NaiveDate, Utc};
use inventa_core::Audit;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::db::documents::Document;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EquipmentStatus {
    #[default]
    Available,
    InUse,
    Maintenance,
    Retired,
    OnLoan,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Equipment {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub equipment_type_id: Uuid,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub serial_number: Option<String>,
    #[serde(default)]
    pub acquisition_date: Option<NaiveDate>,
    #[serde(default)]
    pub acquisition_value: Option<Decimal>,
    #[serde(default)]
    pub status: EquipmentStatus,
    #[serde(default)]
    pub current_location: Option<String>,
    #[serde(default)]
    pub responsible: Option<String>,
    #[serde(default)]
    pub workshop_id: Option<Uuid>,
    #[serde(default)]
    pub last_maintenance: Option<NaiveDate>,
    #[serde(default)]
    pub next_maintenance: Option<NaiveDate>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(flatten)]
    pub audit: Audit,
}

impl Equipment {
    /// Whether the next scheduled maintenance falls on or before `limit`.
    pub fn maintenance_due_by(&self, limit: NaiveDate) -> bool {
        self.next_maintenance.is_some_and(|next| next <= limit)
    }
}

impl Document for Equipment {
    const COLLECTION: &'static str = "equipment";
    fn id(&self) -> Uuid {
        self.id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MaintenanceKind {
    Preventive,
    Corrective,
    Calibration,
    Review,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MaintenanceRecord {
    pub id: Uuid,
    pub equipment_id: Uuid,
    pub date: NaiveDate,
    pub kind: MaintenanceKind,
    pub description: String,
    pub performed_by: String,
    #[serde(default)]
    pub cost: Option<Decimal>,
    #[serde(default)]
    pub next_maintenance: Option<NaiveDate>,
    #[serde(default)]
    pub notes: Option<String>,
    pub recorded_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Document for MaintenanceRecord {
    const COLLECTION: &'static str = "maintenance_records";
    fn id(&self) -> Uuid {
        self.id
    }
}
