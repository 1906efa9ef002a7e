//! Reference catalogs.
//!
//! Every catalog shares `code`, `name`, `description` and the audit fields;
//! the per-catalog columns live in a `*Fields` struct flattened into
//! [`CatalogRecord`].

use inventa_core::Audit;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// A catalog row: common columns plus kind-specific `fields`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogRecord<X> {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(flatten)]
    pub fields: X,
    #[serde(flatten)]
    pub audit: Audit,
}

impl<X> CatalogRecord<X> {
    /// Not soft-deleted.
    pub fn is_visible(&self) -> bool {
        self.audit.is_visible()
    }

    /// Visible and active, so it may be referenced by new records.
    pub fn is_usable(&self) -> bool {
        self.audit.is_usable()
    }
}

/// Create/replace payload for any catalog.
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogInput<X> {
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Omitted on create means active; omitted on update keeps the current value.
    #[serde(default)]
    pub active: Option<bool>,
    #[serde(flatten)]
    pub fields: X,
}

/// Status catalogs that mark an initial and possibly final state.
pub trait StatusFlags {
    fn is_initial(&self) -> bool;
    fn is_final(&self) -> bool {
        false
    }
}

fn default_color() -> String {
    "#6c757d".to_string()
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct BrandFields {
    #[serde(default)]
    pub logo_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ModelFields {
    pub brand_id: Uuid,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct ArticleNameFields {
    /// Suggested warehouse category for articles with this name.
    #[serde(default)]
    pub recommended_category_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct SectorFields {
    #[serde(default)]
    pub responsible: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct WorkshopFields {
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub responsible: Option<String>,
    #[serde(default)]
    pub max_capacity: Option<u32>,
    #[serde(default)]
    pub equipment_notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct EquipmentTypeFields {
    #[serde(default)]
    pub requires_maintenance: bool,
    /// Days between scheduled maintenances.
    #[serde(default)]
    pub maintenance_period_days: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct ProvenanceFields {}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct DepartmentFields {
    #[serde(default)]
    pub head: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct WarehouseFields {
    #[serde(default)]
    pub responsible: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct ArticleCategoryFields {}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct MovementTypeFields {}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct AssetCategoryFields {}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct UnitFields {
    #[serde(default)]
    pub symbol: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AssetStateFields {
    #[serde(default = "default_color")]
    pub color: String,
    #[serde(default)]
    pub is_initial: bool,
    #[serde(default = "default_true")]
    pub allows_movement: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct LocationFields {
    #[serde(default)]
    pub building: Option<String>,
    #[serde(default)]
    pub floor: Option<String>,
    #[serde(default)]
    pub area: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct AssetMovementTypeFields {
    #[serde(default)]
    pub requires_location: bool,
    #[serde(default)]
    pub requires_responsible: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderStatusFields {
    #[serde(default = "default_color")]
    pub color: String,
    #[serde(default)]
    pub is_initial: bool,
    #[serde(default)]
    pub is_final: bool,
    #[serde(default = "default_true")]
    pub allows_edit: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ReceptionStatusFields {
    #[serde(default = "default_color")]
    pub color: String,
    #[serde(default)]
    pub is_initial: bool,
    #[serde(default)]
    pub is_final: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RequestTypeFields {
    #[serde(default = "default_true")]
    pub requires_approval: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RequestStatusFields {
    #[serde(default = "default_color")]
    pub color: String,
    #[serde(default)]
    pub is_initial: bool,
    #[serde(default)]
    pub is_final: bool,
    #[serde(default)]
    pub requires_action: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WriteOffReasonFields {
    /// Write-offs for this reason must be authorized before confirmation.
    #[serde(default = "default_true")]
    pub requires_authorization: bool,
    /// A supporting document reference is mandatory.
    #[serde(default)]
    pub requires_document: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WriteOffStatusFields {
    #[serde(default = "default_color")]
    pub color: String,
    #[serde(default)]
    pub is_initial: bool,
    #[serde(default)]
    pub is_final: bool,
    /// Lines may be added or removed while in this status.
    #[serde(default = "default_true")]
    pub allows_edit: bool,
}

impl StatusFlags for AssetStateFields {
    fn is_initial(&self) -> bool {
        self.is_initial
    }
}

impl StatusFlags for OrderStatusFields {
    fn is_initial(&self) -> bool {
        self.is_initial
    }
    fn is_final(&self) -> bool {
        self.is_final
    }
}

impl StatusFlags for ReceptionStatusFields {
    fn is_initial(&self) -> bool {
        self.is_initial
    }
    fn is_final(&self) -> bool {
        self.is_final
    }
}

impl StatusFlags for RequestStatusFields {
    fn is_initial(&self) -> bool {
        self.is_initial
    }
    fn is_final(&self) -> bool {
        self.is_final
    }
}

impl StatusFlags for WriteOffStatusFields {
    fn is_initial(&self) -> bool {
        self.is_initial
    }
    fn is_final(&self) -> bool {
        self.is_final
    }
}

pub type Brand = CatalogRecord<BrandFields>;
pub type Model = CatalogRecord<ModelFields>;
pub type ArticleName = CatalogRecord<ArticleNameFields>;
pub type Sector = CatalogRecord<SectorFields>;
pub type Workshop = CatalogRecord<WorkshopFields>;
pub type EquipmentType = CatalogRecord<EquipmentTypeFields>;
pub type Provenance = CatalogRecord<ProvenanceFields>;
pub type Department = CatalogRecord<DepartmentFields>;
pub type Warehouse = CatalogRecord<WarehouseFields>;
pub type ArticleCategory = CatalogRecord<ArticleCategoryFields>;
pub type MovementType = CatalogRecord<MovementTypeFields>;
pub type AssetCategory = CatalogRecord<AssetCategoryFields>;
pub type Unit = CatalogRecord<UnitFields>;
pub type AssetState = CatalogRecord<AssetStateFields>;
pub type Location = CatalogRecord<LocationFields>;
pub type AssetMovementType = CatalogRecord<AssetMovementTypeFields>;
pub type OrderStatus = CatalogRecord<OrderStatusFields>;
pub type ReceptionStatus = CatalogRecord<ReceptionStatusFields>;
pub type RequestType = CatalogRecord<RequestTypeFields>;
pub type RequestStatus = CatalogRecord<RequestStatusFields>;
pub type WriteOffReason = CatalogRecord<WriteOffReasonFields>;
pub type WriteOffStatus = CatalogRecord<WriteOffStatusFields>;
