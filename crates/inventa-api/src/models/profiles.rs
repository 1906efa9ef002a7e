//! Requests for system access submitted on behalf of new staff.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::db::documents::Document;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProfileStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProfileRequest {
    pub id: Uuid,

    pub first_name: String,
    pub last_names: String,
    pub rut: String,
    pub email: String,
    pub unit: String,
    pub staff_category: String,
    pub position: String,

    pub manager_first_name: String,
    pub manager_last_names: String,
    pub manager_rut: String,
    pub manager_email: String,
    pub manager_unit: String,
    pub manager_staff_category: String,
    pub manager_position: String,

    pub systems: Vec<String>,
    #[serde(default)]
    pub permissions: Option<String>,
    #[serde(default)]
    pub homologation: Option<String>,

    #[serde(default)]
    pub status: ProfileStatus,
    #[serde(default)]
    pub reviewed_by: Option<Uuid>,
    #[serde(default)]
    pub reviewed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub review_notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Document for ProfileRequest {
    const COLLECTION: &'static str = "profile_requests";
    fn id(&self) -> Uuid {
        self.id
    }
}
