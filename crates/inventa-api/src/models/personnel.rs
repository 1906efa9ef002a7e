//! Staff members and their fingerprint enrollment.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::db::documents::Document;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum StaffStatus {
    #[default]
    Active,
    Inactive,
}

/// Stored result of enrolling a fingerprint. The raw template is not kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct FingerprintEnrollment {
    /// Lowercase hex SHA-256 of the template.
    pub hash: String,
    pub quality: Option<u8>,
    pub device_id: Option<String>,
    pub enrolled_at: DateTime<Utc>,
    pub enrolled_by: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StaffMember {
    pub id: Uuid,
    pub first_names: String,
    pub last_names: String,
    pub email: String,
    #[serde(default)]
    pub status: StaffStatus,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub fingerprint: Option<FingerprintEnrollment>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StaffMember {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_names, self.last_names)
    }
}

impl Document for StaffMember {
    const COLLECTION: &'static str = "staff";
    fn id(&self) -> Uuid {
        self.id
    }
}
