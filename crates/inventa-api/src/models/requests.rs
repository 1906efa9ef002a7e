//! Material requests: asking the warehouse for articles or assets.

use chrono::{DateTime, NaiveDate, Utc};
use inventa_core::Audit;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::db::documents::Document;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestKind {
    Article,
    Asset,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RequestLine {
    pub id: Uuid,
    #[serde(default)]
    pub article_id: Option<Uuid>,
    #[serde(default)]
    pub asset_id: Option<Uuid>,
    pub requested_quantity: Decimal,
    pub approved_quantity: Decimal,
    pub dispatched_quantity: Decimal,
    #[serde(default)]
    pub notes: Option<String>,
}

/// One status transition, recorded on creation and on every change.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StatusChange {
    pub from_status_id: Option<Uuid>,
    pub to_status_id: Uuid,
    pub user: Option<Uuid>,
    pub notes: String,
    pub changed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MaterialRequest {
    pub id: Uuid,
    pub kind: RequestKind,
    pub number: String,
    pub request_type_id: Uuid,
    pub status_id: Uuid,
    pub requested_by: Option<Uuid>,
    pub requester_area: String,
    #[serde(default)]
    pub activity_title: Option<String>,
    #[serde(default)]
    pub activity_goal: Option<String>,
    pub required_date: NaiveDate,
    #[serde(default)]
    pub origin_warehouse_id: Option<Uuid>,
    #[serde(default)]
    pub department_id: Option<Uuid>,
    pub reason: String,
    #[serde(default)]
    pub notes: Option<String>,

    #[serde(default)]
    pub approved_by: Option<Uuid>,
    #[serde(default)]
    pub approved_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub approval_notes: Option<String>,

    #[serde(default)]
    pub rejected_by: Option<Uuid>,
    #[serde(default)]
    pub rejected_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub rejection_reason: Option<String>,

    #[serde(default)]
    pub dispatched_by: Option<Uuid>,
    #[serde(default)]
    pub dispatched_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub dispatch_notes: Option<String>,

    #[serde(default)]
    pub lines: Vec<RequestLine>,
    #[serde(default)]
    pub history: Vec<StatusChange>,
    #[serde(flatten)]
    pub audit: Audit,
}

impl MaterialRequest {
    /// Move to `to`, appending a history entry.
    pub fn transition(&mut self, to: Uuid, user: Option<Uuid>, notes: impl Into<String>) {
        let now = Utc::now();
        self.history.push(StatusChange {
            from_status_id: Some(self.status_id),
            to_status_id: to,
            user,
            notes: notes.into(),
            changed_at: now,
        });
        self.status_id = to;
        self.audit.updated_at = now;
    }

    pub fn is_approved(&self) -> bool {
        self.approved_at.is_some()
    }

    pub fn is_dispatched(&self) -> bool {
        self.dispatched_at.is_some()
    }
}

impl Document for MaterialRequest {
    const COLLECTION: &'static str = "material_requests";
    fn id(&self) -> Uuid {
        self.id
    }
}
