//! Inventory write-offs: stock removed from a warehouse for good.

use chrono::{DateTime, NaiveDate, Utc};
use inventa_core::Audit;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::db::documents::Document;
use crate::models::requests::StatusChange;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WriteOffLine {
    pub id: Uuid,
    pub article_id: Uuid,
    pub quantity: Decimal,
    pub unit_value: Decimal,
    /// `quantity × unit_value`.
    pub total_value: Decimal,
    #[serde(default)]
    pub lot: Option<String>,
    #[serde(default)]
    pub serial_number: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WriteOff {
    pub id: Uuid,
    pub number: String,
    pub date: NaiveDate,
    pub reason_id: Uuid,
    pub status_id: Uuid,
    pub warehouse_id: Uuid,
    pub requested_by: Option<Uuid>,
    pub description: String,
    #[serde(default)]
    pub notes: Option<String>,
    /// Supporting document reference, e.g. a police report number.
    #[serde(default)]
    pub document: Option<String>,

    #[serde(default)]
    pub authorized_by: Option<Uuid>,
    #[serde(default)]
    pub authorized_at: Option<DateTime<Utc>>,
    /// Authorization notes, or the rejection reason prefixed `REJECTED:`.
    #[serde(default)]
    pub authorization_notes: Option<String>,

    #[serde(default)]
    pub confirmed_by: Option<Uuid>,
    #[serde(default)]
    pub confirmed_at: Option<DateTime<Utc>>,

    /// Sum of the line totals.
    pub total_value: Decimal,
    #[serde(default)]
    pub lines: Vec<WriteOffLine>,
    #[serde(default)]
    pub history: Vec<StatusChange>,
    #[serde(flatten)]
    pub audit: Audit,
}

impl WriteOff {
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

    pub fn recalculate_total(&mut self) {
        self.total_value = self.lines.iter().map(|l| l.total_value).sum();
    }

    pub fn is_authorized(&self) -> bool {
        self.authorized_at.is_some()
    }

    /// Quantity per article across all lines, in first-seen order.
    pub fn quantities_by_article(&self) -> Vec<(Uuid, Decimal)> {
        let mut totals: Vec<(Uuid, Decimal)> = Vec::new();
        for line in &self.lines {
            match totals.iter_mut().find(|(id, _)| *id == line.article_id) {
                Some((_, quantity)) => *quantity += line.quantity,
                None => totals.push((line.article_id, line.quantity)),
            }
        }
        totals
    }
}

impl Document for WriteOff {
    const COLLECTION: &'static str = "write_offs";
    fn id(&self) -> Uuid {
        self.id
    }
}
