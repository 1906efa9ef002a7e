//! # Audit Fields
//!
//! Every persisted record carries the same four bookkeeping fields. The
//! struct is flattened into each record's JSON, so clients see
//! `active`, `deleted`, `created_at` and `updated_at` at top level.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Activity flag, soft-delete flag and timestamps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Audit {
    /// Whether the record is offered for new use. Inactive records stay visible.
    #[serde(default = "default_true")]
    pub active: bool,
    /// Soft-delete marker. Deleted records are hidden from default queries.
    #[serde(default)]
    pub deleted: bool,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp.
    pub updated_at: DateTime<Utc>,
}

fn default_true() -> bool {
    true
}

impl Audit {
    /// Fresh audit fields for a record created now.
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            active: true,
            deleted: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Bump `updated_at`.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Mark as deleted and inactive.
    pub fn soft_delete(&mut self) {
        self.deleted = true;
        self.active = false;
        self.touch();
    }

    /// Visible in default queries (not soft-deleted).
    pub fn is_visible(&self) -> bool {
        !self.deleted
    }

    /// Usable as a reference target: visible and active.
    pub fn is_usable(&self) -> bool {
        !self.deleted && self.active
    }
}

impl Default for Audit {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_records_are_active_and_visible() {
        let audit = Audit::new();
        assert!(audit.active);
        assert!(!audit.deleted);
        assert!(audit.is_visible());
        assert!(audit.is_usable());
        assert_eq!(audit.created_at, audit.updated_at);
    }

    #[test]
    fn soft_delete_hides_and_deactivates() {
        let mut audit = Audit::new();
        let before = audit.updated_at;
        audit.soft_delete();
        assert!(audit.deleted);
        assert!(!audit.active);
        assert!(!audit.is_visible());
        assert!(audit.updated_at >= before);
    }

    #[test]
    fn inactive_records_remain_visible_but_unusable() {
        let mut audit = Audit::new();
        audit.active = false;
        assert!(audit.is_visible());
        assert!(!audit.is_usable());
    }

    #[test]
    fn missing_flags_default_on_deserialize() {
        let audit: Audit = serde_json::from_value(serde_json::json!({
            "created_at": "2026-03-01T10:00:00Z",
            "updated_at": "2026-03-01T10:00:00Z"
        }))
        .unwrap();
        assert!(audit.active);
        assert!(!audit.deleted);
    }
}
