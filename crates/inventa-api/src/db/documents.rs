//! Document persistence operations.
//!
//! Records are stored as JSONB in the `documents` table keyed by
//! `(collection, id)`. Business rules are enforced at the application
//! layer, not in SQL.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::AppError;

/// A record type with its own collection in the `documents` table.
pub trait Document: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {
    /// Collection name used as the first half of the primary key.
    const COLLECTION: &'static str;

    /// Record identifier.
    fn id(&self) -> Uuid;
}

/// Insert or replace one document.
pub async fn upsert<'e, E>(
    executor: E,
    collection: &str,
    id: Uuid,
    body: &Value,
) -> Result<(), sqlx::Error>
where
    E: sqlx::PgExecutor<'e>,
{
    sqlx::query(
        "INSERT INTO documents (collection, id, body)
         VALUES ($1, $2, $3)
         ON CONFLICT (collection, id)
         DO UPDATE SET body = EXCLUDED.body, updated_at = now()",
    )
    .bind(collection)
    .bind(id)
    .bind(body)
    .execute(executor)
    .await?;

    Ok(())
}

/// Load every document of a collection, oldest first.
///
/// Rows that no longer deserialize into `D` are logged and skipped so that
/// one bad row cannot prevent startup.
pub async fn load_all<D: Document>(pool: &PgPool) -> Result<Vec<D>, sqlx::Error> {
    let rows: Vec<(Uuid, Value)> = sqlx::query_as(
        "SELECT id, body FROM documents WHERE collection = $1 ORDER BY created_at",
    )
    .bind(D::COLLECTION)
    .fetch_all(pool)
    .await?;

    let mut records = Vec::with_capacity(rows.len());
    for (id, body) in rows {
        match serde_json::from_value::<D>(body) {
            Ok(record) => records.push(record),
            Err(e) => {
                tracing::warn!(
                    collection = D::COLLECTION,
                    id = %id,
                    error = %e,
                    "skipping undecodable document"
                );
            }
        }
    }
    Ok(records)
}

#[derive(Debug)]
struct Staged {
    collection: &'static str,
    id: Uuid,
    body: Value,
}

/// Documents touched by one business operation, written in a single
/// transaction.
#[derive(Debug, Default)]
pub struct Changes {
    staged: Vec<Staged>,
}

impl Changes {
    /// Empty change set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage a document. Staging the same document twice keeps the later body.
    pub fn put<D: Document>(&mut self, doc: &D) -> Result<(), AppError> {
        let body = serde_json::to_value(doc).map_err(|e| {
            tracing::error!(collection = D::COLLECTION, error = %e, "failed to encode document");
            AppError::Internal(format!("failed to encode {}: {e}", D::COLLECTION))
        })?;
        let id = doc.id();
        match self
            .staged
            .iter_mut()
            .find(|s| s.collection == D::COLLECTION && s.id == id)
        {
            Some(existing) => existing.body = body,
            None => self.staged.push(Staged {
                collection: D::COLLECTION,
                id,
                body,
            }),
        }
        Ok(())
    }

    /// Number of staged documents.
    pub fn len(&self) -> usize {
        self.staged.len()
    }

    /// Whether nothing is staged.
    pub fn is_empty(&self) -> bool {
        self.staged.is_empty()
    }

    /// Write every staged document in one transaction.
    pub async fn commit(self, pool: &PgPool) -> Result<(), sqlx::Error> {
        if self.staged.is_empty() {
            return Ok(());
        }
        let mut tx = pool.begin().await?;
        for doc in &self.staged {
            upsert(&mut *tx, doc.collection, doc.id, &doc.body).await?;
        }
        tx.commit().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Note {
        id: Uuid,
        text: String,
    }

    impl Document for Note {
        const COLLECTION: &'static str = "notes";
        fn id(&self) -> Uuid {
            self.id
        }
    }

    #[test]
    fn staging_same_document_twice_keeps_last_body() {
        let id = Uuid::new_v4();
        let mut changes = Changes::new();
        changes.put(&Note { id, text: "draft".into() }).unwrap();
        changes.put(&Note { id, text: "final".into() }).unwrap();
        changes
            .put(&Note {
                id: Uuid::new_v4(),
                text: "other".into(),
            })
            .unwrap();

        assert_eq!(changes.len(), 2);
        assert_eq!(changes.staged[0].body["text"], "final");
        assert_eq!(changes.staged[0].collection, "notes");
    }

    #[test]
    fn new_change_set_is_empty() {
        assert!(Changes::new().is_empty());
    }
}
