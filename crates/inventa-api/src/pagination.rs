//! List pagination: `limit`/`offset` query parameters and the page envelope.

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize};

/// Default page size.
pub const DEFAULT_PAGE_LIMIT: u64 = 20;

const MAX_PAGE_LIMIT: u64 = 1000;

#[derive(Deserialize)]
#[serde(untagged)]
enum U64Input {
    Number(u64),
    Text(String),
}

/// Accept `limit=20` or `"limit": "20"`.
pub fn deserialize_optional_u64<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<U64Input>::deserialize(deserializer)?;
    match value {
        None => Ok(None),
        Some(U64Input::Number(number)) => Ok(Some(number)),
        Some(U64Input::Text(text)) => text
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(DeError::custom),
    }
}

/// One page of a filtered, ordered listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Number of records matching the filters before paging.
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
}

impl<T> Page<T> {
    /// Cut a page out of already filtered and ordered records.
    pub fn from_items(items: Vec<T>, limit: Option<u64>, offset: Option<u64>) -> Self {
        let limit = limit.unwrap_or(DEFAULT_PAGE_LIMIT).min(MAX_PAGE_LIMIT) as usize;
        let offset = offset.unwrap_or(0) as usize;
        let total = items.len();
        let items = items.into_iter().skip(offset).take(limit).collect();
        Self {
            items,
            total,
            limit,
            offset,
        }
    }
}
