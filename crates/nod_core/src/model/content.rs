//! Free-form text content keyed per node.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentEntry {
    /// Stamped with the owning node id on save.
    pub node_id: String,
    pub key: String,
    pub value: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl ContentEntry {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            node_id: String::new(),
            key: key.into(),
            value: Some(value.into()),
            created_at: None,
            updated_at: None,
        }
    }
}

/// Builds a content map from plain text pairs.
pub fn content_map_from<K, V>(
    pairs: impl IntoIterator<Item = (K, V)>,
) -> BTreeMap<String, ContentEntry>
where
    K: Into<String>,
    V: Into<String>,
{
    pairs
        .into_iter()
        .map(|(key, value)| {
            let entry = ContentEntry::new(key, value);
            (entry.key.clone(), entry)
        })
        .collect()
}

/// Projects a content map to plain text; entries without value are skipped.
pub fn content_text_map(entries: &BTreeMap<String, ContentEntry>) -> BTreeMap<String, String> {
    entries
        .iter()
        .filter_map(|(key, entry)| Some((key.clone(), entry.value.clone()?)))
        .collect()
}
