//! Tag model shared across nodes through the `node_tags` join.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    /// Empty until the store assigns one on save.
    pub id: String,
    pub namespace_id: Option<String>,
    pub name: String,
    pub created_at: Option<DateTime<Utc>>,
}

impl Tag {
    /// Tag without id. Every save of a node carrying it creates a fresh
    /// `tags` row; reuse the stored id (see [`Tag::with_id`]) to share one
    /// tag between saves and nodes.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_id(String::new(), name)
    }

    pub fn with_id(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            namespace_id: None,
            name: name.into(),
            created_at: None,
        }
    }
}

/// One (node, tag) binding.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeTag {
    pub node_id: String,
    pub tag_id: String,
}
