//! Node record and node aggregate.
//!
//! # Invariants
//! - `NodeRecord::id` is empty until the store assigns one on save.
//! - `created_at`/`updated_at` are `None` on caller-built records and always
//!   populated on records read back from the store.
//! - Side-data maps are keyed by their cell key; the key inside a cell is
//!   overwritten by the map key on save.

use super::content::ContentEntry;
use super::kv::{KvCell, KvValue};
use super::tag::Tag;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Opaque node identifier.
pub type NodeId = String;

/// Core storage record of one node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: NodeId,
    pub namespace_id: Option<String>,
    /// Forest edge. `None` or empty means root.
    pub parent_id: Option<NodeId>,
    #[serde(rename = "type")]
    pub node_type: String,
    pub kind: String,
    pub status: String,
    pub name: String,
    /// Opaque metadata, stored as JSON text.
    pub metadata: Value,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Default for NodeRecord {
    fn default() -> Self {
        Self {
            id: String::new(),
            namespace_id: None,
            parent_id: None,
            node_type: String::new(),
            kind: String::new(),
            status: String::new(),
            name: String::new(),
            metadata: Value::Object(Default::default()),
            created_at: None,
            updated_at: None,
        }
    }
}

impl NodeRecord {
    /// Creates a record without id; the store assigns one on save.
    pub fn new(
        node_type: impl Into<String>,
        kind: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            node_type: node_type.into(),
            kind: kind.into(),
            name: name.into(),
            ..Self::default()
        }
    }

    /// Returns the parent id when it is present and non-empty.
    pub fn parent(&self) -> Option<&str> {
        self.parent_id.as_deref().filter(|value| !value.is_empty())
    }

    pub fn is_root(&self) -> bool {
        self.parent().is_none()
    }
}

/// One node record plus the side data requested for a read or supplied for a
/// write.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Node {
    pub record: NodeRecord,
    pub tags: Vec<Tag>,
    pub kv: BTreeMap<String, KvCell>,
    pub content: BTreeMap<String, ContentEntry>,
}

impl Node {
    pub fn new(record: NodeRecord) -> Self {
        Self {
            record,
            ..Self::default()
        }
    }

    pub fn id(&self) -> &str {
        &self.record.id
    }

    pub fn with_tag(mut self, tag: Tag) -> Self {
        self.tags.push(tag);
        self
    }

    /// Sets one key/value cell, replacing any previous cell with that key.
    pub fn set_kv(&mut self, key: impl Into<String>, value: impl Into<KvValue>) {
        let cell = KvCell::new(key, value);
        self.kv.insert(cell.key.clone(), cell);
    }

    /// Sets one content entry, replacing any previous entry with that key.
    pub fn set_content(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let entry = ContentEntry::new(key, value);
        self.content.insert(entry.key.clone(), entry);
    }

    pub fn kv_value(&self, key: &str) -> Option<&KvValue> {
        self.kv.get(key).and_then(|cell| cell.value.as_ref())
    }

    pub fn content_text(&self, key: &str) -> Option<&str> {
        self.content
            .get(key)
            .and_then(|entry| entry.value.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::{Node, NodeRecord};

    #[test]
    fn empty_parent_id_is_root() {
        let mut record = NodeRecord::new("task", "", "a");
        assert!(record.is_root());
        record.parent_id = Some(String::new());
        assert!(record.is_root());
        record.parent_id = Some("p".to_string());
        assert_eq!(record.parent(), Some("p"));
        assert!(!record.is_root());
    }

    #[test]
    fn set_kv_replaces_existing_key() {
        let mut node = Node::new(NodeRecord::new("task", "", "a"));
        node.set_kv("a", 1_i64);
        node.set_kv("a", "text");
        assert_eq!(node.kv.len(), 1);
        assert_eq!(
            node.kv_value("a").and_then(|value| value.as_text()),
            Some("text")
        );
    }
}
