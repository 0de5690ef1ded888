#![allow(dead_code)]

use nod_core::{
    open_db_in_memory, MapperRegistry, Node, NodeMapper, NodeModel, NodeRecord, NodResult, NodError,
    Tag,
};
use rusqlite::Connection;

pub fn setup() -> Connection {
    open_db_in_memory().unwrap()
}

pub fn registry() -> MapperRegistry {
    MapperRegistry::new()
        .with::<Task, _>("task", "", TaskMapper)
        .with::<Entry, _>("entry", "folder", EntryMapper)
        .with::<Entry, _>("entry", "file", EntryMapper)
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Task {
    pub id: String,
    pub namespace_id: Option<String>,
    pub parent_id: Option<String>,
    pub title: String,
    pub status: String,
    pub priority: i64,
    pub body: Option<String>,
    pub labels: Vec<String>,
}

impl Task {
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            status: "open".to_string(),
            ..Self::default()
        }
    }
}

impl NodeModel for Task {
    fn node_type(&self) -> &str {
        "task"
    }

    fn node_kind(&self) -> &str {
        ""
    }
}

pub struct TaskMapper;

impl NodeMapper<Task> for TaskMapper {
    fn to_node(&self, model: &Task) -> NodResult<Node> {
        let mut record = NodeRecord::new("task", "", model.title.clone());
        record.id = model.id.clone();
        record.namespace_id = model.namespace_id.clone();
        record.parent_id = model.parent_id.clone();
        record.status = model.status.clone();

        let mut node = Node::new(record);
        node.set_kv("priority", model.priority);
        if let Some(body) = &model.body {
            node.set_content("body", body.clone());
        }
        node.tags = model.labels.iter().map(Tag::new).collect();
        Ok(node)
    }

    fn from_node(&self, node: &Node) -> NodResult<Task> {
        Ok(Task {
            id: node.record.id.clone(),
            namespace_id: node.record.namespace_id.clone(),
            parent_id: node.record.parent_id.clone(),
            title: node.record.name.clone(),
            status: node.record.status.clone(),
            priority: node
                .kv_value("priority")
                .and_then(|value| value.as_int())
                .unwrap_or_default(),
            body: node.content_text("body").map(str::to_string),
            labels: node.tags.iter().map(|tag| tag.name.clone()).collect(),
        })
    }
}

/// One Rust type stored under two (type, kind) pairs.
#[derive(Debug, Clone, PartialEq)]
pub enum Entry {
    Folder {
        id: String,
        parent_id: Option<String>,
        name: String,
    },
    File {
        id: String,
        parent_id: Option<String>,
        name: String,
        size: i64,
    },
}

impl Entry {
    pub fn folder(id: &str, parent_id: Option<&str>, name: &str) -> Self {
        Self::Folder {
            id: id.to_string(),
            parent_id: parent_id.map(str::to_string),
            name: name.to_string(),
        }
    }

    pub fn file(id: &str, parent_id: Option<&str>, name: &str, size: i64) -> Self {
        Self::File {
            id: id.to_string(),
            parent_id: parent_id.map(str::to_string),
            name: name.to_string(),
            size,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Self::Folder { id, .. } | Self::File { id, .. } => id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Folder { name, .. } | Self::File { name, .. } => name,
        }
    }
}

impl NodeModel for Entry {
    fn node_type(&self) -> &str {
        "entry"
    }

    fn node_kind(&self) -> &str {
        match self {
            Self::Folder { .. } => "folder",
            Self::File { .. } => "file",
        }
    }
}

pub struct EntryMapper;

impl NodeMapper<Entry> for EntryMapper {
    fn to_node(&self, model: &Entry) -> NodResult<Node> {
        let (id, parent_id, name) = match model {
            Entry::Folder {
                id,
                parent_id,
                name,
            }
            | Entry::File {
                id,
                parent_id,
                name,
                ..
            } => (id, parent_id, name),
        };
        let mut record = NodeRecord::new("entry", model.node_kind(), name.clone());
        record.id = id.clone();
        record.parent_id = parent_id.clone();

        let mut node = Node::new(record);
        if let Entry::File { size, .. } = model {
            node.set_kv("size", *size);
        }
        Ok(node)
    }

    fn from_node(&self, node: &Node) -> NodResult<Entry> {
        let record = &node.record;
        match record.kind.as_str() {
            "folder" => Ok(Entry::Folder {
                id: record.id.clone(),
                parent_id: record.parent_id.clone(),
                name: record.name.clone(),
            }),
            "file" => Ok(Entry::File {
                id: record.id.clone(),
                parent_id: record.parent_id.clone(),
                name: record.name.clone(),
                size: node
                    .kv_value("size")
                    .and_then(|value| value.as_int())
                    .unwrap_or_default(),
            }),
            other => Err(NodError::mapping(format!("unknown entry kind `{other}`"))),
        }
    }
}
