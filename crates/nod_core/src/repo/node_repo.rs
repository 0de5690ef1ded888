//! Node record repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Upsert, read and delete rows of the `nodes` table.
//! - Own row decoding shared by the query engine and tree builder.
//!
//! # Invariants
//! - `created_at` is written once; upserts only move `updated_at`.
//! - `metadata` is stored as JSON text and must parse on read.

use crate::error::{NodError, NodResult};
use crate::model::node::NodeRecord;
use crate::model::{from_epoch_ms, now_ms};
use rusqlite::{params, Connection, Row};

pub(crate) const NODE_COLUMNS: &str =
    "id, namespace_id, parent_id, type, kind, status, name, metadata, created_at, updated_at";

/// Repository interface for node record rows.
pub trait NodeRepository {
    /// Inserts the record or replaces every non-timestamp column.
    fn upsert_node(&self, record: &NodeRecord) -> NodResult<()>;
    fn get_node(&self, node_id: &str) -> NodResult<Option<NodeRecord>>;
    /// Returns whether a row was removed.
    fn delete_node(&self, node_id: &str) -> NodResult<bool>;
    /// Returns whether any record uses `node_id` as parent.
    fn has_children(&self, node_id: &str) -> NodResult<bool>;
}

/// SQLite-backed node record repository.
pub struct SqliteNodeRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteNodeRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl NodeRepository for SqliteNodeRepository<'_> {
    fn upsert_node(&self, record: &NodeRecord) -> NodResult<()> {
        if record.id.is_empty() {
            return Err(NodError::InvalidData(
                "node record must carry an id before upsert".to_string(),
            ));
        }

        let metadata = serde_json::to_string(&record.metadata).map_err(|err| {
            NodError::InvalidData(format!("metadata of node `{}`: {err}", record.id))
        })?;

        self.conn.execute(
            "INSERT INTO nodes (
                id,
                namespace_id,
                parent_id,
                type,
                kind,
                status,
                name,
                metadata,
                created_at,
                updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)
            ON CONFLICT(id) DO UPDATE SET
                namespace_id = excluded.namespace_id,
                parent_id = excluded.parent_id,
                type = excluded.type,
                kind = excluded.kind,
                status = excluded.status,
                name = excluded.name,
                metadata = excluded.metadata,
                updated_at = excluded.updated_at;",
            params![
                record.id.as_str(),
                record.namespace_id.as_deref(),
                record.parent_id.as_deref(),
                record.node_type.as_str(),
                record.kind.as_str(),
                record.status.as_str(),
                record.name.as_str(),
                metadata,
                now_ms(),
            ],
        )?;

        Ok(())
    }

    fn get_node(&self, node_id: &str) -> NodResult<Option<NodeRecord>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {NODE_COLUMNS} FROM nodes WHERE id = ?1;"))?;
        let mut rows = stmt.query([node_id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_node_row(row)?));
        }
        Ok(None)
    }

    fn delete_node(&self, node_id: &str) -> NodResult<bool> {
        let changed = self
            .conn
            .execute("DELETE FROM nodes WHERE id = ?1;", [node_id])?;
        Ok(changed > 0)
    }

    fn has_children(&self, node_id: &str) -> NodResult<bool> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM nodes
                WHERE parent_id = ?1
            );",
            [node_id],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }
}

pub(crate) fn parse_node_row(row: &Row<'_>) -> NodResult<NodeRecord> {
    let id: String = row.get("id")?;
    let metadata_text: String = row.get("metadata")?;
    let metadata = serde_json::from_str(&metadata_text).map_err(|err| {
        NodError::InvalidData(format!("invalid json in nodes.metadata of `{id}`: {err}"))
    })?;

    Ok(NodeRecord {
        namespace_id: row.get("namespace_id")?,
        parent_id: row.get("parent_id")?,
        node_type: row.get("type")?,
        kind: row.get("kind")?,
        status: row.get("status")?,
        name: row.get("name")?,
        metadata,
        created_at: Some(from_epoch_ms(row.get("created_at")?, "nodes.created_at")?),
        updated_at: Some(from_epoch_ms(row.get("updated_at")?, "nodes.updated_at")?),
        id,
    })
}
