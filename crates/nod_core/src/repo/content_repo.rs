//! Content repository contracts and SQLite implementation.
//!
//! # Invariants
//! - One row per (node_id, key).
//! - `created_at` survives re-saves of the same key, both through `save` and
//!   through aggregate saves on the repository.
//! - A caller-supplied `created_at` is stored for new rows; otherwise the
//!   current time is used.

use super::placeholders;
use crate::error::NodResult;
use crate::model::content::ContentEntry;
use crate::model::{from_epoch_ms, now_ms, to_epoch_ms};
use rusqlite::{params, params_from_iter, Connection, Row};
use std::collections::{BTreeMap, HashMap};

const CONTENT_SELECT_SQL: &str = "SELECT node_id, key, value, created_at, updated_at FROM contents";

/// Repository interface for per-node text content.
pub trait ContentRepository {
    fn save(&self, entry: &ContentEntry) -> NodResult<()>;
    fn get(&self, node_id: &str, key: &str) -> NodResult<Option<ContentEntry>>;
    fn list_for_node(&self, node_id: &str) -> NodResult<BTreeMap<String, ContentEntry>>;
    fn list_for_nodes(
        &self,
        node_ids: &[String],
    ) -> NodResult<HashMap<String, BTreeMap<String, ContentEntry>>>;
    fn delete_all(&self, node_id: &str) -> NodResult<()>;
}

/// SQLite-backed content repository.
pub struct SqliteContentRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteContentRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl ContentRepository for SqliteContentRepository<'_> {
    fn save(&self, entry: &ContentEntry) -> NodResult<()> {
        self.conn.execute(
            "INSERT INTO contents (node_id, key, value, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(node_id, key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at;",
            params![
                entry.node_id.as_str(),
                entry.key.as_str(),
                entry.value.as_deref(),
                entry.created_at.as_ref().map_or_else(now_ms, to_epoch_ms),
                now_ms(),
            ],
        )?;
        Ok(())
    }

    fn get(&self, node_id: &str, key: &str) -> NodResult<Option<ContentEntry>> {
        let mut stmt = self.conn.prepare(&format!(
            "{CONTENT_SELECT_SQL} WHERE node_id = ?1 AND key = ?2;"
        ))?;
        let mut rows = stmt.query(params![node_id, key])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_content_row(row)?));
        }
        Ok(None)
    }

    fn list_for_node(&self, node_id: &str) -> NodResult<BTreeMap<String, ContentEntry>> {
        let mut by_node = self.list_for_nodes(&[node_id.to_string()])?;
        Ok(by_node.remove(node_id).unwrap_or_default())
    }

    fn list_for_nodes(
        &self,
        node_ids: &[String],
    ) -> NodResult<HashMap<String, BTreeMap<String, ContentEntry>>> {
        let mut result: HashMap<String, BTreeMap<String, ContentEntry>> = HashMap::new();
        if node_ids.is_empty() {
            return Ok(result);
        }

        let mut stmt = self.conn.prepare(&format!(
            "{CONTENT_SELECT_SQL} WHERE node_id IN ({});",
            placeholders(node_ids.len())
        ))?;
        let mut rows = stmt.query(params_from_iter(node_ids.iter()))?;
        while let Some(row) = rows.next()? {
            let entry = parse_content_row(row)?;
            result
                .entry(entry.node_id.clone())
                .or_default()
                .insert(entry.key.clone(), entry);
        }
        Ok(result)
    }

    fn delete_all(&self, node_id: &str) -> NodResult<()> {
        self.conn
            .execute("DELETE FROM contents WHERE node_id = ?1;", [node_id])?;
        Ok(())
    }
}

fn parse_content_row(row: &Row<'_>) -> NodResult<ContentEntry> {
    Ok(ContentEntry {
        node_id: row.get("node_id")?,
        key: row.get("key")?,
        value: row.get("value")?,
        created_at: Some(from_epoch_ms(row.get("created_at")?, "contents.created_at")?),
        updated_at: Some(from_epoch_ms(row.get("updated_at")?, "contents.updated_at")?),
    })
}
