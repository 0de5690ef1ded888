//! Tag repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist tag rows and (node, tag) bindings.
//! - Load tags for one node or for a whole result set in one statement.
//!
//! # Invariants
//! - A (node, tag) binding is unique; re-binding is a no-op.
//! - Deleting a tag removes all of its bindings in the same scope.
//! - Tag lists are ordered by name, then id.

use super::placeholders;
use crate::db::atomic;
use crate::error::{NodError, NodResult};
use crate::model::tag::{NodeTag, Tag};
use crate::model::{from_epoch_ms, new_id, now_ms, to_epoch_ms};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::collections::HashMap;

/// Repository interface for tags and node bindings.
pub trait TagRepository {
    /// Inserts the tag or updates its namespace and name. Returns the tag id.
    fn upsert_tag(&self, tag: &Tag) -> NodResult<String>;
    /// Inserts the tag unless a row with its id exists. Returns the tag id.
    fn create_tag_if_missing(&self, tag: &Tag) -> NodResult<String>;
    fn get_tag(&self, tag_id: &str) -> NodResult<Option<Tag>>;
    /// Deletes the tag and every binding that references it.
    fn delete_tag(&self, tag_id: &str) -> NodResult<()>;
    fn bind(&self, node_id: &str, tag_id: &str) -> NodResult<()>;
    fn unbind(&self, node_id: &str, tag_id: &str) -> NodResult<()>;
    /// Raw (node, tag) bindings of one node, ordered by tag id.
    fn list_bindings(&self, node_id: &str) -> NodResult<Vec<NodeTag>>;
    fn list_for_node(&self, node_id: &str) -> NodResult<Vec<Tag>>;
    fn list_for_nodes(&self, node_ids: &[String]) -> NodResult<HashMap<String, Vec<Tag>>>;
    /// Removes every binding of one node. Tag rows stay.
    fn delete_all(&self, node_id: &str) -> NodResult<()>;
}

/// SQLite-backed tag repository.
pub struct SqliteTagRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteTagRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl TagRepository for SqliteTagRepository<'_> {
    fn upsert_tag(&self, tag: &Tag) -> NodResult<String> {
        let tag_id = tag_id_or_new(tag);
        self.conn.execute(
            "INSERT INTO tags (id, namespace_id, name, created_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET
                namespace_id = excluded.namespace_id,
                name = excluded.name;",
            params![
                tag_id.as_str(),
                tag.namespace_id.as_deref(),
                tag.name.as_str(),
                created_at_ms(tag),
            ],
        )?;
        Ok(tag_id)
    }

    fn create_tag_if_missing(&self, tag: &Tag) -> NodResult<String> {
        let tag_id = tag_id_or_new(tag);
        self.conn.execute(
            "INSERT OR IGNORE INTO tags (id, namespace_id, name, created_at)
             VALUES (?1, ?2, ?3, ?4);",
            params![
                tag_id.as_str(),
                tag.namespace_id.as_deref(),
                tag.name.as_str(),
                created_at_ms(tag),
            ],
        )?;
        Ok(tag_id)
    }

    fn get_tag(&self, tag_id: &str) -> NodResult<Option<Tag>> {
        let tag = self
            .conn
            .query_row(
                "SELECT id, namespace_id, name, created_at FROM tags WHERE id = ?1;",
                [tag_id],
                |row| Ok(parse_tag_row(row)),
            )
            .optional()?;
        tag.transpose()
    }

    fn delete_tag(&self, tag_id: &str) -> NodResult<()> {
        atomic(self.conn, || -> NodResult<()> {
            self.conn
                .execute("DELETE FROM node_tags WHERE tag_id = ?1;", [tag_id])?;
            self.conn
                .execute("DELETE FROM tags WHERE id = ?1;", [tag_id])?;
            Ok(())
        })
    }

    fn bind(&self, node_id: &str, tag_id: &str) -> NodResult<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO node_tags (node_id, tag_id) VALUES (?1, ?2);",
            params![node_id, tag_id],
        )?;
        Ok(())
    }

    fn unbind(&self, node_id: &str, tag_id: &str) -> NodResult<()> {
        self.conn.execute(
            "DELETE FROM node_tags WHERE node_id = ?1 AND tag_id = ?2;",
            params![node_id, tag_id],
        )?;
        Ok(())
    }

    fn list_bindings(&self, node_id: &str) -> NodResult<Vec<NodeTag>> {
        let mut stmt = self.conn.prepare(
            "SELECT node_id, tag_id FROM node_tags WHERE node_id = ?1 ORDER BY tag_id ASC;",
        )?;
        let bindings = stmt
            .query_map([node_id], |row| {
                Ok(NodeTag {
                    node_id: row.get(0)?,
                    tag_id: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(bindings)
    }

    fn list_for_node(&self, node_id: &str) -> NodResult<Vec<Tag>> {
        let mut by_node = self.list_for_nodes(&[node_id.to_string()])?;
        Ok(by_node.remove(node_id).unwrap_or_default())
    }

    fn list_for_nodes(&self, node_ids: &[String]) -> NodResult<HashMap<String, Vec<Tag>>> {
        let mut result: HashMap<String, Vec<Tag>> = HashMap::new();
        if node_ids.is_empty() {
            return Ok(result);
        }

        let mut stmt = self.conn.prepare(&format!(
            "SELECT nt.node_id AS node_id, t.id AS id, t.namespace_id AS namespace_id,
                    t.name AS name, t.created_at AS created_at
             FROM node_tags nt
             INNER JOIN tags t ON t.id = nt.tag_id
             WHERE nt.node_id IN ({})
             ORDER BY t.name ASC, t.id ASC;",
            placeholders(node_ids.len())
        ))?;
        let mut rows = stmt.query(params_from_iter(node_ids.iter()))?;
        while let Some(row) = rows.next()? {
            let node_id: String = row.get("node_id")?;
            result.entry(node_id).or_default().push(parse_tag_row(row)?);
        }
        Ok(result)
    }

    fn delete_all(&self, node_id: &str) -> NodResult<()> {
        self.conn
            .execute("DELETE FROM node_tags WHERE node_id = ?1;", [node_id])?;
        Ok(())
    }
}

fn tag_id_or_new(tag: &Tag) -> String {
    if tag.id.is_empty() {
        new_id()
    } else {
        tag.id.clone()
    }
}

fn created_at_ms(tag: &Tag) -> i64 {
    tag.created_at.as_ref().map_or_else(now_ms, to_epoch_ms)
}

fn parse_tag_row(row: &Row<'_>) -> NodResult<Tag> {
    let id: String = row.get("id")?;
    if id.is_empty() {
        return Err(NodError::InvalidData("empty id in tags.id".to_string()));
    }
    Ok(Tag {
        id,
        namespace_id: row.get("namespace_id")?,
        name: row.get("name")?,
        created_at: Some(from_epoch_ms(row.get("created_at")?, "tags.created_at")?),
    })
}
