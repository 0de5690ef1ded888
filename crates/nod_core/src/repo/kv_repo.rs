//! Key/value repository contracts and SQLite implementation.
//!
//! # Invariants
//! - One row per (node_id, key); `set` replaces the whole row.
//! - Exactly one `value_*` column is non-null for a populated cell; rows with
//!   more than one are rejected on read.
//! - NaN numbers are rejected on write; SQLite would store them as NULL.

use super::placeholders;
use crate::error::{NodError, NodResult};
use crate::model::kv::{KvCell, KvValue};
use crate::model::{from_epoch_ms, to_epoch_ms};
use rusqlite::{params, params_from_iter, Connection, Row};
use std::collections::{BTreeMap, HashMap};

const KV_SELECT_SQL: &str = "SELECT
    node_id,
    key,
    value_text,
    value_number,
    value_int,
    value_bool,
    value_time
FROM kv";

/// Repository interface for typed key/value cells.
pub trait KvRepository {
    /// Inserts or replaces one cell.
    ///
    /// # Errors
    /// - `InvalidData` for a NaN number.
    fn set(&self, cell: &KvCell) -> NodResult<()>;
    fn get(&self, node_id: &str, key: &str) -> NodResult<Option<KvCell>>;
    fn list_for_node(&self, node_id: &str) -> NodResult<BTreeMap<String, KvCell>>;
    fn list_for_nodes(
        &self,
        node_ids: &[String],
    ) -> NodResult<HashMap<String, BTreeMap<String, KvCell>>>;
    fn delete(&self, node_id: &str, key: &str) -> NodResult<()>;
    fn delete_all(&self, node_id: &str) -> NodResult<()>;
}

/// SQLite-backed key/value repository.
pub struct SqliteKvRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteKvRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl KvRepository for SqliteKvRepository<'_> {
    fn set(&self, cell: &KvCell) -> NodResult<()> {
        let columns = ValueColumns::from_value(cell.value.as_ref(), &cell.node_id, &cell.key)?;
        self.conn.execute(
            "INSERT INTO kv (
                node_id,
                key,
                value_text,
                value_number,
                value_int,
                value_bool,
                value_time
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(node_id, key) DO UPDATE SET
                value_text = excluded.value_text,
                value_number = excluded.value_number,
                value_int = excluded.value_int,
                value_bool = excluded.value_bool,
                value_time = excluded.value_time;",
            params![
                cell.node_id.as_str(),
                cell.key.as_str(),
                columns.text,
                columns.number,
                columns.int,
                columns.boolean,
                columns.time,
            ],
        )?;
        Ok(())
    }

    fn get(&self, node_id: &str, key: &str) -> NodResult<Option<KvCell>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{KV_SELECT_SQL} WHERE node_id = ?1 AND key = ?2;"))?;
        let mut rows = stmt.query(params![node_id, key])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_kv_row(row)?));
        }
        Ok(None)
    }

    fn list_for_node(&self, node_id: &str) -> NodResult<BTreeMap<String, KvCell>> {
        let mut by_node = self.list_for_nodes(&[node_id.to_string()])?;
        Ok(by_node.remove(node_id).unwrap_or_default())
    }

    fn list_for_nodes(
        &self,
        node_ids: &[String],
    ) -> NodResult<HashMap<String, BTreeMap<String, KvCell>>> {
        let mut result: HashMap<String, BTreeMap<String, KvCell>> = HashMap::new();
        if node_ids.is_empty() {
            return Ok(result);
        }

        let mut stmt = self.conn.prepare(&format!(
            "{KV_SELECT_SQL} WHERE node_id IN ({});",
            placeholders(node_ids.len())
        ))?;
        let mut rows = stmt.query(params_from_iter(node_ids.iter()))?;
        while let Some(row) = rows.next()? {
            let cell = parse_kv_row(row)?;
            result
                .entry(cell.node_id.clone())
                .or_default()
                .insert(cell.key.clone(), cell);
        }
        Ok(result)
    }

    fn delete(&self, node_id: &str, key: &str) -> NodResult<()> {
        self.conn.execute(
            "DELETE FROM kv WHERE node_id = ?1 AND key = ?2;",
            params![node_id, key],
        )?;
        Ok(())
    }

    fn delete_all(&self, node_id: &str) -> NodResult<()> {
        self.conn
            .execute("DELETE FROM kv WHERE node_id = ?1;", [node_id])?;
        Ok(())
    }
}

/// Column projection of one cell value.
#[derive(Debug, Default, PartialEq)]
struct ValueColumns {
    text: Option<String>,
    number: Option<f64>,
    int: Option<i64>,
    boolean: Option<bool>,
    time: Option<i64>,
}

impl ValueColumns {
    fn from_value(value: Option<&KvValue>, node_id: &str, key: &str) -> NodResult<Self> {
        let mut columns = Self::default();
        match value {
            None => {}
            Some(KvValue::Text(value)) => columns.text = Some(value.clone()),
            Some(KvValue::Number(value)) if value.is_nan() => {
                return Err(NodError::InvalidData(format!(
                    "kv cell `{key}` of node `{node_id}` is NaN"
                )));
            }
            Some(KvValue::Number(value)) => columns.number = Some(*value),
            Some(KvValue::Int(value)) => columns.int = Some(*value),
            Some(KvValue::Bool(value)) => columns.boolean = Some(*value),
            Some(KvValue::Time(value)) => columns.time = Some(to_epoch_ms(value)),
        }
        Ok(columns)
    }

    fn into_value(self, node_id: &str, key: &str) -> NodResult<Option<KvValue>> {
        let mut arms = Vec::with_capacity(1);
        if let Some(value) = self.text {
            arms.push(KvValue::Text(value));
        }
        if let Some(value) = self.number {
            arms.push(KvValue::Number(value));
        }
        if let Some(value) = self.int {
            arms.push(KvValue::Int(value));
        }
        if let Some(value) = self.boolean {
            arms.push(KvValue::Bool(value));
        }
        if let Some(value) = self.time {
            arms.push(KvValue::Time(from_epoch_ms(value, "kv.value_time")?));
        }

        if arms.len() > 1 {
            return Err(NodError::InvalidData(format!(
                "kv cell `{key}` of node `{node_id}` has {} populated values",
                arms.len()
            )));
        }
        Ok(arms.pop())
    }
}

fn parse_kv_row(row: &Row<'_>) -> NodResult<KvCell> {
    let node_id: String = row.get("node_id")?;
    let key: String = row.get("key")?;
    let columns = ValueColumns {
        text: row.get("value_text")?,
        number: row.get("value_number")?,
        int: row.get("value_int")?,
        boolean: row.get("value_bool")?,
        time: row.get("value_time")?,
    };
    let value = columns.into_value(&node_id, &key)?;
    Ok(KvCell {
        node_id,
        key,
        value,
    })
}
