//! Typed key/value side data.
//!
//! # Invariants
//! - A cell holds at most one typed value.
//! - Keys are unique per node.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Tagged scalar held by one key/value cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum KvValue {
    Text(String),
    Number(f64),
    Int(i64),
    Bool(bool),
    Time(DateTime<Utc>),
}

impl KvValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_time(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Time(value) => Some(*value),
            _ => None,
        }
    }
}

impl From<String> for KvValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for KvValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<f64> for KvValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i64> for KvValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<bool> for KvValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<DateTime<Utc>> for KvValue {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Time(value)
    }
}

/// One persisted key/value row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KvCell {
    /// Stamped with the owning node id on save.
    pub node_id: String,
    pub key: String,
    pub value: Option<KvValue>,
}

impl KvCell {
    pub fn new(key: impl Into<String>, value: impl Into<KvValue>) -> Self {
        Self {
            node_id: String::new(),
            key: key.into(),
            value: Some(value.into()),
        }
    }

    /// Cell that keeps the key but holds no value.
    pub fn empty(key: impl Into<String>) -> Self {
        Self {
            node_id: String::new(),
            key: key.into(),
            value: None,
        }
    }
}

/// Builds a key/value map from plain pairs.
pub fn kv_map_from<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> BTreeMap<String, KvCell>
where
    K: Into<String>,
    V: Into<KvValue>,
{
    pairs
        .into_iter()
        .map(|(key, value)| {
            let cell = KvCell::new(key, value);
            (cell.key.clone(), cell)
        })
        .collect()
}

/// Projects a key/value map to its text cells; other cells are skipped.
pub fn kv_text_map(cells: &BTreeMap<String, KvCell>) -> BTreeMap<String, String> {
    cells
        .iter()
        .filter_map(|(key, cell)| {
            let text = cell.value.as_ref()?.as_text()?;
            Some((key.clone(), text.to_string()))
        })
        .collect()
}

/// Projects a key/value map to its integer cells; other cells are skipped.
pub fn kv_int_map(cells: &BTreeMap<String, KvCell>) -> BTreeMap<String, i64> {
    cells
        .iter()
        .filter_map(|(key, cell)| Some((key.clone(), cell.value.as_ref()?.as_int()?)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{kv_int_map, kv_map_from, kv_text_map, KvCell, KvValue};

    #[test]
    fn projections_read_only_matching_arm() {
        let mut cells = kv_map_from([("a", KvValue::Int(1)), ("b", KvValue::from("x"))]);
        cells.insert("c".to_string(), KvCell::new("c", 2.5));
        cells.insert("d".to_string(), KvCell::empty("d"));

        let ints = kv_int_map(&cells);
        assert_eq!(ints.len(), 1);
        assert_eq!(ints.get("a"), Some(&1));

        let texts = kv_text_map(&cells);
        assert_eq!(texts.len(), 1);
        assert_eq!(texts.get("b").map(String::as_str), Some("x"));
    }

    #[test]
    fn integer_does_not_project_as_number() {
        let cells = kv_map_from([("n", 3_i64)]);
        assert_eq!(cells["n"].value.as_ref().and_then(KvValue::as_number), None);
    }
}
