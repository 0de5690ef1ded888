//! Filter values and their SQL compilation.
//!
//! # Invariants
//! - Conditions are ANDed; an empty filter matches every record.
//! - `contains`/`starts_with`/`ends_with` match literally: `%`, `_` and the
//!   escape character are escaped before they reach `LIKE`.
//! - Page pagination wins over a flat limit; zero disables either form.

use crate::model::to_epoch_ms;
use crate::repo::placeholders;
use chrono::{DateTime, Utc};
use rusqlite::types::Value;

const LIKE_ESCAPE: char = '\\';

/// Combination of string predicates applied to one column.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StringFilter {
    pub equals: Option<String>,
    pub contains: Option<String>,
    pub starts_with: Option<String>,
    pub ends_with: Option<String>,
}

impl StringFilter {
    pub fn equals(value: impl Into<String>) -> Self {
        Self::default().and_equals(value)
    }

    pub fn contains(value: impl Into<String>) -> Self {
        Self::default().and_contains(value)
    }

    pub fn starts_with(value: impl Into<String>) -> Self {
        Self::default().and_starts_with(value)
    }

    pub fn ends_with(value: impl Into<String>) -> Self {
        Self::default().and_ends_with(value)
    }

    pub fn and_equals(mut self, value: impl Into<String>) -> Self {
        self.equals = Some(value.into());
        self
    }

    pub fn and_contains(mut self, value: impl Into<String>) -> Self {
        self.contains = Some(value.into());
        self
    }

    pub fn and_starts_with(mut self, value: impl Into<String>) -> Self {
        self.starts_with = Some(value.into());
        self
    }

    pub fn and_ends_with(mut self, value: impl Into<String>) -> Self {
        self.ends_with = Some(value.into());
        self
    }

    fn push_conditions(&self, column: &str, sql: &mut Vec<String>, params: &mut Vec<Value>) {
        if let Some(value) = &self.equals {
            sql.push(format!("{column} = ?"));
            params.push(Value::Text(value.clone()));
        }
        let patterns = [
            self.contains.as_deref().map(|v| format!("%{}%", escape_like(v))),
            self.starts_with.as_deref().map(|v| format!("{}%", escape_like(v))),
            self.ends_with.as_deref().map(|v| format!("%{}", escape_like(v))),
        ];
        for pattern in patterns.into_iter().flatten() {
            sql.push(format!("{column} LIKE ? ESCAPE '{LIKE_ESCAPE}'"));
            params.push(Value::Text(pattern));
        }
    }
}

impl From<&str> for StringFilter {
    fn from(value: &str) -> Self {
        Self::equals(value)
    }
}

impl From<String> for StringFilter {
    fn from(value: String) -> Self {
        Self::equals(value)
    }
}

/// Inclusive time range; either bound may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeFilter {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl TimeFilter {
    pub fn between(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self {
            from: Some(from),
            to: Some(to),
        }
    }

    pub fn since(from: DateTime<Utc>) -> Self {
        Self {
            from: Some(from),
            to: None,
        }
    }

    pub fn until(to: DateTime<Utc>) -> Self {
        Self {
            from: None,
            to: Some(to),
        }
    }

    fn push_conditions(&self, column: &str, sql: &mut Vec<String>, params: &mut Vec<Value>) {
        if let Some(from) = &self.from {
            sql.push(format!("{column} >= ?"));
            params.push(Value::Integer(to_epoch_ms(from)));
        }
        if let Some(to) = &self.to {
            sql.push(format!("{column} <= ?"));
            params.push(Value::Integer(to_epoch_ms(to)));
        }
    }
}

/// Side data eagerly loaded with each matched record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Includes {
    pub tags: bool,
    pub kv: bool,
    pub content: bool,
}

/// Accumulated state of one node query.
#[derive(Debug, Clone, Default)]
pub(crate) struct NodeFilter {
    pub node_ids: Vec<String>,
    pub parent_ids: Vec<String>,
    pub namespace_ids: Vec<String>,
    pub name: Option<StringFilter>,
    pub node_type: Option<StringFilter>,
    pub kind: Option<StringFilter>,
    pub status: Option<StringFilter>,
    pub created: Option<TimeFilter>,
    pub updated: Option<TimeFilter>,
    pub only_roots: bool,
    pub exclude_root: bool,
    pub limit: u32,
    pub page: u32,
    pub page_size: u32,
    pub includes: Includes,
}

/// SQL fragment plus positional parameters.
#[derive(Debug, Default)]
pub(crate) struct Compiled {
    pub sql: String,
    pub params: Vec<Value>,
}

impl NodeFilter {
    /// ` WHERE ...` clause, or an empty string when nothing is filtered.
    pub fn where_clause(&self) -> Compiled {
        let mut sql = Vec::new();
        let mut params = Vec::new();

        push_in(&mut sql, &mut params, "id", &self.node_ids);
        push_in(&mut sql, &mut params, "parent_id", &self.parent_ids);
        push_in(&mut sql, &mut params, "namespace_id", &self.namespace_ids);

        let strings = [
            ("name", &self.name),
            ("type", &self.node_type),
            ("kind", &self.kind),
            ("status", &self.status),
        ];
        for (column, filter) in strings {
            if let Some(filter) = filter {
                filter.push_conditions(column, &mut sql, &mut params);
            }
        }

        if let Some(created) = &self.created {
            created.push_conditions("created_at", &mut sql, &mut params);
        }
        if let Some(updated) = &self.updated {
            updated.push_conditions("updated_at", &mut sql, &mut params);
        }

        if self.only_roots {
            sql.push("(parent_id IS NULL OR parent_id = '')".to_string());
        }
        if self.exclude_root {
            sql.push("(parent_id IS NOT NULL AND parent_id <> '')".to_string());
        }

        if sql.is_empty() {
            return Compiled::default();
        }
        Compiled {
            sql: format!(" WHERE {}", sql.join(" AND ")),
            params,
        }
    }

    /// `(limit, offset)` when pagination is active. The offset saturates at
    /// `i64::MAX`.
    pub fn window(&self) -> Option<(i64, i64)> {
        if self.page > 0 && self.page_size > 0 {
            let size = i64::from(self.page_size);
            let offset = (i64::from(self.page) - 1).saturating_mul(size);
            return Some((size, offset));
        }
        if self.limit > 0 {
            return Some((i64::from(self.limit), 0));
        }
        None
    }

    pub fn is_paged(&self) -> bool {
        self.window().is_some()
    }
}

fn push_in(sql: &mut Vec<String>, params: &mut Vec<Value>, column: &str, values: &[String]) {
    if values.is_empty() {
        return;
    }
    sql.push(format!("{column} IN ({})", placeholders(values.len())));
    params.extend(values.iter().cloned().map(Value::Text));
}

pub(crate) fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        if ch == LIKE_ESCAPE || ch == '%' || ch == '_' {
            escaped.push(LIKE_ESCAPE);
        }
        escaped.push(ch);
    }
    escaped
}
