//! Generic node storage model.
//!
//! # Responsibility
//! - Define the node record and the aggregate that carries its side data.
//! - Define tag, key/value and content side-data shapes.
//!
//! # Invariants
//! - Every node is identified by an opaque string id, unique per store.
//! - A node whose parent id is absent or empty is a root.
//! - Timestamps are UTC with millisecond precision.

use crate::error::{NodError, NodResult};
use chrono::{DateTime, Utc};

pub mod content;
pub mod kv;
pub mod node;
pub mod tag;

pub(crate) fn to_epoch_ms(value: &DateTime<Utc>) -> i64 {
    value.timestamp_millis()
}

pub(crate) fn from_epoch_ms(value: i64, column: &'static str) -> NodResult<DateTime<Utc>> {
    DateTime::from_timestamp_millis(value)
        .ok_or_else(|| NodError::InvalidData(format!("invalid timestamp `{value}` in {column}")))
}

pub(crate) fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

pub(crate) fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
