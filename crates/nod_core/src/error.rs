//! Crate-wide error taxonomy.
//!
//! # Invariants
//! - Storage errors are passed through unchanged and never retried.
//! - `Lookup` is fatal for the calling read/write.

use crate::db::DbError;
use thiserror::Error;

pub type NodResult<T> = Result<T, NodError>;

/// Error returned by every node store operation.
#[derive(Debug, Error)]
pub enum NodError {
    /// A read that required one row matched nothing.
    #[error("not found: {0}")]
    NotFound(String),
    /// No mapper is registered for the (type, kind) pair.
    #[error("no mapper registered for type `{node_type}` kind `{node_kind}`")]
    Lookup {
        node_type: String,
        node_kind: String,
    },
    /// The registered mapper for a pair converts another Rust type.
    #[error("mapper for type `{node_type}` kind `{node_kind}` does not produce `{expected}`")]
    MapperTypeMismatch {
        node_type: String,
        node_kind: String,
        expected: &'static str,
    },
    /// Delete attempted on a node that other records use as parent.
    #[error("cannot delete node with children: {0}")]
    HasChildren(String),
    /// A mapper rejected the model or the node aggregate.
    #[error("mapping failed: {0}")]
    Mapping(String),
    /// Persisted data cannot be converted to a valid read model.
    #[error("invalid persisted node data: {0}")]
    InvalidData(String),
    /// Connection schema is not at the expected migrated version.
    #[error("node repository requires schema version {expected_version}, got {actual_version}")]
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Required table is missing.
    #[error("node repository requires table `{0}`")]
    MissingRequiredTable(&'static str),
    /// Required column is missing.
    #[error("node repository requires column `{table}.{column}`")]
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
    #[error(transparent)]
    Db(#[from] DbError),
}

impl NodError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn lookup(node_type: &str, node_kind: &str) -> Self {
        Self::Lookup {
            node_type: node_type.to_string(),
            node_kind: node_kind.to_string(),
        }
    }

    /// Convenience constructor for user mappers.
    pub fn mapping(message: impl Into<String>) -> Self {
        Self::Mapping(message.into())
    }
}

impl From<rusqlite::Error> for NodError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}
