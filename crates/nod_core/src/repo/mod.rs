//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define flat per-table data access contracts (node, tag, kv, content).
//! - Compose them into the transactional [`repository::Repository`].
//! - Isolate SQLite query details from query/tree orchestration.
//!
//! # Invariants
//! - Bulk side-data reads issue one statement for all requested owners.
//! - Read paths reject invalid persisted state instead of masking it.

pub mod content_repo;
pub mod kv_repo;
pub mod node_repo;
pub mod repository;
pub mod tag_repo;

/// `?, ?, ?` placeholder list for an `IN (...)` clause.
pub(crate) fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}
