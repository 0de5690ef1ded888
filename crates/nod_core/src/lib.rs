//! Generic persistence for hierarchical domain entities on SQLite.
//!
//! Domain types are registered against one schema of node records through
//! the mapper registry; each node carries tags, typed key/values and text
//! content, and is read back through filtered queries or recursive trees.

pub mod db;
pub mod error;
pub mod logging;
pub mod manager;
pub mod mapper;
pub mod model;
pub mod query;
pub mod repo;
pub mod tree;

pub use db::migrations::latest_version;
pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use error::{NodError, NodResult};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use manager::Manager;
pub use mapper::{Mapper, MapperRegistry, NodeMapper, NodeModel};
pub use model::content::{content_map_from, content_text_map, ContentEntry};
pub use model::kv::{kv_int_map, kv_map_from, kv_text_map, KvCell, KvValue};
pub use model::node::{Node, NodeId, NodeRecord};
pub use model::tag::{NodeTag, Tag};
pub use query::{NodeQuery, StringFilter, TimeFilter, TypedQuery};
pub use repo::repository::{Repository, TypedRepository};
pub use tree::TreeNode;

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
