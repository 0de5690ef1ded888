//! Transactional mutation boundary over nodes and their side data.
//!
//! # Responsibility
//! - Save a node aggregate as one atomic full replacement.
//! - Delete a node and its side data behind the no-children guard.
//! - Run caller closures inside nestable atomic scopes.
//! - Hand out untyped and typed queries bound to the same registry.
//!
//! # Invariants
//! - Save and delete are all-or-nothing.
//! - Save replaces tags, key/values and content; it never merges.
//! - A node that is the parent of any record cannot be deleted.

use super::content_repo::{ContentRepository, SqliteContentRepository};
use super::kv_repo::{KvRepository, SqliteKvRepository};
use super::node_repo::{NodeRepository, SqliteNodeRepository};
use super::tag_repo::{SqliteTagRepository, TagRepository};
use crate::db::migrations::latest_version;
use crate::db::{atomic, table_exists, table_has_column, user_version};
use crate::error::{NodError, NodResult};
use crate::mapper::{MapperRegistry, NodeModel};
use crate::model::content::ContentEntry;
use crate::model::kv::KvCell;
use crate::model::new_id;
use crate::model::node::{Node, NodeId};
use crate::query::{NodeQuery, TypedQuery};
use log::{error, info};
use rusqlite::Connection;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Instant;

const REQUIRED_TABLES: [&str; 5] = ["nodes", "tags", "node_tags", "kv", "contents"];
const REQUIRED_NODE_COLUMNS: [&str; 10] = [
    "id",
    "namespace_id",
    "parent_id",
    "type",
    "kind",
    "status",
    "name",
    "metadata",
    "created_at",
    "updated_at",
];

/// Entry point for reads and writes against one connection.
#[derive(Clone)]
pub struct Repository<'conn> {
    conn: &'conn Connection,
    registry: Arc<MapperRegistry>,
}

impl<'conn> Repository<'conn> {
    /// Binds a connection returned by `open_db*` to a mapper registry.
    pub fn new(conn: &'conn Connection, registry: impl Into<Arc<MapperRegistry>>) -> Self {
        Self {
            conn,
            registry: registry.into(),
        }
    }

    /// Like [`Repository::new`], but first checks that the connection is
    /// migrated to the latest schema.
    ///
    /// # Errors
    /// - `UninitializedConnection` when `user_version` differs from the
    ///   latest migration.
    /// - `MissingRequiredTable`/`MissingRequiredColumn` when the schema is
    ///   incomplete.
    pub fn try_new(
        conn: &'conn Connection,
        registry: impl Into<Arc<MapperRegistry>>,
    ) -> NodResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self::new(conn, registry))
    }

    pub fn connection(&self) -> &'conn Connection {
        self.conn
    }

    pub fn registry(&self) -> &MapperRegistry {
        &self.registry
    }

    /// Converts `model` through its registered mapper and saves it.
    ///
    /// Returns the stored node id.
    pub fn save<T>(&self, model: &T) -> NodResult<NodeId>
    where
        T: NodeModel + 'static,
    {
        let node = self.registry.for_model(model)?.to_node(model)?;
        self.save_node(node)
    }

    /// Saves one aggregate: record upsert, then full replacement of tags,
    /// key/values and content. Assigns a fresh id when the record has none.
    pub fn save_node(&self, node: Node) -> NodResult<NodeId> {
        let started_at = Instant::now();
        let Node {
            mut record,
            tags,
            kv,
            content,
        } = node;
        let (tag_count, kv_count, content_count) = (tags.len(), kv.len(), content.len());

        let result = atomic(self.conn, move || -> NodResult<NodeId> {
            if record.id.is_empty() {
                record.id = new_id();
            }
            let node_id = record.id.clone();
            self.node_records().upsert_node(&record)?;

            let tag_repo = self.tags();
            tag_repo.delete_all(&node_id)?;
            for tag in &tags {
                let tag_id = tag_repo.create_tag_if_missing(tag)?;
                tag_repo.bind(&node_id, &tag_id)?;
            }

            let kv_repo = self.kv();
            kv_repo.delete_all(&node_id)?;
            for (key, cell) in kv {
                kv_repo.set(&KvCell {
                    node_id: node_id.clone(),
                    key,
                    value: cell.value,
                })?;
            }

            let content_repo = self.content();
            let previous = content_repo.list_for_node(&node_id)?;
            content_repo.delete_all(&node_id)?;
            for (key, entry) in content {
                let created_at = entry
                    .created_at
                    .or_else(|| previous.get(&key).and_then(|stored| stored.created_at));
                content_repo.save(&ContentEntry {
                    node_id: node_id.clone(),
                    key,
                    created_at,
                    ..entry
                })?;
            }

            Ok(node_id)
        });

        match &result {
            Ok(node_id) => info!(
                "event=node_save module=repo status=ok node_id={node_id} tags={tag_count} kv={kv_count} content={content_count} duration_ms={}",
                started_at.elapsed().as_millis()
            ),
            Err(err) => error!(
                "event=node_save module=repo status=error duration_ms={} error={err}",
                started_at.elapsed().as_millis()
            ),
        }
        result
    }

    /// Deletes a node with its tag bindings, key/values and content.
    ///
    /// # Errors
    /// - `HasChildren` when any record uses `node_id` as parent; nothing is
    ///   removed in that case.
    pub fn delete(&self, node_id: &str) -> NodResult<()> {
        let result = atomic(self.conn, || -> NodResult<()> {
            let nodes = self.node_records();
            if nodes.has_children(node_id)? {
                return Err(NodError::HasChildren(node_id.to_string()));
            }
            nodes.delete_node(node_id)?;
            self.tags().delete_all(node_id)?;
            self.kv().delete_all(node_id)?;
            self.content().delete_all(node_id)?;
            Ok(())
        });

        match &result {
            Ok(()) => info!("event=node_delete module=repo status=ok node_id={node_id}"),
            Err(err) => error!(
                "event=node_delete module=repo status=error node_id={node_id} error={err}"
            ),
        }
        result
    }

    /// Runs `f` inside one atomic scope.
    ///
    /// An error from `f` rolls back every write made through the repository
    /// inside the scope, nested `transaction` calls included.
    pub fn transaction<R>(&self, f: impl FnOnce(&Self) -> NodResult<R>) -> NodResult<R> {
        atomic(self.conn, || f(self))
    }

    /// Loads one node with all side data.
    pub fn get_node(&self, node_id: &str) -> NodResult<Node> {
        self.nodes().node_id(node_id).with_all().first()
    }

    /// Untyped query over node aggregates.
    pub fn nodes(&self) -> NodeQuery<'conn> {
        NodeQuery::new(self.conn)
    }

    /// Query whose results are materialized as `T`.
    pub fn query<T: 'static>(&self) -> TypedQuery<'_, T> {
        TypedQuery::new(NodeQuery::new(self.conn), &self.registry)
    }

    /// Repository view bound to one domain type.
    pub fn typed<T: NodeModel + 'static>(&self) -> TypedRepository<'_, T> {
        TypedRepository {
            repo: self,
            _model: PhantomData,
        }
    }

    pub fn node_records(&self) -> SqliteNodeRepository<'conn> {
        SqliteNodeRepository::new(self.conn)
    }

    pub fn tags(&self) -> SqliteTagRepository<'conn> {
        SqliteTagRepository::new(self.conn)
    }

    pub fn kv(&self) -> SqliteKvRepository<'conn> {
        SqliteKvRepository::new(self.conn)
    }

    pub fn content(&self) -> SqliteContentRepository<'conn> {
        SqliteContentRepository::new(self.conn)
    }
}

/// [`Repository`] surface bound to one domain type.
pub struct TypedRepository<'r, T> {
    repo: &'r Repository<'r>,
    _model: PhantomData<fn() -> T>,
}

impl<'r, T: NodeModel + 'static> TypedRepository<'r, T> {
    pub fn save(&self, model: &T) -> NodResult<NodeId> {
        self.repo.save(model)
    }

    pub fn delete(&self, node_id: &str) -> NodResult<()> {
        self.repo.delete(node_id)
    }

    /// Loads and materializes one node with all side data.
    pub fn get(&self, node_id: &str) -> NodResult<T> {
        self.query().node_id(node_id).with_all().first()
    }

    pub fn query(&self) -> TypedQuery<'r, T> {
        self.repo.query()
    }

    pub fn transaction<R>(&self, f: impl FnOnce(&Self) -> NodResult<R>) -> NodResult<R> {
        atomic(self.repo.conn, || f(self))
    }
}

fn ensure_connection_ready(conn: &Connection) -> NodResult<()> {
    let expected_version = latest_version();
    let actual_version = user_version(conn)?;
    if actual_version != expected_version {
        return Err(NodError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    for table in REQUIRED_TABLES {
        if !table_exists(conn, table)? {
            return Err(NodError::MissingRequiredTable(table));
        }
    }

    for column in REQUIRED_NODE_COLUMNS {
        if !table_has_column(conn, "nodes", column)? {
            return Err(NodError::MissingRequiredColumn {
                table: "nodes",
                column,
            });
        }
    }

    Ok(())
}
