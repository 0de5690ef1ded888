//! Untyped fluent query over node aggregates.

use super::filter::{Compiled, NodeFilter, StringFilter, TimeFilter};
use super::hydrate::hydrate;
use crate::db::atomic;
use crate::error::{NodError, NodResult};
use crate::model::node::{Node, NodeRecord};
use crate::repo::node_repo::{parse_node_row, NODE_COLUMNS};
use crate::tree::{
    assemble_ancestor_tree, assemble_descendant_tree, fetch_ancestors, fetch_descendants,
    TreeNode,
};
use log::{debug, info};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, OptionalExtension};

/// Filtered read/delete over the `nodes` table.
///
/// Every setter consumes and returns the query; clone it to branch.
#[derive(Clone)]
pub struct NodeQuery<'c> {
    conn: &'c Connection,
    filter: NodeFilter,
}

impl<'c> NodeQuery<'c> {
    pub(crate) fn new(conn: &'c Connection) -> Self {
        Self {
            conn,
            filter: NodeFilter::default(),
        }
    }

    pub fn node_id(mut self, node_id: impl Into<String>) -> Self {
        self.filter.node_ids.push(node_id.into());
        self
    }

    pub fn node_ids<I, S>(mut self, node_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.filter
            .node_ids
            .extend(node_ids.into_iter().map(Into::into));
        self
    }

    pub fn parent_id(mut self, parent_id: impl Into<String>) -> Self {
        self.filter.parent_ids.push(parent_id.into());
        self
    }

    pub fn parent_ids<I, S>(mut self, parent_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.filter
            .parent_ids
            .extend(parent_ids.into_iter().map(Into::into));
        self
    }

    pub fn namespace_id(mut self, namespace_id: impl Into<String>) -> Self {
        self.filter.namespace_ids.push(namespace_id.into());
        self
    }

    pub fn namespace_ids<I, S>(mut self, namespace_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.filter
            .namespace_ids
            .extend(namespace_ids.into_iter().map(Into::into));
        self
    }

    /// A plain string converts to an equality filter.
    pub fn name(mut self, filter: impl Into<StringFilter>) -> Self {
        self.filter.name = Some(filter.into());
        self
    }

    pub fn node_type(mut self, filter: impl Into<StringFilter>) -> Self {
        self.filter.node_type = Some(filter.into());
        self
    }

    pub fn kind(mut self, filter: impl Into<StringFilter>) -> Self {
        self.filter.kind = Some(filter.into());
        self
    }

    pub fn status(mut self, filter: impl Into<StringFilter>) -> Self {
        self.filter.status = Some(filter.into());
        self
    }

    pub fn created(mut self, range: TimeFilter) -> Self {
        self.filter.created = Some(range);
        self
    }

    pub fn updated(mut self, range: TimeFilter) -> Self {
        self.filter.updated = Some(range);
        self
    }

    /// Keeps only records without parent.
    pub fn roots(mut self) -> Self {
        self.filter.only_roots = true;
        self
    }

    /// Drops records without parent.
    pub fn exclude_root(mut self) -> Self {
        self.filter.exclude_root = true;
        self
    }

    /// Flat limit; zero disables it.
    pub fn limit(mut self, limit: u32) -> Self {
        self.filter.limit = limit;
        self
    }

    /// One-based page; both values must be positive to take effect.
    pub fn page(mut self, page: u32, page_size: u32) -> Self {
        self.filter.page = page;
        self.filter.page_size = page_size;
        self
    }

    pub fn with_tags(mut self) -> Self {
        self.filter.includes.tags = true;
        self
    }

    pub fn with_kv(mut self) -> Self {
        self.filter.includes.kv = true;
        self
    }

    pub fn with_content(mut self) -> Self {
        self.filter.includes.content = true;
        self
    }

    /// Eager-loads tags, key/values and content.
    pub fn with_all(self) -> Self {
        self.with_tags().with_kv().with_content()
    }

    pub fn list(&self) -> NodResult<Vec<Node>> {
        let Compiled { sql, mut params } = self.filter.where_clause();
        let mut statement =
            format!("SELECT {NODE_COLUMNS} FROM nodes{sql} ORDER BY created_at ASC, id ASC");
        if let Some((limit, offset)) = self.filter.window() {
            statement.push_str(" LIMIT ? OFFSET ?");
            params.push(Value::Integer(limit));
            params.push(Value::Integer(offset));
        }

        let records = self.fetch_records(&statement, params)?;
        let nodes = hydrate(self.conn, records, self.filter.includes)?;
        debug!(
            "event=query_list module=query status=ok rows={} tags={} kv={} content={}",
            nodes.len(),
            self.filter.includes.tags,
            self.filter.includes.kv,
            self.filter.includes.content
        );
        Ok(nodes)
    }

    /// First match in list order, or `NotFound`.
    pub fn first(&self) -> NodResult<Node> {
        let mut bounded = self.clone();
        if !bounded.filter.is_paged() {
            bounded.filter.limit = 1;
        }
        bounded
            .list()?
            .into_iter()
            .next()
            .ok_or_else(|| NodError::not_found("no node matches the query"))
    }

    /// Number of matches, ignoring pagination and eager-load flags.
    pub fn count(&self) -> NodResult<u64> {
        let Compiled { sql, params } = self.filter.where_clause();
        let count: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM nodes{sql};"),
            params_from_iter(params),
            |row| row.get(0),
        )?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    pub fn exists(&self) -> NodResult<bool> {
        let Compiled { sql, params } = self.filter.where_clause();
        let exists: i64 = self.conn.query_row(
            &format!("SELECT EXISTS(SELECT 1 FROM nodes{sql});"),
            params_from_iter(params),
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }

    /// Whether any record uses a matched node as parent.
    pub fn has_children(&self) -> NodResult<bool> {
        Ok(self.referenced_parent()?.is_some())
    }

    /// Deletes matched records only; side data stays.
    ///
    /// Fails with `HasChildren` when any matched node is a parent. Pagination
    /// is ignored.
    pub fn delete(&self) -> NodResult<usize> {
        atomic(self.conn, || -> NodResult<usize> {
            if let Some(parent_id) = self.referenced_parent()? {
                return Err(NodError::HasChildren(parent_id));
            }
            let Compiled { sql, params } = self.filter.where_clause();
            let removed = self
                .conn
                .execute(&format!("DELETE FROM nodes{sql};"), params_from_iter(params))?;
            info!("event=query_delete module=query status=ok rows={removed}");
            Ok(removed)
        })
    }

    /// Tree of `root_id` and all of its descendants.
    pub fn descendant_tree(&self, root_id: &str) -> NodResult<TreeNode<Node>> {
        let records = fetch_descendants(self.conn, root_id, &self.filter.namespace_ids)?;
        debug!(
            "event=tree_descendants module=tree status=ok members={}",
            records.len()
        );
        let nodes = hydrate(self.conn, records, self.filter.includes)?;
        assemble_descendant_tree(nodes, root_id)
    }

    /// One descendant tree per matched record without parent.
    ///
    /// `only_roots` does not change the result: matched records that have a
    /// parent are never expanded in either mode.
    pub fn descendants(&self, only_roots: bool) -> NodResult<Vec<TreeNode<Node>>> {
        let mut trees = Vec::new();
        for member in self.list()? {
            if !member.record.is_root() {
                continue;
            }
            trees.push(self.descendant_tree(member.id())?);
        }
        debug!(
            "event=tree_descendants_many module=tree status=ok trees={} only_roots={only_roots}",
            trees.len()
        );
        Ok(trees)
    }

    /// Tree from the top-most ancestor of `leaf_id` down to `leaf_id`.
    pub fn ancestor_tree(&self, leaf_id: &str) -> NodResult<TreeNode<Node>> {
        let records = fetch_ancestors(self.conn, leaf_id, &self.filter.namespace_ids)?;
        if records.is_empty() {
            return Err(NodError::not_found(format!("node `{leaf_id}`")));
        }
        debug!(
            "event=tree_ancestors module=tree status=ok members={}",
            records.len()
        );
        let nodes = hydrate(self.conn, records, self.filter.includes)?;
        assemble_ancestor_tree(nodes)
    }

    /// One ancestor tree per matched record.
    pub fn ancestors(&self) -> NodResult<Vec<TreeNode<Node>>> {
        self.list()?
            .iter()
            .map(|member| self.ancestor_tree(member.id()))
            .collect()
    }

    /// First parent id among the matched set that some record references.
    fn referenced_parent(&self) -> NodResult<Option<String>> {
        let Compiled { sql, params } = self.filter.where_clause();
        let parent_id = self
            .conn
            .query_row(
                &format!(
                    "SELECT parent_id FROM nodes
                     WHERE parent_id IN (SELECT id FROM nodes{sql})
                     ORDER BY parent_id ASC
                     LIMIT 1;"
                ),
                params_from_iter(params),
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(parent_id)
    }

    fn fetch_records(&self, sql: &str, params: Vec<Value>) -> NodResult<Vec<NodeRecord>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(params_from_iter(params))?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            records.push(parse_node_row(row)?);
        }
        Ok(records)
    }
}
