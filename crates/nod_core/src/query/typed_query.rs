//! Query bound to one domain type.

use super::filter::{StringFilter, TimeFilter};
use super::node_query::NodeQuery;
use crate::error::NodResult;
use crate::mapper::MapperRegistry;
use crate::model::node::Node;
use crate::tree::TreeNode;
use std::marker::PhantomData;

/// [`NodeQuery`] whose results are materialized as `T` through the registry.
///
/// Every matched record must have a mapper for `T` registered under its
/// (type, kind) pair, otherwise the read fails with `Lookup`.
pub struct TypedQuery<'r, T> {
    query: NodeQuery<'r>,
    registry: &'r MapperRegistry,
    _model: PhantomData<fn() -> T>,
}

impl<T> Clone for TypedQuery<'_, T> {
    fn clone(&self) -> Self {
        Self {
            query: self.query.clone(),
            registry: self.registry,
            _model: PhantomData,
        }
    }
}

impl<'r, T: 'static> TypedQuery<'r, T> {
    pub(crate) fn new(query: NodeQuery<'r>, registry: &'r MapperRegistry) -> Self {
        Self {
            query,
            registry,
            _model: PhantomData,
        }
    }

    /// Untyped view of the same filter.
    pub fn nodes(&self) -> NodeQuery<'r> {
        self.query.clone()
    }

    fn refine(self, f: impl FnOnce(NodeQuery<'r>) -> NodeQuery<'r>) -> Self {
        Self {
            query: f(self.query),
            ..self
        }
    }

    pub fn node_id(self, node_id: impl Into<String>) -> Self {
        self.refine(|q| q.node_id(node_id))
    }

    pub fn node_ids<I, S>(self, node_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.refine(|q| q.node_ids(node_ids))
    }

    pub fn parent_id(self, parent_id: impl Into<String>) -> Self {
        self.refine(|q| q.parent_id(parent_id))
    }

    pub fn parent_ids<I, S>(self, parent_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.refine(|q| q.parent_ids(parent_ids))
    }

    pub fn namespace_id(self, namespace_id: impl Into<String>) -> Self {
        self.refine(|q| q.namespace_id(namespace_id))
    }

    pub fn namespace_ids<I, S>(self, namespace_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.refine(|q| q.namespace_ids(namespace_ids))
    }

    pub fn name(self, filter: impl Into<StringFilter>) -> Self {
        self.refine(|q| q.name(filter))
    }

    pub fn node_type(self, filter: impl Into<StringFilter>) -> Self {
        self.refine(|q| q.node_type(filter))
    }

    pub fn kind(self, filter: impl Into<StringFilter>) -> Self {
        self.refine(|q| q.kind(filter))
    }

    pub fn status(self, filter: impl Into<StringFilter>) -> Self {
        self.refine(|q| q.status(filter))
    }

    pub fn created(self, range: TimeFilter) -> Self {
        self.refine(|q| q.created(range))
    }

    pub fn updated(self, range: TimeFilter) -> Self {
        self.refine(|q| q.updated(range))
    }

    pub fn roots(self) -> Self {
        self.refine(NodeQuery::roots)
    }

    pub fn exclude_root(self) -> Self {
        self.refine(NodeQuery::exclude_root)
    }

    pub fn limit(self, limit: u32) -> Self {
        self.refine(|q| q.limit(limit))
    }

    pub fn page(self, page: u32, page_size: u32) -> Self {
        self.refine(|q| q.page(page, page_size))
    }

    pub fn with_tags(self) -> Self {
        self.refine(NodeQuery::with_tags)
    }

    pub fn with_kv(self) -> Self {
        self.refine(NodeQuery::with_kv)
    }

    pub fn with_content(self) -> Self {
        self.refine(NodeQuery::with_content)
    }

    pub fn with_all(self) -> Self {
        self.refine(NodeQuery::with_all)
    }

    pub fn list(&self) -> NodResult<Vec<T>> {
        self.query
            .list()?
            .iter()
            .map(|node| self.materialize(node))
            .collect()
    }

    pub fn first(&self) -> NodResult<T> {
        self.materialize(&self.query.first()?)
    }

    pub fn count(&self) -> NodResult<u64> {
        self.query.count()
    }

    pub fn exists(&self) -> NodResult<bool> {
        self.query.exists()
    }

    pub fn has_children(&self) -> NodResult<bool> {
        self.query.has_children()
    }

    pub fn delete(&self) -> NodResult<usize> {
        self.query.delete()
    }

    pub fn descendant_tree(&self, root_id: &str) -> NodResult<TreeNode<T>> {
        self.map_tree(self.query.descendant_tree(root_id)?)
    }

    /// See [`NodeQuery::descendants`]; `only_roots` does not change the
    /// result.
    pub fn descendants(&self, only_roots: bool) -> NodResult<Vec<TreeNode<T>>> {
        self.query
            .descendants(only_roots)?
            .into_iter()
            .map(|tree| self.map_tree(tree))
            .collect()
    }

    pub fn ancestor_tree(&self, leaf_id: &str) -> NodResult<TreeNode<T>> {
        self.map_tree(self.query.ancestor_tree(leaf_id)?)
    }

    pub fn ancestors(&self) -> NodResult<Vec<TreeNode<T>>> {
        self.query
            .ancestors()?
            .into_iter()
            .map(|tree| self.map_tree(tree))
            .collect()
    }

    fn materialize(&self, node: &Node) -> NodResult<T> {
        self.registry.materialize(node)
    }

    fn map_tree(&self, tree: TreeNode<Node>) -> NodResult<TreeNode<T>> {
        tree.try_map(|node| self.materialize(&node))
    }
}
