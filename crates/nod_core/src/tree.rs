//! Recursive ancestor/descendant resolution and tree assembly.
//!
//! # Responsibility
//! - Fetch a whole connected node set with one `WITH RECURSIVE` statement.
//! - Assemble the fetched set into an owned tree.
//!
//! # Invariants
//! - Traversals use `UNION`, so a parent cycle terminates.
//! - Each member is placed at most once; members whose parent is not in the
//!   fetched set are omitted.
//! - Children keep fetch order (`created_at ASC, id ASC`).

use crate::error::{NodError, NodResult};
use crate::model::node::{Node, NodeRecord};
use crate::repo::node_repo::{parse_node_row, NODE_COLUMNS};
use crate::repo::placeholders;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection};
use std::collections::HashMap;

/// One tree member and its children.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeNode<T> {
    pub node: T,
    pub children: Vec<TreeNode<T>>,
}

impl<T> TreeNode<T> {
    pub fn leaf(node: T) -> Self {
        Self {
            node,
            children: Vec::new(),
        }
    }

    /// Number of members including this one.
    pub fn size(&self) -> usize {
        1 + self.children.iter().map(TreeNode::size).sum::<usize>()
    }

    /// Pre-order iterator over member values.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        let mut stack = vec![self];
        std::iter::from_fn(move || {
            let current = stack.pop()?;
            stack.extend(current.children.iter().rev());
            Some(&current.node)
        })
    }

    /// Converts every member, stopping at the first error.
    pub fn try_map<U, F>(self, mut f: F) -> NodResult<TreeNode<U>>
    where
        F: FnMut(T) -> NodResult<U>,
    {
        self.try_map_with(&mut f)
    }

    fn try_map_with<U, F>(self, f: &mut F) -> NodResult<TreeNode<U>>
    where
        F: FnMut(T) -> NodResult<U>,
    {
        let node = f(self.node)?;
        let children = self
            .children
            .into_iter()
            .map(|child| child.try_map_with(f))
            .collect::<NodResult<Vec<_>>>()?;
        Ok(TreeNode { node, children })
    }
}

/// Fetches `root_id` and every record reachable through parent->child edges.
pub(crate) fn fetch_descendants(
    conn: &Connection,
    root_id: &str,
    namespace_ids: &[String],
) -> NodResult<Vec<NodeRecord>> {
    let scope = NamespaceScope::new(namespace_ids);
    let sql = format!(
        "WITH RECURSIVE subtree(id) AS (
            SELECT id FROM nodes WHERE id = ?{seed}
            UNION
            SELECT n.id FROM nodes n
            INNER JOIN subtree s ON n.parent_id = s.id{step}
        )
        SELECT {NODE_COLUMNS} FROM nodes
        WHERE id IN (SELECT id FROM subtree)
        ORDER BY created_at ASC, id ASC;",
        seed = scope.seed_sql,
        step = scope.step_sql,
    );
    fetch_records(conn, &sql, scope.params(root_id))
}

/// Fetches `leaf_id` and every record reachable through child->parent edges.
pub(crate) fn fetch_ancestors(
    conn: &Connection,
    leaf_id: &str,
    namespace_ids: &[String],
) -> NodResult<Vec<NodeRecord>> {
    let scope = NamespaceScope::new(namespace_ids);
    let sql = format!(
        "WITH RECURSIVE chain(id, parent_id) AS (
            SELECT id, parent_id FROM nodes WHERE id = ?{seed}
            UNION
            SELECT n.id, n.parent_id FROM nodes n
            INNER JOIN chain c ON n.id = c.parent_id{step}
        )
        SELECT {NODE_COLUMNS} FROM nodes
        WHERE id IN (SELECT id FROM chain)
        ORDER BY created_at ASC, id ASC;",
        seed = scope.seed_sql,
        step = scope.step_sql,
    );
    fetch_records(conn, &sql, scope.params(leaf_id))
}

struct NamespaceScope<'a> {
    namespace_ids: &'a [String],
    seed_sql: String,
    step_sql: String,
}

impl<'a> NamespaceScope<'a> {
    fn new(namespace_ids: &'a [String]) -> Self {
        if namespace_ids.is_empty() {
            return Self {
                namespace_ids,
                seed_sql: String::new(),
                step_sql: String::new(),
            };
        }
        let list = placeholders(namespace_ids.len());
        Self {
            namespace_ids,
            seed_sql: format!(" AND namespace_id IN ({list})"),
            step_sql: format!(" WHERE n.namespace_id IN ({list})"),
        }
    }

    /// Start id, then the namespace list once for the seed and once for the
    /// recursive step.
    fn params(&self, start_id: &str) -> Vec<Value> {
        let mut params = vec![Value::Text(start_id.to_string())];
        for _ in 0..2 {
            params.extend(self.namespace_ids.iter().cloned().map(Value::Text));
        }
        params
    }
}

fn fetch_records(conn: &Connection, sql: &str, params: Vec<Value>) -> NodResult<Vec<NodeRecord>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query(params_from_iter(params))?;
    let mut records = Vec::new();
    while let Some(row) = rows.next()? {
        records.push(parse_node_row(row)?);
    }
    Ok(records)
}

/// Builds the tree rooted at `root_id` from a fetched descendant set.
pub(crate) fn assemble_descendant_tree(nodes: Vec<Node>, root_id: &str) -> NodResult<TreeNode<Node>> {
    let mut assembler = Assembler::new(nodes);
    assembler
        .attach(root_id)
        .ok_or_else(|| NodError::not_found(format!("node `{root_id}`")))
}

/// Builds the tree rooted at the parent-less member of a fetched ancestor set.
pub(crate) fn assemble_ancestor_tree(nodes: Vec<Node>) -> NodResult<TreeNode<Node>> {
    let root_id = nodes
        .iter()
        .find(|node| node.record.is_root())
        .map(|node| node.record.id.clone())
        .ok_or_else(|| NodError::not_found("ancestor chain has no root node"))?;
    assemble_descendant_tree(nodes, &root_id)
}

struct Assembler {
    by_id: HashMap<String, Node>,
    children_of: HashMap<String, Vec<String>>,
}

impl Assembler {
    fn new(nodes: Vec<Node>) -> Self {
        let mut by_id = HashMap::with_capacity(nodes.len());
        let mut children_of: HashMap<String, Vec<String>> = HashMap::new();
        for node in nodes {
            if let Some(parent) = node.record.parent() {
                children_of
                    .entry(parent.to_string())
                    .or_default()
                    .push(node.record.id.clone());
            }
            by_id.insert(node.record.id.clone(), node);
        }
        Self { by_id, children_of }
    }

    /// Removes `id` from the pool so it is placed at most once.
    fn attach(&mut self, id: &str) -> Option<TreeNode<Node>> {
        let node = self.by_id.remove(id)?;
        let child_ids = self.children_of.remove(id).unwrap_or_default();
        let children = child_ids
            .iter()
            .filter_map(|child_id| self.attach(child_id))
            .collect();
        Some(TreeNode { node, children })
    }
}

#[cfg(test)]
mod tests {
    use super::{assemble_ancestor_tree, assemble_descendant_tree, TreeNode};
    use crate::error::NodError;
    use crate::model::node::{Node, NodeRecord};

    fn node(id: &str, parent: Option<&str>) -> Node {
        let mut record = NodeRecord::new("folder", "", id);
        record.id = id.to_string();
        record.parent_id = parent.map(str::to_string);
        Node::new(record)
    }

    fn ids(tree: &TreeNode<Node>) -> Vec<&str> {
        tree.iter().map(|node| node.id()).collect()
    }

    #[test]
    fn descendant_tree_keeps_fetch_order() {
        let nodes = vec![
            node("root", None),
            node("a", Some("root")),
            node("b", Some("root")),
            node("a1", Some("a")),
        ];
        let tree = assemble_descendant_tree(nodes, "root").unwrap();
        assert_eq!(ids(&tree), vec!["root", "a", "a1", "b"]);
        assert_eq!(tree.size(), 4);
        assert_eq!(tree.children[0].children[0].node.id(), "a1");
    }

    #[test]
    fn dangling_member_is_omitted() {
        let nodes = vec![
            node("root", None),
            node("a", Some("root")),
            node("orphan", Some("missing")),
        ];
        let tree = assemble_descendant_tree(nodes, "root").unwrap();
        assert_eq!(ids(&tree), vec!["root", "a"]);
    }

    #[test]
    fn cycle_places_each_member_once() {
        let nodes = vec![node("a", Some("b")), node("b", Some("a"))];
        let tree = assemble_descendant_tree(nodes, "a").unwrap();
        assert_eq!(ids(&tree), vec!["a", "b"]);
        assert!(tree.children[0].children.is_empty());
    }

    #[test]
    fn ancestor_tree_is_rooted_at_parentless_member() {
        let nodes = vec![
            node("leaf", Some("mid")),
            node("mid", Some("top")),
            node("top", Some("")),
        ];
        let tree = assemble_ancestor_tree(nodes).unwrap();
        assert_eq!(ids(&tree), vec!["top", "mid", "leaf"]);
    }

    #[test]
    fn ancestor_chain_without_root_is_not_found() {
        let nodes = vec![node("leaf", Some("gone"))];
        let err = assemble_ancestor_tree(nodes).unwrap_err();
        assert!(matches!(err, NodError::NotFound(_)));
    }

    #[test]
    fn missing_root_is_not_found() {
        let err = assemble_descendant_tree(Vec::new(), "root").unwrap_err();
        assert!(matches!(err, NodError::NotFound(_)));
    }

    #[test]
    fn try_map_converts_every_member() {
        let tree = TreeNode {
            node: 1,
            children: vec![TreeNode::leaf(2), TreeNode::leaf(3)],
        };
        let mapped = tree.try_map(|value| Ok(value * 10)).unwrap();
        assert_eq!(mapped.iter().copied().collect::<Vec<_>>(), vec![10, 20, 30]);
    }
}
