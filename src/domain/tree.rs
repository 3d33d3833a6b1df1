//! Nested, caller-facing view of a snapshot.

use std::fmt;

use serde::Serialize;
use termtree::Tree as TermTree;

use crate::domain::error::{DomainError, DomainResult};
use crate::domain::node::{Fields, NodeId, TypeTag};
use crate::domain::snapshot::Snapshot;

/// A node with its children resolved, without parent links.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Tree {
    pub id: NodeId,
    pub type_tag: TypeTag,
    pub fields: Fields,
    pub children: Vec<Tree>,
}

impl Tree {
    /// Reconstruct the tree below `id`.
    ///
    /// A child id without a node entry means the snapshot is broken and is
    /// reported as [`DomainError::NodeNotFound`]. Built with an explicit
    /// stack, so depth is bounded by memory only.
    pub fn build(snapshot: &Snapshot, id: NodeId) -> DomainResult<Self> {
        // (node, children already expanded)
        let mut stack: Vec<(NodeId, bool)> = vec![(id, false)];
        let mut finished: Vec<Tree> = Vec::new();
        let mut expansions = 0;

        while let Some((current, expanded)) = stack.pop() {
            let node = snapshot
                .get(current)
                .ok_or(DomainError::NodeNotFound(current))?;
            if !expanded {
                expansions += 1;
                if expansions > snapshot.len() {
                    return Err(DomainError::InvariantViolation(format!(
                        "child links below {} form a cycle",
                        id
                    )));
                }
                stack.push((current, true));
                stack.extend(node.children.iter().rev().map(|&child| (child, false)));
                continue;
            }
            let children = finished.split_off(finished.len() - node.children.len());
            finished.push(Self {
                id: node.id,
                type_tag: node.type_tag.clone(),
                fields: node.fields.clone(),
                children,
            });
        }

        finished.pop().ok_or(DomainError::NodeNotFound(id))
    }

    /// Bottom-up fold: `combine` receives each node with its children's
    /// results in order. Uses an explicit stack; the root's value is last.
    fn fold<T, F>(&self, mut combine: F) -> Option<T>
    where
        F: FnMut(&Tree, Vec<T>) -> T,
    {
        let mut stack: Vec<(&Tree, bool)> = vec![(self, false)];
        let mut finished: Vec<T> = Vec::new();

        while let Some((tree, expanded)) = stack.pop() {
            if !expanded {
                stack.push((tree, true));
                stack.extend(tree.children.iter().rev().map(|child| (child, false)));
                continue;
            }
            let children = finished.split_off(finished.len() - tree.children.len());
            finished.push(combine(tree, children));
        }

        finished.pop()
    }

    /// Number of nodes in this tree.
    pub fn size(&self) -> usize {
        self.fold(|_, children: Vec<usize>| 1 + children.iter().sum::<usize>())
            .unwrap_or(1)
    }

    /// Type tags in pre-order, e.g. for shape assertions.
    pub fn type_tags(&self) -> Vec<&TypeTag> {
        let mut tags = Vec::new();
        let mut stack = vec![self];
        while let Some(tree) = stack.pop() {
            tags.push(&tree.type_tag);
            stack.extend(tree.children.iter().rev());
        }
        tags
    }

    /// Compact shape string: `fragment{list{list-item{text{}}}}`.
    pub fn shape(&self) -> String {
        self.fold(|tree, children: Vec<String>| {
            format!("{}{{{}}}", tree.type_tag, children.join(","))
        })
        .unwrap_or_default()
    }

    /// Render as a `termtree` for terminal display.
    ///
    /// `label` formats each node; the CLI uses it to add colours.
    pub fn to_term_tree<F>(&self, label: &F) -> TermTree<String>
    where
        F: Fn(&Tree) -> String,
    {
        self.fold(|tree, leaves| TermTree::new(label(tree)).with_leaves(leaves))
            .unwrap_or_else(|| TermTree::new(label(self)))
    }

    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::{Map, Value};

        self.fold(|tree, children| {
            let fields = tree
                .fields
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect();
            let mut object = Map::new();
            object.insert("id".into(), Value::String(tree.id.to_string()));
            object.insert("type".into(), Value::String(tree.type_tag.to_string()));
            object.insert("fields".into(), Value::Object(fields));
            // moved in whole; `json!` would re-serialize the subtree
            object.insert("children".into(), Value::Array(children));
            Value::Object(object)
        })
        .unwrap_or(Value::Null)
    }
}

impl Drop for Tree {
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.children);
        while let Some(mut child) = pending.pop() {
            pending.append(&mut child.children);
        }
    }
}

/// Plain label: type tag plus non-empty fields.
pub fn plain_label(tree: &Tree) -> String {
    if tree.fields.is_empty() {
        tree.type_tag.to_string()
    } else {
        let fields = tree
            .fields
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(" ");
        format!("{} [{}]", tree.type_tag, fields)
    }
}

impl fmt::Display for Tree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_term_tree(&plain_label))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::catalogue::TypeCatalogue;
    use crate::domain::node::Node;
    use crate::domain::value::FieldValue;

    #[test]
    fn given_nested_snapshot_when_building_tree_then_shape_matches() {
        let catalogue = TypeCatalogue::reference();
        let mut snap = Snapshot::with_root(Node::detached("fragment".into(), Fields::new()));
        let root = snap.root_id;
        let list = snap
            .attach(Node::detached("list".into(), Fields::new()), root, None, &catalogue)
            .unwrap();
        let mut fields = Fields::new();
        fields.insert("text".into(), FieldValue::from("hi"));
        let item = snap
            .attach(Node::detached("list-item".into(), Fields::new()), list, None, &catalogue)
            .unwrap();
        snap.attach(Node::detached("text".into(), fields), item, None, &catalogue)
            .unwrap();

        let tree = Tree::build(&snap, root).unwrap();
        assert_eq!(tree.shape(), "fragment{list{list-item{text{}}}}");
        assert_eq!(tree.size(), 4);

        let rendered = tree.to_string();
        assert!(rendered.contains("text [text=\"hi\"]"));
        assert_eq!(tree.to_json()["children"][0]["type"], "list");
    }

    #[test]
    fn given_dangling_child_when_building_tree_then_node_not_found() {
        let mut snap = Snapshot::with_root(Node::detached("fragment".into(), Fields::new()));
        let ghost = NodeId::new();
        let root = snap.root_id;
        if let Some(r) = snap.nodes.get_mut(&root) {
            r.children.push_back(ghost);
        }
        assert_eq!(
            Tree::build(&snap, root),
            Err(DomainError::NodeNotFound(ghost))
        );
    }

    #[test]
    fn given_child_link_cycle_when_building_tree_then_invariant_violation() {
        let mut snap = Snapshot::with_root(Node::detached("fragment".into(), Fields::new()));
        let root = snap.root_id;
        if let Some(r) = snap.nodes.get_mut(&root) {
            r.children.push_back(root);
        }
        assert!(matches!(
            Tree::build(&snap, root),
            Err(DomainError::InvariantViolation(_))
        ));
        assert_eq!(snap.depth(), 1);
    }
}
