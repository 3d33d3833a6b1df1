//! Document snapshot: one complete version of the node tree.
//!
//! Snapshots are built on persistent maps, so `clone()` is O(1) and an edit
//! on the clone copies only the touched nodes. A snapshot recorded in the
//! history is never edited again; the document always edits a fresh clone.

use std::collections::HashSet;

use im::HashMap;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::domain::catalogue::Catalogue;
use crate::domain::error::{DomainError, DomainResult};
use crate::domain::node::{Node, NodeId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub root_id: NodeId,
    pub nodes: HashMap<NodeId, Node>,
    pub selection: Option<NodeId>,
}

impl Snapshot {
    /// Snapshot holding only `root`, which is also selected.
    pub fn with_root(mut root: Node) -> Self {
        root.parent = None;
        let root_id = root.id;
        let mut nodes = HashMap::new();
        nodes.insert(root_id, root);
        Self {
            root_id,
            nodes,
            selection: Some(root_id),
        }
    }

    pub fn root(&self) -> Option<&Node> {
        self.nodes.get(&self.root_id)
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Pre-order traversal starting at `start` (inclusive).
    pub fn iter_from(&self, start: NodeId) -> PreOrderIter<'_> {
        PreOrderIter::new(self, start)
    }

    /// Pre-order traversal of the whole tree.
    pub fn iter(&self) -> PreOrderIter<'_> {
        self.iter_from(self.root_id)
    }

    /// Post-order traversal starting at `start` (inclusive, visited last).
    pub fn iter_postorder_from(&self, start: NodeId) -> PostOrderIter<'_> {
        PostOrderIter::new(self, start)
    }

    /// Is `candidate` equal to `ancestor` or one of its descendants?
    ///
    /// Walks parent links upward, so the cost is the depth of `candidate`.
    pub fn is_in_subtree(&self, ancestor: NodeId, candidate: NodeId) -> bool {
        let mut current = Some(candidate);
        let mut steps = 0;
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            steps += 1;
            if steps > self.nodes.len() {
                // parent chain loops: broken invariant, nothing is reachable
                return false;
            }
            current = self.nodes.get(&id).and_then(|node| node.parent);
        }
        false
    }

    /// Height of the tree (a lone root has depth 1).
    pub fn depth(&self) -> usize {
        let mut deepest = 0;
        let mut stack = vec![(self.root_id, 1)];
        // at most one visit per node, even if child links loop
        let mut budget = self.nodes.len();
        while let Some((id, level)) = stack.pop() {
            let Some(node) = self.nodes.get(&id) else {
                continue;
            };
            if budget == 0 {
                break;
            }
            budget -= 1;
            deepest = deepest.max(level);
            stack.extend(node.children.iter().map(|&child| (child, level + 1)));
        }
        deepest
    }

    /// Identifiers of all nodes without children, in tree order.
    pub fn leaf_ids(&self) -> Vec<NodeId> {
        self.iter()
            .filter(|(_, node)| node.is_leaf())
            .map(|(id, _)| id)
            .collect()
    }

    /// Link a detached `node` under `parent_id` at `index` (clamped to append).
    ///
    /// Checks parent presence and containment before touching anything.
    #[instrument(level = "trace", skip(self, node, catalogue), fields(node = %node.id))]
    pub(crate) fn attach(
        &mut self,
        mut node: Node,
        parent_id: NodeId,
        index: Option<usize>,
        catalogue: &dyn Catalogue,
    ) -> DomainResult<NodeId> {
        let parent = self
            .nodes
            .get(&parent_id)
            .ok_or(DomainError::ParentNotFound(parent_id))?;

        if !catalogue.accepts(&parent.type_tag, &node.type_tag) {
            return Err(DomainError::ContainmentViolation {
                parent: parent.type_tag.clone(),
                child: node.type_tag.clone(),
            });
        }

        let id = node.id;
        node.parent = Some(parent_id);
        self.nodes.insert(id, node);

        if let Some(parent) = self.nodes.get_mut(&parent_id) {
            match index {
                Some(i) if i <= parent.children.len() => parent.children.insert(i, id),
                _ => parent.children.push_back(id),
            }
        }
        Ok(id)
    }

    /// Unlink `id` from its parent and return the detached node.
    #[instrument(level = "trace", skip(self))]
    pub(crate) fn detach(&mut self, id: NodeId) -> DomainResult<Node> {
        let mut node = self
            .nodes
            .remove(&id)
            .ok_or(DomainError::NodeNotFound(id))?;

        if let Some(parent_id) = node.parent.take() {
            if let Some(parent) = self.nodes.get_mut(&parent_id) {
                parent.children.retain(|child| *child != id);
            }
        }
        Ok(node)
    }

    /// Delete `id` and its whole subtree, descendants first.
    ///
    /// Returns the removed identifiers in removal order.
    #[instrument(level = "trace", skip(self))]
    pub(crate) fn remove_subtree(&mut self, id: NodeId) -> DomainResult<Vec<NodeId>> {
        if !self.contains(id) {
            return Err(DomainError::NodeNotFound(id));
        }
        let doomed: Vec<NodeId> = self.iter_postorder_from(id).map(|(id, _)| id).collect();

        for &victim in &doomed {
            if victim == id {
                self.detach(victim)?;
            } else {
                self.nodes.remove(&victim);
            }
        }

        if self
            .selection
            .map(|selected| doomed.contains(&selected))
            .unwrap_or(false)
        {
            self.selection = None;
        }
        Ok(doomed)
    }

    /// Verify every structural invariant; reports the first violation.
    ///
    /// The selection is not checked: `select` stores unvalidated ids.
    pub fn check_invariants(&self) -> DomainResult<()> {
        let violation = |msg: String| Err(DomainError::InvariantViolation(msg));

        let Some(root) = self.nodes.get(&self.root_id) else {
            return violation(format!("root {} missing", self.root_id));
        };
        if let Some(parent) = root.parent {
            return violation(format!("root {} has parent {}", self.root_id, parent));
        }

        for (id, node) in self.nodes.iter() {
            if node.id != *id {
                return violation(format!("node keyed {} carries id {}", id, node.id));
            }
            let mut seen = HashSet::new();
            for child in node.children.iter() {
                if !seen.insert(*child) {
                    return violation(format!("{} lists child {} twice", id, child));
                }
                match self.nodes.get(child) {
                    None => return violation(format!("{} lists missing child {}", id, child)),
                    Some(c) if c.parent != Some(*id) => {
                        return violation(format!("child {} does not point back to {}", child, id))
                    }
                    Some(_) => {}
                }
            }
            if *id == self.root_id {
                continue;
            }
            let Some(parent_id) = node.parent else {
                return violation(format!("non-root {} has no parent", id));
            };
            match self.nodes.get(&parent_id) {
                None => return violation(format!("{} points to missing parent {}", id, parent_id)),
                Some(parent) => {
                    let count = parent.children.iter().filter(|c| *c == id).count();
                    if count != 1 {
                        return violation(format!(
                            "{} appears {} times under parent {}",
                            id, count, parent_id
                        ));
                    }
                }
            }
        }

        let mut visited = HashSet::new();
        let mut stack = vec![self.root_id];
        while let Some(id) = stack.pop() {
            if !visited.insert(id) {
                return violation(format!("cycle through {}", id));
            }
            if let Some(node) = self.nodes.get(&id) {
                stack.extend(node.children.iter().copied());
            }
        }
        if visited.len() != self.nodes.len() {
            return violation(format!(
                "{} of {} nodes unreachable from root",
                self.nodes.len() - visited.len(),
                self.nodes.len()
            ));
        }
        Ok(())
    }
}

pub struct PreOrderIter<'a> {
    snapshot: &'a Snapshot,
    stack: Vec<NodeId>,
}

impl<'a> PreOrderIter<'a> {
    fn new(snapshot: &'a Snapshot, start: NodeId) -> Self {
        Self {
            snapshot,
            stack: vec![start],
        }
    }
}

impl<'a> Iterator for PreOrderIter<'a> {
    type Item = (NodeId, &'a Node);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(current) = self.stack.pop() {
            if let Some(node) = self.snapshot.get(current) {
                // Push children in reverse order for left-to-right traversal
                self.stack.extend(node.children.iter().rev().copied());
                return Some((current, node));
            }
        }
        None
    }
}

pub struct PostOrderIter<'a> {
    snapshot: &'a Snapshot,
    stack: Vec<(NodeId, bool)>,
}

impl<'a> PostOrderIter<'a> {
    fn new(snapshot: &'a Snapshot, start: NodeId) -> Self {
        Self {
            snapshot,
            stack: vec![(start, false)],
        }
    }
}

impl<'a> Iterator for PostOrderIter<'a> {
    type Item = (NodeId, &'a Node);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some((current, visited)) = self.stack.pop() {
            if let Some(node) = self.snapshot.get(current) {
                if visited {
                    return Some((current, node));
                }
                self.stack.push((current, true));
                for &child in node.children.iter().rev() {
                    self.stack.push((child, false));
                }
            }
        }
        None
    }
}
