//! The versioned document: structural edits over a snapshot history.
//!
//! Every mutation clones the current [`Snapshot`] (cheap, persistent maps),
//! edits the clone, validates it and pushes it into the [`History`]. Any
//! failure is raised before the push, so a rejected edit leaves the history
//! untouched.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, trace};

use crate::domain::catalogue::Catalogue;
use crate::domain::error::{DomainError, DomainResult};
use crate::domain::history::{History, HistoryConfig};
use crate::domain::node::{Fields, Node, NodeId, TypeTag};
use crate::domain::snapshot::Snapshot;
use crate::domain::tree::Tree;
use crate::domain::value::{format_path, set_in, FieldValue, PathKey};

/// Construction settings for a [`Document`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentConfig {
    /// Type tag of the root node
    pub root_type: TypeTag,
    pub history: HistoryConfig,
    /// Run the full invariant sweep on every edit before it is recorded
    pub verify_invariants: bool,
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            root_type: TypeTag::from("fragment"),
            history: HistoryConfig::default(),
            verify_invariants: false,
        }
    }
}

/// A tree document with undo/redo and transactions.
pub struct Document {
    history: History<Snapshot>,
    catalogue: Box<dyn Catalogue>,
    verify_invariants: bool,
    /// Nesting level of `run_transaction` calls
    transaction_depth: usize,
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("root_id", &self.root_id())
            .field("nodes", &self.snapshot().len())
            .field("history", &self.history)
            .finish()
    }
}

impl Document {
    /// Document with a `fragment` root and unbounded history.
    pub fn new(catalogue: impl Catalogue + 'static) -> Self {
        let catalogue: Box<dyn Catalogue> = Box::new(catalogue);
        let config = DocumentConfig::default();
        let fields = seed_fields(catalogue.as_ref(), &config.root_type);
        let root = Node::detached(config.root_type.clone(), fields);
        Self::from_parts(catalogue, root, config)
    }

    /// Document built from explicit settings.
    ///
    /// Fails when a strict catalogue does not know the root type.
    pub fn with_config(
        catalogue: impl Catalogue + 'static,
        config: DocumentConfig,
    ) -> DomainResult<Self> {
        let catalogue: Box<dyn Catalogue> = Box::new(catalogue);
        if !catalogue.knows(&config.root_type) {
            return Err(DomainError::UnknownNodeType(config.root_type));
        }
        let fields = seed_fields(catalogue.as_ref(), &config.root_type);
        let root = Node::detached(config.root_type.clone(), fields);
        Ok(Self::from_parts(catalogue, root, config))
    }

    fn from_parts(catalogue: Box<dyn Catalogue>, root: Node, config: DocumentConfig) -> Self {
        debug!("new document: root {} ({})", root.id, root.type_tag);
        Self {
            history: History::with_config(Snapshot::with_root(root), config.history),
            catalogue,
            verify_invariants: config.verify_invariants,
            transaction_depth: 0,
        }
    }

    // ====================================================================
    // Reads
    // ====================================================================

    pub fn root_id(&self) -> NodeId {
        self.snapshot().root_id
    }

    pub fn get_node(&self, id: NodeId) -> Option<&Node> {
        self.snapshot().get(id)
    }

    /// The current snapshot, borrowed.
    pub fn snapshot(&self) -> &Snapshot {
        self.history.current()
    }

    /// An independent copy of the current snapshot.
    ///
    /// Edits to the copy never reach the document.
    pub fn export_snapshot(&self) -> Snapshot {
        self.snapshot().clone()
    }

    #[instrument(level = "trace", skip(self))]
    pub fn to_tree(&self) -> DomainResult<Tree> {
        Tree::build(self.snapshot(), self.root_id())
    }

    /// Selected node, or `None` if the stored selection names a node that
    /// does not exist in the current version.
    pub fn selection(&self) -> Option<NodeId> {
        let snapshot = self.snapshot();
        snapshot.selection.filter(|id| snapshot.contains(*id))
    }

    pub fn catalogue(&self) -> &dyn Catalogue {
        self.catalogue.as_ref()
    }

    pub fn history(&self) -> &History<Snapshot> {
        &self.history
    }

    // ====================================================================
    // Structural edits
    // ====================================================================

    /// Create a node of type `type_tag`; attach it with [`PendingNode::into`].
    ///
    /// The node receives the type's schema defaults overlaid with `fields`.
    /// Nothing changes in the document until `into` succeeds.
    #[instrument(level = "trace", skip(self, fields))]
    pub fn add(
        &mut self,
        type_tag: impl Into<TypeTag> + fmt::Debug,
        fields: Option<Fields>,
    ) -> DomainResult<PendingNode<'_>> {
        let type_tag = type_tag.into();
        if !self.catalogue.knows(&type_tag) {
            return Err(DomainError::UnknownNodeType(type_tag));
        }
        let mut seeded = seed_fields(self.catalogue.as_ref(), &type_tag);
        if let Some(fields) = fields {
            for name in fields.keys() {
                self.check_field(&type_tag, name)?;
            }
            seeded = fields.union(seeded);
        }
        let node = Node::detached(type_tag, seeded);
        trace!("allocated {} ({})", node.id, node.type_tag);
        Ok(PendingNode { doc: self, node })
    }

    /// Delete `id` and its subtree. Removing the root is a silent no-op.
    #[instrument(level = "trace", skip(self))]
    pub fn remove(&mut self, id: NodeId) -> DomainResult<()> {
        if id == self.root_id() {
            debug!("remove: ignoring root {}", id);
            return Ok(());
        }
        let mut next = self.export_snapshot();
        let removed = next.remove_subtree(id)?;
        debug!("remove: {} nodes under {}", removed.len(), id);
        self.commit(next)
    }

    /// Start moving `id`; finish with [`PendingMove::into`].
    #[instrument(level = "trace", skip(self))]
    pub fn move_node(&mut self, id: NodeId) -> DomainResult<PendingMove<'_>> {
        if id == self.root_id() {
            return Err(DomainError::InvalidOperation(
                "cannot move root node".to_string(),
            ));
        }
        if !self.snapshot().contains(id) {
            return Err(DomainError::NodeNotFound(id));
        }
        Ok(PendingMove { doc: self, id })
    }

    /// Replace a field wholesale.
    #[instrument(level = "trace", skip(self, value))]
    pub fn update_field(
        &mut self,
        id: NodeId,
        field: &str,
        value: impl Into<FieldValue>,
    ) -> DomainResult<()> {
        let mut node = self.node_for_write(id, field)?;
        node.fields.insert(field.to_string(), value.into());

        let mut next = self.export_snapshot();
        next.nodes.insert(id, node);
        self.commit(next)
    }

    /// Shallow-merge a mapping into a mapping field.
    ///
    /// An absent field is treated as an empty mapping.
    #[instrument(level = "trace", skip(self, partial))]
    pub fn patch_field(
        &mut self,
        id: NodeId,
        field: &str,
        partial: impl Into<FieldValue>,
    ) -> DomainResult<()> {
        let mut node = self.node_for_write(id, field)?;
        let partial = partial.into();
        let base = node.fields.get(field).cloned().unwrap_or_else(FieldValue::map);
        let merged = base.merged(&partial).ok_or_else(|| DomainError::NotAMapping {
            node: id,
            field: field.to_string(),
        })?;
        node.fields.insert(field.to_string(), merged);

        let mut next = self.export_snapshot();
        next.nodes.insert(id, node);
        self.commit(next)
    }

    /// Copy-on-write update at a nested path; the first key names the field.
    ///
    /// Only the containers along `path` are rebuilt. An empty path changes
    /// nothing and records nothing. Returns the updated node.
    #[instrument(level = "trace", skip(self, value))]
    pub fn patch_path(
        &mut self,
        id: NodeId,
        path: &[PathKey],
        value: impl Into<FieldValue>,
    ) -> DomainResult<Node> {
        let node = self
            .get_node(id)
            .cloned()
            .ok_or(DomainError::NodeNotFound(id))?;
        let Some((head, rest)) = path.split_first() else {
            return Ok(node);
        };
        let PathKey::Key(field) = head else {
            return Err(DomainError::InvalidOperation(format!(
                "path {} must start with a field name",
                format_path(path)
            )));
        };
        let mut node = self.node_for_write(id, field)?;

        let rebuilt = set_in(node.fields.get(field), rest, value.into()).ok_or_else(|| {
            DomainError::PathConflict {
                node: id,
                path: format_path(path),
            }
        })?;
        node.fields.insert(field.clone(), rebuilt);

        let mut next = self.export_snapshot();
        next.nodes.insert(id, node.clone());
        self.commit(next)?;
        Ok(node)
    }

    /// Set or clear the selection. The id is not validated.
    #[instrument(level = "trace", skip(self))]
    pub fn select(&mut self, id: Option<NodeId>) -> DomainResult<()> {
        let mut next = self.export_snapshot();
        next.selection = id;
        self.commit(next)
    }

    // ====================================================================
    // History
    // ====================================================================

    pub fn undo(&mut self) -> bool {
        let changed = self.history.undo().is_some();
        trace!("undo: {}", changed);
        changed
    }

    pub fn redo(&mut self) -> bool {
        let changed = self.history.redo().is_some();
        trace!("redo: {}", changed);
        changed
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn in_transaction(&self) -> bool {
        self.transaction_depth > 0
    }

    /// Whether every edit is checked against the tree invariants.
    pub fn verifies_invariants(&self) -> bool {
        self.verify_invariants
    }

    /// Run `f` as one undo step.
    ///
    /// Commits when `f` returns `Ok`. On `Err`, or if `f` panics, the
    /// document returns to the state it had when this call started and the
    /// error or panic is passed on. A call nested inside another transaction
    /// joins it; its failure rewinds only its own edits.
    pub fn run_transaction<R, E, F>(&mut self, f: F) -> Result<R, E>
    where
        F: FnOnce(&mut Document) -> Result<R, E>,
    {
        let outermost = self.transaction_depth == 0;
        let savepoint = self.export_snapshot();
        if outermost {
            self.history.begin_transaction();
        }
        self.transaction_depth += 1;

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| f(self)));
        self.transaction_depth -= 1;

        let rewind = |doc: &mut Document| {
            if outermost {
                doc.history.rollback_transaction();
            } else {
                doc.history.push(savepoint);
            }
        };

        match outcome {
            Ok(Ok(value)) => {
                if outermost {
                    self.history.commit_transaction();
                }
                Ok(value)
            }
            Ok(Err(err)) => {
                debug!("transaction failed, rolling back");
                rewind(self);
                Err(err)
            }
            Err(payload) => {
                rewind(self);
                panic::resume_unwind(payload)
            }
        }
    }

    // ====================================================================
    // Internals
    // ====================================================================

    fn check_field(&self, type_tag: &TypeTag, field: &str) -> DomainResult<()> {
        match self.catalogue.schema(type_tag) {
            Some(schema) if !schema.contains_key(field) => Err(DomainError::UnknownField {
                type_tag: type_tag.clone(),
                field: field.to_string(),
            }),
            _ => Ok(()),
        }
    }

    /// Owned copy of `id`, after checking that `field` may be written.
    fn node_for_write(&self, id: NodeId, field: &str) -> DomainResult<Node> {
        let node = self.get_node(id).ok_or(DomainError::NodeNotFound(id))?;
        self.check_field(&node.type_tag, field)?;
        Ok(node.clone())
    }

    fn attach_into(
        &mut self,
        mut next: Snapshot,
        node: Node,
        parent: NodeId,
        index: Option<usize>,
    ) -> DomainResult<NodeId> {
        let id = next.attach(node, parent, index, self.catalogue.as_ref())?;
        self.commit(next)?;
        Ok(id)
    }

    /// Validate and record `next`.
    fn commit(&mut self, next: Snapshot) -> DomainResult<()> {
        if self.verify_invariants {
            next.check_invariants()?;
        }
        self.history.push(next);
        Ok(())
    }
}

fn seed_fields(catalogue: &dyn Catalogue, type_tag: &TypeTag) -> Fields {
    catalogue
        .schema(type_tag)
        .map(|schema| {
            schema
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect()
        })
        .unwrap_or_default()
}

/// A created but not yet attached node.
#[must_use = "a pending node is discarded unless `into` is called"]
pub struct PendingNode<'a> {
    doc: &'a mut Document,
    node: Node,
}

impl<'a> PendingNode<'a> {
    /// Identifier the node will have once attached.
    pub fn id(&self) -> NodeId {
        self.node.id
    }

    /// Attach under `parent` at `index`; `None` or an out-of-range index appends.
    pub fn into(self, parent: NodeId, index: Option<usize>) -> DomainResult<NodeId> {
        let next = self.doc.export_snapshot();
        self.doc.attach_into(next, self.node, parent, index)
    }
}

/// A move waiting for its destination.
#[must_use = "a pending move does nothing unless `into` is called"]
pub struct PendingMove<'a> {
    doc: &'a mut Document,
    id: NodeId,
}

impl<'a> PendingMove<'a> {
    /// Re-attach under `parent` at `index`, counted after the node left its
    /// old position.
    pub fn into(self, parent: NodeId, index: Option<usize>) -> DomainResult<()> {
        let current = self.doc.snapshot();
        if !current.contains(parent) {
            return Err(DomainError::ParentNotFound(parent));
        }
        if current.is_in_subtree(self.id, parent) {
            return Err(DomainError::CyclicMoveRejected {
                node: self.id,
                target: parent,
            });
        }

        let mut next = self.doc.export_snapshot();
        let node = next.detach(self.id)?;
        self.doc.attach_into(next, node, parent, index)?;
        debug!("moved {} under {}", self.id, parent);
        Ok(())
    }
}
