//! Domain-level errors (no external dependencies)

use thiserror::Error;

use crate::domain::node::{NodeId, TypeTag};

/// Domain errors represent violations of the document's structural rules.
///
/// Every mutation detects its error before a snapshot is pushed, so an
/// `Err` always leaves the history untouched.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    #[error("node not found: {0}")]
    NodeNotFound(NodeId),

    #[error("parent not found: {0}")]
    ParentNotFound(NodeId),

    #[error("{parent} cannot contain {child}")]
    ContainmentViolation { parent: TypeTag, child: TypeTag },

    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    #[error("cannot move {node} into its own subtree (target {target})")]
    CyclicMoveRejected { node: NodeId, target: NodeId },

    #[error("unknown field '{field}' for node type {type_tag}")]
    UnknownField { type_tag: TypeTag, field: String },

    #[error("unknown node type: {0}")]
    UnknownNodeType(TypeTag),

    #[error("field '{field}' of node {node} is not a mapping")]
    NotAMapping { node: NodeId, field: String },

    #[error("path {path} cannot be applied to node {node}")]
    PathConflict { node: NodeId, path: String },

    #[error("document invariant violated: {0}")]
    InvariantViolation(String),
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;
