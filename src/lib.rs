//! folddoc: a versioned tree-document model for UI builders.
//!
//! A [`Document`] is a tree of typed nodes (one root, ordered children,
//! key/value fields). Every mutation produces a new immutable [`Snapshot`]
//! recorded in a [`History`], so any prior state can be restored with undo
//! and redo. A pluggable [`Catalogue`] decides which node types may contain
//! which. Edits can be grouped into transactions that commit as one undo
//! step or roll back completely.
//!
//! ```
//! use folddoc::domain::{Document, TypeCatalogue};
//!
//! let mut doc = Document::new(TypeCatalogue::reference());
//! let root = doc.root_id();
//! let list = doc.add("list", None).and_then(|n| n.into(root, None)).unwrap();
//! doc.add("list-item", None).and_then(|n| n.into(list, None)).unwrap();
//! assert_eq!(doc.to_tree().unwrap().shape(), "fragment{list{list-item{}}}");
//!
//! doc.undo();
//! assert_eq!(doc.to_tree().unwrap().shape(), "fragment{list{}}");
//! ```

pub mod application;
pub mod cli;
pub mod config;
pub mod domain;
pub mod exitcode;
pub mod infrastructure;
pub mod util;

pub use domain::{
    Catalogue, Document, DomainError, DomainResult, FieldValue, History, Node, NodeId, Snapshot,
    Tree, TypeCatalogue, TypeTag,
};
