//! Domain layer: the versioned document model
//!
//! This layer is independent of external concerns (no I/O, no CLI, no config loading).

pub mod catalogue;
pub mod document;
pub mod error;
pub mod history;
pub mod node;
pub mod snapshot;
pub mod tree;
pub mod value;

pub use catalogue::{Accepts, Catalogue, FieldSchema, FnPolicy, TypeCatalogue, TypeSpec};
pub use document::{Document, DocumentConfig, PendingMove, PendingNode};
pub use error::{DomainError, DomainResult};
pub use history::{History, HistoryConfig};
pub use node::{Fields, Node, NodeId, TypeTag};
pub use snapshot::Snapshot;
pub use tree::Tree;
pub use value::{parse_dotted_path, FieldValue, PathKey};
