//! Node identity and the node record stored in every snapshot.

use std::fmt;
use std::str::FromStr;

use im::{OrdMap, Vector};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::value::FieldValue;

/// Field payload of a node, keyed by field name.
pub type Fields = OrdMap<String, FieldValue>;

/// Globally unique node identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(Uuid);

impl NodeId {
    /// Allocate a fresh identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for NodeId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Node type tag, e.g. `fragment`, `list`, `text`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeTag(String);

impl TypeTag {
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TypeTag {
    fn from(tag: &str) -> Self {
        Self(tag.to_string())
    }
}

impl From<String> for TypeTag {
    fn from(tag: String) -> Self {
        Self(tag)
    }
}

impl PartialEq<str> for TypeTag {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for TypeTag {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// A node of the document tree.
///
/// Nodes reference each other by [`NodeId`] only; the owning
/// [`Snapshot`](crate::domain::Snapshot) resolves the links.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub type_tag: TypeTag,
    /// Parent link, `None` for the root and for detached nodes
    pub parent: Option<NodeId>,
    /// Ordered child identifiers
    pub children: Vector<NodeId>,
    pub fields: Fields,
}

impl Node {
    /// Create a detached node without parent or children.
    pub fn detached(type_tag: TypeTag, fields: Fields) -> Self {
        Self {
            id: NodeId::new(),
            type_tag,
            parent: None,
            children: Vector::new(),
            fields,
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Position of `child` in this node's children.
    pub fn child_index(&self, child: NodeId) -> Option<usize> {
        self.children.index_of(&child)
    }
}
