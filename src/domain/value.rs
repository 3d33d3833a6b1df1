//! Typed field values and copy-on-write path updates.
//!
//! Containers are persistent (`im`) collections: cloning a [`FieldValue`]
//! is cheap and an update along a path rebuilds only the containers on that
//! path, sharing every sibling with the previous version.

use std::fmt;

use im::{OrdMap, Vector};
use serde::{Deserialize, Serialize};

/// A field value stored on a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vector<FieldValue>),
    Map(OrdMap<String, FieldValue>),
}

/// One segment of a path into a field value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathKey {
    Key(String),
    Index(usize),
}

impl fmt::Display for PathKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathKey::Key(key) => f.write_str(key),
            PathKey::Index(idx) => write!(f, "{}", idx),
        }
    }
}

impl From<&str> for PathKey {
    fn from(key: &str) -> Self {
        PathKey::Key(key.to_string())
    }
}

impl From<String> for PathKey {
    fn from(key: String) -> Self {
        PathKey::Key(key)
    }
}

impl From<usize> for PathKey {
    fn from(idx: usize) -> Self {
        PathKey::Index(idx)
    }
}

/// Split a dotted path (`style.padding.0`) into keys; numeric segments become indices.
pub fn parse_dotted_path(path: &str) -> Vec<PathKey> {
    path.split('.')
        .filter(|segment| !segment.is_empty())
        .map(|segment| match segment.parse::<usize>() {
            Ok(idx) => PathKey::Index(idx),
            Err(_) => PathKey::Key(segment.to_string()),
        })
        .collect()
}

/// Render a path in dotted form.
pub fn format_path(path: &[PathKey]) -> String {
    itertools::join(path, ".")
}

impl FieldValue {
    /// Empty mapping value.
    pub fn map() -> Self {
        FieldValue::Map(OrdMap::new())
    }

    pub fn is_map(&self) -> bool {
        matches!(self, FieldValue::Map(_))
    }

    pub fn as_map(&self) -> Option<&OrdMap<String, FieldValue>> {
        match self {
            FieldValue::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Look up a nested value.
    pub fn get_path(&self, path: &[PathKey]) -> Option<&FieldValue> {
        let mut current = self;
        for key in path {
            current = match (key, current) {
                (PathKey::Key(k), FieldValue::Map(map)) => map.get(k)?,
                (PathKey::Index(i), FieldValue::List(list)) => list.get(*i)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Shallow merge: keys of `patch` override, other keys of `self` survive.
    ///
    /// Returns `None` unless both sides are mappings.
    pub fn merged(&self, patch: &FieldValue) -> Option<FieldValue> {
        match (self, patch) {
            (FieldValue::Map(base), FieldValue::Map(overlay)) => {
                Some(FieldValue::Map(overlay.clone().union(base.clone())))
            }
            _ => None,
        }
    }

    /// Convert to a JSON value (non-finite floats become `null`).
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value;
        match self {
            FieldValue::Null => Value::Null,
            FieldValue::Bool(b) => Value::Bool(*b),
            FieldValue::Int(i) => Value::from(*i),
            FieldValue::Float(x) => serde_json::Number::from_f64(*x)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            FieldValue::String(s) => Value::String(s.clone()),
            FieldValue::List(items) => Value::Array(items.iter().map(FieldValue::to_json).collect()),
            FieldValue::Map(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }
}

/// Write `value` at `path` below `current`, returning the rebuilt container.
///
/// `None` and `Null` stand for a missing slot and are replaced by a fresh
/// container of the kind the next key needs. A list index may address an
/// existing element or the end of the list. Returns `None` when the path runs
/// into a scalar or past the end of a list.
pub(crate) fn set_in(
    current: Option<&FieldValue>,
    path: &[PathKey],
    value: FieldValue,
) -> Option<FieldValue> {
    let Some((head, rest)) = path.split_first() else {
        return Some(value);
    };

    match head {
        PathKey::Key(key) => {
            let mut map = match current {
                None | Some(FieldValue::Null) => OrdMap::new(),
                Some(FieldValue::Map(map)) => map.clone(),
                Some(_) => return None,
            };
            let child = set_in(map.get(key), rest, value)?;
            map.insert(key.clone(), child);
            Some(FieldValue::Map(map))
        }
        PathKey::Index(idx) => {
            let mut list = match current {
                None | Some(FieldValue::Null) => Vector::new(),
                Some(FieldValue::List(list)) => list.clone(),
                Some(_) => return None,
            };
            let idx = *idx;
            if idx < list.len() {
                let child = set_in(list.get(idx), rest, value)?;
                list.set(idx, child);
            } else if idx == list.len() {
                let child = set_in(None, rest, value)?;
                list.push_back(child);
            } else {
                return None;
            }
            Some(FieldValue::List(list))
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

impl From<serde_json::Value> for FieldValue {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => FieldValue::Null,
            Value::Bool(b) => FieldValue::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => FieldValue::Int(i),
                None => FieldValue::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => FieldValue::String(s),
            Value::Array(items) => FieldValue::List(items.into_iter().map(FieldValue::from).collect()),
            Value::Object(map) => FieldValue::Map(
                map.into_iter()
                    .map(|(k, v)| (k, FieldValue::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Bool(b)
    }
}

impl From<i64> for FieldValue {
    fn from(i: i64) -> Self {
        FieldValue::Int(i)
    }
}

impl From<i32> for FieldValue {
    fn from(i: i32) -> Self {
        FieldValue::Int(i64::from(i))
    }
}

impl From<f64> for FieldValue {
    fn from(x: f64) -> Self {
        FieldValue::Float(x)
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::String(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::String(s)
    }
}

impl From<OrdMap<String, FieldValue>> for FieldValue {
    fn from(map: OrdMap<String, FieldValue>) -> Self {
        FieldValue::Map(map)
    }
}

impl From<Vec<FieldValue>> for FieldValue {
    fn from(items: Vec<FieldValue>) -> Self {
        FieldValue::List(items.into_iter().collect())
    }
}
