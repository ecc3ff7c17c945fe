use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::CoreError;
use crate::path::{FieldPath, PathKey};

/// How many null slots a write may pad in front of a new list element.
/// Writes further past the end fail with [`CoreError::IndexOutOfRange`].
pub const MAX_LIST_PADDING: usize = 1024;

/// A node of the form value tree.
///
/// Containers hold their children behind `Arc`, so cloning a tree is cheap and
/// writes through [`FieldValue::set`] copy only the nodes along the written
/// path. Untouched subtrees keep their allocation, which is what
/// [`FieldValue::same_ref`] compares.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    #[default]
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    List(Arc<Vec<FieldValue>>),
    Object(Arc<BTreeMap<String, FieldValue>>),
}

impl PartialEq for FieldValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Boolean(a), Self::Boolean(b)) => a == b,
            (Self::Integer(a), Self::Integer(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a.total_cmp(b).is_eq(),
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::List(a), Self::List(b)) => Arc::ptr_eq(a, b) || a == b,
            (Self::Object(a), Self::Object(b)) => Arc::ptr_eq(a, b) || a == b,
            _ => false,
        }
    }
}

impl Eq for FieldValue {}

impl FieldValue {
    pub fn list(items: impl IntoIterator<Item = FieldValue>) -> Self {
        Self::List(Arc::new(items.into_iter().collect()))
    }

    pub fn object<K: Into<String>>(entries: impl IntoIterator<Item = (K, FieldValue)>) -> Self {
        Self::Object(Arc::new(
            entries.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        ))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Boolean(_) => "boolean",
            Self::Integer(_) => "integer",
            Self::Float(_) => "float",
            Self::Text(_) => "text",
            Self::List(_) => "list",
            Self::Object(_) => "object",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            FieldValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[FieldValue]> {
        match self {
            FieldValue::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&BTreeMap<String, FieldValue>> {
        match self {
            FieldValue::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Reference identity for containers, value equality for scalars.
    ///
    /// Two trees that are `same_ref` are guaranteed equal; the converse does
    /// not hold.
    pub fn same_ref(&self, other: &FieldValue) -> bool {
        match (self, other) {
            (Self::List(a), Self::List(b)) => Arc::ptr_eq(a, b),
            (Self::Object(a), Self::Object(b)) => Arc::ptr_eq(a, b),
            (Self::List(_) | Self::Object(_), _) | (_, Self::List(_) | Self::Object(_)) => false,
            _ => self == other,
        }
    }

    fn child(&self, key: &PathKey) -> Option<&FieldValue> {
        match (self, key) {
            (Self::List(items), PathKey::Index(i)) => items.get(*i),
            (Self::Object(map), PathKey::Field(k)) => map.get(k),
            (Self::Object(map), PathKey::Index(i)) => map.get(&i.to_string()),
            _ => None,
        }
    }

    /// The value at `path`, or `None` when nothing is stored there.
    pub fn get(&self, path: &FieldPath) -> Option<&FieldValue> {
        path.keys()
            .iter()
            .try_fold(self, |node, key| node.child(key))
    }

    /// Replace the subtree at `path`, creating intermediate containers.
    ///
    /// Scalars in the way are replaced by an object (for a key) or a list
    /// (for an index); lists are padded with nulls up to the index.
    pub fn set(&mut self, path: &FieldPath, value: FieldValue) -> Result<(), CoreError> {
        let mut node = self;
        for (depth, key) in path.keys().iter().enumerate() {
            node = node.child_slot(key, path, depth)?;
        }
        *node = value;
        Ok(())
    }

    fn child_slot(
        &mut self,
        key: &PathKey,
        path: &FieldPath,
        depth: usize,
    ) -> Result<&mut FieldValue, CoreError> {
        match self {
            FieldValue::List(items) => match key {
                PathKey::Index(i) => {
                    let len = items.len();
                    if *i >= len {
                        let padded = i
                            .checked_add(1)
                            .filter(|n| n - len <= MAX_LIST_PADDING + 1)
                            .ok_or_else(|| CoreError::IndexOutOfRange {
                                path: FieldPath::from_keys(path.keys()[..=depth].to_vec())
                                    .to_string(),
                                index: *i,
                                len,
                            })?;
                        Arc::make_mut(items).resize(padded, FieldValue::Null);
                    }
                    Ok(&mut Arc::make_mut(items)[*i])
                }
                PathKey::Field(_) => Err(CoreError::NotAContainer {
                    path: FieldPath::from_keys(path.keys()[..depth].to_vec()).to_string(),
                    kind: "list",
                }),
            },
            FieldValue::Object(map) => {
                let k = match key {
                    PathKey::Field(k) => k.clone(),
                    PathKey::Index(i) => i.to_string(),
                };
                Ok(Arc::make_mut(map).entry(k).or_insert(FieldValue::Null))
            }
            other => {
                *other = match key {
                    PathKey::Index(_) => FieldValue::List(Arc::default()),
                    PathKey::Field(_) => FieldValue::Object(Arc::default()),
                };
                other.child_slot(key, path, depth)
            }
        }
    }

    /// Mutable access to the list at `path`, creating an empty one if nothing
    /// (or null) is stored there.
    pub fn list_mut(&mut self, path: &FieldPath) -> Result<&mut Vec<FieldValue>, CoreError> {
        let mut node = self;
        for (depth, key) in path.keys().iter().enumerate() {
            node = node.child_slot(key, path, depth)?;
        }
        if node.is_null() {
            *node = FieldValue::List(Arc::default());
        }
        match node {
            FieldValue::List(items) => Ok(Arc::make_mut(items)),
            other => Err(CoreError::NotAContainer {
                path: path.to_string(),
                kind: other.kind(),
            }),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value;
        match self {
            Self::Null => Value::Null,
            Self::Boolean(b) => Value::Bool(*b),
            Self::Integer(n) => Value::from(*n),
            Self::Float(f) => serde_json::Number::from_f64(*f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Self::Text(s) => Value::String(s.clone()),
            Self::List(items) => Value::Array(items.iter().map(FieldValue::to_json).collect()),
            Self::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }
}

impl From<serde_json::Value> for FieldValue {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Boolean(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Integer(i),
                None => Self::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => Self::Text(s),
            Value::Array(items) => Self::list(items.into_iter().map(FieldValue::from)),
            Value::Object(map) => Self::object(map.into_iter().map(|(k, v)| (k, FieldValue::from(v)))),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<i64> for FieldValue {
    fn from(n: i64) -> Self {
        Self::Integer(n)
    }
}

impl From<f64> for FieldValue {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}
