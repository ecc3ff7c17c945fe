use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::CoreError;

/// One step of a [`FieldPath`]: an object key or a list index.
///
/// Indices order before keys so that `BTreeMap<FieldPath, _>` iterates list
/// items in position order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PathKey {
    Index(usize),
    Field(String),
}

impl PathKey {
    pub fn as_index(&self) -> Option<usize> {
        match self {
            Self::Index(i) => Some(*i),
            Self::Field(_) => None,
        }
    }

    pub fn as_field(&self) -> Option<&str> {
        match self {
            Self::Field(k) => Some(k),
            Self::Index(_) => None,
        }
    }
}

impl From<usize> for PathKey {
    fn from(i: usize) -> Self {
        Self::Index(i)
    }
}

impl From<&str> for PathKey {
    fn from(k: &str) -> Self {
        Self::Field(k.to_string())
    }
}

/// Address of a location in the value tree, e.g. `todos[0].title`.
///
/// The empty path is the root of the tree.
#[derive(Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FieldPath(Vec<PathKey>);

impl FieldPath {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Build a path from raw keys.
    ///
    /// Keys are taken as given, so a path built here may not survive a
    /// format/parse cycle: a field key that contains `.`, `[` or `]`, or that
    /// is all digits, formats into text that parses differently (`Field("0")`
    /// comes back as `Index(0)`). Paths from [`FieldPath::parse`] always do.
    pub fn from_keys(keys: Vec<PathKey>) -> Self {
        Self(keys)
    }

    /// Parse a dotted/bracketed path string.
    ///
    /// `a.b[2].c` and `a.b.2.c` both parse to the same key sequence; digit-only
    /// dotted segments are treated as list indices.
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        let malformed = |reason: &str| CoreError::MalformedPath {
            path: s.to_string(),
            reason: reason.to_string(),
        };

        let mut keys = Vec::new();
        if s.is_empty() {
            return Ok(Self(keys));
        }

        let bytes = s.as_bytes();
        let mut pos = 0;

        while pos < bytes.len() {
            match bytes[pos] {
                b'[' => {
                    let close = s[pos..]
                        .find(']')
                        .map(|off| pos + off)
                        .ok_or_else(|| malformed("unclosed '['"))?;
                    let inner = &s[pos + 1..close];
                    if inner.is_empty() || !inner.bytes().all(|b| b.is_ascii_digit()) {
                        return Err(malformed("bracket segment must be a list index"));
                    }
                    let index = inner
                        .parse::<usize>()
                        .map_err(|_| malformed("list index out of range"))?;
                    keys.push(PathKey::Index(index));
                    pos = close + 1;
                }
                b'.' => {
                    if keys.is_empty() {
                        return Err(malformed("leading '.'"));
                    }
                    pos += 1;
                    if pos >= bytes.len() {
                        return Err(malformed("trailing '.'"));
                    }
                    if matches!(bytes[pos], b'.' | b'[' | b']') {
                        return Err(malformed("empty segment"));
                    }
                    pos = Self::read_segment(s, pos, &mut keys);
                }
                b']' => return Err(malformed("unexpected ']'")),
                _ => {
                    if !keys.is_empty() {
                        // a segment directly following `]` without a dot
                        return Err(malformed("expected '.' or '[' after ']'"));
                    }
                    pos = Self::read_segment(s, pos, &mut keys);
                }
            }
        }

        Ok(Self(keys))
    }

    fn read_segment(s: &str, start: usize, keys: &mut Vec<PathKey>) -> usize {
        let end = s[start..]
            .find(['.', '[', ']'])
            .map(|off| start + off)
            .unwrap_or(s.len());
        let segment = &s[start..end];
        match segment.parse::<usize>() {
            Ok(index) if segment.bytes().all(|b| b.is_ascii_digit()) => {
                keys.push(PathKey::Index(index))
            }
            _ => keys.push(PathKey::Field(segment.to_string())),
        }
        end
    }

    pub fn keys(&self) -> &[PathKey] {
        &self.0
    }

    pub fn depth(&self) -> usize {
        self.0.len()
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn last(&self) -> Option<&PathKey> {
        self.0.last()
    }

    pub fn parent(&self) -> Option<FieldPath> {
        if self.0.is_empty() {
            return None;
        }
        Some(Self(self.0[..self.0.len() - 1].to_vec()))
    }

    /// True when `other` starts with all of `self`'s keys (a path is its own ancestor).
    pub fn is_ancestor_of(&self, other: &FieldPath) -> bool {
        other.0.len() >= self.0.len() && other.0[..self.0.len()] == self.0[..]
    }

    pub fn is_strict_ancestor_of(&self, other: &FieldPath) -> bool {
        other.0.len() > self.0.len() && self.is_ancestor_of(other)
    }

    pub fn join(&self, suffix: &FieldPath) -> FieldPath {
        let mut keys = self.0.clone();
        keys.extend(suffix.0.iter().cloned());
        Self(keys)
    }

    pub fn child(&self, key: impl Into<PathKey>) -> FieldPath {
        let mut keys = self.0.clone();
        keys.push(key.into());
        Self(keys)
    }

    /// The remainder of `self` below `prefix`, if `prefix` is an ancestor.
    pub fn strip_prefix(&self, prefix: &FieldPath) -> Option<FieldPath> {
        if !prefix.is_ancestor_of(self) {
            return None;
        }
        Some(Self(self.0[prefix.0.len()..].to_vec()))
    }

    pub(crate) fn with_index_at(&self, depth: usize, index: usize) -> FieldPath {
        let mut keys = self.0.clone();
        keys[depth] = PathKey::Index(index);
        Self(keys)
    }

    /// If this path lies inside an element of the list at `list`, returns that element's index.
    pub fn index_under(&self, list: &FieldPath) -> Option<usize> {
        if !list.is_strict_ancestor_of(self) {
            return None;
        }
        self.0[list.0.len()].as_index()
    }

    /// Rewrite the element index below `list`, keeping the rest of the path.
    pub fn reindex_under(&self, list: &FieldPath, index: usize) -> FieldPath {
        self.with_index_at(list.0.len(), index)
    }
}

/// Normalized text form, `todos[0].title`. Field keys are written verbatim;
/// see [`FieldPath::from_keys`] for the keys that do not read back the same.
impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, key) in self.0.iter().enumerate() {
            match key {
                PathKey::Index(idx) => write!(f, "[{idx}]")?,
                PathKey::Field(k) if i == 0 => write!(f, "{k}")?,
                PathKey::Field(k) => write!(f, ".{k}")?,
            }
        }
        Ok(())
    }
}

impl fmt::Debug for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FieldPath({self})")
    }
}

impl FromStr for FieldPath {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for FieldPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for FieldPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s: String = Deserialize::deserialize(deserializer)?;
        FieldPath::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Anything that can address a field: path strings or already-parsed paths.
pub trait IntoFieldPath {
    fn into_field_path(self) -> Result<FieldPath, CoreError>;
}

impl IntoFieldPath for &str {
    fn into_field_path(self) -> Result<FieldPath, CoreError> {
        FieldPath::parse(self)
    }
}

impl IntoFieldPath for &String {
    fn into_field_path(self) -> Result<FieldPath, CoreError> {
        FieldPath::parse(self)
    }
}

impl IntoFieldPath for FieldPath {
    fn into_field_path(self) -> Result<FieldPath, CoreError> {
        Ok(self)
    }
}

impl IntoFieldPath for &FieldPath {
    fn into_field_path(self) -> Result<FieldPath, CoreError> {
        Ok(self.clone())
    }
}
