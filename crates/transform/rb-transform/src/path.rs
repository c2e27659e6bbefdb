//! FieldPath - the address of a leaf inside a nested row.

use std::fmt;

/// Field names from a top-level column down to a nested field.
///
/// Segments are kept apart, so a column literally named `id.orig_h` and a
/// field `orig_h` inside a struct `id` are different paths. Joining with
/// `.` only happens for display.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct FieldPath(Vec<String>);

impl FieldPath {
    /// The empty path addresses the row itself.
    pub fn row() -> Self {
        Self::default()
    }

    /// A path of one top-level name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(vec![name.into()])
    }

    /// The path of field `name` below this one.
    pub fn child(&self, name: impl Into<String>) -> Self {
        let mut segments = self.0.clone();
        segments.push(name.into());
        Self(segments)
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Name of the top-level column.
    pub fn root(&self) -> &str {
        self.0.first().map_or("", String::as_str)
    }

    /// Name of the addressed field itself.
    pub fn name(&self) -> &str {
        self.0.last().map_or("", String::as_str)
    }

    /// The enclosing path and the last segment, `None` for the empty path.
    pub fn split_last(&self) -> Option<(FieldPath, &str)> {
        let (last, parents) = self.0.split_last()?;
        Some((FieldPath(parents.to_vec()), last.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("."))
    }
}

/// A single name, never split.
impl From<&str> for FieldPath {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for FieldPath {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

impl<const N: usize> From<[&str; N]> for FieldPath {
    fn from(segments: [&str; N]) -> Self {
        Self(segments.iter().map(|s| s.to_string()).collect())
    }
}

impl From<Vec<String>> for FieldPath {
    fn from(segments: Vec<String>) -> Self {
        Self(segments)
    }
}

impl From<&FieldPath> for FieldPath {
    fn from(path: &FieldPath) -> Self {
        path.clone()
    }
}
