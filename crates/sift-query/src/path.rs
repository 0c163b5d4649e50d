//! Dotted field paths into JSON candidates.

use crate::error::{QueryError, Result};
use serde_json::Value;
use std::fmt;

/// A parsed dotted path such as `name` or `meta.tags.0`.
///
/// Object segments are looked up by key, array segments by integer index.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldPath {
    raw: String,
    segments: Vec<String>,
}

impl FieldPath {
    pub fn parse(path: &str) -> Self {
        Self {
            raw: path.to_string(),
            segments: path.split('.').map(str::to_string).collect(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Walk the path. A missing key, a `null` at a key, a bad index or a scalar
    /// in the middle of the path is a [`QueryError::PathNotFound`].
    pub fn get<'v>(&self, value: &'v Value) -> Result<&'v Value> {
        let mut current = value;
        for segment in &self.segments {
            let next = match current {
                Value::Object(map) => map.get(segment).filter(|v| !v.is_null()),
                Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
                _ => None,
            };
            current = next.ok_or_else(|| QueryError::PathNotFound {
                path: self.raw.clone(),
                segment: segment.clone(),
            })?;
        }
        Ok(current)
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl From<&str> for FieldPath {
    fn from(path: &str) -> Self {
        FieldPath::parse(path)
    }
}
