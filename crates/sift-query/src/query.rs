//! Query value model.
//!
//! JSON cannot tell an ordered "any of" list from a fixed "all of" tuple, so
//! queries carry their own small value type. Candidates stay plain
//! `serde_json::Value`s and are lifted into [`Query`] only for comparison.

use serde_json::Value;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};

/// A query value.
///
/// `==` is structural and compares floats by bit pattern, so it agrees with
/// `Hash` and queries can key caches. Matching uses [`Query::loose_eq`].
#[derive(Debug, Clone)]
pub enum Query {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// Any-of composition.
    List(Vec<Query>),
    /// All-of composition.
    Tuple(Vec<Query>),
    Map(BTreeMap<String, Query>),
}

/// Shape tag of a [`Query`], used by type-based applicability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKind {
    None,
    Bool,
    Int,
    Float,
    Str,
    List,
    Tuple,
    Map,
}

impl QueryKind {
    pub fn label(&self) -> &'static str {
        match self {
            QueryKind::None => "none",
            QueryKind::Bool => "bool",
            QueryKind::Int => "int",
            QueryKind::Float => "float",
            QueryKind::Str => "str",
            QueryKind::List => "list",
            QueryKind::Tuple => "tuple",
            QueryKind::Map => "map",
        }
    }
}

impl fmt::Display for QueryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Query {
    /// Build an all-of tuple query.
    pub fn tuple(items: impl IntoIterator<Item = Query>) -> Self {
        Query::Tuple(items.into_iter().collect())
    }

    /// Build an any-of list query.
    pub fn list(items: impl IntoIterator<Item = Query>) -> Self {
        Query::List(items.into_iter().collect())
    }

    pub fn kind(&self) -> QueryKind {
        match self {
            Query::None => QueryKind::None,
            Query::Bool(_) => QueryKind::Bool,
            Query::Int(_) => QueryKind::Int,
            Query::Float(_) => QueryKind::Float,
            Query::Str(_) => QueryKind::Str,
            Query::List(_) => QueryKind::List,
            Query::Tuple(_) => QueryKind::Tuple,
            Query::Map(_) => QueryKind::Map,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Query::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Lift a JSON value into the query model.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => Query::None,
            Value::Bool(b) => Query::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Query::Int(i),
                None => Query::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => Query::Str(s.clone()),
            Value::Array(items) => Query::List(items.iter().map(Query::from_json).collect()),
            Value::Object(map) => Query::Map(
                map.iter()
                    .map(|(k, v)| (k.clone(), Query::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Replace an all-digit string with the integer it spells.
    pub fn coerce_numeric(self) -> Self {
        match self {
            Query::Str(s) if is_digit_string(&s) => match s.parse::<i64>() {
                Ok(i) => Query::Int(i),
                Err(_) => Query::Str(s),
            },
            other => other,
        }
    }

    /// Equality with numeric cross-type comparison (`1 == 1.0`).
    pub fn loose_eq(&self, other: &Query) -> bool {
        match (self, other) {
            (Query::Int(a), Query::Float(b)) | (Query::Float(b), Query::Int(a)) => {
                (*a as f64) == *b
            }
            (Query::Float(a), Query::Float(b)) => a == b,
            (Query::List(a), Query::List(b)) | (Query::Tuple(a), Query::Tuple(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.loose_eq(y))
            }
            (Query::Map(a), Query::Map(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .all(|(k, v)| b.get(k).is_some_and(|other| v.loose_eq(other)))
            }
            _ => self == other,
        }
    }

    /// Ordering between comparable values. `None` when the kinds do not order.
    pub fn loose_cmp(&self, other: &Query) -> Option<Ordering> {
        match (self, other) {
            (Query::Int(a), Query::Int(b)) => Some(a.cmp(b)),
            (Query::Int(a), Query::Float(b)) => (*a as f64).partial_cmp(b),
            (Query::Float(a), Query::Int(b)) => a.partial_cmp(&(*b as f64)),
            (Query::Float(a), Query::Float(b)) => a.partial_cmp(b),
            (Query::Bool(a), Query::Bool(b)) => Some(a.cmp(b)),
            (Query::Str(a), Query::Str(b)) => Some(a.cmp(b)),
            (Query::List(a), Query::List(b)) | (Query::Tuple(a), Query::Tuple(b)) => {
                for (x, y) in a.iter().zip(b) {
                    match x.loose_cmp(y)? {
                        Ordering::Equal => continue,
                        ord => return Some(ord),
                    }
                }
                Some(a.len().cmp(&b.len()))
            }
            _ => None,
        }
    }
}

/// Non-empty and made only of ASCII digits.
pub(crate) fn is_digit_string(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

impl PartialEq for Query {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Query::None, Query::None) => true,
            (Query::Bool(a), Query::Bool(b)) => a == b,
            (Query::Int(a), Query::Int(b)) => a == b,
            (Query::Float(a), Query::Float(b)) => a.to_bits() == b.to_bits(),
            (Query::Str(a), Query::Str(b)) => a == b,
            (Query::List(a), Query::List(b)) | (Query::Tuple(a), Query::Tuple(b)) => a == b,
            (Query::Map(a), Query::Map(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Query {}

impl Hash for Query {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Query::None => {}
            Query::Bool(b) => b.hash(state),
            Query::Int(i) => i.hash(state),
            Query::Float(f) => f.to_bits().hash(state),
            Query::Str(s) => s.hash(state),
            Query::List(items) | Query::Tuple(items) => items.hash(state),
            Query::Map(map) => map.hash(state),
        }
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Query::None => f.write_str("None"),
            Query::Bool(true) => f.write_str("True"),
            Query::Bool(false) => f.write_str("False"),
            Query::Int(i) => write!(f, "{i}"),
            Query::Float(x) => write!(f, "{x:?}"),
            Query::Str(s) => write!(f, "{s:?}"),
            Query::List(items) => {
                f.write_str("[")?;
                write_items(f, items)?;
                f.write_str("]")
            }
            Query::Tuple(items) => {
                f.write_str("(")?;
                write_items(f, items)?;
                if items.len() == 1 {
                    f.write_str(",")?;
                }
                f.write_str(")")
            }
            Query::Map(map) => {
                f.write_str("{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{k:?}: {v}")?;
                }
                f.write_str("}")
            }
        }
    }
}

fn write_items(f: &mut fmt::Formatter<'_>, items: &[Query]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

impl From<i64> for Query {
    fn from(value: i64) -> Self {
        Query::Int(value)
    }
}

impl From<i32> for Query {
    fn from(value: i32) -> Self {
        Query::Int(value.into())
    }
}

impl From<f64> for Query {
    fn from(value: f64) -> Self {
        Query::Float(value)
    }
}

impl From<bool> for Query {
    fn from(value: bool) -> Self {
        Query::Bool(value)
    }
}

impl From<&str> for Query {
    fn from(value: &str) -> Self {
        Query::Str(value.to_string())
    }
}

impl From<String> for Query {
    fn from(value: String) -> Self {
        Query::Str(value)
    }
}

impl From<Vec<Query>> for Query {
    fn from(value: Vec<Query>) -> Self {
        Query::List(value)
    }
}

impl From<&Value> for Query {
    fn from(value: &Value) -> Self {
        Query::from_json(value)
    }
}
