//! Built-in matchers and the default registry.
//!
//! - `is_id` / `is_name` - equality on the `id` / `name` field
//! - `regex_name` - glob-ish pattern search on `name`
//! - `expression` - sandboxed `?expr` queries (opt-in)
//! - `or_query` / `and_query` - list and tuple composition

mod expression;
mod logical;
mod pattern;

use crate::config::QueryConfig;
use crate::error::Result;
use crate::matcher::{CastType, CompareOp, Matcher};
use crate::query::QueryKind;
use crate::registry::Registry;

pub use expression::{expression, ExpressionEvaluator};
pub use logical::{and_query, or_query};
pub use pattern::{glob_to_regex, regex_name};

/// `id` equals the query, compared as text so `"2"` and `2` agree.
pub fn is_id() -> Result<Matcher> {
    Matcher::compare("is_id", CompareOp::Eq)
        .path("id")
        .cast(CastType::String)
        .applies_to([QueryKind::Int, QueryKind::Str])
        .build()
}

/// `name` equals the query exactly.
pub fn is_name() -> Result<Matcher> {
    Matcher::compare("is_name", CompareOp::Eq)
        .path("name")
        .applies_to([QueryKind::Str])
        .build()
}

/// Registry with the standard matchers, in dispatch order: `expression`
/// (only when `allow_expressions` is set), `is_id`, `regex_name`,
/// `or_query`, `and_query`.
pub fn default_registry(config: &QueryConfig) -> Result<Registry> {
    let registry = Registry::with_config(config.clone());
    if config.allow_expressions {
        registry.push(expression(config)?);
    }
    registry.push(is_id()?);
    registry.push(regex_name(config)?);
    registry.push(or_query()?);
    registry.push(and_query()?);
    Ok(registry)
}
