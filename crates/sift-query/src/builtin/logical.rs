//! Logical composition of queries.
//!
//! A list query is an OR over its items, a tuple query an AND. Each item is
//! dispatched through the registry as a query of its own, so items may be
//! ids, patterns, expressions or further lists and tuples.

use crate::error::Result;
use crate::matcher::{MatchContext, Matcher};
use crate::query::{Query, QueryKind};
use serde_json::Value;

/// Matches if any item of a list query matches.
///
/// Results are concatenated in item order, so an object matched by two items
/// appears twice.
pub fn or_query() -> Result<Matcher> {
    Matcher::from_fn("or_query", any_of)
        .applies_to([QueryKind::List])
        .build()
}

/// Matches if every item of a tuple query matches.
///
/// Keeps the results of the first item that every other item also produced,
/// compared by identity. An empty tuple matches nothing.
pub fn and_query() -> Result<Matcher> {
    Matcher::from_fn("and_query", all_of)
        .applies_to([QueryKind::Tuple])
        .build()
}

fn any_of<'a>(ctx: &MatchContext<'a, '_>) -> Result<Vec<&'a Value>> {
    let Query::List(items) = ctx.query else {
        return Ok(Vec::new());
    };
    let mut matched = Vec::new();
    for item in items {
        matched.extend(ctx.registry.match_subquery(item, ctx.candidate)?);
    }
    Ok(matched)
}

fn all_of<'a>(ctx: &MatchContext<'a, '_>) -> Result<Vec<&'a Value>> {
    let Query::Tuple(items) = ctx.query else {
        return Ok(Vec::new());
    };
    let mut results = Vec::with_capacity(items.len());
    for item in items {
        let matched = ctx.registry.match_subquery(item, ctx.candidate)?;
        if matched.is_empty() {
            return Ok(Vec::new());
        }
        results.push(matched);
    }

    let Some((first, rest)) = results.split_first() else {
        return Ok(Vec::new());
    };
    Ok(first
        .iter()
        .copied()
        .filter(|hit| rest.iter().all(|other| contains_same(other, hit)))
        .collect())
}

fn contains_same(list: &[&Value], value: &Value) -> bool {
    list.iter().any(|item| std::ptr::eq(*item, value))
}
