//! Pattern search on the `name` field.

use crate::cache::MemoCache;
use crate::config::QueryConfig;
use crate::error::Result;
use crate::matcher::{MatchContext, Matcher, ValueKind};
use crate::query::QueryKind;
use regex::Regex;
use serde_json::Value;
use std::sync::Arc;

/// `name` matches the query as a pattern.
///
/// Purely alphanumeric queries must equal the name. Anything else is a regex
/// where a bare `*` means `.*`, searched anywhere in the name. Compiled
/// patterns are cached under `config.cache`.
pub fn regex_name(config: &QueryConfig) -> Result<Matcher> {
    let patterns = Patterns::new(config);
    Matcher::from_fn("regex_name", move |ctx| name_matches(&patterns, ctx))
        .path("name")
        .object_kinds([ValueKind::String])
        .applies_to([QueryKind::Str])
        .build()
}

struct Patterns {
    cache: MemoCache<String, Arc<Regex>>,
}

impl Patterns {
    fn new(config: &QueryConfig) -> Self {
        Self {
            cache: MemoCache::new("patterns", config.cache.clone()),
        }
    }

    fn compile(&self, query: &str) -> Result<Arc<Regex>> {
        if let Some(regex) = self.cache.get(&query.to_string()) {
            return Ok(regex);
        }
        let regex = Arc::new(Regex::new(&glob_to_regex(query))?);
        self.cache.insert(query.to_string(), regex.clone());
        Ok(regex)
    }
}

fn name_matches<'a>(patterns: &Patterns, ctx: &MatchContext<'a, '_>) -> Result<Vec<&'a Value>> {
    let (Some(name), Some(query)) = (ctx.candidate.as_str(), ctx.query.as_str()) else {
        return Ok(Vec::new());
    };

    let found = if is_alphanumeric(query) {
        name == query
    } else {
        patterns.compile(query)?.is_match(name)
    };

    Ok(if found { vec![ctx.original] } else { Vec::new() })
}

fn is_alphanumeric(s: &str) -> bool {
    !s.is_empty() && s.chars().all(char::is_alphanumeric)
}

/// Rewrite each `*` not already preceded by `.` into `.*`.
pub fn glob_to_regex(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() + 4);
    let mut prev = None;
    for c in pattern.chars() {
        if c == '*' && prev != Some('.') {
            out.push_str(".*");
        } else {
            out.push(c);
        }
        prev = Some(c);
    }
    out
}
