//! Ordered matcher registry with eligibility dispatch.

use crate::cache::{CacheMetrics, MemoCache};
use crate::config::{FailurePolicy, QueryConfig};
use crate::error::Result;
use crate::matcher::{Eligibility, Matcher};
use crate::query::Query;
use parking_lot::RwLock;
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

/// Eligible matchers for one query, in registration order.
pub type Eligible = Arc<[Arc<Matcher>]>;

/// An ordered, append-only collection of matchers.
///
/// `&self` is enough for every operation, so a registry can sit behind an
/// `Arc` and be shared between threads. Locks are released before any matcher
/// runs; composite matchers call back into the registry.
pub struct Registry {
    config: QueryConfig,
    matchers: RwLock<Vec<Arc<Matcher>>>,
    /// Bumped by every push; matcher result caches are tagged with it.
    generation: AtomicU64,
    eligibility: MemoCache<Query, Eligible>,
}

impl Registry {
    pub fn new() -> Self {
        Self::with_config(QueryConfig::default())
    }

    pub fn with_config(config: QueryConfig) -> Self {
        debug!(
            "Creating query registry: on_missing_path={:?}, cache_enabled={}, max_entries={}",
            config.on_missing_path, config.cache.enabled, config.cache.max_entries
        );
        Self {
            eligibility: MemoCache::new("eligibility", config.cache.clone()),
            matchers: RwLock::new(Vec::new()),
            generation: AtomicU64::new(0),
            config,
        }
    }

    pub fn config(&self) -> &QueryConfig {
        &self.config
    }

    /// Append a matcher. Cached eligibility and cached matcher results are
    /// dropped since composite results depend on the registry contents.
    pub fn push(&self, matcher: Matcher) -> Arc<Matcher> {
        let matcher = Arc::new(matcher.with_cache_config(self.config.cache.clone()));
        let mut matchers = self.matchers.write();
        debug!(matcher = matcher.name(), position = matchers.len(), "Registering matcher");
        matchers.push(matcher.clone());
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.eligibility.clear();
        for existing in matchers.iter() {
            existing.clear_cache();
        }
        matcher
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.matchers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.matchers.read().is_empty()
    }

    /// Snapshot of the registered matchers.
    pub fn matchers(&self) -> Vec<Arc<Matcher>> {
        self.matchers.read().clone()
    }

    /// Turn query text into the literal it spells, if any.
    ///
    /// `"42"` becomes `Int(42)`, `"[1, 2]"` a list; text that is not a literal
    /// is returned unchanged. Non-text queries pass through.
    pub fn resolve_query(query: &Query) -> Query {
        match query {
            Query::Str(text) => match Query::parse_literal(text) {
                Ok(value) => value,
                Err(err) => {
                    trace!(query = %text, %err, "query kept as text");
                    query.clone()
                }
            },
            other => other.clone(),
        }
    }

    /// Matchers eligible for `query` (resolved first), cached per resolved value.
    ///
    /// An exclusive matcher whose predicate holds ends the scan and is
    /// returned alone.
    pub fn eligible_matchers(&self, query: &Query) -> Eligible {
        let query = Self::resolve_query(query);
        self.eligible_for_resolved(&query)
    }

    fn eligible_for_resolved(&self, query: &Query) -> Eligible {
        if let Some(cached) = self.eligibility.get(query) {
            return cached;
        }

        let matchers = self.matchers.read();
        let mut eligible = Vec::new();
        for matcher in matchers.iter() {
            match matcher.eligibility(query) {
                Eligibility::Eligible => eligible.push(matcher.clone()),
                Eligibility::Ineligible => {}
                Eligibility::Exclusive => {
                    eligible = vec![matcher.clone()];
                    break;
                }
            }
        }
        let eligible: Eligible = eligible.into();
        debug!(
            %query,
            kind = %query.kind(),
            eligible = ?eligible.iter().map(|m| m.name()).collect::<Vec<_>>(),
            "Resolved eligible matchers"
        );
        // Inserted under the read lock so a concurrent push cannot be missed
        self.eligibility.insert(query.clone(), eligible.clone());
        eligible
    }

    /// Run `query` against every candidate, in order.
    ///
    /// Returns references to the matched candidates in candidate-then-matcher
    /// order; a candidate matched by several matchers appears once per match.
    pub fn match_all<'a, I>(&self, query: &Query, candidates: I) -> Result<Vec<&'a Value>>
    where
        I: IntoIterator<Item = &'a Value>,
    {
        let query = Self::resolve_query(query);
        let eligible = self.eligible_for_resolved(&query);
        let mut matched = Vec::new();
        if eligible.is_empty() {
            return Ok(matched);
        }
        for candidate in candidates {
            matched.extend(self.match_one(&query, candidate, &eligible)?);
        }
        trace!(%query, matched = matched.len(), "match complete");
        Ok(matched)
    }

    /// Run the given matchers against one object.
    ///
    /// Each matcher's field path is extracted first; a missing path follows
    /// `on_missing_path`.
    pub fn match_one<'a>(
        &self,
        query: &Query,
        original: &'a Value,
        matchers: &[Arc<Matcher>],
    ) -> Result<Vec<&'a Value>> {
        let mut matched = Vec::new();
        for matcher in matchers {
            let candidate = match matcher.path() {
                None => original,
                Some(path) => match path.get(original) {
                    Ok(value) => value,
                    Err(err) => match self.config.on_missing_path {
                        FailurePolicy::Skip => {
                            trace!(matcher = matcher.name(), %err, "skipping candidate");
                            continue;
                        }
                        FailurePolicy::Abort => return Err(err),
                    },
                },
            };
            matched.extend(matcher.apply(query, candidate, original, self)?);
        }
        Ok(matched)
    }

    /// Resolve `query` and match a single object against its eligible
    /// matchers. Composite matchers use this for their sub-queries.
    pub fn match_subquery<'a>(&self, query: &Query, original: &'a Value) -> Result<Vec<&'a Value>> {
        let query = Self::resolve_query(query);
        let eligible = self.eligible_for_resolved(&query);
        self.match_one(&query, original, &eligible)
    }

    /// Combined metrics of the eligibility cache and every matcher cache.
    pub fn cache_metrics(&self) -> CacheMetrics {
        let mut metrics = self.eligibility.metrics();
        for matcher in self.matchers.read().iter() {
            metrics.merge(&matcher.cache_metrics());
        }
        metrics
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("config", &self.config)
            .field("matchers", &*self.matchers.read())
            .finish()
    }
}
