//! The matcher: one predicate unit tested against one candidate.
//!
//! A matcher either compares the candidate with the query through a
//! [`CompareOp`] or hands both to a custom [`MatchFn`]. Before that it may
//! extract a field path, filter on the candidate's kind and cast the value.
//! Results on scalar candidates are memoized per `(query, candidate)`.

use crate::cache::{CacheMetrics, MemoCache};
use crate::config::CacheConfig;
use crate::error::{QueryError, Result};
use crate::path::FieldPath;
use crate::query::{Query, QueryKind};
use crate::registry::Registry;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Simple comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CompareOp {
    Eq,
    #[serde(rename = "neq")]
    Ne,
    Gt,
    #[serde(rename = "gte")]
    Ge,
    Lt,
    #[serde(rename = "lte")]
    Le,
}

impl CompareOp {
    /// Compare `candidate <op> query`. Orderings across incompatible kinds are false.
    pub fn test(&self, candidate: &Query, query: &Query) -> bool {
        match self {
            CompareOp::Eq => candidate.loose_eq(query),
            CompareOp::Ne => !candidate.loose_eq(query),
            CompareOp::Gt => candidate.loose_cmp(query) == Some(Ordering::Greater),
            CompareOp::Ge => matches!(
                candidate.loose_cmp(query),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            CompareOp::Lt => candidate.loose_cmp(query) == Some(Ordering::Less),
            CompareOp::Le => matches!(
                candidate.loose_cmp(query),
                Some(Ordering::Less | Ordering::Equal)
            ),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CompareOp::Eq => "eq",
            CompareOp::Ne => "neq",
            CompareOp::Gt => "gt",
            CompareOp::Ge => "gte",
            CompareOp::Lt => "lt",
            CompareOp::Le => "lte",
        }
    }
}

impl FromStr for CompareOp {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "eq" => Ok(CompareOp::Eq),
            "neq" | "ne" => Ok(CompareOp::Ne),
            "gt" => Ok(CompareOp::Gt),
            "gte" | "ge" => Ok(CompareOp::Ge),
            "lt" => Ok(CompareOp::Lt),
            "lte" | "le" => Ok(CompareOp::Le),
            other => Err(QueryError::Config(format!(
                "unknown comparison operator '{other}'"
            ))),
        }
    }
}

/// Conversion applied to a candidate before comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CastType {
    String,
    Int,
    Float,
}

impl CastType {
    pub fn apply(&self, value: &Value) -> Result<Query> {
        match self {
            CastType::String => Ok(Query::Str(match value {
                Value::String(s) => s.clone(),
                Value::Null => "None".to_string(),
                Value::Bool(true) => "True".to_string(),
                Value::Bool(false) => "False".to_string(),
                other => other.to_string(),
            })),
            CastType::Int => match value {
                Value::Number(n) => match n.as_i64() {
                    Some(i) => Ok(Query::Int(i)),
                    None => n
                        .as_f64()
                        .filter(|f| f.is_finite())
                        .map(|f| Query::Int(f.trunc() as i64))
                        .ok_or_else(|| self.error(value)),
                },
                Value::Bool(b) => Ok(Query::Int(i64::from(*b))),
                Value::String(s) => s
                    .trim()
                    .parse::<i64>()
                    .map(Query::Int)
                    .map_err(|_| self.error(value)),
                _ => Err(self.error(value)),
            },
            CastType::Float => match value {
                Value::Number(n) => n.as_f64().map(Query::Float).ok_or_else(|| self.error(value)),
                Value::Bool(b) => Ok(Query::Float(if *b { 1.0 } else { 0.0 })),
                Value::String(s) => s
                    .trim()
                    .parse::<f64>()
                    .map(Query::Float)
                    .map_err(|_| self.error(value)),
                _ => Err(self.error(value)),
            },
        }
    }

    fn error(&self, value: &Value) -> QueryError {
        QueryError::Cast {
            value: value.to_string(),
            target: match self {
                CastType::String => "string",
                CastType::Int => "int",
                CastType::Float => "float",
            },
        }
    }
}

/// Shape tag of a JSON candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    Null,
    Bool,
    Int,
    Float,
    String,
    Array,
    Object,
}

impl ValueKind {
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Null => ValueKind::Null,
            Value::Bool(_) => ValueKind::Bool,
            Value::Number(n) if n.is_i64() || n.is_u64() => ValueKind::Int,
            Value::Number(_) => ValueKind::Float,
            Value::String(_) => ValueKind::String,
            Value::Array(_) => ValueKind::Array,
            Value::Object(_) => ValueKind::Object,
        }
    }

    /// Scalars are the values whose results can be memoized.
    pub fn is_scalar(&self) -> bool {
        !matches!(self, ValueKind::Array | ValueKind::Object)
    }
}

pub type PredicateFn = Arc<dyn Fn(&Query) -> bool + Send + Sync>;

/// Which queries a matcher accepts.
#[derive(Clone)]
pub enum Applicability {
    /// Eligible when the query is one of these kinds.
    AnyOf(Vec<QueryKind>),
    /// Eligible when the predicate holds.
    Predicate(PredicateFn),
    /// When the predicate holds this matcher is the only eligible one;
    /// otherwise it is skipped.
    Exclusive(PredicateFn),
}

/// Outcome of an applicability check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eligibility {
    Eligible,
    Ineligible,
    Exclusive,
}

impl Applicability {
    pub fn check(&self, query: &Query) -> Eligibility {
        match self {
            Applicability::AnyOf(kinds) if kinds.contains(&query.kind()) => Eligibility::Eligible,
            Applicability::Predicate(pred) if pred(query) => Eligibility::Eligible,
            Applicability::Exclusive(pred) if pred(query) => Eligibility::Exclusive,
            _ => Eligibility::Ineligible,
        }
    }
}

impl fmt::Debug for Applicability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Applicability::AnyOf(kinds) => f.debug_tuple("AnyOf").field(kinds).finish(),
            Applicability::Predicate(_) => f.write_str("Predicate(..)"),
            Applicability::Exclusive(_) => f.write_str("Exclusive(..)"),
        }
    }
}

/// Everything a custom match function sees.
pub struct MatchContext<'a, 'r> {
    /// The candidate after path extraction (not cast).
    pub candidate: &'a Value,
    /// The query after numeric-string coercion.
    pub query: &'r Query,
    /// The object the candidate was extracted from.
    pub original: &'a Value,
    /// The registry running the match, for composite matchers.
    pub registry: &'r Registry,
}

pub type MatchFn =
    Arc<dyn for<'a, 'r> Fn(&MatchContext<'a, 'r>) -> Result<Vec<&'a Value>> + Send + Sync>;

#[derive(Clone)]
pub enum MatchMode {
    Compare(CompareOp),
    Custom(MatchFn),
}

impl fmt::Debug for MatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchMode::Compare(op) => write!(f, "Compare({})", op.as_str()),
            MatchMode::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    query: Query,
    /// Canonical JSON of the scalar candidate
    candidate: String,
}

/// A single predicate unit. Immutable once built.
pub struct Matcher {
    name: String,
    path: Option<FieldPath>,
    object_kinds: Option<Vec<ValueKind>>,
    cast: Option<CastType>,
    mode: MatchMode,
    applicability: Option<Applicability>,
    /// Registry generation and hit count of `original` per (query, candidate)
    cache: MemoCache<CacheKey, (u64, usize)>,
}

impl Matcher {
    pub fn builder(name: impl Into<String>) -> MatcherBuilder {
        MatcherBuilder::new(name)
    }

    /// Start a simple comparison matcher.
    pub fn compare(name: impl Into<String>, op: CompareOp) -> MatcherBuilder {
        MatcherBuilder::new(name).compare(op)
    }

    /// Start a matcher driven by a custom function.
    pub fn from_fn<F>(name: impl Into<String>, func: F) -> MatcherBuilder
    where
        F: for<'a, 'r> Fn(&MatchContext<'a, 'r>) -> Result<Vec<&'a Value>> + Send + Sync + 'static,
    {
        MatcherBuilder::new(name).custom(func)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> Option<&FieldPath> {
        self.path.as_ref()
    }

    pub fn mode(&self) -> &MatchMode {
        &self.mode
    }

    pub fn applicability(&self) -> Option<&Applicability> {
        self.applicability.as_ref()
    }

    /// Whether this matcher accepts `query`. No declared applicability means always.
    pub fn eligibility(&self, query: &Query) -> Eligibility {
        match &self.applicability {
            None => Eligibility::Eligible,
            Some(applicability) => applicability.check(query),
        }
    }

    pub fn cache_metrics(&self) -> CacheMetrics {
        self.cache.metrics()
    }

    pub(crate) fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Rebuild the (still empty) result cache with registry settings.
    pub(crate) fn with_cache_config(mut self, config: CacheConfig) -> Self {
        self.cache = MemoCache::new("matcher", config);
        self
    }

    /// Test `candidate` (already path-extracted) against `query`.
    ///
    /// Returns the matched originals: empty, `[original]`, or more for
    /// composite functions.
    pub fn apply<'a>(
        &self,
        query: &Query,
        candidate: &'a Value,
        original: &'a Value,
        registry: &Registry,
    ) -> Result<Vec<&'a Value>> {
        let kind = ValueKind::of(candidate);
        if let Some(kinds) = &self.object_kinds {
            if !kinds.contains(&kind) {
                return Ok(Vec::new());
            }
        }

        if self.path.is_some() || !kind.is_scalar() {
            return self.evaluate(query, candidate, original, registry);
        }

        let key = CacheKey {
            query: query.clone(),
            candidate: candidate.to_string(),
        };
        // Entries computed before the last push are stale
        let generation = registry.generation();
        if let Some((cached_at, hits)) = self.cache.get(&key) {
            if cached_at == generation {
                return Ok(vec![original; hits]);
            }
        }
        let result = self.evaluate(query, candidate, original, registry)?;
        // Only results made of `original` itself can be replayed from a count
        if result.iter().all(|item| std::ptr::eq(*item, original)) {
            self.cache.insert(key, (generation, result.len()));
        }
        Ok(result)
    }

    fn evaluate<'a>(
        &self,
        query: &Query,
        candidate: &'a Value,
        original: &'a Value,
        registry: &Registry,
    ) -> Result<Vec<&'a Value>> {
        let query = query.clone().coerce_numeric();
        match &self.mode {
            MatchMode::Compare(op) => {
                let value = match self.cast {
                    Some(cast) => cast.apply(candidate)?,
                    None => Query::from_json(candidate),
                }
                .coerce_numeric();
                Ok(if op.test(&value, &query) {
                    vec![original]
                } else {
                    Vec::new()
                })
            }
            MatchMode::Custom(func) => func(&MatchContext {
                candidate,
                query: &query,
                original,
                registry,
            }),
        }
    }
}

impl fmt::Debug for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Matcher")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("object_kinds", &self.object_kinds)
            .field("cast", &self.cast)
            .field("mode", &self.mode)
            .field("applicability", &self.applicability)
            .finish()
    }
}

/// Collects matcher fields; [`MatcherBuilder::build`] checks a mode was chosen.
#[derive(Debug, Clone)]
pub struct MatcherBuilder {
    name: String,
    path: Option<FieldPath>,
    object_kinds: Option<Vec<ValueKind>>,
    cast: Option<CastType>,
    mode: Option<MatchMode>,
    applicability: Option<Applicability>,
}

impl MatcherBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: None,
            object_kinds: None,
            cast: None,
            mode: None,
            applicability: None,
        }
    }

    /// Extract this dotted path from each candidate before testing.
    pub fn path(mut self, path: &str) -> Self {
        self.path = Some(FieldPath::parse(path));
        self
    }

    /// Decline candidates that are not one of these kinds.
    pub fn object_kinds(mut self, kinds: impl IntoIterator<Item = ValueKind>) -> Self {
        self.object_kinds = Some(kinds.into_iter().collect());
        self
    }

    pub fn cast(mut self, cast: CastType) -> Self {
        self.cast = Some(cast);
        self
    }

    pub fn compare(mut self, op: CompareOp) -> Self {
        self.mode = Some(MatchMode::Compare(op));
        self
    }

    pub fn custom<F>(mut self, func: F) -> Self
    where
        F: for<'a, 'r> Fn(&MatchContext<'a, 'r>) -> Result<Vec<&'a Value>> + Send + Sync + 'static,
    {
        self.mode = Some(MatchMode::Custom(Arc::new(func)));
        self
    }

    pub fn applicability(mut self, applicability: Applicability) -> Self {
        self.applicability = Some(applicability);
        self
    }

    /// Accept queries of these kinds.
    pub fn applies_to(self, kinds: impl IntoIterator<Item = QueryKind>) -> Self {
        self.applicability(Applicability::AnyOf(kinds.into_iter().collect()))
    }

    /// Accept queries satisfying `pred`.
    pub fn applies_when<P>(self, pred: P) -> Self
    where
        P: Fn(&Query) -> bool + Send + Sync + 'static,
    {
        self.applicability(Applicability::Predicate(Arc::new(pred)))
    }

    /// Claim queries satisfying `pred` for this matcher alone.
    pub fn exclusive_when<P>(self, pred: P) -> Self
    where
        P: Fn(&Query) -> bool + Send + Sync + 'static,
    {
        self.applicability(Applicability::Exclusive(Arc::new(pred)))
    }

    pub fn build(self) -> Result<Matcher> {
        let mode = self.mode.ok_or(QueryError::MissingMode)?;
        Ok(Matcher {
            name: self.name,
            path: self.path,
            object_kinds: self.object_kinds,
            cast: self.cast,
            mode,
            applicability: self.applicability,
            cache: MemoCache::new("matcher", CacheConfig::default()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

    #[test]
    fn test_build_without_mode_fails() {
        let result = Matcher::builder("nothing").path("id").build();
        assert!(matches!(result, Err(QueryError::MissingMode)));
    }

    #[test]
    fn test_compare_ops() {
        let two = Query::Int(2);
        let three = Query::Int(3);
        assert!(CompareOp::Eq.test(&two, &two));
        assert!(CompareOp::Ne.test(&two, &three));
        assert!(CompareOp::Gt.test(&three, &two));
        assert!(CompareOp::Ge.test(&two, &two));
        assert!(CompareOp::Lt.test(&two, &three));
        assert!(CompareOp::Le.test(&two, &two));
        // Incomparable kinds never order
        assert!(!CompareOp::Lt.test(&two, &Query::from("a")));
        assert!(!CompareOp::Ge.test(&two, &Query::from("a")));
    }

    #[test]
    fn test_compare_op_from_str() {
        assert_eq!("gte".parse::<CompareOp>().unwrap(), CompareOp::Ge);
        assert_eq!("neq".parse::<CompareOp>().unwrap(), CompareOp::Ne);
        assert!("approx".parse::<CompareOp>().is_err());
    }

    #[test]
    fn test_cast() {
        assert_eq!(CastType::String.apply(&json!(2)).unwrap(), Query::from("2"));
        assert_eq!(CastType::String.apply(&json!("x")).unwrap(), Query::from("x"));
        assert_eq!(CastType::Int.apply(&json!(" 12 ")).unwrap(), Query::Int(12));
        assert_eq!(CastType::Int.apply(&json!(2.9)).unwrap(), Query::Int(2));
        assert_eq!(CastType::Float.apply(&json!("1.5")).unwrap(), Query::Float(1.5));
        assert!(matches!(
            CastType::Int.apply(&json!("abc")),
            Err(QueryError::Cast { target: "int", .. })
        ));
    }

    #[test]
    fn test_numeric_string_coercion_both_directions() {
        let registry = Registry::new();
        let eq = Matcher::compare("eq", CompareOp::Eq).build().unwrap();

        let text_two = json!("2");
        let int_two = json!(2);
        assert_eq!(eq.apply(&Query::Int(2), &text_two, &text_two, &registry).unwrap().len(), 1);
        assert_eq!(eq.apply(&Query::from("2"), &int_two, &int_two, &registry).unwrap().len(), 1);
        assert!(eq.apply(&Query::from("2x"), &int_two, &int_two, &registry).unwrap().is_empty());
    }

    #[test]
    fn test_cast_then_compare() {
        let registry = Registry::new();
        let gt = Matcher::compare("score_gt", CompareOp::Gt)
            .cast(CastType::Float)
            .build()
            .unwrap();
        let score = json!("2.5");
        assert_eq!(gt.apply(&Query::Int(2), &score, &score, &registry).unwrap(), vec![&score]);
        assert!(gt.apply(&Query::Int(3), &score, &score, &registry).unwrap().is_empty());
    }

    #[test]
    fn test_object_kind_filter_declines() {
        let registry = Registry::new();
        let matcher = Matcher::compare("strings", CompareOp::Eq)
            .object_kinds([ValueKind::String])
            .build()
            .unwrap();
        let number = json!(5);
        assert!(matcher.apply(&Query::Int(5), &number, &number, &registry).unwrap().is_empty());
    }

    #[test]
    fn test_scalar_results_are_cached() {
        let registry = Registry::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let matcher = Matcher::from_fn("counting", move |ctx| {
            counter.fetch_add(1, AtomicOrdering::SeqCst);
            Ok(if ctx.candidate == &json!("a") {
                vec![ctx.original]
            } else {
                Vec::new()
            })
        })
        .build()
        .unwrap();

        let candidate = json!("a");
        let first = matcher.apply(&Query::from("q"), &candidate, &candidate, &registry).unwrap();
        let second = matcher.apply(&Query::from("q"), &candidate, &candidate, &registry).unwrap();
        assert_eq!(first, second);
        assert_eq!(calls.load(AtomicOrdering::SeqCst), 1);
        assert_eq!(matcher.cache_metrics().hits, 1);

        // A different query is a different entry
        matcher.apply(&Query::from("r"), &candidate, &candidate, &registry).unwrap();
        assert_eq!(calls.load(AtomicOrdering::SeqCst), 2);
    }

    #[test]
    fn test_objects_and_paths_are_not_cached() {
        let registry = Registry::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let matcher = Matcher::from_fn("counting", move |ctx| {
            counter.fetch_add(1, AtomicOrdering::SeqCst);
            Ok(vec![ctx.original])
        })
        .build()
        .unwrap();

        let object = json!({"a": 1});
        matcher.apply(&Query::Int(1), &object, &object, &registry).unwrap();
        matcher.apply(&Query::Int(1), &object, &object, &registry).unwrap();
        assert_eq!(calls.load(AtomicOrdering::SeqCst), 2);
        assert_eq!(matcher.cache_metrics().inserts, 0);
    }

    #[test]
    fn test_applicability() {
        let by_kind = Applicability::AnyOf(vec![QueryKind::Int, QueryKind::Str]);
        assert_eq!(by_kind.check(&Query::Int(1)), Eligibility::Eligible);
        assert_eq!(by_kind.check(&Query::None), Eligibility::Ineligible);

        let positive =
            Applicability::Predicate(Arc::new(|q: &Query| matches!(q, Query::Int(i) if *i > 0)));
        assert_eq!(positive.check(&Query::Int(1)), Eligibility::Eligible);
        assert_eq!(positive.check(&Query::Int(-1)), Eligibility::Ineligible);

        let claim = Applicability::Exclusive(Arc::new(|q: &Query| q.as_str() == Some("!")));
        assert_eq!(claim.check(&Query::from("!")), Eligibility::Exclusive);
        assert_eq!(claim.check(&Query::from("?")), Eligibility::Ineligible);
    }
}
