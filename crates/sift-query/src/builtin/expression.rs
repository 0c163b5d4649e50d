//! Expression queries: `?<expr>` evaluated against each candidate.
//!
//! Expressions run in a Rhai engine restricted to single expressions with
//! bounded operations, nesting and value sizes. The candidate is bound to `x`:
//!
//! ```text
//! ?x["name"].startswith("test") && x["id"] > 1
//! ```
//!
//! This is still code supplied by the caller. The matcher is only registered
//! when `allow_expressions` is set; leave it off for untrusted queries.

use crate::cache::MemoCache;
use crate::config::{FailurePolicy, QueryConfig};
use crate::error::{QueryError, Result};
use crate::matcher::{MatchContext, Matcher};
use crate::query::Query;
use rhai::{Dynamic, Engine, ImmutableString, Map, Scope, AST};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, trace};

const PREFIX: char = '?';

/// The `?expr` matcher. Claims every text query starting with `?`.
pub fn expression(config: &QueryConfig) -> Result<Matcher> {
    let evaluator = ExpressionEvaluator::new(config);
    Matcher::from_fn("expression", move |ctx| evaluator.matches(ctx))
        .exclusive_when(is_expression_query)
        .build()
}

fn is_expression_query(query: &Query) -> bool {
    query.as_str().is_some_and(|s| s.starts_with(PREFIX))
}

/// Sandboxed evaluator with a compiled-expression cache.
pub struct ExpressionEvaluator {
    engine: Engine,
    asts: MemoCache<String, Arc<AST>>,
    on_error: FailurePolicy,
}

impl ExpressionEvaluator {
    pub fn new(config: &QueryConfig) -> Self {
        Self {
            engine: Self::create_engine(config),
            asts: MemoCache::new("expressions", config.cache.clone()),
            on_error: config.on_expression_error,
        }
    }

    fn create_engine(config: &QueryConfig) -> Engine {
        let limits = &config.expression_limits;
        let mut engine = Engine::new();
        engine.set_max_operations(limits.max_operations);
        engine.set_max_expr_depths(limits.max_expr_depth, limits.max_expr_depth);
        engine.set_max_string_size(limits.max_string_size);
        engine.set_max_array_size(limits.max_collection_size);
        engine.set_max_map_size(limits.max_collection_size);
        engine.set_max_call_levels(8);
        engine.set_max_modules(0);
        engine.disable_symbol("eval");

        // Matching has no side effects; script output goes to the log
        engine.on_print(|text| trace!(target: "sift_query::expression", "print: {text}"));
        engine.on_debug(|text, source, pos| {
            trace!(target: "sift_query::expression", ?source, %pos, "debug: {text}")
        });

        // String helpers: x["name"].startswith("a")
        engine
            .register_fn("startswith", |s: &mut ImmutableString, prefix: ImmutableString| {
                s.starts_with(prefix.as_str())
            })
            .register_fn("endswith", |s: &mut ImmutableString, suffix: ImmutableString| {
                s.ends_with(suffix.as_str())
            })
            .register_fn("lower", |s: &mut ImmutableString| s.to_lowercase())
            .register_fn("upper", |s: &mut ImmutableString| s.to_uppercase())
            .register_fn("strip", |s: &mut ImmutableString| s.trim().to_string());

        engine
    }

    /// Evaluate `expression` (without the `?`) with `x` bound to `candidate`.
    pub fn evaluate(&self, expression: &str, candidate: &Value) -> Result<bool> {
        let ast = self.compile(expression)?;
        let mut scope = Scope::new();
        scope.push_dynamic("x", json_to_dynamic(candidate));
        let result: Dynamic = self
            .engine
            .eval_ast_with_scope(&mut scope, ast.as_ref())
            .map_err(|e| QueryError::expression(expression, e))?;
        Ok(is_truthy(&result))
    }

    fn compile(&self, expression: &str) -> Result<Arc<AST>> {
        if let Some(ast) = self.asts.get(&expression.to_string()) {
            return Ok(ast);
        }
        let ast = Arc::new(
            self.engine
                .compile_expression(expression)
                .map_err(|e| QueryError::expression(expression, e))?,
        );
        self.asts.insert(expression.to_string(), ast.clone());
        Ok(ast)
    }

    fn matches<'a>(&self, ctx: &MatchContext<'a, '_>) -> Result<Vec<&'a Value>> {
        let Some(expression) = ctx.query.as_str().and_then(|q| q.strip_prefix(PREFIX)) else {
            return Ok(Vec::new());
        };
        match self.evaluate(expression, ctx.candidate) {
            Ok(true) => Ok(vec![ctx.original]),
            Ok(false) => Ok(Vec::new()),
            Err(err) => match self.on_error {
                FailurePolicy::Skip => {
                    debug!(%err, "expression failed, treating as no match");
                    Ok(Vec::new())
                }
                FailurePolicy::Abort => Err(err),
            },
        }
    }
}

/// Truthiness of an expression result: unit, `false`, zero and empty
/// strings/arrays/maps are false.
fn is_truthy(value: &Dynamic) -> bool {
    if value.is_unit() {
        false
    } else if let Ok(b) = value.as_bool() {
        b
    } else if let Ok(i) = value.as_int() {
        i != 0
    } else if let Ok(f) = value.as_float() {
        f != 0.0
    } else if value.is_string() {
        value
            .clone()
            .into_immutable_string()
            .is_ok_and(|s| !s.is_empty())
    } else if value.is_array() {
        value.clone().into_array().is_ok_and(|a| !a.is_empty())
    } else if value.is_map() {
        value.clone().try_cast::<Map>().is_some_and(|m| !m.is_empty())
    } else {
        true
    }
}

fn json_to_dynamic(value: &Value) -> Dynamic {
    match value {
        Value::Null => Dynamic::UNIT,
        Value::Bool(b) => Dynamic::from(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Dynamic::from(i)
            } else if let Some(f) = n.as_f64() {
                Dynamic::from(f)
            } else {
                Dynamic::UNIT
            }
        }
        Value::String(s) => Dynamic::from(s.clone()),
        Value::Array(arr) => {
            let vec: Vec<Dynamic> = arr.iter().map(json_to_dynamic).collect();
            Dynamic::from(vec)
        }
        Value::Object(obj) => {
            let mut map = Map::new();
            for (k, v) in obj {
                map.insert(k.as_str().into(), json_to_dynamic(v));
            }
            Dynamic::from(map)
        }
    }
}
