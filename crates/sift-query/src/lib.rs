//! Pluggable object query engine.
//!
//! Matchers are registered in an ordered [`Registry`]. A query is resolved
//! from text into a typed [`Query`], dispatched to the matchers eligible for
//! its shape, and run against a collection of JSON candidates. Results are
//! references into the candidate slice.
//!
//! # Example
//!
//! ```
//! use sift_query::{default_registry, Query, QueryConfig};
//! use serde_json::json;
//!
//! let items = vec![
//!     json!({"id": "1", "name": "test_item"}),
//!     json!({"id": 2, "name": "another_item"}),
//!     json!({"id": "3", "name": "test_something"}),
//! ];
//! let registry = default_registry(&QueryConfig::default()).unwrap();
//!
//! // Patterns on `name`
//! let hits = registry.match_all(&Query::from("test_*"), &items).unwrap();
//! assert_eq!(hits, vec![&items[0], &items[2]]);
//!
//! // Lists are OR, tuples are AND
//! let hits = registry.match_all(&Query::from("[2, 'test_item']"), &items).unwrap();
//! assert_eq!(hits, vec![&items[0], &items[1]]);
//! ```

pub mod builtin;
mod cache;
mod config;
mod error;
mod literal;
mod matcher;
mod path;
mod query;
mod registry;

pub use builtin::default_registry;
pub use cache::CacheMetrics;
pub use config::{CacheConfig, ExpressionLimits, FailurePolicy, QueryConfig};
pub use error::{QueryError, Result};
pub use literal::LiteralError;
pub use matcher::{
    Applicability, CastType, CompareOp, Eligibility, MatchContext, MatchFn, MatchMode, Matcher,
    MatcherBuilder, PredicateFn, ValueKind,
};
pub use path::FieldPath;
pub use query::{Query, QueryKind};
pub use registry::{Eligible, Registry};
