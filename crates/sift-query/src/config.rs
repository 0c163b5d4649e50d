//! Engine configuration.
//!
//! Loaded from YAML (or JSON when the file ends in `.json`). Every field has a
//! default so an empty document is a valid config.

use crate::error::{QueryError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct QueryConfig {
    /// Register the `?expr` expression matcher. Off unless asked for.
    pub allow_expressions: bool,
    /// What to do when a matcher's field path is missing on a candidate.
    pub on_missing_path: FailurePolicy,
    /// What to do when an expression query fails to compile or evaluate.
    pub on_expression_error: FailurePolicy,
    pub cache: CacheConfig,
    pub expression_limits: ExpressionLimits,
}

/// Skip the failing candidate or abort the whole match call.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    #[default]
    Skip,
    Abort,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    /// Entries per cache before it is cleared
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_entries: 10_000,
        }
    }
}

/// Sandbox bounds for expression queries.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ExpressionLimits {
    pub max_operations: u64,
    pub max_expr_depth: usize,
    pub max_string_size: usize,
    pub max_collection_size: usize,
}

impl Default for ExpressionLimits {
    fn default() -> Self {
        Self {
            max_operations: 10_000,
            max_expr_depth: 32,
            max_string_size: 4096,
            max_collection_size: 1024,
        }
    }
}

impl QueryConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let is_json = path.extension().is_some_and(|ext| ext == "json");
        let config: QueryConfig = if is_json {
            serde_json::from_str(&contents).map_err(|e| QueryError::Config(e.to_string()))?
        } else {
            serde_yaml::from_str(&contents).map_err(|e| QueryError::Config(e.to_string()))?
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.cache.enabled && self.cache.max_entries == 0 {
            return Err(QueryError::Config(
                "cache.max_entries must be greater than 0 when the cache is enabled".to_string(),
            ));
        }
        let limits = &self.expression_limits;
        if limits.max_operations == 0
            || limits.max_expr_depth == 0
            || limits.max_string_size == 0
            || limits.max_collection_size == 0
        {
            return Err(QueryError::Config(
                "expression_limits values must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}
