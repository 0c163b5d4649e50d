//! Error type shared by the matcher, registry and config layers.

/// Errors raised while building matchers or running queries.
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("matcher requires either a comparison operator or a match function")]
    MissingMode,
    #[error("path '{path}' not found at segment '{segment}'")]
    PathNotFound { path: String, segment: String },
    #[error("cannot cast {value} to {target}")]
    Cast { value: String, target: &'static str },
    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),
    #[error("expression '{expression}' failed: {message}")]
    Expression { expression: String, message: String },
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl QueryError {
    pub(crate) fn expression(expression: &str, message: impl ToString) -> Self {
        QueryError::Expression {
            expression: expression.to_string(),
            message: message.to_string(),
        }
    }
}

pub type Result<T, E = QueryError> = std::result::Result<T, E>;
