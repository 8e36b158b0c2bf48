//! Error types
//!
//! - [`ExpressionError`] – parsing, evaluating or differentiating a typed expression
//! - [`SimError`]        – building a scenario (config, io, yaml, expressions)
//!
//! Nothing in the per-frame path returns these: frame-time failures are absorbed
//! (zero displacement, zero velocity) and only logged.

use thiserror::Error;

/// Result alias for scenario-level operations
pub type Result<T> = std::result::Result<T, SimError>;

/// Failure while handling a user-entered expression
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExpressionError {
    #[error("unexpected character '{ch}' at position {pos}")]
    UnexpectedChar { ch: char, pos: usize },

    #[error("unexpected token '{found}' at position {pos}")]
    UnexpectedToken { found: String, pos: usize },

    #[error("unexpected end of expression")]
    UnexpectedEnd,

    #[error("unknown function '{0}'")]
    UnknownFunction(String),

    #[error("function '{name}' expects {expected} argument(s), got {found}")]
    Arity { name: String, expected: usize, found: usize },

    #[error("unbound variable '{0}'")]
    UnboundVariable(String),

    #[error("'{0}' is not differentiable symbolically")]
    NotDifferentiable(String),

    #[error("symbolic backend: {0}")]
    Symbolic(String),
}

/// Failure while building a scenario
#[derive(Error, Debug)]
pub enum SimError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("expression error in {field}: {source}")]
    Expression {
        field: String,
        #[source]
        source: ExpressionError,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl SimError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn expression(field: impl Into<String>, source: ExpressionError) -> Self {
        Self::Expression { field: field.into(), source }
    }
}
