//! Common error types for catchtree

use crate::rules::Operator;
use thiserror::Error;

/// Common result type for catchtree operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the catch tree core
///
/// Compilation and tree navigation never fail; errors come from loading
/// external inputs (config, JSON) and from the rule engine.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON input could not be decoded
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML config file could not be parsed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid caller input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Structurally invalid rule definition
    #[error("Invalid rule: {0}")]
    InvalidRule(String),

    /// Rule controls an attribute the entity type does not expose
    #[error("Unknown rule attribute: {0}")]
    UnknownAttribute(String),

    /// Rule operator is declared but has no evaluation yet
    #[error("Operator not implemented yet: {0}")]
    OperatorNotImplemented(Operator),
}
