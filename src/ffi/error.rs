//! # Error Types
//!
//! This module defines the error type shared by the parser, the declaration
//! namespace and the foreign call layer.

use thiserror::Error;

/// Main error type for annotation parsing, compilation and foreign calls
#[derive(Error, Debug)]
pub enum AnnotateError {
    #[error("Unknown type or declaration name: `{name}`")]
    NameResolution { name: String },

    #[error("@{kind} declaration expects {expected} value(s) for @{field}, got {got}")]
    Arity {
        kind: String,
        field: String,
        expected: usize,
        got: usize,
    },

    #[error("Unknown field @{tag} in @{kind} declaration")]
    UnknownField { tag: String, kind: String },

    #[error("Invalid use of `{name}`: {reason}")]
    Usage { name: String, reason: String },

    #[error("@{kind} declaration does not have a name")]
    MissingName { kind: String },

    #[error("Comment block opened at line {line} is never closed")]
    UnterminatedBlock { line: usize },

    #[error("Unbalanced parentheses in annotation line: {line}")]
    UnbalancedParentheses { line: String },

    #[error("Invalid type name `{name}`: {reason}")]
    InvalidTypeName { name: String, reason: String },

    #[error("Invalid constant expression `{expression}`: {reason}")]
    InvalidExpression { expression: String, reason: String },

    #[error("Symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("Library loading failed: {0}")]
    LibraryLoad(#[from] libloading::Error),

    #[error("Library not found: {library}")]
    LibraryNotFound { library: String },

    #[error("Function `{function}` takes {expected} argument(s), got {got}")]
    ArgumentMismatch {
        function: String,
        expected: usize,
        got: usize,
    },

    #[error("Cannot store {got} into {expected}")]
    ValueMismatch { expected: String, got: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] serde_json::Error),
}

impl AnnotateError {
    pub(crate) fn usage(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Usage {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn unresolved(name: impl Into<String>) -> Self {
        Self::NameResolution { name: name.into() }
    }
}

/// Result type for all crate operations
pub type AnnotateResult<T> = Result<T, AnnotateError>;

impl From<AnnotateError> for std::io::Error {
    fn from(err: AnnotateError) -> Self {
        match err {
            AnnotateError::Io(io_err) => io_err,
            _ => std::io::Error::new(std::io::ErrorKind::Other, err),
        }
    }
}
