//! RS-009: Engine error taxonomy.
//!
//! Every failure in the core is a value of [`EngineError`]; nothing in the
//! engine retries or recovers. Callers decide whether to keep a session.

use thiserror::Error;

/// Typed failure returned by every engine operation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("cannot instantiate model '{model}': {reason}")]
    ModelInstantiation { model: String, reason: String },

    #[error("dataset not found: {path}: {reason}")]
    DatasetNotFound { path: String, reason: String },

    #[error("dataset format error at line {line}: {message}")]
    DatasetFormat { line: usize, message: String },

    #[error("cannot bind field '{field}': {reason}")]
    FieldBinding { field: String, reason: String },

    #[error("cannot read field '{field}': {reason}")]
    FieldAccess { field: String, reason: String },

    #[error("model '{model}' failed to compute: {reason}")]
    ModelExecution { model: String, reason: String },

    #[error("script engine '{backend}' is not available (installed: {installed})")]
    ScriptEngineUnavailable { backend: String, installed: String },

    #[error("script evaluation failed: {message}")]
    ScriptEvaluation { message: String },

    #[error("illegal state: {0}")]
    IllegalState(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("journal error: {0}")]
    Journal(String),
}

impl EngineError {
    pub(crate) fn format(line: usize, message: impl Into<String>) -> Self {
        Self::DatasetFormat {
            line,
            message: message.into(),
        }
    }
}
