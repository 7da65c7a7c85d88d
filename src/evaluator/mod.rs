//! RS-010: Script evaluator capability and backend lookup.
//!
//! An evaluator runs one script source against a set of pre-seeded bindings,
//! then answers post-run reads by variable name. Backends are looked up by
//! name so a session config can select one without the engine knowing the
//! concrete type.

pub mod calc;
pub mod syntax;

use crate::core::error::EngineError;
use crate::core::types::{EvaluatorConfig, Value};
use indexmap::IndexMap;
use std::time::Duration;
use thiserror::Error;

/// Installed backends, in preference order.
const BACKENDS: &[&str] = &[calc::BACKEND_NAME];

/// Failure raised inside an evaluator.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("syntax error at line {line}: {message}")]
    Syntax { line: usize, message: String },

    #[error("runtime error at line {line}: {message}")]
    Runtime { line: usize, message: String },

    #[error("script cancelled: {0}")]
    Cancelled(String),
}

/// Execution budget for one script run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvalLimits {
    /// Statements executed plus loop iterations.
    pub max_steps: u64,
    pub timeout: Option<Duration>,
}

impl Default for EvalLimits {
    fn default() -> Self {
        Self::from(&EvaluatorConfig::default())
    }
}

impl From<&EvaluatorConfig> for EvalLimits {
    fn from(config: &EvaluatorConfig) -> Self {
        Self {
            max_steps: config.max_steps,
            timeout: config.timeout_ms.map(Duration::from_millis),
        }
    }
}

/// Script language backend.
pub trait Evaluator {
    fn name(&self) -> &'static str;

    /// Words the language owns; never treated as script variables.
    fn reserved_words(&self) -> &[&'static str];

    /// Run `source` with `bindings` visible as variables.
    ///
    /// Each call starts from a clean scope holding only `bindings`.
    fn eval(&mut self, source: &str, bindings: &IndexMap<String, Value>) -> Result<(), EvalError>;

    /// Value of a variable after the last `eval`, if it was ever assigned.
    fn read_variable(&self, name: &str) -> Option<Value>;
}

/// Names of the installed backends.
pub fn available() -> Vec<&'static str> {
    BACKENDS.to_vec()
}

pub fn is_available(name: &str) -> bool {
    BACKENDS.contains(&name)
}

/// Construct a backend by name.
pub fn backend(name: &str, limits: EvalLimits) -> Result<Box<dyn Evaluator>, EngineError> {
    match name {
        calc::BACKEND_NAME => Ok(Box::new(calc::CalcEvaluator::new(limits))),
        other => Err(EngineError::ScriptEngineUnavailable {
            backend: other.to_string(),
            installed: available().join(", "),
        }),
    }
}
