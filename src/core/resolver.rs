//! RS-003: Script variable classification.
//!
//! Scans script text for identifiers without parsing it, then sorts each
//! candidate into one of three buckets:
//! - model-bound: the model declares a field of that name
//! - session-bound: an earlier script run left a value in the store
//! - script-local: neither; the evaluator starts it unset
//!
//! Model-bound names are seeded and then dropped from post-run capture.
//! Session-bound and script-local names stay tracked for capture.

use super::error::EngineError;
use super::model::Model;
use super::state::ScriptVariableStore;
use super::types::{FieldValue, Value};
use indexmap::{IndexMap, IndexSet};
use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

static NON_IDENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^A-Za-z0-9_]+").unwrap());
static IDENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());

/// Outcome of classifying one script.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Classification {
    /// Values to pre-seed the evaluator with (model- and session-bound).
    pub resolved: IndexMap<String, Value>,
    /// Names whose post-run values are captured into the store.
    pub candidates: IndexSet<String>,
    pub model_bound: Vec<String>,
    pub session_bound: Vec<String>,
}

/// Candidate identifiers in first-occurrence order.
///
/// Drops `reserved` words and bare single lowercase letters (loop indices).
pub fn candidate_identifiers(source: &str, reserved: &[&str]) -> IndexSet<String> {
    NON_IDENT
        .split(source)
        .filter(|tok| IDENT.is_match(tok))
        .filter(|tok| !reserved.contains(tok))
        .filter(|tok| !is_index_variable(tok))
        .map(str::to_string)
        .collect()
}

fn is_index_variable(tok: &str) -> bool {
    let mut chars = tok.chars();
    matches!((chars.next(), chars.next()), (Some(c), None) if c.is_ascii_lowercase())
}

/// Classify a script's identifiers against a model and a session store.
pub fn classify(
    source: &str,
    model: &dyn Model,
    store: &ScriptVariableStore,
    reserved: &[&str],
) -> Result<Classification, EngineError> {
    let mut result = Classification {
        candidates: candidate_identifiers(source, reserved),
        ..Classification::default()
    };

    let names: Vec<String> = result.candidates.iter().cloned().collect();
    for name in names {
        if model.field_kind(&name).is_some() {
            let value = field_to_value(&name, model.get_field(&name)?)?;
            result.resolved.insert(name.clone(), value);
            result.candidates.shift_remove(&name);
            result.model_bound.push(name);
        } else if let Some(value) = store.get(&name) {
            result.resolved.insert(name.clone(), value.clone());
            result.session_bound.push(name);
        }
    }

    debug!(
        model_bound = ?result.model_bound,
        session_bound = ?result.session_bound,
        tracked = result.candidates.len(),
        "classified script identifiers"
    );
    Ok(result)
}

fn field_to_value(name: &str, value: FieldValue) -> Result<Value, EngineError> {
    match value {
        FieldValue::Periods(n) => Ok(Value::Scalar(n as f64)),
        FieldValue::Series(v) => Ok(Value::Series(v)),
        FieldValue::Unset => Err(EngineError::FieldAccess {
            field: name.to_string(),
            reason: "series field has no value; bind a dataset first".to_string(),
        }),
    }
}
