//! RS-001: Shared types for values, field descriptors, datasets, and session config.
//!
//! Defines the runtime value model shared by the binder, classifier, evaluator
//! and serializer, plus the YAML schema for session configs and the provenance
//! events written to the journal.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Reserved first token of the dataset row carrying period labels.
pub const PERIOD_HEADER: &str = "LATA";

// ============================================================================
// Values
// ============================================================================

/// A script-visible value: a single number or a numeric series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Scalar(f64),
    Series(Vec<f64>),
}

impl Value {
    /// True for a series with no elements. Scalars are never empty.
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Series(v) if v.is_empty())
    }

    /// Values as a flat slice-like vector (a scalar yields one element).
    pub fn to_vec(&self) -> Vec<f64> {
        match self {
            Self::Scalar(x) => vec![*x],
            Self::Series(v) => v.clone(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(x) => write!(f, "{}", format_number(*x)),
            Self::Series(v) => {
                let cells: Vec<String> = v.iter().map(|x| format_number(*x)).collect();
                write!(f, "[{}]", cells.join(", "))
            }
        }
    }
}

/// Render a number with the shortest round-trip form, always with a decimal
/// point for finite integral values (`10.0`, `0.25`, `-3.5`).
pub fn format_number(x: f64) -> String {
    format!("{:?}", x)
}

// ============================================================================
// Bindable fields
// ============================================================================

/// Kind of a bindable model field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// Number of periods (`LL`), paired with the dataset's period labels.
    PeriodCount,
    /// Fixed-length numeric series.
    Series,
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PeriodCount => write!(f, "period-count"),
            Self::Series => write!(f, "series"),
        }
    }
}

/// Stable name and kind of one bindable field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    pub kind: FieldKind,
}

/// Current content of a bindable field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Periods(usize),
    Series(Vec<f64>),
    /// A series field that has never been assigned.
    Unset,
}

impl FieldValue {
    pub fn kind(&self) -> Option<FieldKind> {
        match self {
            Self::Periods(_) => Some(FieldKind::PeriodCount),
            Self::Series(_) => Some(FieldKind::Series),
            Self::Unset => None,
        }
    }
}

// ============================================================================
// Dataset
// ============================================================================

/// Parsed dataset: period labels plus equal-length series keyed by name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    /// Labels from the `LATA` row; their count is `LL`.
    pub periods: Vec<String>,

    /// Series in file order, each exactly `LL` long.
    pub series: IndexMap<String, Vec<f64>>,
}

impl Dataset {
    /// Number of periods (`LL`).
    pub fn ll(&self) -> usize {
        self.periods.len()
    }
}

// ============================================================================
// Session config (session.yaml)
// ============================================================================

/// Root of a session config: which model, which data, which scripts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Schema version (must be "1.0")
    pub version: String,

    /// Optional human-readable session name
    #[serde(default)]
    pub name: Option<String>,

    /// Model identifier (registry key)
    pub model: String,

    /// Dataset path, relative to the config file
    pub data: String,

    /// Scripts executed in order after compute
    #[serde(default)]
    pub scripts: Vec<ScriptSource>,

    /// Evaluator backend and limits
    #[serde(default)]
    pub evaluator: EvaluatorConfig,

    /// Failure and journal policy
    #[serde(default)]
    pub policy: Policy,

    /// Result file; stdout when absent
    #[serde(default)]
    pub output: Option<String>,
}

/// A script reference: a path, or inline source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScriptSource {
    File(String),
    Inline { inline: String },
}

impl ScriptSource {
    /// Short label for logs and journal events.
    pub fn label(&self) -> String {
        match self {
            Self::File(path) => path.clone(),
            Self::Inline { .. } => "<inline>".to_string(),
        }
    }
}

/// Evaluator selection and execution budget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluatorConfig {
    #[serde(default = "default_backend")]
    pub backend: String,

    /// Maximum statements + loop iterations per script run
    #[serde(default = "default_max_steps")]
    pub max_steps: u64,

    /// Optional wall-clock budget per script run
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            max_steps: default_max_steps(),
            timeout_ms: None,
        }
    }
}

fn default_backend() -> String {
    "calc".to_string()
}

fn default_max_steps() -> u64 {
    10_000_000
}

/// Session policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    /// Script failure handling
    #[serde(default)]
    pub failure: FailurePolicy,

    /// Append provenance events to the journal
    #[serde(default = "default_true")]
    pub journal: bool,

    /// Journal directory, relative to the config file
    #[serde(default = "default_journal_dir")]
    pub journal_dir: String,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            failure: FailurePolicy::default(),
            journal: true,
            journal_dir: default_journal_dir(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_journal_dir() -> String {
    "state".to_string()
}

/// Failure handling strategy for script runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    #[default]
    StopOnFirst,
    ContinueIndependent,
}

// ============================================================================
// Provenance events
// ============================================================================

/// Provenance event for the JSONL journal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProvenanceEvent {
    SessionOpened {
        session_id: String,
        model: String,
        dataset: String,
        dataset_hash: String,
        periods: usize,
    },
    ModelComputed {
        session_id: String,
        duration_seconds: f64,
    },
    ScriptExecuted {
        session_id: String,
        script: String,
        script_hash: String,
        captured: Vec<String>,
        duration_seconds: f64,
    },
    ScriptFailed {
        session_id: String,
        script: String,
        error: String,
    },
    ResultsRendered {
        session_id: String,
        rows: usize,
        results_hash: String,
    },
}

/// Timestamped event wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimestampedEvent {
    pub ts: String,
    #[serde(flatten)]
    pub event: ProvenanceEvent,
}

// ============================================================================
// Tests
// ============================================================================
