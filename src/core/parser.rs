//! RS-002: Dataset parsing and session-config validation.
//!
//! Dataset text is one record per line, whitespace-separated:
//! `<NAME> <v1> <v2> ... <vN>`. The `LATA` row carries period labels and fixes
//! `LL`; every other row becomes a series of exactly `LL` values. Short rows
//! are filled positionally: index 0 defaults to `0.0`, later indices repeat
//! the previous value.

use super::error::EngineError;
use super::model::ModelRegistry;
use super::types::*;
use crate::evaluator;
use indexmap::IndexMap;
use std::path::Path;
use tracing::{debug, warn};

/// Validation error.
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Read and parse a dataset file.
pub fn parse_dataset_file(path: &Path) -> Result<Dataset, EngineError> {
    parse_dataset(&read_dataset_text(path)?)
}

pub(crate) fn read_dataset_text(path: &Path) -> Result<String, EngineError> {
    std::fs::read_to_string(path).map_err(|e| EngineError::DatasetNotFound {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}

/// Parse dataset text. Nothing is returned unless every row parses.
pub fn parse_dataset(text: &str) -> Result<Dataset, EngineError> {
    let rows: Vec<(usize, Vec<&str>)> = text
        .lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line.split_whitespace().collect::<Vec<_>>()))
        .filter(|(_, tokens)| !tokens.is_empty())
        .collect();

    let periods = find_periods(&rows)?;
    let ll = periods.len();

    let mut series: IndexMap<String, Vec<f64>> = IndexMap::new();
    for (line, tokens) in &rows {
        let name = tokens[0];
        if name == PERIOD_HEADER {
            continue;
        }
        let values = fill_row(&tokens[1..], ll, *line)?;
        if tokens.len() - 1 > ll {
            warn!(
                line,
                variable = name,
                extra = tokens.len() - 1 - ll,
                "ignoring values beyond the last period"
            );
        }
        if series.insert(name.to_string(), values).is_some() {
            warn!(line, variable = name, "duplicate variable row, later row wins");
        }
    }

    debug!(periods = ll, variables = series.len(), "parsed dataset");
    Ok(Dataset { periods, series })
}

/// Locate the single `LATA` row and return its labels.
fn find_periods(rows: &[(usize, Vec<&str>)]) -> Result<Vec<String>, EngineError> {
    let mut headers = rows.iter().filter(|(_, t)| t[0] == PERIOD_HEADER);
    let (line, tokens) = headers
        .next()
        .ok_or_else(|| EngineError::format(0, format!("missing {} header row", PERIOD_HEADER)))?;
    if let Some((dup, _)) = headers.next() {
        return Err(EngineError::format(
            *dup,
            format!("second {} header row (first at line {})", PERIOD_HEADER, line),
        ));
    }
    if tokens.len() < 2 {
        return Err(EngineError::format(
            *line,
            format!("{} header row has no period labels", PERIOD_HEADER),
        ));
    }
    Ok(tokens[1..].iter().map(|s| s.to_string()).collect())
}

/// Parse one row's value tokens into exactly `ll` numbers using the fill rule.
pub fn fill_row(tokens: &[&str], ll: usize, line: usize) -> Result<Vec<f64>, EngineError> {
    let mut values = Vec::with_capacity(ll);
    for i in 0..ll {
        let value = match tokens.get(i) {
            Some(tok) => tok.parse::<f64>().map_err(|_| {
                EngineError::format(line, format!("invalid number '{}' at period {}", tok, i + 1))
            })?,
            None if i == 0 => 0.0,
            None => values[i - 1],
        };
        values.push(value);
    }
    Ok(values)
}

// ============================================================================
// Session config
// ============================================================================

/// Parse a session config file from disk.
pub fn parse_config_file(path: &Path) -> Result<SessionConfig, EngineError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| EngineError::Config(format!("failed to read {}: {}", path.display(), e)))?;
    parse_config(&content)
}

/// Parse a session config from a string.
pub fn parse_config(yaml: &str) -> Result<SessionConfig, EngineError> {
    serde_yaml_ng::from_str(yaml).map_err(|e| EngineError::Config(format!("YAML parse error: {}", e)))
}

/// Validate a parsed config. Returns a list of errors (empty = valid).
pub fn validate_config(config: &SessionConfig, registry: &ModelRegistry) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let mut fail = |message: String| errors.push(ValidationError { message });

    if config.version != "1.0" {
        fail(format!("version must be \"1.0\", got \"{}\"", config.version));
    }

    if config.model.trim().is_empty() {
        fail("model must not be empty".to_string());
    } else if !registry.contains(&config.model) {
        fail(format!("unknown model '{}'", config.model));
    }

    if config.data.trim().is_empty() {
        fail("data must not be empty".to_string());
    }

    if !evaluator::is_available(&config.evaluator.backend) {
        fail(format!(
            "unknown evaluator backend '{}' (available: {})",
            config.evaluator.backend,
            evaluator::available().join(", ")
        ));
    }
    if config.evaluator.max_steps == 0 {
        fail("evaluator.max_steps must be greater than 0".to_string());
    }
    if config.evaluator.timeout_ms == Some(0) {
        fail("evaluator.timeout_ms must be greater than 0".to_string());
    }

    for (i, script) in config.scripts.iter().enumerate() {
        match script {
            ScriptSource::Inline { inline } if inline.trim().is_empty() => {
                fail(format!("script #{} is an empty inline script", i + 1))
            }
            ScriptSource::File(path) if path.trim().is_empty() => {
                fail(format!("script #{} has an empty path", i + 1))
            }
            _ => {}
        }
    }

    errors
}
