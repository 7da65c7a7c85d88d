//! RS-006: Model runner, script executor, and session orchestration.
//!
//! execute: read dataset → parse → instantiate + bind → compute → snapshot →
//! for each script: classify → eval → capture → final snapshot → events

use super::binder::bind_dataset;
use super::error::EngineError;
use super::model::ModelRegistry;
use super::parser;
use super::resolver::classify;
use super::serializer::{snapshot, ResultTable};
use super::state::Session;
use super::types::*;
use crate::evaluator::{self, EvalLimits, Evaluator};
use crate::journal::{eventlog, hasher};
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// What one successful script run did to the session.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptOutcome {
    /// Names written into the store, in classification order.
    pub captured: Vec<String>,
    pub model_bound: Vec<String>,
    pub session_bound: Vec<String>,
    pub duration: Duration,
}

/// Instantiate a model and bind a parsed dataset onto it.
pub fn open_session(
    registry: &ModelRegistry,
    model_id: &str,
    dataset: &Dataset,
) -> Result<Session, EngineError> {
    let mut model = registry.instantiate(model_id)?;
    let report = bind_dataset(model.as_mut(), dataset)?;
    let session = Session::new(eventlog::generate_session_id(), model, dataset.periods.clone());
    info!(
        session = session.id(),
        model = model_id,
        periods = dataset.ll(),
        bound = report.bound.len(),
        zero_filled = report.zero_filled.len(),
        dropped = report.dropped.len(),
        "session opened"
    );
    Ok(session)
}

/// Invoke the model's compute entry point once.
pub fn run_model(session: &mut Session) -> Result<Duration, EngineError> {
    let start = Instant::now();
    session.model_mut().compute()?;
    session.mark_computed();
    let elapsed = start.elapsed();
    info!(session = session.id(), seconds = elapsed.as_secs_f64(), "model computed");
    Ok(elapsed)
}

/// Classify, evaluate, and capture one script into the session store.
///
/// Nothing is written to the store unless evaluation succeeds.
pub fn run_script(
    session: &mut Session,
    source: &str,
    evaluator: &mut dyn Evaluator,
) -> Result<ScriptOutcome, EngineError> {
    let start = Instant::now();
    let classification = classify(
        source,
        session.model(),
        session.store(),
        evaluator.reserved_words(),
    )?;

    evaluator
        .eval(source, &classification.resolved)
        .map_err(|e| EngineError::ScriptEvaluation {
            message: e.to_string(),
        })?;

    let mut captured = Vec::new();
    for name in &classification.candidates {
        match evaluator.read_variable(name) {
            Some(value) if !value.is_empty() => {
                session.store_mut().insert(name, value);
                captured.push(name.clone());
            }
            _ => {}
        }
    }

    let duration = start.elapsed();
    info!(
        session = session.id(),
        backend = evaluator.name(),
        captured = captured.len(),
        "script executed"
    );
    Ok(ScriptOutcome {
        captured,
        model_bound: classification.model_bound,
        session_bound: classification.session_bound,
        duration,
    })
}

/// Read a script file and run it.
pub fn run_script_file(
    session: &mut Session,
    path: &Path,
    evaluator: &mut dyn Evaluator,
) -> Result<ScriptOutcome, EngineError> {
    let source = read_script(path)?;
    run_script(session, &source, evaluator)
}

fn read_script(path: &Path) -> Result<String, EngineError> {
    std::fs::read_to_string(path).map_err(|e| EngineError::ScriptEvaluation {
        message: format!("cannot read script {}: {}", path.display(), e),
    })
}

// ============================================================================
// Session orchestration
// ============================================================================

/// Configuration for a full session run.
pub struct RunConfig<'a> {
    pub config: &'a SessionConfig,
    /// Directory that `data`, script paths, and `journal_dir` are relative to.
    pub base_dir: &'a Path,
    pub registry: &'a ModelRegistry,
}

/// Result of one script within a run.
#[derive(Debug)]
pub struct ScriptRun {
    pub label: String,
    pub outcome: Result<ScriptOutcome, EngineError>,
}

/// Everything a session run produced.
#[derive(Debug)]
pub struct RunReport {
    pub session_id: String,
    /// Snapshot right after compute, before any script.
    pub computed: ResultTable,
    /// Final snapshot: model fields plus every captured script variable.
    pub results: ResultTable,
    pub scripts: Vec<ScriptRun>,
    pub duration: Duration,
}

impl RunReport {
    pub fn failed(&self) -> usize {
        self.scripts.iter().filter(|s| s.outcome.is_err()).count()
    }
}

/// Log a journal event if the journal is enabled. Write failures never fail
/// the session.
fn log_journal(journal_dir: &Path, enabled: bool, event: ProvenanceEvent) {
    if enabled {
        if let Err(e) = eventlog::append_event(journal_dir, event) {
            warn!(error = %e, "journal write failed");
        }
    }
}

/// Run a whole session: dataset, model, scripts, results.
pub fn execute(cfg: &RunConfig) -> Result<RunReport, EngineError> {
    let start = Instant::now();
    let config = cfg.config;
    let journal_dir = cfg.base_dir.join(&config.policy.journal_dir);
    let journal = config.policy.journal;

    let data_path = cfg.base_dir.join(&config.data);
    let text = parser::read_dataset_text(&data_path)?;
    let dataset = parser::parse_dataset(&text)?;

    let mut evaluator =
        evaluator::backend(&config.evaluator.backend, EvalLimits::from(&config.evaluator))?;

    let mut session = open_session(cfg.registry, &config.model, &dataset)?;
    let session_id = session.id().to_string();
    log_journal(
        &journal_dir,
        journal,
        ProvenanceEvent::SessionOpened {
            session_id: session_id.clone(),
            model: config.model.clone(),
            dataset: config.data.clone(),
            dataset_hash: hasher::dataset_hash(&text),
            periods: dataset.ll(),
        },
    );

    let elapsed = run_model(&mut session)?;
    log_journal(
        &journal_dir,
        journal,
        ProvenanceEvent::ModelComputed {
            session_id: session_id.clone(),
            duration_seconds: elapsed.as_secs_f64(),
        },
    );
    let computed = snapshot(&session)?;

    let mut scripts = Vec::with_capacity(config.scripts.len());
    for script in &config.scripts {
        let label = script.label();
        let source = match script {
            ScriptSource::File(path) => read_script(&cfg.base_dir.join(path)),
            ScriptSource::Inline { inline } => Ok(inline.clone()),
        };
        let outcome = source.and_then(|src| {
            let script_hash = hasher::script_hash(evaluator.name(), &src);
            run_script(&mut session, &src, evaluator.as_mut()).map(|o| (script_hash, o))
        });

        match outcome {
            Ok((script_hash, outcome)) => {
                log_journal(
                    &journal_dir,
                    journal,
                    ProvenanceEvent::ScriptExecuted {
                        session_id: session_id.clone(),
                        script: label.clone(),
                        script_hash,
                        captured: outcome.captured.clone(),
                        duration_seconds: outcome.duration.as_secs_f64(),
                    },
                );
                scripts.push(ScriptRun {
                    label,
                    outcome: Ok(outcome),
                });
            }
            Err(e) => {
                log_journal(
                    &journal_dir,
                    journal,
                    ProvenanceEvent::ScriptFailed {
                        session_id: session_id.clone(),
                        script: label.clone(),
                        error: e.to_string(),
                    },
                );
                if config.policy.failure == FailurePolicy::StopOnFirst {
                    warn!(script = %label, error = %e, "stopping after script failure");
                    return Err(e);
                }
                warn!(script = %label, error = %e, "script failed, continuing");
                scripts.push(ScriptRun {
                    label,
                    outcome: Err(e),
                });
            }
        }
    }

    let results = snapshot(&session)?;
    log_journal(
        &journal_dir,
        journal,
        ProvenanceEvent::ResultsRendered {
            session_id: session_id.clone(),
            rows: results.len(),
            results_hash: hasher::results_hash(&results),
        },
    );

    Ok(RunReport {
        session_id,
        computed,
        results,
        scripts,
        duration: start.elapsed(),
    })
}
