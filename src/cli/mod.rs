//! RS-017: CLI subcommands (init, validate, models, data, run).

use crate::core::executor::{self, RunConfig};
use crate::core::parser;
use crate::core::serializer;
use crate::core::types::{ScriptSource, SessionConfig};
use crate::journal::hasher;
use crate::models;
use anyhow::{bail, Context, Result};
use clap::Subcommand;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a starter session.yaml, dataset, and script
    Init {
        /// Directory to initialize (default: current)
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Validate a session config without running it
    Validate {
        /// Path to session.yaml
        #[arg(short, long, default_value = "session.yaml")]
        file: PathBuf,
    },

    /// List built-in models and their bindable fields
    Models,

    /// Parse a dataset file and show it as a table
    Data {
        /// Dataset file
        file: PathBuf,
    },

    /// Bind a dataset, run a model, then run scripts against it
    Run {
        /// Path to session.yaml; without it, --model and --data are required
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Model identifier (overrides the config)
        #[arg(long)]
        model: Option<String>,

        /// Dataset file (overrides the config)
        #[arg(long)]
        data: Option<String>,

        /// Script file, run after the config's scripts (repeatable)
        #[arg(long = "script")]
        scripts: Vec<String>,

        /// Inline script source, run after every --script (repeatable)
        #[arg(long = "eval")]
        evals: Vec<String>,

        /// Write results here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Do not append to the provenance journal
        #[arg(long)]
        no_journal: bool,
    },
}

/// Dispatch a CLI command.
pub fn dispatch(cmd: Commands) -> Result<()> {
    match cmd {
        Commands::Init { path } => cmd_init(&path),
        Commands::Validate { file } => cmd_validate(&file),
        Commands::Models => cmd_models(),
        Commands::Data { file } => cmd_data(&file),
        Commands::Run {
            file,
            model,
            data,
            scripts,
            evals,
            output,
            no_journal,
        } => {
            let (config, base_dir) = load_run_config(file.as_deref(), model, data, scripts, evals)?;
            cmd_run(config, &base_dir, output.as_deref(), no_journal)
        }
    }
}

const SESSION_TEMPLATE: &str = r#"version: "1.0"
name: starter
model: CompoundGrowth
data: data.txt
scripts:
  - scripts/summary.calc
  - inline: "PEAK = max(LEVEL)"
evaluator:
  backend: calc
  max_steps: 10000000
policy:
  failure: stop_on_first
  journal: true
  journal_dir: state
"#;

const DATA_TEMPLATE: &str = "LATA 2021 2022 2023 2024\nBASE 100\nRATE 0 0.05 0.03 -0.02\n";

const SCRIPT_TEMPLATE: &str = "# Period-over-period change of the computed level.
CHANGE = zeros(LL)
for i in 1..LL {
  CHANGE[i] = LEVEL[i] - LEVEL[i - 1]
}
";

fn cmd_init(path: &Path) -> Result<()> {
    let config_path = path.join("session.yaml");
    if config_path.exists() {
        bail!("{} already exists", config_path.display());
    }

    let scripts_dir = path.join("scripts");
    std::fs::create_dir_all(&scripts_dir)
        .with_context(|| format!("cannot create {}", scripts_dir.display()))?;

    let files = [
        (config_path, SESSION_TEMPLATE),
        (path.join("data.txt"), DATA_TEMPLATE),
        (scripts_dir.join("summary.calc"), SCRIPT_TEMPLATE),
    ];
    for (file, content) in &files {
        std::fs::write(file, content).with_context(|| format!("cannot write {}", file.display()))?;
    }

    println!("Initialized session at {}", path.display());
    for (file, _) in &files {
        println!("  Created: {}", file.display());
    }
    Ok(())
}

/// Parse and validate a session config, printing every error.
fn parse_and_validate(file: &Path) -> Result<SessionConfig> {
    let config = parser::parse_config_file(file)?;
    check(&config)?;
    Ok(config)
}

fn check(config: &SessionConfig) -> Result<()> {
    let registry = models::builtin_registry()?;
    let errors = parser::validate_config(config, &registry);
    if errors.is_empty() {
        return Ok(());
    }
    for e in &errors {
        eprintln!("  ERROR: {}", e);
    }
    bail!("{} validation error(s)", errors.len())
}

fn cmd_validate(file: &Path) -> Result<()> {
    let config = parse_and_validate(file)?;
    println!(
        "OK: {} (model {}, {} script(s), backend {})",
        config.name.as_deref().unwrap_or("unnamed session"),
        config.model,
        config.scripts.len(),
        config.evaluator.backend
    );
    Ok(())
}

fn cmd_models() -> Result<()> {
    let registry = models::builtin_registry()?;
    for id in registry.ids() {
        println!("{}", id);
        for field in registry.describe(id).unwrap_or_default() {
            println!("  {:<8} {}", field.name, field.kind);
        }
    }
    Ok(())
}

fn cmd_data(file: &Path) -> Result<()> {
    let text = parser::read_dataset_text(file)?;
    let dataset = parser::parse_dataset(&text)?;
    print!("{}", serializer::preview(&dataset));
    println!();
    println!(
        "{} period(s), {} variable(s), {}",
        dataset.ll(),
        dataset.series.len(),
        hasher::dataset_hash(&text)
    );
    Ok(())
}

/// Build the run config from a session file, flags, or both.
fn load_run_config(
    file: Option<&Path>,
    model: Option<String>,
    data: Option<String>,
    scripts: Vec<String>,
    evals: Vec<String>,
) -> Result<(SessionConfig, PathBuf)> {
    let (mut config, base_dir) = match file {
        Some(file) => {
            let config = parser::parse_config_file(file)?;
            let base = file.parent().map(Path::to_path_buf).unwrap_or_default();
            (config, base)
        }
        None => {
            let model = model.clone().context("--model is required without -f")?;
            let data = data.clone().context("--data is required without -f")?;
            let config = SessionConfig {
                version: "1.0".to_string(),
                name: None,
                model,
                data,
                scripts: Vec::new(),
                evaluator: Default::default(),
                policy: Default::default(),
                output: None,
            };
            (config, PathBuf::new())
        }
    };

    if let Some(model) = model {
        config.model = model;
    }
    if let Some(data) = data {
        config.data = data;
    }
    config.scripts.extend(scripts.into_iter().map(ScriptSource::File));
    config
        .scripts
        .extend(evals.into_iter().map(|inline| ScriptSource::Inline { inline }));
    Ok((config, base_dir))
}

fn cmd_run(
    mut config: SessionConfig,
    base_dir: &Path,
    output: Option<&Path>,
    no_journal: bool,
) -> Result<()> {
    check(&config)?;
    if no_journal {
        config.policy.journal = false;
    }

    let registry = models::builtin_registry()?;
    let report = executor::execute(&RunConfig {
        config: &config,
        base_dir,
        registry: &registry,
    })
    .with_context(|| format!("session for model '{}' failed", config.model))?;

    for run in &report.scripts {
        if let Err(e) = &run.outcome {
            eprintln!("  FAILED: {}: {}", run.label, e);
        }
    }

    let destination = output
        .map(Path::to_path_buf)
        .or_else(|| config.output.as_ref().map(|o| base_dir.join(o)));
    match destination {
        Some(path) => {
            std::fs::write(&path, report.results.to_tsv())
                .with_context(|| format!("cannot write {}", path.display()))?;
            println!("Results written to {}", path.display());
        }
        None => print!("{}", report.results),
    }

    info!(
        session = %report.session_id,
        rows = report.results.len(),
        scripts = report.scripts.len(),
        failed = report.failed(),
        seconds = report.duration.as_secs_f64(),
        "session complete"
    );

    if report.failed() > 0 {
        bail!("{} script(s) failed", report.failed());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rs017_init() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("project");
        cmd_init(&sub).unwrap();
        assert!(sub.join("session.yaml").exists());
        assert!(sub.join("data.txt").exists());
        assert!(sub.join("scripts/summary.calc").exists());
        cmd_validate(&sub.join("session.yaml")).unwrap();
    }

    #[test]
    fn test_rs017_init_already_exists() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("session.yaml"), "exists").unwrap();
        assert!(cmd_init(dir.path()).is_err());
    }

    #[test]
    fn test_rs017_validate_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("session.yaml");
        std::fs::write(
            &config,
            r#"
version: "2.0"
model: Ghost
data: data.txt
"#,
        )
        .unwrap();
        let err = cmd_validate(&config).unwrap_err();
        assert!(err.to_string().contains("2 validation error(s)"));
    }

    #[test]
    fn test_rs017_models_and_data() {
        cmd_models().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("data.txt");
        std::fs::write(&file, DATA_TEMPLATE).unwrap();
        cmd_data(&file).unwrap();
        assert!(cmd_data(&dir.path().join("missing.txt")).is_err());
    }

    #[test]
    fn test_rs017_run_starter_session() {
        let dir = tempfile::tempdir().unwrap();
        cmd_init(dir.path()).unwrap();
        let out = dir.path().join("results.tsv");
        let (config, base) = load_run_config(
            Some(&dir.path().join("session.yaml")),
            None,
            None,
            vec![],
            vec!["LAST = LEVEL[LL - 1]".to_string()],
        )
        .unwrap();
        cmd_run(config, &base, Some(&out), false).unwrap();

        let tsv = std::fs::read_to_string(&out).unwrap();
        let names: Vec<_> = tsv.lines().map(|l| l.split('\t').next().unwrap()).collect();
        assert_eq!(
            names,
            vec!["LL", "BASE", "RATE", "LEVEL", "CHANGE", "PEAK", "LAST"]
        );
        assert!(tsv.starts_with("LL\t2021 2022 2023 2024\n"));
        assert!(dir.path().join("state/events.jsonl").exists());
    }

    #[test]
    fn test_rs017_run_from_flags() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("data.txt");
        std::fs::write(&data, DATA_TEMPLATE).unwrap();
        let out = dir.path().join("out.tsv");
        let (config, base) = load_run_config(
            None,
            Some("CompoundGrowth".to_string()),
            Some(data.display().to_string()),
            vec![],
            vec!["FIRST = LEVEL[0]".to_string()],
        )
        .unwrap();
        assert_eq!(base, PathBuf::new());
        cmd_run(config, &base, Some(&out), true).unwrap();
        let tsv = std::fs::read_to_string(&out).unwrap();
        assert!(tsv.ends_with("FIRST\t100.0\n"));
    }

    #[test]
    fn test_rs017_run_requires_model_without_file() {
        let err = load_run_config(None, None, Some("d.txt".to_string()), vec![], vec![])
            .unwrap_err();
        assert!(err.to_string().contains("--model is required"));
    }

    #[test]
    fn test_rs017_run_reports_failed_scripts() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("data.txt"), DATA_TEMPLATE).unwrap();
        std::fs::write(
            dir.path().join("session.yaml"),
            r#"
version: "1.0"
model: CompoundGrowth
data: data.txt
scripts:
  - inline: "BAD = MISSING"
  - inline: "GOOD = 1"
policy:
  failure: continue_independent
  journal: false
output: out.tsv
"#,
        )
        .unwrap();
        let (config, base) =
            load_run_config(Some(&dir.path().join("session.yaml")), None, None, vec![], vec![])
                .unwrap();
        let err = cmd_run(config, &base, None, false).unwrap_err();
        assert!(err.to_string().contains("1 script(s) failed"));
        let tsv = std::fs::read_to_string(dir.path().join("out.tsv")).unwrap();
        assert!(tsv.contains("GOOD\t1.0\n"));
    }
}
