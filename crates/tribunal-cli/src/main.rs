//! Tribunal - rubric-driven repository audits from the command line
//!
//! ## Commands
//!
//! - `audit`: Audit one repository and write its reports
//! - `batch`: Audit several targets concurrently
//! - `resume`: Continue an interrupted run from its checkpoint
//! - `rubric`: Show or validate a rubric

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, Level};

use tribunal_core::{
    AuditConfig, AuditOutcome, ChatOpinionProducer, CommandCollector, FsReportEmitter,
    PipelineController, Rubric, RunContext, SynthesisEngine, METRICS,
};
use tribunal_state::{CheckpointStore, SurrealCheckpointStore};

#[derive(Parser)]
#[command(name = "tribunal")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Multi-judge repository audits with deterministic verdicts", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Configuration file (TOML)
    #[arg(short, long, global = true, env = "TRIBUNAL_CONFIG")]
    config: Option<PathBuf>,

    /// Rubric file (JSON); overrides `rubric_path` from the config
    #[arg(long, global = true, env = "TRIBUNAL_RUBRIC")]
    rubric: Option<PathBuf>,

    /// Directory for report artifacts
    #[arg(long, global = true, env = "TRIBUNAL_REPORT_DIR")]
    report_dir: Option<PathBuf>,

    /// Directory for run checkpoints
    #[arg(long, global = true, env = "TRIBUNAL_STATE_DIR")]
    state_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Audit a repository against the rubric
    Audit {
        /// Repository reference (URL or local path)
        target: String,

        /// Accompanying document (e.g. architecture report PDF)
        #[arg(short, long)]
        document: Option<String>,

        /// Diagram or screenshot files
        #[arg(short, long, num_args = 1..)]
        images: Vec<String>,

        /// Use this trace id instead of a generated one
        #[arg(long)]
        trace_id: Option<String>,
    },

    /// Audit every target listed in a file
    ///
    /// The file is either a JSON array of `{"target", "document", "images"}`
    /// objects or one target per line.
    Batch {
        /// Path to the batch file
        file: PathBuf,
    },

    /// Resume a persisted run
    Resume {
        /// Run (trace) id to resume
        run_id: String,
    },

    /// List persisted runs
    Runs,

    /// Inspect the rubric
    Rubric {
        #[command(subcommand)]
        action: RubricAction,
    },
}

#[derive(Subcommand)]
enum RubricAction {
    /// Print the effective rubric as JSON
    Show,
    /// Validate the effective rubric
    Validate,
}

/// One entry of a batch file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
struct BatchEntry {
    target: String,
    #[serde(default)]
    document: Option<String>,
    #[serde(default)]
    images: Vec<String>,
}

impl BatchEntry {
    fn into_context(self) -> RunContext {
        let mut ctx = RunContext::new(self.target).with_images(self.images);
        if let Some(document) = self.document {
            ctx = ctx.with_document(document);
        }
        ctx
    }
}

fn parse_batch(text: &str) -> Result<Vec<BatchEntry>> {
    if text.trim_start().starts_with('[') {
        return serde_json::from_str(text).context("parse batch file as JSON");
    }
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(|target| BatchEntry {
            target: target.to_string(),
            document: None,
            images: Vec::new(),
        })
        .collect())
}

/// Load the config file (or defaults) and apply CLI overrides.
fn load_config(cli: &Cli) -> Result<AuditConfig> {
    let mut config = match &cli.config {
        Some(path) => AuditConfig::load(path)
            .with_context(|| format!("Failed to load config {:?}", path))?,
        None => AuditConfig::default(),
    };
    if let Some(rubric) = &cli.rubric {
        config.rubric_path = Some(rubric.clone());
    }
    if let Some(dir) = &cli.report_dir {
        config.report_dir = dir.clone();
    }
    if let Some(dir) = &cli.state_dir {
        config.state_dir = dir.clone();
    }
    Ok(config)
}

async fn open_store(config: &AuditConfig) -> Result<Arc<SurrealCheckpointStore>> {
    let store = SurrealCheckpointStore::local(&config.state_dir)
        .await
        .with_context(|| format!("Failed to open checkpoint store at {:?}", config.state_dir))?;
    Ok(Arc::new(store))
}

fn build_controller(
    config: &AuditConfig,
    store: Arc<dyn CheckpointStore>,
) -> Result<PipelineController> {
    let rubric = config.rubric().context("Failed to load rubric")?;
    let engine = SynthesisEngine::new(config.synthesis.clone(), config.personas.clone())?;
    let producer = ChatOpinionProducer::new(
        config.chat.clone(),
        Duration::from_secs(config.pipeline.opinion_timeout_secs),
    )?;
    if config.chat.resolve_api_key().is_none() {
        tracing::warn!("no chat API key found in {:?}", config.chat.api_key_env);
    }

    let mut controller = PipelineController::new(
        rubric,
        engine,
        Arc::new(producer),
        Arc::new(FsReportEmitter::new(&config.report_dir)),
        store,
        config.pipeline.clone(),
    );
    for (kind, collector) in &config.collectors {
        controller = controller.with_collector(Arc::new(CommandCollector::new(
            *kind,
            collector.clone(),
        )));
    }
    Ok(controller)
}

fn print_outcome(outcome: &AuditOutcome) {
    let v = &outcome.verdict;
    println!("Run:     {}", outcome.run_id);
    println!("Target:  {}", v.target);
    println!(
        "Score:   {:.2} / {:.2} ({}%)",
        v.overall_score, v.max_possible, v.percentage
    );
    for c in &v.criteria {
        println!(
            "  {:<28} {}/{}  [{}]",
            c.criterion_id,
            c.score,
            c.maximum,
            c.applied_rule()
        );
    }
    if !v.missing_evidence.is_empty() {
        let missing: Vec<&str> = v.missing_evidence.iter().map(|k| k.as_str()).collect();
        println!("Missing evidence: {}", missing.join(", "));
    }
    println!("Report:  {}", outcome.artifacts.full_report);
}

async fn cmd_audit(config: &AuditConfig, ctx: RunContext) -> Result<()> {
    let store = open_store(config).await?;
    let controller = build_controller(config, store)?;
    info!(repo = %ctx.target, trace_id = %ctx.trace_id, "starting audit");
    let outcome = controller
        .run(ctx)
        .await
        .context("Audit did not complete")?;
    print_outcome(&outcome);
    Ok(())
}

async fn cmd_batch(config: &AuditConfig, file: &Path) -> Result<()> {
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read batch file {:?}", file))?;
    let entries = parse_batch(&text)?;
    if entries.is_empty() {
        println!("No targets in {:?}", file);
        return Ok(());
    }

    let store = open_store(config).await?;
    let controller = build_controller(config, store)?;
    let contexts: Vec<RunContext> = entries.into_iter().map(BatchEntry::into_context).collect();
    let targets: Vec<String> = contexts.iter().map(|c| c.target.clone()).collect();

    let results = controller.run_batch(contexts).await;
    let mut failures = 0;
    for (target, result) in targets.iter().zip(results) {
        match result {
            Ok(outcome) => {
                println!(
                    "{}  {}%  {}",
                    target, outcome.verdict.percentage, outcome.artifacts.full_report
                );
            }
            Err(e) => {
                failures += 1;
                println!("{}  FAILED  {}", target, e);
            }
        }
    }
    if failures > 0 {
        anyhow::bail!("{} of {} audits failed", failures, targets.len());
    }
    Ok(())
}

async fn cmd_resume(config: &AuditConfig, run_id: &str) -> Result<()> {
    let store = open_store(config).await?;
    let controller = build_controller(config, store)?;
    let outcome = controller
        .resume(run_id)
        .await
        .with_context(|| format!("Failed to resume run {}", run_id))?;
    print_outcome(&outcome);
    Ok(())
}

async fn cmd_runs(config: &AuditConfig) -> Result<()> {
    let store = open_store(config).await?;
    let runs = store.list().await?;
    if runs.is_empty() {
        println!("No runs recorded in {:?}", config.state_dir);
        return Ok(());
    }
    for run in runs {
        println!(
            "{}  {:<18} {}",
            run.run_id,
            run.state,
            run.updated_at.format("%Y-%m-%d %H:%M:%S UTC")
        );
    }
    Ok(())
}

fn cmd_rubric(config: &AuditConfig, action: RubricAction) -> Result<()> {
    let rubric: Rubric = config.rubric().context("Failed to load rubric")?;
    match action {
        RubricAction::Show => {
            println!("{}", serde_json::to_string_pretty(&rubric)?);
        }
        RubricAction::Validate => {
            rubric.validate()?;
            println!(
                "Rubric '{}' is valid: {} criteria, max possible {:.2}",
                rubric.name,
                rubric.len(),
                rubric.max_possible()
            );
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    tribunal_core::telemetry::init_tracing(cli.json, level);

    let config = load_config(&cli)?;

    let result = match cli.command {
        Commands::Audit {
            target,
            document,
            images,
            trace_id,
        } => {
            let mut ctx = RunContext::new(target).with_images(images);
            if let Some(document) = document {
                ctx = ctx.with_document(document);
            }
            if let Some(trace_id) = trace_id {
                ctx = ctx.with_trace_id(trace_id);
            }
            cmd_audit(&config, ctx).await
        }
        Commands::Batch { file } => cmd_batch(&config, &file).await,
        Commands::Resume { run_id } => cmd_resume(&config, &run_id).await,
        Commands::Runs => cmd_runs(&config).await,
        Commands::Rubric { action } => cmd_rubric(&config, action),
    };

    METRICS.flush();
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_audit_with_images() {
        let cli = Cli::try_parse_from([
            "tribunal",
            "audit",
            "https://github.com/example/repo",
            "--document",
            "report.pdf",
            "--images",
            "a.png",
            "b.png",
            "--json",
        ])
        .unwrap();
        assert!(cli.json);
        match cli.command {
            Commands::Audit {
                target,
                document,
                images,
                trace_id,
            } => {
                assert_eq!(target, "https://github.com/example/repo");
                assert_eq!(document.as_deref(), Some("report.pdf"));
                assert_eq!(images, vec!["a.png", "b.png"]);
                assert!(trace_id.is_none());
            }
            _ => panic!("expected audit"),
        }
    }

    #[test]
    fn test_parse_batch_lines_skip_comments() {
        let entries = parse_batch("# targets\nrepo-a\n\n  repo-b  \n").unwrap();
        let targets: Vec<&str> = entries.iter().map(|e| e.target.as_str()).collect();
        assert_eq!(targets, vec!["repo-a", "repo-b"]);
    }

    #[test]
    fn test_parse_batch_json() {
        let entries = parse_batch(
            r#"[{"target": "repo-a", "document": "a.pdf"}, {"target": "repo-b", "images": ["x.png"]}]"#,
        )
        .unwrap();
        assert_eq!(entries.len(), 2);
        let ctx = entries[0].clone().into_context();
        assert_eq!(ctx.document.as_deref(), Some("a.pdf"));
        assert_eq!(entries[1].images, vec!["x.png"]);
    }

    #[test]
    fn test_cli_flags_override_config() {
        let tmp = tempfile::tempdir().unwrap();
        let config_path = tmp.path().join("tribunal.toml");
        std::fs::write(
            &config_path,
            "report_dir = \"from-file\"\n[pipeline]\nmax_evidence_retries = 3\n",
        )
        .unwrap();
        let cli = Cli::try_parse_from([
            "tribunal",
            "--config",
            config_path.to_str().unwrap(),
            "--state-dir",
            "/tmp/tribunal-state",
            "runs",
        ])
        .unwrap();
        let config = load_config(&cli).unwrap();
        assert_eq!(config.report_dir, PathBuf::from("from-file"));
        assert_eq!(config.state_dir, PathBuf::from("/tmp/tribunal-state"));
        assert_eq!(config.pipeline.max_evidence_retries, 3);
    }

    #[test]
    fn test_rubric_validate_default() {
        cmd_rubric(&AuditConfig::default(), RubricAction::Validate).unwrap();
    }

    #[test]
    fn test_rubric_validate_rejects_bad_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("rubric.json");
        std::fs::write(&path, r#"{"dimensions": []}"#).unwrap();
        let config = AuditConfig {
            rubric_path: Some(path),
            ..AuditConfig::default()
        };
        assert!(cmd_rubric(&config, RubricAction::Validate).is_err());
    }
}
