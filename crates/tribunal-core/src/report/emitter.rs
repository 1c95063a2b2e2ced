//! Report emission.
//!
//! [`FsReportEmitter`] writes three artifacts to `<dir>/<trace_id>/`:
//! `report.md`, `summary.md` and `verdict.json`, plus a companion
//! `verdict.digest` holding the SHA-256 of the JSON bytes.

use std::path::{Path, PathBuf};

use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tribunal_state::ContentDigest;

use crate::domain::{FinalVerdict, Result, TribunalError};
use crate::report::render::{render_report_md, render_summary_md};

/// References to the three persisted artifacts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportArtifacts {
    pub full_report: String,
    pub summary: String,
    pub json: String,
}

/// Persists a finished verdict. Called exactly once per successful run
/// (again only when re-emitting after a failed emission).
#[async_trait]
pub trait ReportEmitter: Send + Sync {
    async fn emit(&self, verdict: &FinalVerdict) -> Result<ReportArtifacts>;
}

/// Writes artifacts under a base directory.
#[derive(Debug, Clone)]
pub struct FsReportEmitter {
    dir: PathBuf,
}

impl FsReportEmitter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

fn write_artifacts(dir: &Path, verdict: &FinalVerdict) -> anyhow::Result<ReportArtifacts> {
    let run_dir = dir.join(&verdict.trace_id);
    std::fs::create_dir_all(&run_dir).with_context(|| format!("create {:?}", run_dir))?;

    let report_path = run_dir.join("report.md");
    let summary_path = run_dir.join("summary.md");
    let json_path = run_dir.join("verdict.json");
    let digest_path = run_dir.join("verdict.digest");

    std::fs::write(&report_path, render_report_md(verdict))
        .with_context(|| format!("write {:?}", report_path))?;
    std::fs::write(&summary_path, render_summary_md(verdict))
        .with_context(|| format!("write {:?}", summary_path))?;

    let json = serde_json::to_vec_pretty(verdict).context("serialize verdict")?;
    std::fs::write(&json_path, &json).with_context(|| format!("write {:?}", json_path))?;
    let digest = ContentDigest::from_bytes(&json);
    std::fs::write(&digest_path, digest.as_str().as_bytes())
        .with_context(|| format!("write {:?}", digest_path))?;

    Ok(ReportArtifacts {
        full_report: report_path.display().to_string(),
        summary: summary_path.display().to_string(),
        json: json_path.display().to_string(),
    })
}

#[async_trait]
impl ReportEmitter for FsReportEmitter {
    async fn emit(&self, verdict: &FinalVerdict) -> Result<ReportArtifacts> {
        let dir = self.dir.clone();
        let verdict = verdict.clone();
        tokio::task::spawn_blocking(move || write_artifacts(&dir, &verdict))
            .await
            .map_err(|e| TribunalError::EmitFailure(e.to_string()))?
            .map_err(|e| TribunalError::EmitFailure(format!("{e:#}")))
    }
}

/// Read `<dir>/<trace_id>/verdict.json` and verify it against `verdict.digest`.
pub fn read_verdict(dir: &Path, trace_id: &str) -> Result<FinalVerdict> {
    let run_dir = dir.join(trace_id);
    let json = std::fs::read(run_dir.join("verdict.json"))?;
    let expected = std::fs::read_to_string(run_dir.join("verdict.digest"))?;
    let actual = ContentDigest::from_bytes(&json);
    if actual.as_str() != expected.trim() {
        return Err(TribunalError::EmitFailure(format!(
            "verdict digest mismatch for {trace_id}: expected {}, got {}",
            expected.trim(),
            actual
        )));
    }
    Ok(serde_json::from_slice(&json)?)
}
