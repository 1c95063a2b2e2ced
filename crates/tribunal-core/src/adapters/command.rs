//! Evidence collection by running an external program.
//!
//! The program receives the run's inputs as arguments and prints a JSON
//! object on stdout, which becomes the evidence payload.

use std::process::Stdio;

use async_trait::async_trait;
use serde_json::Value;
use tokio::process::Command;
use tracing::debug;

use crate::config::CommandCollectorConfig;
use crate::domain::{EvidenceKind, EvidenceRecord, RunContext};
use crate::evidence::EvidenceCollector;

pub struct CommandCollector {
    kind: EvidenceKind,
    config: CommandCollectorConfig,
}

impl CommandCollector {
    pub fn new(kind: EvidenceKind, config: CommandCollectorConfig) -> Self {
        Self { kind, config }
    }

    fn inputs(&self, ctx: &RunContext) -> Vec<String> {
        match self.kind {
            EvidenceKind::Repository => vec![ctx.target.clone()],
            EvidenceKind::Document => ctx.document.iter().cloned().collect(),
            EvidenceKind::Visual => ctx.images.clone(),
        }
    }

    /// Expand argument placeholders for `ctx`.
    pub fn expand_args(&self, ctx: &RunContext) -> Vec<String> {
        let has_placeholder = self.config.args.iter().any(|a| {
            a.contains("{target}") || a.contains("{document}") || a == "{images}"
        });
        if !has_placeholder {
            let mut args = self.config.args.clone();
            args.extend(self.inputs(ctx));
            return args;
        }

        let document = ctx.document.clone().unwrap_or_default();
        let mut args = Vec::with_capacity(self.config.args.len());
        for arg in &self.config.args {
            if arg == "{images}" {
                args.extend(ctx.images.iter().cloned());
            } else {
                args.push(
                    arg.replace("{target}", &ctx.target)
                        .replace("{document}", &document),
                );
            }
        }
        args
    }

    async fn run(&self, ctx: &RunContext) -> EvidenceRecord {
        let args = self.expand_args(ctx);
        debug!(kind = %self.kind, program = %self.config.program, ?args, "running collector");

        let child = Command::new(&self.config.program)
            .args(&args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();
        let child = match child {
            Ok(child) => child,
            Err(e) => {
                return EvidenceRecord::failed(
                    self.kind,
                    format!("failed to start {}: {e}", self.config.program),
                    true,
                )
            }
        };
        let output = match child.wait_with_output().await {
            Ok(output) => output,
            Err(e) => return EvidenceRecord::failed(self.kind, e.to_string(), true),
        };

        let exit_code = output.status.code().unwrap_or(-1);
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let reason = format!("exit code {exit_code}: {}", stderr.trim());
            let retryable = self.config.unresolvable_exit_code != Some(exit_code);
            return EvidenceRecord::failed(self.kind, reason, retryable);
        }

        match serde_json::from_slice::<Value>(&output.stdout) {
            Ok(payload @ Value::Object(_)) => EvidenceRecord::ok(self.kind, payload),
            Ok(_) => EvidenceRecord::failed(self.kind, "collector output is not a JSON object", true),
            Err(e) => EvidenceRecord::failed(self.kind, format!("invalid collector output: {e}"), true),
        }
    }
}

#[async_trait]
impl EvidenceCollector for CommandCollector {
    fn kind(&self) -> EvidenceKind {
        self.kind
    }

    async fn collect(&self, ctx: &RunContext) -> EvidenceRecord {
        if !ctx.has_input(self.kind) {
            return EvidenceRecord::skipped(self.kind, "no input for this run");
        }
        self.run(ctx).await
    }
}
