//! Structured observability hooks for the audit run lifecycle.
//!
//! Events are emitted at `info!` (failures at `warn!`) with an `event` field
//! so they can be filtered in JSON log pipelines. For JSON output set
//! `TRIBUNAL_LOG_FORMAT=json`.

use tracing::{info, warn, Span};

/// Run-scoped tracing span. Attach it to a run's future with
/// [`tracing::Instrument`] so every event carries the trace id.
///
/// ```ignore
/// controller.drive(cp).instrument(run_span("3f2c...")).await
/// ```
pub fn run_span(trace_id: &str) -> Span {
    tracing::info_span!("tribunal.run", trace_id = %trace_id)
}

pub fn emit_run_started(trace_id: &str, target: &str) {
    info!(event = "run.started", trace_id = %trace_id, repo = %target);
}

pub fn emit_state_transition(trace_id: &str, from: &str, to: &str) {
    info!(event = "run.transition", trace_id = %trace_id, from = %from, to = %to);
}

pub fn emit_evidence_aggregated(trace_id: &str, attempt: u32, complete: bool, missing: &str) {
    info!(
        event = "evidence.aggregated",
        trace_id = %trace_id,
        attempt = attempt,
        complete = complete,
        missing = %missing,
    );
}

pub fn emit_evidence_retry(trace_id: &str, attempt: u32, kinds: &str) {
    info!(event = "evidence.retry", trace_id = %trace_id, attempt = attempt, kinds = %kinds);
}

pub fn emit_opinion_failed(trace_id: &str, criterion: &str, persona: &str, reason: &str) {
    warn!(
        event = "opinion.failed",
        trace_id = %trace_id,
        criterion = %criterion,
        persona = %persona,
        reason = %reason,
    );
}

pub fn emit_rule_triggered(trace_id: &str, criterion: &str, rule: &str, score: u32) {
    info!(
        event = "synthesis.rule_triggered",
        trace_id = %trace_id,
        criterion = %criterion,
        rule = %rule,
        score = score,
    );
}

pub fn emit_artifacts_emitted(trace_id: &str, full_report: &str) {
    info!(event = "report.emitted", trace_id = %trace_id, full_report = %full_report);
}

pub fn emit_run_finished(trace_id: &str, duration_ms: u64, percentage: u32) {
    info!(
        event = "run.finished",
        trace_id = %trace_id,
        duration_ms = duration_ms,
        percentage = percentage,
    );
}

pub fn emit_run_aborted(trace_id: &str, last_completed: &str, reason: &dyn std::fmt::Display) {
    warn!(
        event = "run.aborted",
        trace_id = %trace_id,
        last_completed = %last_completed,
        reason = %reason,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_span_create() {
        let span = run_span("test-trace-id");
        let _guard = span.enter();
        emit_state_transition("test-trace-id", "aggregate", "dispatch_judges");
    }
}
