//! Serialized run state, written after every transition.

use serde::{Deserialize, Serialize};
use tribunal_state::CheckpointRecord;

use crate::domain::{EvidenceBundle, EvidenceRecord, FinalVerdict, OpinionSet, Result, RunContext};
use crate::pipeline::state::PipelineState;
use crate::report::ReportArtifacts;

/// Everything needed to resume a run without repeating completed stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunCheckpoint {
    pub context: RunContext,
    /// The state to execute next.
    pub state: PipelineState,
    pub retry_count: u32,
    /// Every evidence record received so far, in dispatch order.
    #[serde(default)]
    pub records: Vec<EvidenceRecord>,
    #[serde(default)]
    pub bundle: Option<EvidenceBundle>,
    #[serde(default)]
    pub opinions: Vec<OpinionSet>,
    #[serde(default)]
    pub verdict: Option<FinalVerdict>,
    #[serde(default)]
    pub artifacts: Option<ReportArtifacts>,
    #[serde(default)]
    pub last_completed: Option<PipelineState>,
    #[serde(default)]
    pub abort_reason: Option<String>,
}

impl RunCheckpoint {
    pub fn new(context: RunContext) -> Self {
        Self {
            context,
            state: PipelineState::INITIAL,
            retry_count: 0,
            records: Vec::new(),
            bundle: None,
            opinions: Vec::new(),
            verdict: None,
            artifacts: None,
            last_completed: None,
            abort_reason: None,
        }
    }

    pub fn run_id(&self) -> &str {
        &self.context.trace_id
    }

    /// Name of the last completed stage, for abort diagnostics.
    pub fn last_completed_name(&self) -> &'static str {
        self.last_completed.map(|s| s.as_str()).unwrap_or("none")
    }

    /// Record that the current state finished and move to `next`.
    pub fn advance(&mut self, next: PipelineState) {
        self.last_completed = Some(self.state);
        self.state = next;
    }

    pub fn abort(&mut self, reason: impl Into<String>) {
        self.abort_reason = Some(reason.into());
        self.state = PipelineState::Aborted;
    }

    pub fn to_record(&self) -> Result<CheckpointRecord> {
        let payload = serde_json::to_value(self)?;
        Ok(CheckpointRecord::new(
            self.run_id(),
            self.state.as_str(),
            payload,
        )?)
    }

    pub fn from_record(record: &CheckpointRecord) -> Result<Self> {
        Ok(serde_json::from_value(record.payload.clone())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::EvidenceKind;
    use serde_json::json;

    #[test]
    fn test_record_round_trip_preserves_state() {
        let mut cp = RunCheckpoint::new(RunContext::new("repo").with_trace_id("t-7"));
        cp.records
            .push(EvidenceRecord::ok(EvidenceKind::Repository, json!({"k": 1})));
        cp.advance(PipelineState::Aggregate);

        let record = cp.to_record().unwrap();
        assert_eq!(record.run_id, "t-7");
        assert_eq!(record.state, "aggregate");

        let back = RunCheckpoint::from_record(&record).unwrap();
        assert_eq!(back, cp);
        assert_eq!(back.last_completed_name(), "dispatch_evidence");
    }

    #[test]
    fn test_abort_keeps_last_completed() {
        let mut cp = RunCheckpoint::new(RunContext::new("repo"));
        cp.advance(PipelineState::Aggregate);
        cp.abort("target unresolvable");
        assert_eq!(cp.state, PipelineState::Aborted);
        assert_eq!(cp.last_completed, Some(PipelineState::DispatchEvidence));
        assert_eq!(cp.abort_reason.as_deref(), Some("target unresolvable"));
    }
}
