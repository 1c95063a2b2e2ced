//! Pipeline finite state machine and transition guards.
//!
//! ```text
//! DISPATCH_EVIDENCE -> AGGREGATE -> RETRY_EVIDENCE -> AGGREGATE ...
//!                               \-> DISPATCH_JUDGES -> COLLECT_OPINIONS
//!                                   -> SYNTHESIZE -> EMIT -> DONE
//! any non-terminal state -> ABORTED
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::EvidenceBundle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    DispatchEvidence,
    Aggregate,
    RetryEvidence,
    DispatchJudges,
    CollectOpinions,
    Synthesize,
    Emit,
    Done,
    Aborted,
}

impl PipelineState {
    pub const INITIAL: PipelineState = PipelineState::DispatchEvidence;

    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineState::DispatchEvidence => "dispatch_evidence",
            PipelineState::Aggregate => "aggregate",
            PipelineState::RetryEvidence => "retry_evidence",
            PipelineState::DispatchJudges => "dispatch_judges",
            PipelineState::CollectOpinions => "collect_opinions",
            PipelineState::Synthesize => "synthesize",
            PipelineState::Emit => "emit",
            PipelineState::Done => "done",
            PipelineState::Aborted => "aborted",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Done | PipelineState::Aborted)
    }

    /// Unconditional successor. `None` for the guarded `Aggregate` state and
    /// for terminal states.
    pub fn successor(&self) -> Option<PipelineState> {
        match self {
            PipelineState::DispatchEvidence | PipelineState::RetryEvidence => {
                Some(PipelineState::Aggregate)
            }
            PipelineState::DispatchJudges => Some(PipelineState::CollectOpinions),
            PipelineState::CollectOpinions => Some(PipelineState::Synthesize),
            PipelineState::Synthesize => Some(PipelineState::Emit),
            PipelineState::Emit => Some(PipelineState::Done),
            PipelineState::Aggregate | PipelineState::Done | PipelineState::Aborted => None,
        }
    }

    /// Whether `self -> next` is an edge of the graph.
    pub fn can_transition_to(&self, next: PipelineState) -> bool {
        if self.is_terminal() {
            return false;
        }
        if next == PipelineState::Aborted {
            return true;
        }
        match self {
            PipelineState::Aggregate => matches!(
                next,
                PipelineState::RetryEvidence | PipelineState::DispatchJudges
            ),
            other => other.successor() == Some(next),
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Guard for the `Aggregate` edge.
///
/// Retry iff evidence is missing and the budget is not spent; otherwise judge
/// on whatever the bundle holds, with its `missing` set carried forward.
pub fn route_after_aggregate(
    bundle: &EvidenceBundle,
    retry_count: u32,
    max_retries: u32,
) -> PipelineState {
    if !bundle.is_complete() && retry_count < max_retries {
        PipelineState::RetryEvidence
    } else {
        PipelineState::DispatchJudges
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{EvidenceKind, EvidenceRecord};
    use crate::evidence::aggregate;
    use serde_json::json;

    fn bundle(complete: bool) -> EvidenceBundle {
        let record = if complete {
            EvidenceRecord::ok(EvidenceKind::Repository, json!({}))
        } else {
            EvidenceRecord::failed(EvidenceKind::Repository, "clone timed out", true)
        };
        aggregate(
            vec![record],
            &[EvidenceKind::Repository].into_iter().collect(),
            0,
        )
    }

    #[test]
    fn test_route_retries_only_within_budget() {
        assert_eq!(
            route_after_aggregate(&bundle(false), 0, 1),
            PipelineState::RetryEvidence
        );
        assert_eq!(
            route_after_aggregate(&bundle(false), 1, 1),
            PipelineState::DispatchJudges
        );
        assert_eq!(
            route_after_aggregate(&bundle(true), 0, 1),
            PipelineState::DispatchJudges
        );
        assert_eq!(
            route_after_aggregate(&bundle(false), 0, 0),
            PipelineState::DispatchJudges
        );
    }

    #[test]
    fn test_edges() {
        use PipelineState::*;
        assert!(DispatchEvidence.can_transition_to(Aggregate));
        assert!(Aggregate.can_transition_to(RetryEvidence));
        assert!(Aggregate.can_transition_to(DispatchJudges));
        assert!(RetryEvidence.can_transition_to(Aggregate));
        assert!(CollectOpinions.can_transition_to(Synthesize));
        assert!(Synthesize.can_transition_to(Aborted));
        assert!(!Synthesize.can_transition_to(DispatchJudges));
        assert!(!Done.can_transition_to(Aborted));
        assert!(!Aborted.can_transition_to(DispatchEvidence));
    }

    #[test]
    fn test_state_names_round_trip_through_serde() {
        let json = serde_json::to_string(&PipelineState::CollectOpinions).unwrap();
        assert_eq!(json, "\"collect_opinions\"");
        assert_eq!(PipelineState::CollectOpinions.as_str(), "collect_opinions");
    }
}
