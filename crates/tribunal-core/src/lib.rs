//! Tribunal Core Library
//!
//! Rubric-driven repository audits: parallel evidence collection, a panel of
//! judges scoring every criterion, and deterministic synthesis into a final
//! verdict with persisted report artifacts.

pub mod adapters;
pub mod config;
pub mod domain;
pub mod evidence;
pub mod judicial;
pub mod metrics;
pub mod obs;
pub mod pipeline;
pub mod report;
pub mod synthesis;
pub mod telemetry;

pub use domain::{
    validate_personas, Citation, CriterionSpec, CriterionVerdict, EvidenceBundle, EvidenceKind,
    EvidenceRecord, EvidenceStatus, FinalVerdict, JudicialOpinion, OpinionSet, OpinionStatus,
    Persona, ResolutionRule, Result, Rubric, RunContext, Stance, TribunalError,
};

pub use adapters::{ChatOpinionProducer, CommandCollector};
pub use config::{AuditConfig, ChatConfig, CommandCollectorConfig, PipelineConfig};
pub use evidence::{aggregate, EvidenceCollector};
pub use judicial::{parse_opinion, OpinionProducer};
pub use metrics::METRICS;
pub use pipeline::{AuditOutcome, PipelineController, PipelineState, RunCheckpoint};
pub use report::{read_verdict, FsReportEmitter, ReportArtifacts, ReportEmitter};
pub use synthesis::{SynthesisEngine, SynthesisPolicy};

pub use tribunal_state::fakes::MemoryCheckpointStore;
pub use tribunal_state::{CheckpointStore, SurrealCheckpointStore};
