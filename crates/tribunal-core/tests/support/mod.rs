//! Stub collaborators shared by the integration tests.
#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tribunal_core::{
    CriterionSpec, EvidenceBundle, EvidenceCollector, EvidenceKind, EvidenceRecord, FinalVerdict,
    FsReportEmitter, JudicialOpinion, MemoryCheckpointStore, OpinionProducer, Persona,
    PipelineConfig, PipelineController, ReportArtifacts, ReportEmitter, Result, Rubric,
    RunContext, SynthesisEngine, SynthesisPolicy, TribunalError,
};

/// Always returns the same `ok` payload.
pub struct StaticCollector {
    pub kind: EvidenceKind,
    pub payload: Value,
    pub calls: AtomicUsize,
}

impl StaticCollector {
    pub fn new(kind: EvidenceKind) -> Arc<Self> {
        Arc::new(Self {
            kind,
            payload: json!({"summary": format!("{kind} evidence"), "files": 12}),
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl EvidenceCollector for StaticCollector {
    fn kind(&self) -> EvidenceKind {
        self.kind
    }

    async fn collect(&self, _ctx: &RunContext) -> EvidenceRecord {
        self.calls.fetch_add(1, Ordering::SeqCst);
        EvidenceRecord::ok(self.kind, self.payload.clone())
    }
}

/// Fails (retryably) on the first `failures` calls, then succeeds.
pub struct FlakyCollector {
    pub kind: EvidenceKind,
    pub failures: usize,
    pub calls: AtomicUsize,
}

impl FlakyCollector {
    pub fn new(kind: EvidenceKind, failures: usize) -> Arc<Self> {
        Arc::new(Self {
            kind,
            failures,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl EvidenceCollector for FlakyCollector {
    fn kind(&self) -> EvidenceKind {
        self.kind
    }

    async fn collect(&self, _ctx: &RunContext) -> EvidenceRecord {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if n < self.failures {
            EvidenceRecord::failed(self.kind, "extraction failed", true)
        } else {
            EvidenceRecord::ok(self.kind, json!({"summary": "recovered"}))
        }
    }
}

/// Reports the target as unresolvable.
pub struct UnresolvableCollector;

#[async_trait]
impl EvidenceCollector for UnresolvableCollector {
    fn kind(&self) -> EvidenceKind {
        EvidenceKind::Repository
    }

    async fn collect(&self, _ctx: &RunContext) -> EvidenceRecord {
        EvidenceRecord::failed(EvidenceKind::Repository, "repository not found", false)
    }
}

pub type Script = dyn Fn(&CriterionSpec, &Persona) -> JudicialOpinion + Send + Sync;

/// Answers from a closure and counts invocations.
pub struct ScriptedProducer {
    script: Box<Script>,
    pub calls: AtomicUsize,
}

impl ScriptedProducer {
    pub fn new(
        script: impl Fn(&CriterionSpec, &Persona) -> JudicialOpinion + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            script: Box::new(script),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OpinionProducer for ScriptedProducer {
    async fn produce(
        &self,
        _bundle: &EvidenceBundle,
        criterion: &CriterionSpec,
        persona: &Persona,
    ) -> JudicialOpinion {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (self.script)(criterion, persona)
    }
}

/// Never answers.
pub struct HangingProducer;

#[async_trait]
impl OpinionProducer for HangingProducer {
    async fn produce(
        &self,
        _bundle: &EvidenceBundle,
        _criterion: &CriterionSpec,
        _persona: &Persona,
    ) -> JudicialOpinion {
        std::future::pending::<JudicialOpinion>().await
    }
}

/// Fails the first `failures` emissions, then writes to disk.
pub struct FlakyEmitter {
    inner: FsReportEmitter,
    failures: usize,
    pub calls: AtomicUsize,
}

impl FlakyEmitter {
    pub fn new(dir: &Path, failures: usize) -> Arc<Self> {
        Arc::new(Self {
            inner: FsReportEmitter::new(dir),
            failures,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl ReportEmitter for FlakyEmitter {
    async fn emit(&self, verdict: &FinalVerdict) -> Result<ReportArtifacts> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if n < self.failures {
            return Err(TribunalError::EmitFailure("disk full".to_string()));
        }
        self.inner.emit(verdict).await
    }
}

/// Persona scores 3 / 5 / 4 with neutral wording and no citations.
pub fn steady_opinion(criterion: &CriterionSpec, persona: &Persona) -> JudicialOpinion {
    let score = match persona.id.as_str() {
        "prosecutor" => 3,
        "defense" => 5,
        _ => 4,
    };
    JudicialOpinion::ok(
        &criterion.id,
        &persona.id,
        score,
        format!("{} reviewed {}", persona.id, criterion.name),
        vec![],
    )
}

pub fn engine() -> SynthesisEngine {
    SynthesisEngine::new(SynthesisPolicy::default(), Persona::default_panel())
        .expect("default panel is valid")
}

pub fn controller(
    producer: Arc<dyn OpinionProducer>,
    emitter: Arc<dyn ReportEmitter>,
    store: Arc<MemoryCheckpointStore>,
) -> PipelineController {
    PipelineController::new(
        Rubric::default(),
        engine(),
        producer,
        emitter,
        store,
        PipelineConfig::default(),
    )
}

/// A context with input for every evidence kind.
pub fn full_context(trace_id: &str) -> RunContext {
    RunContext::new("https://github.com/example/agent-swarm")
        .with_document("reports/architecture.pdf")
        .with_images(vec!["diagrams/flow.png".to_string()])
        .with_trace_id(trace_id)
}
