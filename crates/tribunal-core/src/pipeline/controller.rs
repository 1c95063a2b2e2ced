//! Pipeline controller: drives one run through the state machine.
//!
//! Each call to [`PipelineController::step`] executes exactly one state,
//! persists the resulting checkpoint, and returns it. `run` and `resume` loop
//! `step` until a terminal state. Leaf stages never see the controller: they
//! receive immutable inputs and return new values.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use tokio::sync::watch;
use tracing::{debug, instrument, Instrument};
use tribunal_state::CheckpointStore;

use crate::config::PipelineConfig;
use crate::domain::{
    EvidenceKind, EvidenceStatus, FinalVerdict, ResolutionRule, Result, Rubric, RunContext,
    TribunalError,
};
use crate::evidence::{aggregate, dispatch_collectors, CollectorSet, EvidenceCollector};
use crate::judicial::{collect_opinions, OpinionProducer};
use crate::metrics::METRICS;
use crate::obs::{self, run_span};
use crate::pipeline::checkpoint::RunCheckpoint;
use crate::pipeline::state::{route_after_aggregate, PipelineState};
use crate::report::{ReportArtifacts, ReportEmitter};
use crate::synthesis::SynthesisEngine;

/// Result of a successful run.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditOutcome {
    pub run_id: String,
    pub verdict: FinalVerdict,
    pub artifacts: ReportArtifacts,
}

pub struct PipelineController {
    collectors: CollectorSet,
    producer: Arc<dyn OpinionProducer>,
    emitter: Arc<dyn ReportEmitter>,
    store: Arc<dyn CheckpointStore>,
    rubric: Arc<Rubric>,
    engine: Arc<SynthesisEngine>,
    config: PipelineConfig,
    /// Cancel flag per run currently being stepped, keyed by trace id.
    in_flight: Mutex<HashMap<String, watch::Sender<bool>>>,
}

/// Drops a run's cancel flag once `drive` returns.
struct InFlight<'a> {
    controller: &'a PipelineController,
    run_id: String,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.controller.runs().remove(&self.run_id);
    }
}

impl PipelineController {
    pub fn new(
        rubric: Rubric,
        engine: SynthesisEngine,
        producer: Arc<dyn OpinionProducer>,
        emitter: Arc<dyn ReportEmitter>,
        store: Arc<dyn CheckpointStore>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            collectors: CollectorSet::new(),
            producer,
            emitter,
            store,
            rubric: Arc::new(rubric),
            engine: Arc::new(engine),
            config,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Register the collector for its kind, replacing any previous one.
    pub fn with_collector(mut self, collector: Arc<dyn EvidenceCollector>) -> Self {
        self.collectors.insert(collector.kind(), collector);
        self
    }

    pub fn rubric(&self) -> &Rubric {
        &self.rubric
    }

    fn runs(&self) -> MutexGuard<'_, HashMap<String, watch::Sender<bool>>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Cancel flag for `run_id`, registering a lowered one if the run is new.
    fn cancel_flag(&self, run_id: &str) -> watch::Receiver<bool> {
        self.runs()
            .entry(run_id.to_string())
            .or_insert_with(|| watch::channel(false).0)
            .subscribe()
    }

    /// Register a lowered cancel flag for a run about to be driven.
    fn track(&self, run_id: &str) -> InFlight<'_> {
        self.runs().insert(run_id.to_string(), watch::channel(false).0);
        InFlight {
            controller: self,
            run_id: run_id.to_string(),
        }
    }

    /// Request cancellation of every run currently in flight. Their open
    /// slots settle as failed and each aborts at its next step. Runs started
    /// or resumed afterwards are unaffected.
    pub fn cancel(&self) {
        for flag in self.runs().values() {
            flag.send_replace(true);
        }
    }

    /// Cancel a single in-flight run. Returns `false` if no such run is in flight.
    pub fn cancel_run(&self, run_id: &str) -> bool {
        match self.runs().get(run_id) {
            Some(flag) => {
                flag.send_replace(true);
                true
            }
            None => false,
        }
    }

    pub fn is_cancelled(&self, run_id: &str) -> bool {
        self.runs().get(run_id).is_some_and(|flag| *flag.borrow())
    }

    async fn persist(&self, cp: &RunCheckpoint) -> Result<()> {
        self.store.save(cp.to_record()?).await?;
        Ok(())
    }

    /// Create and persist the initial checkpoint for a new run.
    pub async fn begin(&self, ctx: RunContext) -> Result<RunCheckpoint> {
        obs::emit_run_started(&ctx.trace_id, &ctx.target);
        let cp = RunCheckpoint::new(ctx);
        self.persist(&cp).await?;
        Ok(cp)
    }

    /// Abort if any required kind among `records` reported an unresolvable target.
    fn check_unresolvable(cp: &mut RunCheckpoint, from: usize) -> bool {
        let required = cp.context.required_kinds();
        let fatal = cp.records[from..]
            .iter()
            .find(|r| required.contains(&r.kind) && r.is_unresolvable())
            .map(|r| {
                let reason = match &r.status {
                    EvidenceStatus::Failed { reason, .. } => reason.clone(),
                    _ => String::new(),
                };
                TribunalError::TargetUnresolvable {
                    target: cp.context.target.clone(),
                    reason: format!("{}: {}", r.kind, reason),
                }
            });
        match fatal {
            Some(err) => {
                cp.abort(err.to_string());
                true
            }
            None => false,
        }
    }

    /// Execute the current state once, persist, and return the next checkpoint.
    ///
    /// Aborts are returned as a checkpoint in the `Aborted` state. Errors are
    /// reserved for storage failures and report emission failures; on an
    /// emission failure the persisted checkpoint stays at `Emit`.
    #[instrument(skip_all, fields(trace_id = %cp.context.trace_id, state = %cp.state))]
    pub async fn step(&self, mut cp: RunCheckpoint) -> Result<RunCheckpoint> {
        let from = cp.state;
        if from.is_terminal() {
            return Ok(cp);
        }
        let cancel = self.cancel_flag(cp.run_id());
        if *cancel.borrow() {
            cp.abort("cancelled");
            return self.finish_step(cp, from).await;
        }

        let ctx = Arc::new(cp.context.clone());
        match from {
            PipelineState::DispatchEvidence => {
                let kinds: BTreeSet<EvidenceKind> = EvidenceKind::ALL.into_iter().collect();
                let start = cp.records.len();
                let records = dispatch_collectors(
                    &self.collectors,
                    &ctx,
                    &kinds,
                    0,
                    &self.config.collector_limits(),
                    &cancel,
                )
                .await;
                cp.records.extend(records);
                if !Self::check_unresolvable(&mut cp, start) {
                    cp.advance(PipelineState::Aggregate);
                }
            }
            PipelineState::Aggregate => {
                let bundle = aggregate(
                    cp.records.iter().cloned(),
                    &ctx.required_kinds(),
                    cp.retry_count,
                );
                let missing: Vec<&str> = bundle.missing().iter().map(EvidenceKind::as_str).collect();
                obs::emit_evidence_aggregated(
                    &ctx.trace_id,
                    bundle.attempt(),
                    bundle.is_complete(),
                    &missing.join(","),
                );
                let next = route_after_aggregate(
                    &bundle,
                    cp.retry_count,
                    self.config.max_evidence_retries,
                );
                cp.bundle = Some(bundle);
                cp.advance(next);
            }
            PipelineState::RetryEvidence => {
                let missing = cp
                    .bundle
                    .as_ref()
                    .map(|b| b.missing().clone())
                    .unwrap_or_default();
                cp.retry_count += 1;
                METRICS.inc_evidence_retries();
                let names: Vec<&str> = missing.iter().map(EvidenceKind::as_str).collect();
                obs::emit_evidence_retry(&ctx.trace_id, cp.retry_count, &names.join(","));

                let start = cp.records.len();
                let records = dispatch_collectors(
                    &self.collectors,
                    &ctx,
                    &missing,
                    cp.retry_count,
                    &self.config.collector_limits(),
                    &cancel,
                )
                .await;
                cp.records.extend(records);
                if !Self::check_unresolvable(&mut cp, start) {
                    cp.advance(PipelineState::Aggregate);
                }
            }
            PipelineState::DispatchJudges => match cp.bundle.clone() {
                Some(bundle) => {
                    cp.opinions = collect_opinions(
                        &ctx.trace_id,
                        Arc::clone(&self.producer),
                        Arc::new(bundle),
                        &self.rubric,
                        self.engine.personas(),
                        &self.config.opinion_limits(),
                        &cancel,
                    )
                    .await;
                    cp.advance(PipelineState::CollectOpinions);
                }
                None => cp.abort("no evidence bundle to judge"),
            },
            PipelineState::CollectOpinions => {
                let expected = self.rubric.len();
                let arity = self.engine.personas().len();
                if cp.opinions.len() != expected {
                    cp.abort(format!(
                        "collected {} opinion sets for {} criteria",
                        cp.opinions.len(),
                        expected
                    ));
                } else if let Some(set) = cp.opinions.iter().find(|s| s.len() != arity) {
                    cp.abort(format!(
                        "criterion {} has {} opinions for {} personas",
                        set.criterion_id(),
                        set.len(),
                        arity
                    ));
                } else {
                    cp.advance(PipelineState::Synthesize);
                }
            }
            PipelineState::Synthesize => {
                let Some(bundle) = cp.bundle.as_ref() else {
                    cp.abort("no evidence bundle to synthesize against");
                    return self.finish_step(cp, from).await;
                };
                match self
                    .engine
                    .synthesize_all(&ctx, &self.rubric, &cp.opinions, bundle)
                {
                    Ok(verdict) => {
                        for c in &verdict.criteria {
                            for rule in c
                                .rules
                                .iter()
                                .filter(|r| **r != ResolutionRule::WeightedAverage)
                            {
                                obs::emit_rule_triggered(
                                    &ctx.trace_id,
                                    &c.criterion_id,
                                    rule.as_str(),
                                    c.score,
                                );
                            }
                        }
                        cp.verdict = Some(verdict);
                        cp.advance(PipelineState::Emit);
                    }
                    Err(e) => cp.abort(e.to_string()),
                }
            }
            PipelineState::Emit => {
                let Some(verdict) = cp.verdict.as_ref() else {
                    cp.abort("no verdict to emit");
                    return self.finish_step(cp, from).await;
                };
                let artifacts = self.emitter.emit(verdict).await?;
                obs::emit_artifacts_emitted(&ctx.trace_id, &artifacts.full_report);
                cp.artifacts = Some(artifacts);
                cp.advance(PipelineState::Done);
            }
            PipelineState::Done | PipelineState::Aborted => {}
        }

        self.finish_step(cp, from).await
    }

    async fn finish_step(&self, cp: RunCheckpoint, from: PipelineState) -> Result<RunCheckpoint> {
        debug_assert!(from.can_transition_to(cp.state));
        obs::emit_state_transition(cp.run_id(), from.as_str(), cp.state.as_str());
        self.persist(&cp).await?;
        Ok(cp)
    }

    fn outcome(cp: RunCheckpoint) -> Result<AuditOutcome> {
        match (cp.state, cp.verdict, cp.artifacts) {
            (PipelineState::Done, Some(verdict), Some(artifacts)) => Ok(AuditOutcome {
                run_id: cp.context.trace_id,
                verdict,
                artifacts,
            }),
            (PipelineState::Aborted, _, _) => Err(TribunalError::RunAborted {
                reason: cp.abort_reason.unwrap_or_else(|| "unknown".to_string()),
                last_completed: cp
                    .last_completed
                    .map(|s| s.as_str())
                    .unwrap_or("none")
                    .to_string(),
            }),
            (state, _, _) => Err(TribunalError::SynthesisInvariantViolation(format!(
                "run {} ended in non-terminal state {}",
                cp.context.trace_id, state
            ))),
        }
    }

    /// Step until a terminal state.
    pub async fn drive(&self, mut cp: RunCheckpoint) -> Result<AuditOutcome> {
        let started = Utc::now();
        let _in_flight = self.track(cp.run_id());
        while !cp.state.is_terminal() {
            cp = self.step(cp).await?;
        }
        let trace_id = cp.context.trace_id.clone();
        match cp.state {
            PipelineState::Done => {
                METRICS.inc_runs_completed();
                let elapsed = (Utc::now() - started).num_milliseconds().max(0) as u64;
                let pct = cp.verdict.as_ref().map(|v| v.percentage).unwrap_or(0);
                obs::emit_run_finished(&trace_id, elapsed, pct);
            }
            _ => {
                METRICS.inc_runs_aborted();
                let reason = cp.abort_reason.clone().unwrap_or_default();
                obs::emit_run_aborted(&trace_id, cp.last_completed_name(), &reason);
            }
        }
        Self::outcome(cp)
    }

    /// Run a new audit from scratch.
    pub async fn run(&self, ctx: RunContext) -> Result<AuditOutcome> {
        let span = run_span(&ctx.trace_id);
        async move {
            let cp = self.begin(ctx).await?;
            self.drive(cp).await
        }
        .instrument(span)
        .await
    }

    /// Continue a persisted run from its recorded state.
    ///
    /// Completed stages are not repeated: a run persisted at `Synthesize`
    /// resumes there without contacting any opinion producer.
    pub async fn resume(&self, run_id: &str) -> Result<AuditOutcome> {
        async move {
            let record = self.store.load(run_id).await?;
            let cp = RunCheckpoint::from_record(&record)?;
            debug!(state = %cp.state, "resuming run");
            if cp.state.is_terminal() {
                return Self::outcome(cp);
            }
            self.drive(cp).await
        }
        .instrument(run_span(run_id))
        .await
    }

    /// Run independent audits concurrently; results follow input order.
    pub async fn run_batch(&self, contexts: Vec<RunContext>) -> Vec<Result<AuditOutcome>> {
        futures::future::join_all(contexts.into_iter().map(|ctx| self.run(ctx))).await
    }
}
