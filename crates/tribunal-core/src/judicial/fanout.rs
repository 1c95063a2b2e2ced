//! Judicial fan-out/fan-in.
//!
//! Issues one request per (criterion x persona), waits for every slot to
//! settle, then assembles one [`OpinionSet`] per criterion in rubric order.

use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::watch;
use tracing::instrument;

use crate::domain::{EvidenceBundle, JudicialOpinion, OpinionSet, Persona, Rubric};
use crate::judicial::producer::OpinionProducer;
use crate::metrics::METRICS;
use crate::obs;
use crate::pipeline::dispatch::{fan_out, DispatchLimits, SlotOutcome};

fn settle_opinion(
    criterion_id: &str,
    persona: &str,
    outcome: SlotOutcome<JudicialOpinion>,
) -> JudicialOpinion {
    match outcome {
        SlotOutcome::Settled(op) if op.criterion_id == criterion_id && op.persona == persona => op,
        SlotOutcome::Settled(op) => JudicialOpinion::failed(
            criterion_id,
            persona,
            format!(
                "producer answered for {}/{} instead",
                op.criterion_id, op.persona
            ),
        ),
        SlotOutcome::TimedOut(limit) => {
            METRICS.inc_opinion_timeouts();
            JudicialOpinion::failed(criterion_id, persona, format!("timed out after {limit:?}"))
        }
        SlotOutcome::Cancelled => JudicialOpinion::failed(criterion_id, persona, "cancelled"),
        SlotOutcome::Panicked(msg) => {
            JudicialOpinion::failed(criterion_id, persona, format!("producer panicked: {msg}"))
        }
    }
}

/// Request every (criterion, persona) opinion concurrently and fan in.
///
/// Returns exactly one set per rubric criterion, each with exactly one slot
/// per persona.
#[instrument(skip_all, fields(criteria = rubric.len(), personas = personas.len()))]
pub async fn collect_opinions(
    run_id: &str,
    producer: Arc<dyn OpinionProducer>,
    bundle: Arc<EvidenceBundle>,
    rubric: &Rubric,
    personas: &[Persona],
    limits: &DispatchLimits,
    cancel: &watch::Receiver<bool>,
) -> Vec<OpinionSet> {
    let mut keys = Vec::new();
    let mut jobs: Vec<BoxFuture<'static, JudicialOpinion>> = Vec::new();

    for criterion in &rubric.dimensions {
        for persona in personas {
            let producer = Arc::clone(&producer);
            let bundle = Arc::clone(&bundle);
            let criterion = criterion.clone();
            let persona = persona.clone();
            keys.push((criterion.id.clone(), persona.id.clone()));
            METRICS.inc_opinion_invocations();
            jobs.push(
                async move { producer.produce(&bundle, &criterion, &persona).await }.boxed(),
            );
        }
    }

    let outcomes = fan_out(jobs, limits, cancel).await;

    let opinions: Vec<JudicialOpinion> = keys
        .into_iter()
        .zip(outcomes)
        .map(|((criterion_id, persona), outcome)| {
            let op = settle_opinion(&criterion_id, &persona, outcome);
            if let crate::domain::OpinionStatus::Failed { reason } = &op.status {
                METRICS.inc_opinion_failures();
                obs::emit_opinion_failed(run_id, &criterion_id, &persona, reason);
            }
            op
        })
        .collect();

    rubric
        .dimensions
        .iter()
        .map(|c| {
            OpinionSet::assemble(
                &c.id,
                personas,
                opinions.iter().filter(|o| o.criterion_id == c.id).cloned(),
            )
        })
        .collect()
}
