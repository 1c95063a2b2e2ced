//! Evidence collector adapter contract and bounded dispatch.
//!
//! A collector never fails: every outcome, including timeouts and panics
//! inside the collector, settles into an [`EvidenceRecord`].

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::watch;
use tracing::warn;

use crate::domain::{EvidenceKind, EvidenceRecord, RunContext};
use crate::metrics::METRICS;
use crate::pipeline::dispatch::{fan_out, DispatchLimits, SlotOutcome};

/// Produces one typed evidence record for a run.
#[async_trait]
pub trait EvidenceCollector: Send + Sync {
    fn kind(&self) -> EvidenceKind;

    /// Gather evidence for `ctx`. Failures are reported through the record status.
    async fn collect(&self, ctx: &RunContext) -> EvidenceRecord;
}

/// Registered collectors keyed by kind.
pub type CollectorSet = BTreeMap<EvidenceKind, Arc<dyn EvidenceCollector>>;

/// Turn a fan-out slot into a record of the expected kind.
pub fn settle_record(
    kind: EvidenceKind,
    outcome: SlotOutcome<EvidenceRecord>,
    attempt: u32,
) -> EvidenceRecord {
    let record = match outcome {
        SlotOutcome::Settled(record) if record.kind == kind => record,
        SlotOutcome::Settled(record) => EvidenceRecord::failed(
            kind,
            format!("collector returned {} evidence", record.kind),
            true,
        ),
        SlotOutcome::TimedOut(limit) => {
            EvidenceRecord::failed(kind, format!("timed out after {limit:?}"), true)
        }
        SlotOutcome::Cancelled => EvidenceRecord::failed(kind, "cancelled", true),
        SlotOutcome::Panicked(msg) => {
            EvidenceRecord::failed(kind, format!("collector panicked: {msg}"), true)
        }
    };
    if !record.is_ok() {
        METRICS.inc_collector_failures();
    }
    record.with_attempt(attempt)
}

/// Invoke the collectors for `kinds` concurrently and wait for all of them.
///
/// Kinds the run has no input for settle as `skipped` without an invocation.
/// A kind with input but no registered collector settles as an unresolvable
/// failure. Output is ordered by kind.
pub async fn dispatch_collectors(
    collectors: &CollectorSet,
    ctx: &Arc<RunContext>,
    kinds: &BTreeSet<EvidenceKind>,
    attempt: u32,
    limits: &DispatchLimits,
    cancel: &watch::Receiver<bool>,
) -> Vec<EvidenceRecord> {
    let mut slots: Vec<(EvidenceKind, Option<EvidenceRecord>)> = Vec::new();
    let mut jobs: Vec<BoxFuture<'static, EvidenceRecord>> = Vec::new();

    for &kind in kinds {
        if !ctx.has_input(kind) {
            slots.push((
                kind,
                Some(EvidenceRecord::skipped(kind, "no input for this run").with_attempt(attempt)),
            ));
            continue;
        }
        match collectors.get(&kind) {
            Some(collector) => {
                let collector = Arc::clone(collector);
                let ctx = Arc::clone(ctx);
                METRICS.inc_collector_invocations();
                jobs.push(async move { collector.collect(&ctx).await }.boxed());
                slots.push((kind, None));
            }
            None => {
                warn!(kind = %kind, "no collector registered");
                slots.push((
                    kind,
                    Some(
                        EvidenceRecord::failed(kind, "no collector registered", false)
                            .with_attempt(attempt),
                    ),
                ));
            }
        }
    }

    let mut outcomes = fan_out(jobs, limits, cancel).await.into_iter();
    slots
        .into_iter()
        .map(|(kind, preset)| match preset {
            Some(record) => record,
            None => match outcomes.next() {
                Some(outcome) => settle_record(kind, outcome, attempt),
                None => EvidenceRecord::failed(kind, "collector slot lost", true)
                    .with_attempt(attempt),
            },
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    struct FixedCollector(EvidenceRecord);

    #[async_trait]
    impl EvidenceCollector for FixedCollector {
        fn kind(&self) -> EvidenceKind {
            self.0.kind
        }
        async fn collect(&self, _ctx: &RunContext) -> EvidenceRecord {
            self.0.clone()
        }
    }

    #[test]
    fn test_settle_record_rejects_wrong_kind() {
        let rec = settle_record(
            EvidenceKind::Document,
            SlotOutcome::Settled(EvidenceRecord::ok(EvidenceKind::Repository, json!({}))),
            1,
        );
        assert_eq!(rec.kind, EvidenceKind::Document);
        assert!(!rec.is_ok());
        assert_eq!(rec.attempt, 1);
    }

    #[test]
    fn test_settle_record_timeout_is_retryable() {
        let rec = settle_record(
            EvidenceKind::Visual,
            SlotOutcome::TimedOut(Duration::from_secs(3)),
            0,
        );
        assert!(!rec.is_unresolvable());
        assert!(matches!(rec.status, crate::domain::EvidenceStatus::Failed { ref reason, .. } if reason.contains("3s")));

        let rec = settle_record(
            EvidenceKind::Document,
            SlotOutcome::TimedOut(Duration::from_millis(250)),
            1,
        );
        assert!(matches!(rec.status, crate::domain::EvidenceStatus::Failed { ref reason, .. } if reason == "timed out after 250ms"));
    }

    #[tokio::test]
    async fn test_dispatch_skips_kinds_without_input() {
        let mut collectors: CollectorSet = BTreeMap::new();
        collectors.insert(
            EvidenceKind::Repository,
            Arc::new(FixedCollector(EvidenceRecord::ok(
                EvidenceKind::Repository,
                json!({"commits": 12}),
            ))),
        );
        let ctx = Arc::new(RunContext::new("repo"));
        let (_tx, rx) = watch::channel(false);
        let kinds: BTreeSet<_> = EvidenceKind::ALL.into_iter().collect();

        let records =
            dispatch_collectors(&collectors, &ctx, &kinds, 0, &DispatchLimits::default(), &rx)
                .await;
        assert_eq!(records.len(), 3);
        assert!(records[0].is_ok());
        assert!(matches!(
            records[1].status,
            crate::domain::EvidenceStatus::Skipped { .. }
        ));
        assert!(matches!(
            records[2].status,
            crate::domain::EvidenceStatus::Skipped { .. }
        ));
    }

    #[tokio::test]
    async fn test_dispatch_without_collector_is_unresolvable() {
        let collectors: CollectorSet = BTreeMap::new();
        let ctx = Arc::new(RunContext::new("repo"));
        let (_tx, rx) = watch::channel(false);
        let kinds: BTreeSet<_> = [EvidenceKind::Repository].into_iter().collect();

        let records =
            dispatch_collectors(&collectors, &ctx, &kinds, 0, &DispatchLimits::default(), &rx)
                .await;
        assert!(records[0].is_unresolvable());
    }
}
