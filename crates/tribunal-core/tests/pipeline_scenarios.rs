mod support;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use support::*;
use tribunal_core::{
    read_verdict, CheckpointStore, EvidenceKind, FsReportEmitter, JudicialOpinion,
    MemoryCheckpointStore, PipelineState, ResolutionRule, RunCheckpoint, RunContext,
    TribunalError,
};

#[tokio::test]
async fn test_all_evidence_ok_yields_plain_weighted_average() {
    tribunal_core::telemetry::init_tracing(false, tracing::Level::DEBUG);
    let tmp = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryCheckpointStore::new());
    let producer = ScriptedProducer::new(steady_opinion);
    let controller = controller(
        producer.clone(),
        Arc::new(FsReportEmitter::new(tmp.path())),
        store.clone(),
    )
    .with_collector(StaticCollector::new(EvidenceKind::Repository))
    .with_collector(StaticCollector::new(EvidenceKind::Document))
    .with_collector(StaticCollector::new(EvidenceKind::Visual));

    let outcome = controller.run(full_context("run-a")).await.unwrap();
    let verdict = &outcome.verdict;

    assert_eq!(verdict.criteria.len(), 5);
    for c in &verdict.criteria {
        // (3 + 5 + 4) / 3 = 4, variance 2 is not above the threshold
        assert_eq!(c.score, 4);
        assert_eq!(c.rules, vec![ResolutionRule::WeightedAverage]);
        assert_eq!(c.variance, 2);
        assert!(c.dissent_note.is_none());
    }
    assert_eq!(verdict.overall_score, 4.0);
    assert_eq!(verdict.max_possible, 5.0);
    assert_eq!(verdict.percentage, 80);
    assert!(verdict.triggered_rules.is_empty());
    assert!(verdict.missing_evidence.is_empty());
    assert_eq!(producer.calls(), 15);

    let on_disk = read_verdict(tmp.path(), "run-a").unwrap();
    assert_eq!(&on_disk, verdict);

    let record = store.load("run-a").await.unwrap();
    assert_eq!(record.state, "done");
    // initial + one per transition through done
    assert_eq!(store.save_count(), 7);
}

#[tokio::test]
async fn test_exhausted_retry_proceeds_with_missing_kind_and_down_weights_citers() {
    let tmp = tempfile::tempdir().unwrap();
    let document = FlakyCollector::new(EvidenceKind::Document, 5);
    let producer = ScriptedProducer::new(|criterion, persona| {
        if persona.id == "defense" {
            JudicialOpinion::ok(
                &criterion.id,
                &persona.id,
                5,
                "the architecture document explains everything",
                vec!["document:summary".to_string()],
            )
        } else {
            JudicialOpinion::ok(
                &criterion.id,
                &persona.id,
                3,
                "the code is adequate",
                vec!["repository:files".to_string()],
            )
        }
    });
    let controller = controller(
        producer,
        Arc::new(FsReportEmitter::new(tmp.path())),
        Arc::new(MemoryCheckpointStore::new()),
    )
    .with_collector(StaticCollector::new(EvidenceKind::Repository))
    .with_collector(document.clone())
    .with_collector(StaticCollector::new(EvidenceKind::Visual));

    let outcome = controller.run(full_context("run-b")).await.unwrap();
    let verdict = &outcome.verdict;

    // initial attempt plus one retry
    assert_eq!(document.calls.load(Ordering::SeqCst), 2);
    assert_eq!(
        verdict.missing_evidence.iter().copied().collect::<Vec<_>>(),
        vec![EvidenceKind::Document]
    );
    assert!(verdict.triggered_rules.contains(&ResolutionRule::FactSupremacy));
    for c in &verdict.criteria {
        assert_eq!(c.down_weighted, vec!["defense".to_string()]);
        assert!(c.has_rule(ResolutionRule::FactSupremacy));
        assert_eq!(c.score, 3);
    }
}

#[tokio::test]
async fn test_retry_recovers_missing_evidence() {
    let tmp = tempfile::tempdir().unwrap();
    let visual = FlakyCollector::new(EvidenceKind::Visual, 1);
    let controller = controller(
        ScriptedProducer::new(steady_opinion),
        Arc::new(FsReportEmitter::new(tmp.path())),
        Arc::new(MemoryCheckpointStore::new()),
    )
    .with_collector(StaticCollector::new(EvidenceKind::Repository))
    .with_collector(StaticCollector::new(EvidenceKind::Document))
    .with_collector(visual.clone());

    let outcome = controller.run(full_context("run-retry")).await.unwrap();
    assert_eq!(visual.calls.load(Ordering::SeqCst), 2);
    assert!(outcome.verdict.missing_evidence.is_empty());
    assert_eq!(outcome.verdict.percentage, 80);
}

#[tokio::test]
async fn test_security_flag_caps_criterion_at_ceiling() {
    let tmp = tempfile::tempdir().unwrap();
    let producer = ScriptedProducer::new(|criterion, persona| {
        if criterion.id == "forensic_accuracy_code" && persona.id == "prosecutor" {
            JudicialOpinion::ok(
                &criterion.id,
                &persona.id,
                4,
                "Shell tool allows command injection from user input",
                vec![],
            )
        } else if persona.id == "defense" {
            JudicialOpinion::ok(&criterion.id, &persona.id, 5, "well built", vec![])
        } else {
            JudicialOpinion::ok(&criterion.id, &persona.id, 4, "solid work", vec![])
        }
    });
    let controller = controller(
        producer,
        Arc::new(FsReportEmitter::new(tmp.path())),
        Arc::new(MemoryCheckpointStore::new()),
    )
    .with_collector(StaticCollector::new(EvidenceKind::Repository));

    let outcome = controller
        .run(RunContext::new("repo").with_trace_id("run-c"))
        .await
        .unwrap();
    let verdict = &outcome.verdict;

    let flagged = verdict.criterion("forensic_accuracy_code").unwrap();
    // raw average 4.33 capped to the ceiling
    assert_eq!(flagged.score, 2);
    assert_eq!(flagged.applied_rule(), ResolutionRule::SecurityOverride);
    assert!(verdict.triggered_rules.contains(&ResolutionRule::SecurityOverride));

    let other = verdict.criterion("judicial_nuance").unwrap();
    assert_eq!(other.score, 4);
    assert!(!other.has_rule(ResolutionRule::SecurityOverride));
}

#[tokio::test]
async fn test_all_judges_failing_one_criterion_scores_zero() {
    let tmp = tempfile::tempdir().unwrap();
    let producer = ScriptedProducer::new(|criterion, persona| {
        if criterion.id == "judicial_nuance" {
            JudicialOpinion::failed(&criterion.id, &persona.id, "model refused")
        } else {
            JudicialOpinion::ok(&criterion.id, &persona.id, 4, "consistent", vec![])
        }
    });
    let controller = controller(
        producer,
        Arc::new(FsReportEmitter::new(tmp.path())),
        Arc::new(MemoryCheckpointStore::new()),
    )
    .with_collector(StaticCollector::new(EvidenceKind::Repository));

    let outcome = controller
        .run(RunContext::new("repo").with_trace_id("run-d"))
        .await
        .unwrap();
    let verdict = &outcome.verdict;

    let nuance = verdict.criterion("judicial_nuance").unwrap();
    assert_eq!(nuance.score, 0);
    assert_eq!(nuance.rules, vec![ResolutionRule::NoOpinions]);
    assert_eq!(nuance.failed_personas.len(), 3);
    assert!(verdict.triggered_rules.contains(&ResolutionRule::NoOpinions));

    // (4 * 4 + 0) / 5 criteria of equal weight
    assert!((verdict.overall_score - 3.2).abs() < 1e-9);
    assert_eq!(verdict.percentage, 64);
}

#[tokio::test]
async fn test_resume_at_synthesize_does_not_reinvoke_judges() {
    let tmp = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryCheckpointStore::new());
    let first_producer = ScriptedProducer::new(steady_opinion);
    let first = controller(
        first_producer.clone(),
        Arc::new(FsReportEmitter::new(tmp.path())),
        store.clone(),
    )
    .with_collector(StaticCollector::new(EvidenceKind::Repository));

    // drive until opinions are collected, then "crash"
    let mut cp = first
        .begin(RunContext::new("repo").with_trace_id("run-e"))
        .await
        .unwrap();
    while cp.state != PipelineState::Synthesize {
        cp = first.step(cp).await.unwrap();
    }
    drop(first);
    assert_eq!(first_producer.calls(), 15);

    let persisted = RunCheckpoint::from_record(&store.load("run-e").await.unwrap()).unwrap();
    assert_eq!(persisted.state, PipelineState::Synthesize);
    assert_eq!(persisted.opinions.len(), 5);

    let second_producer = ScriptedProducer::new(|criterion, persona| {
        JudicialOpinion::failed(&criterion.id, &persona.id, "must not be called")
    });
    let second = controller(
        second_producer.clone(),
        Arc::new(FsReportEmitter::new(tmp.path())),
        store.clone(),
    );

    let outcome = second.resume("run-e").await.unwrap();
    assert_eq!(second_producer.calls(), 0);
    assert_eq!(outcome.verdict.percentage, 80);
    assert_eq!(store.load("run-e").await.unwrap().state, "done");

    // a finished run resumes to the stored outcome
    let again = second.resume("run-e").await.unwrap();
    assert_eq!(again, outcome);
}

#[tokio::test]
async fn test_unresolvable_target_aborts_run() {
    let tmp = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryCheckpointStore::new());
    let producer = ScriptedProducer::new(steady_opinion);
    let controller = controller(
        producer.clone(),
        Arc::new(FsReportEmitter::new(tmp.path())),
        store.clone(),
    )
    .with_collector(Arc::new(UnresolvableCollector));

    let err = controller
        .run(RunContext::new("missing-repo").with_trace_id("run-x"))
        .await
        .unwrap_err();
    match err {
        TribunalError::RunAborted {
            reason,
            last_completed,
        } => {
            assert!(reason.contains("repository not found"));
            assert_eq!(last_completed, "none");
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert_eq!(producer.calls(), 0);
    assert_eq!(store.load("run-x").await.unwrap().state, "aborted");
}

#[tokio::test]
async fn test_missing_collector_for_required_kind_aborts() {
    let tmp = tempfile::tempdir().unwrap();
    let controller = controller(
        ScriptedProducer::new(steady_opinion),
        Arc::new(FsReportEmitter::new(tmp.path())),
        Arc::new(MemoryCheckpointStore::new()),
    );

    let err = controller
        .run(RunContext::new("repo").with_trace_id("run-none"))
        .await
        .unwrap_err();
    assert!(matches!(err, TribunalError::RunAborted { .. }));
}

#[tokio::test]
async fn test_kinds_without_input_are_not_required() {
    let tmp = tempfile::tempdir().unwrap();
    let controller = controller(
        ScriptedProducer::new(steady_opinion),
        Arc::new(FsReportEmitter::new(tmp.path())),
        Arc::new(MemoryCheckpointStore::new()),
    )
    .with_collector(StaticCollector::new(EvidenceKind::Repository));

    let outcome = controller
        .run(RunContext::new("repo").with_trace_id("run-repo-only"))
        .await
        .unwrap();
    assert!(outcome.verdict.missing_evidence.is_empty());
    assert!(outcome.verdict.evidence_summary.contains("document: skipped"));
}
