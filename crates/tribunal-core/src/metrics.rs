//! Global atomic counters for tribunal runs.
//!
//! Counters are incremented silently at the call site. Call
//! [`Metrics::flush`] to emit current values as a single
//! `tracing::info!` event (e.g. at the end of an audit).

use std::sync::atomic::{AtomicU64, Ordering};

/// Global metrics singleton.
pub static METRICS: Metrics = Metrics::new();

pub struct Metrics {
    collector_invocations: AtomicU64,
    collector_failures: AtomicU64,
    evidence_retries: AtomicU64,
    opinion_invocations: AtomicU64,
    opinion_failures: AtomicU64,
    opinion_timeouts: AtomicU64,
    runs_completed: AtomicU64,
    runs_aborted: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            collector_invocations: AtomicU64::new(0),
            collector_failures: AtomicU64::new(0),
            evidence_retries: AtomicU64::new(0),
            opinion_invocations: AtomicU64::new(0),
            opinion_failures: AtomicU64::new(0),
            opinion_timeouts: AtomicU64::new(0),
            runs_completed: AtomicU64::new(0),
            runs_aborted: AtomicU64::new(0),
        }
    }

    fn bump(counter: &AtomicU64, name: &'static str) {
        counter.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = name, "counter incremented");
    }

    pub fn inc_collector_invocations(&self) {
        Self::bump(&self.collector_invocations, "collector_invocations");
    }

    pub fn inc_collector_failures(&self) {
        Self::bump(&self.collector_failures, "collector_failures");
    }

    pub fn inc_evidence_retries(&self) {
        Self::bump(&self.evidence_retries, "evidence_retries");
    }

    pub fn inc_opinion_invocations(&self) {
        Self::bump(&self.opinion_invocations, "opinion_invocations");
    }

    pub fn inc_opinion_failures(&self) {
        Self::bump(&self.opinion_failures, "opinion_failures");
    }

    pub fn inc_opinion_timeouts(&self) {
        Self::bump(&self.opinion_timeouts, "opinion_timeouts");
    }

    pub fn inc_runs_completed(&self) {
        Self::bump(&self.runs_completed, "runs_completed");
    }

    pub fn inc_runs_aborted(&self) {
        Self::bump(&self.runs_aborted, "runs_aborted");
    }

    /// Emit all current counter values as a single `info!` event.
    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            collector_invocations = self.collector_invocations(),
            collector_failures = self.collector_failures(),
            evidence_retries = self.evidence_retries(),
            opinion_invocations = self.opinion_invocations(),
            opinion_failures = self.opinion_failures(),
            opinion_timeouts = self.opinion_timeouts(),
            runs_completed = self.runs_completed(),
            runs_aborted = self.runs_aborted(),
        );
    }

    pub fn collector_invocations(&self) -> u64 {
        self.collector_invocations.load(Ordering::Relaxed)
    }

    pub fn collector_failures(&self) -> u64 {
        self.collector_failures.load(Ordering::Relaxed)
    }

    pub fn evidence_retries(&self) -> u64 {
        self.evidence_retries.load(Ordering::Relaxed)
    }

    pub fn opinion_invocations(&self) -> u64 {
        self.opinion_invocations.load(Ordering::Relaxed)
    }

    pub fn opinion_failures(&self) -> u64 {
        self.opinion_failures.load(Ordering::Relaxed)
    }

    pub fn opinion_timeouts(&self) -> u64 {
        self.opinion_timeouts.load(Ordering::Relaxed)
    }

    pub fn runs_completed(&self) -> u64 {
        self.runs_completed.load(Ordering::Relaxed)
    }

    pub fn runs_aborted(&self) -> u64 {
        self.runs_aborted.load(Ordering::Relaxed)
    }

    /// Reset all counters to zero (useful in tests).
    pub fn reset(&self) {
        for counter in [
            &self.collector_invocations,
            &self.collector_failures,
            &self.evidence_retries,
            &self.opinion_invocations,
            &self.opinion_failures,
            &self.opinion_timeouts,
            &self.runs_completed,
            &self.runs_aborted,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}
