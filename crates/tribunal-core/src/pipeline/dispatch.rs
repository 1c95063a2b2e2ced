//! Bounded fan-out with a full barrier.
//!
//! Every job runs in its own task under a per-job timeout, a shared
//! concurrency limit and a cancellation flag. Results come back in dispatch
//! order: each task owns its slot (its `JoinHandle`), so the barrier needs no
//! shared collection and completion order never leaks into the output.

use std::time::Duration;

use futures::future::BoxFuture;
use std::sync::Arc;
use tokio::sync::{watch, Semaphore};

/// Limits applied to one fan-out set.
#[derive(Debug, Clone)]
pub struct DispatchLimits {
    pub timeout: Duration,
    pub max_concurrent: usize,
}

impl Default for DispatchLimits {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(120),
            max_concurrent: 8,
        }
    }
}

/// How one slot settled.
#[derive(Debug, Clone, PartialEq)]
pub enum SlotOutcome<T> {
    Settled(T),
    TimedOut(Duration),
    Cancelled,
    Panicked(String),
}

/// Resolves once the flag is raised; never resolves if the sender is gone.
async fn cancelled(mut rx: watch::Receiver<bool>) {
    let fired = rx.wait_for(|flag| *flag).await.is_ok();
    if !fired {
        std::future::pending::<()>().await;
    }
}

/// Run `jobs` concurrently and wait for every one of them to settle.
pub async fn fan_out<T>(
    jobs: Vec<BoxFuture<'static, T>>,
    limits: &DispatchLimits,
    cancel: &watch::Receiver<bool>,
) -> Vec<SlotOutcome<T>>
where
    T: Send + 'static,
{
    let sem = Arc::new(Semaphore::new(limits.max_concurrent.max(1)));
    let mut tasks = Vec::with_capacity(jobs.len());

    for job in jobs {
        let sem = Arc::clone(&sem);
        let cancel_rx = cancel.clone();
        let limit = limits.timeout;

        let task = tokio::spawn(async move {
            let _permit = sem.acquire_owned().await.ok();

            if *cancel_rx.borrow() {
                return SlotOutcome::Cancelled;
            }

            tokio::select! {
                _ = cancelled(cancel_rx) => SlotOutcome::Cancelled,
                res = tokio::time::timeout(limit, job) => match res {
                    Ok(value) => SlotOutcome::Settled(value),
                    Err(_) => SlotOutcome::TimedOut(limit),
                },
            }
        });

        tasks.push(task);
    }

    let mut outcomes = Vec::with_capacity(tasks.len());
    for task in tasks {
        outcomes.push(match task.await {
            Ok(outcome) => outcome,
            Err(e) => SlotOutcome::Panicked(e.to_string()),
        });
    }
    outcomes
}
