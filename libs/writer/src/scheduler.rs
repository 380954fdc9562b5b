use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tokio::time::{Instant, sleep, sleep_until, timeout};
use tokio_util::sync::CancellationToken;

use fieldguard_api::{ConditionalStore, StoreError, StoreErrorKind, UpdatePlan};

use crate::config::WriterConfig;
use crate::outcome::{Outcome, OutcomeAggregator};
use crate::retry::RetryPolicy;

/// Why dispatch stopped before every plan finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stop {
    Deadline,
    Cancelled,
}

impl std::fmt::Display for Stop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stop::Deadline => f.write_str("deadline"),
            Stop::Cancelled => f.write_str("cancelled"),
        }
    }
}

/// Bounded-concurrency dispatcher of conditional updates.
///
/// A permit is taken before a task is spawned, so at most `concurrency`
/// tasks (and store calls) exist at any time. Outcomes are classified as:
/// success → `Applied`; condition false → `Conflict`, never retried;
/// throttling, network and timeout errors → retried with jittered backoff,
/// `FatalFailure` once attempts run out; anything else → `FatalFailure`.
pub struct Scheduler {
    store: Arc<dyn ConditionalStore>,
    table: Arc<str>,
    concurrency: usize,
    retry: RetryPolicy,
    call_timeout: Duration,
}

impl Scheduler {
    pub fn new(
        store: Arc<dyn ConditionalStore>,
        table: impl Into<Arc<str>>,
        concurrency: usize,
        retry: RetryPolicy,
        call_timeout: Duration,
    ) -> Self {
        Self {
            store,
            table: table.into(),
            concurrency: concurrency.max(1),
            retry,
            call_timeout,
        }
    }

    pub fn from_config(store: Arc<dyn ConditionalStore>, config: &WriterConfig) -> Self {
        Self::new(
            store,
            config.table.as_str(),
            config.concurrency,
            config.retry_policy(),
            config.call_timeout(),
        )
    }

    /// Dispatch every plan and wait for all of them.
    ///
    /// Returns once each plan has exactly one outcome in `stats`. When
    /// `deadline` passes or `token` is cancelled, in-flight calls are
    /// aborted and they, along with plans not yet dispatched, are recorded
    /// as abandoned `TransientFailure`s.
    pub async fn run(
        &self,
        plans: Vec<UpdatePlan>,
        stats: &Arc<OutcomeAggregator>,
        deadline: Option<Instant>,
        token: &CancellationToken,
    ) {
        warn_duplicate_keys(&plans);

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks: JoinSet<Outcome> = JoinSet::new();
        let mut pending_plans = plans.into_iter();
        let mut undispatched = 0usize;

        let stop = stop_signal(deadline, token.clone());
        tokio::pin!(stop);

        tracing::debug!(
            store = %self.store.name(),
            table = %self.table,
            plans = pending_plans.len(),
            concurrency = self.concurrency,
            "dispatching"
        );

        // ── Dispatch: permit first, then spawn ──
        let mut stopped = None;
        while let Some(plan) = pending_plans.next() {
            let permit = tokio::select! {
                biased;
                reason = &mut stop => {
                    stopped = Some(reason);
                    undispatched = 1 + pending_plans.len();
                    break;
                }
                permit = semaphore.clone().acquire_owned() => match permit {
                    Ok(p) => p,
                    Err(_) => {
                        undispatched = 1 + pending_plans.len();
                        break;
                    }
                },
            };

            let call = Call {
                store: self.store.clone(),
                table: self.table.clone(),
                retry: self.retry,
                call_timeout: self.call_timeout,
                stats: stats.clone(),
            };
            tasks.spawn(async move {
                let _permit = permit;
                call.execute(plan).await
            });
        }

        // ── Join ──
        if stopped.is_none() && undispatched == 0 {
            loop {
                tokio::select! {
                    biased;
                    reason = &mut stop => {
                        stopped = Some(reason);
                        break;
                    }
                    joined = tasks.join_next() => match joined {
                        Some(result) => record_joined(stats, result),
                        None => break,
                    },
                }
            }
        }

        if stopped.is_some() || undispatched > 0 {
            tracing::warn!(
                table = %self.table,
                reason = %stopped.map(|s| s.to_string()).unwrap_or_else(|| "closed".into()),
                in_flight = tasks.len(),
                undispatched,
                "stopping dispatch, abandoning unfinished writes"
            );
            tasks.abort_all();
            while let Some(result) = tasks.join_next().await {
                record_joined(stats, result);
            }
            for _ in 0..undispatched {
                stats.record_abandoned();
            }
        }
    }
}

async fn stop_signal(deadline: Option<Instant>, token: CancellationToken) -> Stop {
    match deadline {
        Some(at) => tokio::select! {
            _ = sleep_until(at) => Stop::Deadline,
            _ = token.cancelled() => Stop::Cancelled,
        },
        None => {
            token.cancelled().await;
            Stop::Cancelled
        }
    }
}

fn record_joined(stats: &OutcomeAggregator, result: Result<Outcome, JoinError>) {
    match result {
        Ok(outcome) => stats.record(outcome),
        Err(e) if e.is_cancelled() => stats.record_abandoned(),
        Err(e) => {
            tracing::error!(error = %e, "write task panicked");
            stats.record(Outcome::FatalFailure);
        }
    }
}

/// Same-key records in one job race; the shadow conditions keep the
/// result correct per field but which one lands first is unspecified.
fn warn_duplicate_keys(plans: &[UpdatePlan]) {
    let mut seen = HashSet::with_capacity(plans.len());
    for plan in plans {
        let key = (plan.key().kind(), plan.key().to_string());
        if !seen.insert(key) {
            tracing::warn!(key = %plan.key(), version = plan.version(), "duplicate key in one batch, writes will race");
        }
    }
}

// ════════════════════════════════════════════════════════════════
//  Single plan execution
// ════════════════════════════════════════════════════════════════

struct Call {
    store: Arc<dyn ConditionalStore>,
    table: Arc<str>,
    retry: RetryPolicy,
    call_timeout: Duration,
    stats: Arc<OutcomeAggregator>,
}

impl Call {
    async fn execute(self, plan: UpdatePlan) -> Outcome {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            self.stats.store_call();

            let result = match timeout(self.call_timeout, self.store.update_if(&self.table, &plan)).await {
                Ok(r) => r,
                Err(_) => Err(StoreError::timeout(format!(
                    "no response within {} ms",
                    self.call_timeout.as_millis()
                ))),
            };

            let e = match result {
                Ok(()) => {
                    tracing::debug!(
                        key = %plan.key(),
                        version = plan.version(),
                        fields = plan.writes().len(),
                        attempt,
                        "applied"
                    );
                    return Outcome::Applied;
                }
                Err(e) => e,
            };

            if e.kind() == StoreErrorKind::ConditionFailed {
                tracing::info!(
                    key = %plan.key(),
                    version = plan.version(),
                    "conflict, a field already holds a newer or equal version"
                );
                return Outcome::Conflict;
            }

            if e.kind().is_transient() && self.retry.should_retry(attempt) {
                let delay = self.retry.delay(attempt);
                self.stats.retried();
                tracing::warn!(
                    key = %plan.key(),
                    attempt,
                    kind = %e.kind(),
                    error = %e,
                    delay_ms = delay.as_millis() as u64,
                    "transient store error, retrying"
                );
                sleep(delay).await;
                continue;
            }

            tracing::error!(
                key = %plan.key(),
                version = plan.version(),
                attempt,
                kind = %e.kind(),
                error = %e,
                "write failed"
            );
            return Outcome::FatalFailure;
        }
    }
}
