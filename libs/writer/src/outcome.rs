use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;

/// Result of one plan's execution. Recorded exactly once per plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Every write landed.
    Applied,
    /// At least one field was already at a newer or equal version; nothing written.
    Conflict,
    /// The call did not finish (deadline, cancellation); may be replayed.
    TransientFailure,
    /// Permanent error, or transient retries exhausted.
    FatalFailure,
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Applied => f.write_str("applied"),
            Outcome::Conflict => f.write_str("conflict"),
            Outcome::TransientFailure => f.write_str("transient_failure"),
            Outcome::FatalFailure => f.write_str("fatal_failure"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    Live,
    DryRun,
}

// ════════════════════════════════════════════════════════════════
//  Aggregator
// ════════════════════════════════════════════════════════════════

/// Lock-free counters shared by every dispatched task of one invocation.
#[derive(Debug, Default)]
pub struct OutcomeAggregator {
    received: AtomicU64,
    applied: AtomicU64,
    conflicted: AtomicU64,
    transient_failed: AtomicU64,
    fatal_failed: AtomicU64,
    decode_skipped: AtomicU64,
    schema_skipped: AtomicU64,
    no_op: AtomicU64,
    retries: AtomicU64,
    abandoned: AtomicU64,
    store_calls: AtomicU64,
}

impl OutcomeAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, outcome: Outcome) {
        let counter = match outcome {
            Outcome::Applied => &self.applied,
            Outcome::Conflict => &self.conflicted,
            Outcome::TransientFailure => &self.transient_failed,
            Outcome::FatalFailure => &self.fatal_failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// A plan stopped by deadline or cancellation, dispatched or not.
    pub fn record_abandoned(&self) {
        self.abandoned.fetch_add(1, Ordering::Relaxed);
        self.record(Outcome::TransientFailure);
    }

    pub fn add_received(&self, n: u64) {
        self.received.fetch_add(n, Ordering::Relaxed);
    }

    pub fn decode_skipped(&self) {
        self.decode_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn schema_skipped(&self) {
        self.schema_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn no_op(&self) {
        self.no_op.fetch_add(1, Ordering::Relaxed);
    }

    pub fn retried(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn store_call(&self) {
        self.store_calls.fetch_add(1, Ordering::Relaxed);
    }

    /// Snapshot the counters. Call after every task has been joined.
    pub fn summary(&self, mode: RunMode, elapsed: Duration) -> Summary {
        let get = |c: &AtomicU64| c.load(Ordering::Relaxed);
        Summary {
            mode,
            received: get(&self.received),
            applied: get(&self.applied),
            conflicted: get(&self.conflicted),
            transient_failed: get(&self.transient_failed),
            fatal_failed: get(&self.fatal_failed),
            decode_skipped: get(&self.decode_skipped),
            schema_skipped: get(&self.schema_skipped),
            no_op: get(&self.no_op),
            retries: get(&self.retries),
            abandoned: get(&self.abandoned),
            store_calls: get(&self.store_calls),
            elapsed_ms: elapsed.as_millis() as u64,
        }
    }
}

// ════════════════════════════════════════════════════════════════
//  Summary
// ════════════════════════════════════════════════════════════════

/// Aggregate result of one invocation.
///
/// `applied + conflicted + transient_failed + fatal_failed + no_op +
/// decode_skipped + schema_skipped == received` once every plan is accounted for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub mode: RunMode,
    pub received: u64,
    pub applied: u64,
    pub conflicted: u64,
    pub transient_failed: u64,
    pub fatal_failed: u64,
    pub decode_skipped: u64,
    pub schema_skipped: u64,
    pub no_op: u64,
    pub retries: u64,
    pub abandoned: u64,
    pub store_calls: u64,
    pub elapsed_ms: u64,
}

impl Summary {
    /// Records that were planned and handed to the scheduler or the dry-run gate.
    pub fn planned(&self) -> u64 {
        self.applied + self.conflicted + self.transient_failed + self.fatal_failed
    }

    /// Every received record ended up in exactly one bucket.
    pub fn is_balanced(&self) -> bool {
        self.planned() + self.no_op + self.decode_skipped + self.schema_skipped == self.received
    }
}

impl std::fmt::Display for Summary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Processed {} record(s) in {} ms", self.received, self.elapsed_ms)?;
        if self.mode == RunMode::DryRun {
            f.write_str(" (DRY_RUN)")?;
        }
        write!(
            f,
            ": applied={} conflicted={} transient={} fatal={} no_op={} decode_skipped={} schema_skipped={} retries={} abandoned={}",
            self.applied,
            self.conflicted,
            self.transient_failed,
            self.fatal_failed,
            self.no_op,
            self.decode_skipped,
            self.schema_skipped,
            self.retries,
            self.abandoned,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn counts_each_outcome_once() {
        let agg = OutcomeAggregator::new();
        agg.add_received(5);
        agg.record(Outcome::Applied);
        agg.record(Outcome::Applied);
        agg.record(Outcome::Conflict);
        agg.record_abandoned();
        agg.schema_skipped();

        let s = agg.summary(RunMode::Live, Duration::from_millis(12));
        assert_eq!(s.applied, 2);
        assert_eq!(s.conflicted, 1);
        assert_eq!(s.transient_failed, 1);
        assert_eq!(s.abandoned, 1);
        assert_eq!(s.planned(), 4);
        assert!(s.is_balanced());
    }

    #[test]
    fn concurrent_recording_is_not_lost() {
        let agg = Arc::new(OutcomeAggregator::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let agg = agg.clone();
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        agg.record(Outcome::Applied);
                        agg.store_call();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        let s = agg.summary(RunMode::Live, Duration::ZERO);
        assert_eq!(s.applied, 8000);
        assert_eq!(s.store_calls, 8000);
    }

    #[test]
    fn display_marks_dry_run() {
        let agg = OutcomeAggregator::new();
        agg.add_received(1);
        agg.record(Outcome::Applied);

        let live = agg.summary(RunMode::Live, Duration::from_millis(3)).to_string();
        assert!(live.starts_with("Processed 1 record(s) in 3 ms: applied=1"));
        assert!(!live.contains("DRY_RUN"));

        let dry = agg.summary(RunMode::DryRun, Duration::from_millis(3)).to_string();
        assert!(dry.starts_with("Processed 1 record(s) in 3 ms (DRY_RUN): "));
    }

    #[test]
    fn serializes_mode_in_snake_case() {
        let s = OutcomeAggregator::new().summary(RunMode::DryRun, Duration::ZERO);
        let json = serde_json::to_value(&s).unwrap();
        assert_eq!(json["mode"], "dry_run");
        assert_eq!(json["received"], 0);
    }
}
