use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;

use crate::dispatch::cancel::CancellationController;

/// Process-lifetime request and cost counters.
///
/// Invariants: `successful_requests + failed_requests <= total_requests` and
/// `total_cost == input_cost + output_cost` after every update.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionCounters {
    /// Wall-clock minutes since the Unix epoch of the current rate bucket.
    pub current_minute: u64,
    pub requests_this_minute: u64,
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub cancelled_requests: u64,
    pub input_cost: f64,
    pub output_cost: f64,
    pub total_cost: f64,
}

impl SessionCounters {
    pub fn record_issued(&mut self) {
        self.total_requests += 1;
    }

    /// A 2xx reply also consumes one slot of the current minute's budget.
    pub fn record_success(&mut self) {
        self.successful_requests += 1;
        self.requests_this_minute += 1;
    }

    pub fn record_failure(&mut self) {
        self.failed_requests += 1;
    }

    pub fn record_cancelled(&mut self) {
        self.cancelled_requests += 1;
    }

    /// Add both cost components and reconcile the total in the same step.
    pub fn add_cost(&mut self, input_cost: f64, output_cost: f64) {
        self.input_cost += input_cost;
        self.output_cost += output_cost;
        self.total_cost = self.input_cost + self.output_cost;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Counters plus the number of resets they have been through.
#[derive(Default)]
struct Ledger {
    epoch: u64,
    counters: SessionCounters,
}

/// Explicit per-widget session state passed into every orchestrator call.
///
/// Counter mutations happen under a lock that is never held across an
/// await, so each resumed call applies its update as one step. A request
/// issued before a reset never records its outcome afterwards.
pub struct Session {
    ledger: Mutex<Ledger>,
    calls: CancellationController,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            ledger: Mutex::new(Ledger::default()),
            calls: CancellationController::new(),
        }
    }

    pub fn calls(&self) -> &CancellationController {
        &self.calls
    }

    fn lock(&self) -> MutexGuard<'_, Ledger> {
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply one synchronous mutation to the counters.
    pub fn update<R>(&self, f: impl FnOnce(&mut SessionCounters) -> R) -> R {
        f(&mut self.lock().counters)
    }

    /// Count one request as issued and return the reset epoch it belongs to.
    pub fn record_issued(&self) -> u64 {
        let mut ledger = self.lock();
        ledger.counters.record_issued();
        ledger.epoch
    }

    /// Apply `f` only if the counters have not been reset since `epoch`.
    pub fn update_since<R>(&self, epoch: u64, f: impl FnOnce(&mut SessionCounters) -> R) -> Option<R> {
        let mut ledger = self.lock();
        (ledger.epoch == epoch).then(|| f(&mut ledger.counters))
    }

    pub fn counters(&self) -> SessionCounters {
        self.lock().counters.clone()
    }

    /// Zero all counters. Calls in flight keep running, but their outcomes
    /// are no longer recorded.
    pub fn reset(&self) {
        let mut ledger = self.lock();
        ledger.counters.reset();
        ledger.epoch += 1;
        drop(ledger);
        tracing::info!("session counters reset");
    }

    pub fn snapshot(&self, rpm_limit: u32) -> CounterSnapshot {
        CounterSnapshot {
            counters: self.counters(),
            rpm_limit,
        }
    }
}

/// Counters plus the configured limit, as shown to the host.
#[derive(Debug, Clone, Serialize)]
pub struct CounterSnapshot {
    #[serde(flatten)]
    pub counters: SessionCounters,
    pub rpm_limit: u32,
}

impl CounterSnapshot {
    pub fn to_markdown(&self) -> String {
        let c = &self.counters;
        format!(
            "**API Stats:** Total: {} | Success: {} | Failed: {} | Cancelled: {} | \
             Requests this minute / limit: {} / {}\n\
             **Cost:** Input: ${:.6} | Output: ${:.6} | Total: ${:.6}",
            c.total_requests,
            c.successful_requests,
            c.failed_requests,
            c.cancelled_requests,
            c.requests_this_minute,
            self.rpm_limit,
            c.input_cost,
            c.output_cost,
            c.total_cost,
        )
    }
}
