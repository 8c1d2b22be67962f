use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local};
use tokio::sync::{mpsc, watch};

use crate::output::{write_to_targets, ProgressFormat, ProgressSnapshot, SinkLedger, TeeTarget};
use crate::plan::WorkPlan;
use crate::stats::TaskOutcome;

// Cap the remaining-time projection so chrono arithmetic can't overflow on
// degenerate estimates.
const MAX_PROJECTION: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Drains completed outcomes, maintains the rolling runtime average and the
/// completion estimate, and emits one progress line per result.
pub(crate) struct Collector {
    requested: u64,
    retry_on_fail: bool,
    plan: Arc<WorkPlan>,
    targets: Vec<TeeTarget>,
    format: ProgressFormat,
    ledger: SinkLedger,
    started_at: DateTime<Local>,
    results: Vec<TaskOutcome>,
    total_runtime: Duration,
    fails: u64,
}

impl Collector {
    pub(crate) fn new(
        requested: u64,
        retry_on_fail: bool,
        plan: Arc<WorkPlan>,
        targets: Vec<TeeTarget>,
        format: ProgressFormat,
        ledger: SinkLedger,
        started_at: DateTime<Local>,
    ) -> Self {
        Self {
            requested,
            retry_on_fail,
            plan,
            targets,
            format,
            ledger,
            started_at,
            results: Vec::new(),
            total_runtime: Duration::ZERO,
            fails: 0,
        }
    }

    /// Consume outcomes until the run completes or is cancelled. Termination
    /// needs both the success target and every worker back to idle, so a
    /// result still in flight is never silently dropped. On cancellation the
    /// already-queued outcomes are drained before returning.
    pub(crate) async fn collect(
        mut self,
        mut rx: mpsc::Receiver<TaskOutcome>,
        mut cancel: watch::Receiver<bool>,
    ) -> Vec<TaskOutcome> {
        loop {
            if *cancel.borrow() {
                self.drain(&mut rx).await;
                return self.results;
            }
            tokio::select! {
                _ = cancel.changed() => {
                    self.drain(&mut rx).await;
                    return self.results;
                }
                maybe = rx.recv() => match maybe {
                    Some(outcome) => {
                        self.handle(outcome).await;
                        // Successes counted from the collected log, not the
                        // plan, so completion can never be declared ahead of
                        // a result that is queued but not yet collected.
                        let successes = self.results.len() as u64 - self.fails;
                        if successes >= self.requested && self.plan.all_idle() {
                            return self.results;
                        }
                    }
                    // All workers retired; the buffered outcomes have been
                    // delivered ahead of the channel close.
                    None => return self.results,
                },
            }
        }
    }

    async fn drain(&mut self, rx: &mut mpsc::Receiver<TaskOutcome>) {
        while let Ok(outcome) = rx.try_recv() {
            self.handle(outcome).await;
        }
    }

    async fn handle(&mut self, outcome: TaskOutcome) {
        self.total_runtime += outcome.runtime;
        if outcome.is_error {
            self.fails += 1;
        }
        self.results.push(outcome);

        let completed = self.results.len() as u64;
        let successes = completed - self.fails;
        let rolling_avg = self.total_runtime / completed as u32;

        let needed = tasks_still_needed(self.requested, completed, successes, self.retry_on_fail);
        // Clamp before constructing the Duration; from_secs_f64 panics on
        // out-of-range input.
        let remaining_secs = (rolling_avg.as_secs_f64() * needed as f64)
            .min(MAX_PROJECTION.as_secs_f64());
        let remaining = Duration::from_secs_f64(remaining_secs);
        let eta = self.started_at
            + chrono::Duration::from_std(remaining).unwrap_or_else(|_| chrono::Duration::zero());

        let line = self.format.render(&ProgressSnapshot {
            success: successes,
            fail: self.fails,
            requested: self.requested,
            started: self.started_at,
            remaining_secs: remaining.as_secs_f64(),
            eta,
        });
        write_to_targets(&self.targets, &line, &self.ledger).await;
    }
}

/// Projected number of attempts still required to close the success gap.
///
/// Without retry the answer is simply the unfinished share of the requested
/// attempts. With retry the gap is scaled by the observed success rate; with
/// no successes observed yet the rate is clamped and the raw gap is
/// projected instead of dividing by zero.
pub(crate) fn tasks_still_needed(
    requested: u64,
    completed: u64,
    successes: u64,
    retry_on_fail: bool,
) -> u64 {
    if !retry_on_fail {
        return requested.saturating_sub(completed);
    }
    let gap = requested.saturating_sub(successes);
    if gap == 0 {
        return 0;
    }
    if successes == 0 || completed == 0 {
        return gap;
    }
    // ceil(gap / (successes / completed))
    gap.saturating_mul(completed).div_ceil(successes)
}
