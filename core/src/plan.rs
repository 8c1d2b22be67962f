//! Work plan: the per-run shared counters and the admission policy that
//! decides, for every dequeued task index, whether a worker executes it or
//! retires.

use std::sync::{Mutex, MutexGuard};

/// Decision taken by a worker immediately after dequeuing a task index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Run the attempt. The plan has already marked the worker busy.
    Execute,
    /// Enough work is in flight (or the attempt budget is spent); the worker
    /// exits its loop permanently.
    Retire,
}

#[derive(Debug)]
struct PlanState {
    workers: usize,
    requested: u64,
    idle_workers: usize,
    successes: u64,
    retry_on_fail: bool,
}

/// Shared mutable state of one repeat run, guarded by a single lock. Raw
/// counters never leave the lock; callers go through [`WorkPlan::admit`],
/// [`WorkPlan::finish`] and the snapshot accessors.
#[derive(Debug)]
pub struct WorkPlan {
    inner: Mutex<PlanState>,
}

impl WorkPlan {
    pub fn new(workers: usize, requested: u64, retry_on_fail: bool) -> Self {
        let workers = workers.max(1);
        Self {
            inner: Mutex::new(PlanState {
                workers,
                requested,
                idle_workers: workers,
                successes: 0,
                retry_on_fail,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, PlanState> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Evaluate both stopping conditions for a dequeued index and, if the
    /// attempt is admitted, mark the worker busy. The guard check and the
    /// idle-count decrement happen under one lock acquisition so two workers
    /// cannot both conclude that overshoot is safe.
    pub fn admit(&self, task_idx: u64) -> Admission {
        let mut state = self.lock();

        // Overshoot guard: work already in flight plus observed successes is
        // enough to reach the target, so starting another attempt would only
        // overshoot it.
        let busy = (state.workers - state.idle_workers) as u64;
        if busy + state.successes >= state.requested {
            return Admission::Retire;
        }

        // Bounded-attempts guard: without retry, each of the `requested`
        // indices is attempted exactly once.
        if !state.retry_on_fail && task_idx >= state.requested {
            return Admission::Retire;
        }

        state.idle_workers -= 1;
        Admission::Execute
    }

    /// Record the end of an admitted attempt: the worker is idle again and,
    /// on success, the success count advances.
    pub fn finish(&self, success: bool) {
        let mut state = self.lock();
        state.idle_workers += 1;
        debug_assert!(state.idle_workers <= state.workers);
        if success {
            state.successes += 1;
        }
    }

    pub fn successes(&self) -> u64 {
        self.lock().successes
    }

    /// True once the success target is met. Used by the delegator to stop
    /// issuing fresh indices.
    pub fn target_reached(&self) -> bool {
        let state = self.lock();
        state.successes >= state.requested
    }

    /// True when no attempt is mid-execution. Combined with the collector's
    /// own success count this forms the completion condition: a worker can
    /// not still be about to submit an uncollected result.
    pub fn all_idle(&self) -> bool {
        let state = self.lock();
        state.idle_workers == state.workers
    }

    pub fn workers(&self) -> usize {
        self.lock().workers
    }

    pub fn retry_on_fail(&self) -> bool {
        self.lock().retry_on_fail
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admit_sequential_run_to_target() {
        let plan = WorkPlan::new(1, 3, false);
        for idx in 0..3 {
            assert_eq!(plan.admit(idx), Admission::Execute);
            plan.finish(true);
        }
        assert_eq!(plan.admit(3), Admission::Retire);
        assert!(plan.all_idle());
    }

    #[test]
    fn test_overshoot_guard_counts_in_flight_work() {
        // Two workers, two requested: once both are mid-execution, a third
        // admission must be refused even with zero successes so far.
        let plan = WorkPlan::new(3, 2, true);
        assert_eq!(plan.admit(0), Admission::Execute);
        assert_eq!(plan.admit(1), Admission::Execute);
        assert_eq!(plan.admit(2), Admission::Retire);

        // One attempt fails: the gap reopens for exactly one more attempt.
        plan.finish(false);
        assert_eq!(plan.admit(2), Admission::Execute);
        assert_eq!(plan.admit(3), Admission::Retire);
    }

    #[test]
    fn test_bounded_attempts_guard_without_retry() {
        let plan = WorkPlan::new(1, 2, false);
        assert_eq!(plan.admit(0), Admission::Execute);
        plan.finish(false);
        assert_eq!(plan.admit(1), Admission::Execute);
        plan.finish(false);
        // Both attempts spent; failures are not compensated for.
        assert_eq!(plan.admit(2), Admission::Retire);
        assert!(!plan.target_reached());
    }

    #[test]
    fn test_retry_mode_admits_past_requested_index() {
        let plan = WorkPlan::new(1, 1, true);
        assert_eq!(plan.admit(0), Admission::Execute);
        plan.finish(false);
        // Index 5 is well past `requested`, but the success gap is open.
        assert_eq!(plan.admit(5), Admission::Execute);
        plan.finish(true);
        assert_eq!(plan.admit(6), Admission::Retire);
    }

    #[test]
    fn test_all_idle_tracks_in_flight_work() {
        let plan = WorkPlan::new(2, 1, true);
        assert_eq!(plan.admit(0), Admission::Execute);
        assert!(!plan.all_idle());
        assert_eq!(plan.admit(1), Admission::Retire);
        plan.finish(true);
        assert!(plan.all_idle());
    }

    #[test]
    fn test_worker_count_clamped_to_one() {
        let plan = WorkPlan::new(0, 1, false);
        assert_eq!(plan.workers(), 1);
        assert_eq!(plan.admit(0), Admission::Execute);
    }
}
