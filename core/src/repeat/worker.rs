use std::sync::Arc;

use tokio::sync::{mpsc, watch};

use crate::output::ReportFile;
use crate::plan::{Admission, WorkPlan};
use crate::runner::Invoker;
use crate::stats::TaskOutcome;

/// Task-index queue shared by the pool: indices are offered in order by the
/// delegator and pulled by whichever worker grabs the receiver first.
pub(crate) type SharedWorkQueue = Arc<tokio::sync::Mutex<mpsc::Receiver<u64>>>;

/// One worker's life: IDLE (waiting to dequeue) → EVALUATING (admission
/// check) → EXECUTING → back to IDLE, or RETIRED. Retirement is permanent;
/// the loop is never re-entered.
pub(crate) async fn worker_loop(
    worker_id: usize,
    plan: Arc<WorkPlan>,
    invoker: Arc<Invoker>,
    queue: SharedWorkQueue,
    results: mpsc::Sender<TaskOutcome>,
    capture: Option<Arc<ReportFile>>,
    mut cancel: watch::Receiver<bool>,
) {
    loop {
        if *cancel.borrow() {
            return;
        }

        let task_idx = {
            let mut rx = queue.lock().await;
            tokio::select! {
                _ = cancel.changed() => return,
                maybe = rx.recv() => match maybe {
                    Some(idx) => idx,
                    // Delegator is gone and the queue is drained.
                    None => return,
                },
            }
        };

        match plan.admit(task_idx) {
            Admission::Retire => {
                tracing::debug!(worker_id, task_idx, "worker retired");
                return;
            }
            Admission::Execute => {
                let outcome = invoker.execute(worker_id, task_idx, capture.as_ref()).await;
                plan.finish(!outcome.is_error);
                if results.send(outcome).await.is_err() {
                    // Collector already terminated; nothing left to report to.
                    return;
                }
            }
        }
    }
}
