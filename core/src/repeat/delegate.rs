use std::sync::Arc;

use tokio::sync::{mpsc, watch};

use crate::plan::WorkPlan;

/// Offer successive task indices (0, 1, 2, …) to the worker pool until the
/// success target is met or the run is cancelled. The delegator is purely a
/// source: the admission policy on the worker side is what bounds total
/// work.
pub(crate) async fn delegate(
    plan: Arc<WorkPlan>,
    work: mpsc::Sender<u64>,
    mut cancel: watch::Receiver<bool>,
) {
    let mut idx: u64 = 0;
    loop {
        if *cancel.borrow() {
            return;
        }
        tokio::select! {
            _ = cancel.changed() => return,
            sent = work.send(idx) => {
                if sent.is_err() {
                    // Every worker has retired; no one will dequeue again.
                    return;
                }
                if plan.target_reached() {
                    tracing::debug!(last_idx = idx, "delegator done, target reached");
                    return;
                }
                idx += 1;
            }
        }
    }
}
