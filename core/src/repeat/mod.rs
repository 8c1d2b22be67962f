//! The configured repeat operation: validation at construction, then a
//! single `run` that drives the worker pool, the delegator and the result
//! collector to completion or cancellation.

mod collect;
mod delegate;
mod worker;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use chrono::Local;
use tokio::sync::{mpsc, watch};

use crate::error::{ConfigError, RepeatError, SinkError};
use crate::output::{
    output_streams, progress_targets, write_to_targets, ProgressFormat, ReportFile, SinkLedger,
    SinkMode, TeeTarget,
};
use crate::plan::WorkPlan;
use crate::runner::Invoker;
use crate::stats::{Statistics, TaskOutcome};
use crate::task;

/// Construction-time configuration of one repeat run.
#[derive(Debug)]
pub struct RepeatRequest {
    /// Target number of successful (retry mode) or attempted invocations.
    pub requested: u64,
    pub workers: usize,
    /// First element is the executable, the rest its arguments.
    pub argv: Vec<String>,
    pub increment: bool,
    pub retry_on_fail: bool,
    pub output: SinkMode,
    pub progress: SinkMode,
    pub progress_format: ProgressFormat,
    pub report_file: Option<Arc<ReportFile>>,
    /// Directory receiving one `worker-<id>.out` file per worker, teeing
    /// everything that worker's invocations print.
    pub capture_dir: Option<PathBuf>,
}

impl std::fmt::Display for RepeatRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let report = self
            .report_file
            .as_ref()
            .map(|r| r.path().display().to_string())
            .unwrap_or_else(|| "none".to_string());
        let capture = self
            .capture_dir
            .as_ref()
            .map(|d| d.display().to_string())
            .unwrap_or_else(|| "none".to_string());
        write!(
            f,
            "requested: {}\ncommand: {:?}\nincrement: {}\nworkers: {}\nretry on fail: {}\nprogress: {}\nprogress format: {:?}\noutput: {}\nreport file: {}\ncapture dir: {}",
            self.requested,
            self.argv,
            self.increment,
            self.workers,
            self.retry_on_fail,
            self.progress,
            self.progress_format.template(),
            self.output,
            report,
            capture,
        )
    }
}

/// What a finished (or cancelled) run hands back to the caller.
#[derive(Debug)]
pub struct RunReport {
    pub stats: Statistics,
    /// Aggregate of non-fatal sink write failures, if any occurred.
    pub sink_failures: Option<SinkError>,
    pub cancelled: bool,
}

/// A validated repeat operation. All configuration errors surface from
/// [`Repeat::new`], before any worker starts.
#[derive(Debug)]
pub struct Repeat {
    requested: u64,
    workers: usize,
    retry_on_fail: bool,
    invoker: Arc<Invoker>,
    progress_targets: Vec<TeeTarget>,
    progress_format: ProgressFormat,
    capture_dir: Option<PathBuf>,
    ledger: SinkLedger,
}

impl Repeat {
    pub fn new(req: RepeatRequest) -> Result<Self, ConfigError> {
        if req.argv.is_empty() {
            return Err(ConfigError::EmptyCommand);
        }
        if (req.progress.wants_report_file() || req.output.wants_report_file())
            && req.report_file.is_none()
        {
            return Err(ConfigError::ReportFileRequired {
                progress: req.progress.to_string(),
                output: req.output.to_string(),
            });
        }
        task::validate_increment_args(&req.argv, req.increment)?;
        if req.workers as u64 > req.requested {
            return Err(ConfigError::WorkersExceedCount {
                workers: req.workers,
                requested: req.requested,
            });
        }

        let ledger = SinkLedger::default();
        let streams = output_streams(req.output, req.report_file.as_ref());
        let invoker = Arc::new(Invoker::new(
            req.argv,
            req.increment,
            streams,
            ledger.clone(),
        ));

        Ok(Self {
            requested: req.requested,
            workers: req.workers.max(1),
            retry_on_fail: req.retry_on_fail,
            invoker,
            progress_targets: progress_targets(req.progress, req.report_file.as_ref()),
            progress_format: req.progress_format,
            capture_dir: req.capture_dir,
            ledger,
        })
    }

    /// Open (and announce) one worker's capture file. Failure to open it is
    /// a sink failure: the worker runs untee'd and the error surfaces in the
    /// run report's aggregate.
    fn worker_capture_file(&self, worker_id: usize) -> Option<Arc<ReportFile>> {
        let dir = self.capture_dir.as_ref()?;
        let path = dir.join(format!("worker-{worker_id}.out"));
        match std::fs::File::create(&path) {
            Ok(file) => {
                tracing::info!(worker_id, path = %path.display(), "worker output is captured here");
                Some(Arc::new(ReportFile::new(path, file)))
            }
            Err(e) => {
                tracing::warn!(worker_id, path = %path.display(), error = %e, "failed to create worker capture file");
                self.ledger.record(e);
                None
            }
        }
    }

    /// Execute the run to completion. Blocking in the async sense: returns
    /// once every worker has retired and the collector has drained. Flipping
    /// `cancel` to true stops future dequeues and truncates the result log;
    /// attempts already mid-execution run to completion but are not awaited
    /// for collection.
    pub async fn run(&self, cancel: watch::Receiver<bool>) -> Result<RunReport, RepeatError> {
        let plan = Arc::new(WorkPlan::new(
            self.workers,
            self.requested,
            self.retry_on_fail,
        ));

        let (work_tx, work_rx) = mpsc::channel::<u64>(1);
        let queue: worker::SharedWorkQueue = Arc::new(tokio::sync::Mutex::new(work_rx));

        // Capacity covers every attempt that can be in flight or queued, so
        // a retiring worker can always park its final outcome.
        let capacity = usize::try_from(self.requested)
            .unwrap_or(usize::MAX / 2)
            .saturating_add(self.workers)
            .max(1);
        let (result_tx, result_rx) = mpsc::channel::<TaskOutcome>(capacity);

        let started = Instant::now();
        let started_at = Local::now();

        if let Some(dir) = &self.capture_dir {
            if let Err(e) = std::fs::create_dir_all(dir) {
                tracing::warn!(dir = %dir.display(), error = %e, "capture directory unavailable");
                self.ledger.record(e);
            }
        }

        let mut workers = Vec::with_capacity(self.workers);
        for worker_id in 0..self.workers {
            workers.push(tokio::spawn(worker::worker_loop(
                worker_id,
                plan.clone(),
                self.invoker.clone(),
                queue.clone(),
                result_tx.clone(),
                self.worker_capture_file(worker_id),
                cancel.clone(),
            )));
        }
        // Only workers may hold the queue and the result sender: the result
        // channel closes when the last worker retires, and the work queue
        // closes when the last receiver handle is gone.
        drop(queue);
        drop(result_tx);

        let delegator = tokio::spawn(delegate::delegate(
            plan.clone(),
            work_tx,
            cancel.clone(),
        ));

        let results = collect::Collector::new(
            self.requested,
            self.retry_on_fail,
            plan.clone(),
            self.progress_targets.clone(),
            self.progress_format.clone(),
            self.ledger.clone(),
            started_at,
        )
        .collect(result_rx, cancel.clone())
        .await;

        if !self.progress_targets.is_empty() {
            write_to_targets(&self.progress_targets, "\n", &self.ledger).await;
        }

        for handle in workers {
            handle
                .await
                .map_err(|e| RepeatError::Join(e.to_string()))?;
        }
        delegator
            .await
            .map_err(|e| RepeatError::Join(e.to_string()))?;

        let cancelled = *cancel.borrow();
        let stats = Statistics::from_outcomes(started.elapsed(), results)?;
        tracing::info!(
            results = stats.results.len(),
            successes = plan.successes(),
            cancelled,
            "repeat run finished"
        );

        Ok(RunReport {
            stats,
            sink_failures: self.ledger.take(),
            cancelled,
        })
    }
}
