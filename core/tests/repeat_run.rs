//! End-to-end runs through the worker pool against real `/bin/sh`
//! invocations.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::watch;

use encore_core::output::{ProgressFormat, ReportFile, SinkMode};
use encore_core::repeat::{Repeat, RepeatRequest, RunReport};
use encore_core::{ConfigError, RepeatError, StatsError};

fn argv(args: &[&str]) -> Vec<String> {
    args.iter().map(|s| s.to_string()).collect()
}

fn request(requested: u64, workers: usize, args: &[&str]) -> RepeatRequest {
    RepeatRequest {
        requested,
        workers,
        argv: argv(args),
        increment: false,
        retry_on_fail: false,
        output: SinkMode::Hidden,
        progress: SinkMode::Hidden,
        progress_format: ProgressFormat::default(),
        report_file: None,
        capture_dir: None,
    }
}

async fn run(req: RepeatRequest) -> RunReport {
    let (_cancel_tx, cancel_rx) = watch::channel(false);
    Repeat::new(req).unwrap().run(cancel_rx).await.unwrap()
}

#[tokio::test]
async fn exact_attempt_count_without_retry() {
    let report = run(request(6, 3, &["true"])).await;

    assert_eq!(report.stats.results.len(), 6);
    assert!(report.stats.results.iter().all(|r| !r.is_error));

    let indices: HashSet<u64> = report.stats.results.iter().map(|r| r.task_idx).collect();
    assert_eq!(indices.len(), 6, "task indices must be distinct");
    assert!(indices.iter().all(|&i| i < 6), "indices must lie in [0, 6)");
}

#[tokio::test]
async fn failures_are_recorded_not_compensated_without_retry() {
    let report = run(request(4, 2, &["false"])).await;

    assert_eq!(report.stats.results.len(), 4);
    assert!(report.stats.results.iter().all(|r| r.is_error));
}

#[tokio::test]
async fn retry_until_success_target_met() {
    // Counter file makes the first two attempts fail, the rest succeed.
    let dir = tempfile::tempdir().unwrap();
    let counter = dir.path().join("attempts");
    let script = format!(
        "n=$(cat {c} 2>/dev/null || echo 0); n=$((n+1)); echo $n > {c}; test $n -gt 2",
        c = counter.display()
    );

    let mut req = request(3, 1, &["sh", "-c", &script]);
    req.retry_on_fail = true;
    let report = run(req).await;

    let fails = report.stats.results.iter().filter(|r| r.is_error).count();
    let successes = report.stats.results.len() - fails;
    assert_eq!(successes, 3);
    assert_eq!(fails, 2);
    assert!(report.stats.results.len() >= 3);
}

#[tokio::test]
async fn overshoot_stays_bounded_by_pool_size() {
    let workers = 4usize;
    let requested = 8u64;
    let mut req = request(requested, workers, &["true"]);
    req.retry_on_fail = true;
    let report = run(req).await;

    let produced = report.stats.results.len() as u64;
    assert!(produced >= requested);
    assert!(
        produced <= requested + workers as u64 - 1,
        "admission policy must bound overshoot, got {produced} results for {requested} requested"
    );
}

#[tokio::test]
async fn increment_substitution_flows_through_the_pool() {
    let mut req = request(3, 1, &["sh", "-c", "echo INC"]);
    req.increment = true;
    let report = run(req).await;

    let mut outputs: Vec<String> = report
        .stats
        .results
        .iter()
        .map(|r| r.output.trim().to_string())
        .collect();
    outputs.sort();
    assert_eq!(outputs, vec!["0", "1", "2"]);
}

#[tokio::test]
async fn cancellation_drains_completed_results() {
    let (cancel_tx, cancel_rx) = watch::channel(false);
    let repeat = Arc::new(
        Repeat::new(request(50, 2, &["sh", "-c", "sleep 0.05"])).unwrap(),
    );

    let runner = {
        let repeat = repeat.clone();
        tokio::spawn(async move { repeat.run(cancel_rx).await })
    };

    // Let a handful of invocations finish, then cancel.
    tokio::time::sleep(std::time::Duration::from_millis(400)).await;
    cancel_tx.send(true).unwrap();

    let report = runner.await.unwrap().unwrap();
    assert!(report.cancelled);
    assert!(
        !report.stats.results.is_empty(),
        "completed work must survive cancellation"
    );
    assert!((report.stats.results.len() as u64) < 50);
}

#[tokio::test]
async fn cancellation_before_any_result_is_empty_result_set() {
    let (cancel_tx, cancel_rx) = watch::channel(false);
    cancel_tx.send(true).unwrap();

    let repeat = Repeat::new(request(5, 1, &["sleep", "5"])).unwrap();
    let err = repeat.run(cancel_rx).await.unwrap_err();
    assert!(matches!(err, RepeatError::Stats(StatsError::EmptyResultSet)));
}

#[tokio::test]
async fn output_is_teed_into_the_report_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("report.txt");
    let file = std::fs::File::create(&path).unwrap();

    let mut req = request(2, 1, &["echo", "teed-line"]);
    req.output = SinkMode::ReportFile;
    req.report_file = Some(Arc::new(ReportFile::new(&path, file)));
    let report = run(req).await;

    assert!(report.sink_failures.is_none());
    let contents = std::fs::read_to_string(&path).unwrap();
    assert_eq!(contents.matches("teed-line").count(), 2);
}

#[tokio::test]
async fn worker_output_is_captured_per_worker() {
    let dir = tempfile::tempdir().unwrap();
    let capture_dir = dir.path().join("captures");

    let mut req = request(3, 1, &["echo", "captured-line"]);
    req.capture_dir = Some(capture_dir.clone());
    let report = run(req).await;

    assert!(report.sink_failures.is_none());
    let contents = std::fs::read_to_string(capture_dir.join("worker-0.out")).unwrap();
    assert_eq!(contents.matches("captured-line").count(), 3);
}

#[test]
fn workers_exceeding_requested_is_a_config_error() {
    let err = Repeat::new(request(1, 2, &["true"])).unwrap_err();
    assert!(matches!(
        err,
        ConfigError::WorkersExceedCount {
            workers: 2,
            requested: 1
        }
    ));
    let msg = err.to_string();
    assert!(msg.contains('2') && msg.contains('1'), "must name both counts: {msg}");
}

#[test]
fn report_file_modes_require_a_report_file() {
    let mut req = request(1, 1, &["true"]);
    req.progress = SinkMode::Both;
    let err = Repeat::new(req).unwrap_err();
    assert!(matches!(err, ConfigError::ReportFileRequired { .. }));
}

#[test]
fn missing_increment_placeholder_is_caught_before_the_run() {
    let mut req = request(1, 1, &["cmd", "arg"]);
    req.increment = true;
    let err = Repeat::new(req).unwrap_err();
    assert!(err.to_string().contains("arg"));
}
