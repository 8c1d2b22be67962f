//! Invocation runner: executes one external process per call, capturing the
//! combined output and wall-clock duration, and classifying the outcome.

mod io_pump;

use std::process::Stdio;
use std::sync::Arc;
use std::time::Instant;

use tokio::process::Command;

use crate::output::{OutputStreams, ReportFile, SinkLedger, TeeTarget};
use crate::stats::{humanize, TaskOutcome};
use crate::task;

/// Executes invocation attempts for one run. Holds the argument template and
/// the tee targets; every call spawns one child process and blocks the
/// calling worker for its lifetime.
#[derive(Debug)]
pub struct Invoker {
    template: Vec<String>,
    increment: bool,
    streams: OutputStreams,
    ledger: SinkLedger,
}

impl Invoker {
    pub fn new(
        template: Vec<String>,
        increment: bool,
        streams: OutputStreams,
        ledger: SinkLedger,
    ) -> Self {
        Self {
            template,
            increment,
            streams,
            ledger,
        }
    }

    /// Run one attempt. Non-zero exits and spawn failures are reported as
    /// data in the outcome, never as an error: the failure text is prefixed
    /// into the captured output and the failure flag is set. When the worker
    /// carries a capture file, both streams are additionally teed into it.
    pub async fn execute(
        &self,
        worker_id: usize,
        task_idx: u64,
        capture: Option<&Arc<ReportFile>>,
    ) -> TaskOutcome {
        let argv = task::substitute(&self.template, self.increment, task_idx);
        let buf = Arc::new(tokio::sync::Mutex::new(Vec::new()));

        let mut stdout_targets = self.streams.stdout.clone();
        let mut stderr_targets = self.streams.stderr.clone();
        if let Some(capture) = capture {
            stdout_targets.push(TeeTarget::Report(capture.clone()));
            stderr_targets.push(TeeTarget::Report(capture.clone()));
        }

        let mut cmd = Command::new(&argv[0]);
        cmd.args(&argv[1..])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let started = Instant::now();
        let (failure, runtime) = match cmd.spawn() {
            Err(e) => (Some(format!("spawn failed: {e}")), started.elapsed()),
            Ok(mut child) => {
                let out_task = child.stdout.take().map(|s| {
                    io_pump::pump(
                        s,
                        buf.clone(),
                        stdout_targets.clone(),
                        "stdout",
                        self.ledger.clone(),
                    )
                });
                let err_task = child.stderr.take().map(|s| {
                    io_pump::pump(
                        s,
                        buf.clone(),
                        stderr_targets.clone(),
                        "stderr",
                        self.ledger.clone(),
                    )
                });

                let status = child.wait().await;
                let runtime = started.elapsed();

                for pump in [out_task, err_task].into_iter().flatten() {
                    match pump.await {
                        Ok(Ok(_)) => {}
                        Ok(Err(e)) => tracing::warn!(error = %e, "output pump failed"),
                        Err(e) => tracing::warn!(error = %e, "output pump panicked"),
                    }
                }

                let failure = match status {
                    Ok(st) if st.success() => None,
                    Ok(st) => Some(match st.code() {
                        Some(code) => format!("exit status: {code}"),
                        None => "terminated by signal".to_string(),
                    }),
                    Err(e) => Some(format!("wait failed: {e}")),
                };
                (failure, runtime)
            }
        };

        let captured = String::from_utf8_lossy(&buf.lock().await).to_string();
        let (output, is_error) = match failure {
            None => (captured, false),
            Some(text) => {
                tracing::debug!(worker_id, task_idx, %text, "invocation failed");
                let output = if captured.is_empty() {
                    text
                } else {
                    format!("{text}\n{captured}")
                };
                (output, true)
            }
        };

        TaskOutcome {
            worker_id,
            task_idx,
            runtime,
            runtime_human: humanize(runtime),
            output,
            is_error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::OutputStreams;

    fn invoker(argv: &[&str], increment: bool) -> Invoker {
        Invoker::new(
            argv.iter().map(|s| s.to_string()).collect(),
            increment,
            OutputStreams::default(),
            SinkLedger::default(),
        )
    }

    #[tokio::test]
    async fn test_execute_captures_output_and_success() {
        let outcome = invoker(&["echo", "hello"], false).execute(0, 0, None).await;
        assert!(!outcome.is_error);
        assert_eq!(outcome.output.trim(), "hello");
        assert_eq!(outcome.task_idx, 0);
    }

    #[tokio::test]
    async fn test_execute_substitutes_task_index() {
        let outcome = invoker(&["echo", "file-INC.log"], true)
            .execute(2, 7, None)
            .await;
        assert_eq!(outcome.output.trim(), "file-7.log");
    }

    #[tokio::test]
    async fn test_capture_file_receives_teed_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("worker-0.out");
        let file = std::fs::File::create(&path).unwrap();
        let capture = Arc::new(ReportFile::new(&path, file));

        let outcome = invoker(&["echo", "captured"], false)
            .execute(0, 0, Some(&capture))
            .await;
        assert!(!outcome.is_error);
        assert_eq!(std::fs::read_to_string(&path).unwrap().trim(), "captured");
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_reported_as_data() {
        let outcome = invoker(&["sh", "-c", "echo boom >&2; exit 3"], false)
            .execute(1, 4, None)
            .await;
        assert!(outcome.is_error);
        assert!(
            outcome.output.starts_with("exit status: 3"),
            "failure text must be prefixed: {}",
            outcome.output
        );
        assert!(outcome.output.contains("boom"));
    }

    #[tokio::test]
    async fn test_spawn_failure_is_reported_as_data() {
        let outcome = invoker(&["/nonexistent-binary-for-test"], false)
            .execute(0, 0, None)
            .await;
        assert!(outcome.is_error);
        assert!(outcome.output.starts_with("spawn failed:"));
    }
}
