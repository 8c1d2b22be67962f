//! Output and progress sink plumbing: mode selection, the shared report
//! file, tee targets for captured command output, and the progress line
//! template.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Local, SecondsFormat};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;

use crate::error::SinkError;

/// Where a byte stream (command output or progress lines) is echoed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum SinkMode {
    #[default]
    Hidden,
    Stdout,
    ReportFile,
    Both,
}

impl SinkMode {
    pub fn wants_report_file(self) -> bool {
        matches!(self, SinkMode::ReportFile | SinkMode::Both)
    }
}

impl fmt::Display for SinkMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SinkMode::Hidden => "hidden",
            SinkMode::Stdout => "stdout",
            SinkMode::ReportFile => "report-file",
            SinkMode::Both => "both",
        };
        f.write_str(s)
    }
}

impl FromStr for SinkMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "hidden" => Ok(SinkMode::Hidden),
            "stdout" => Ok(SinkMode::Stdout),
            "report-file" | "file" => Ok(SinkMode::ReportFile),
            "both" => Ok(SinkMode::Both),
            other => Err(format!(
                "unknown mode: {other:?}, expected one of: hidden, stdout, report-file, both"
            )),
        }
    }
}

/// The report file, shared between workers and the collector. Writes are
/// serialized through one async lock so concurrent attempts never interleave
/// mid-chunk.
pub struct ReportFile {
    path: PathBuf,
    file: tokio::sync::Mutex<tokio::fs::File>,
}

impl ReportFile {
    pub fn new(path: impl Into<PathBuf>, file: std::fs::File) -> Self {
        Self {
            path: path.into(),
            file: tokio::sync::Mutex::new(tokio::fs::File::from_std(file)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn write_all(&self, bytes: &[u8]) -> io::Result<()> {
        let mut file = self.file.lock().await;
        file.write_all(bytes).await?;
        file.flush().await
    }
}

impl fmt::Debug for ReportFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReportFile").field("path", &self.path).finish()
    }
}

/// One destination a captured child stream is additionally teed into.
#[derive(Debug, Clone)]
pub enum TeeTarget {
    Stdout,
    Stderr,
    Report(Arc<ReportFile>),
}

impl TeeTarget {
    pub async fn write_all(&self, bytes: &[u8]) -> io::Result<()> {
        match self {
            TeeTarget::Stdout => {
                let mut out = tokio::io::stdout();
                out.write_all(bytes).await?;
                out.flush().await
            }
            TeeTarget::Stderr => {
                let mut err = tokio::io::stderr();
                err.write_all(bytes).await?;
                err.flush().await
            }
            TeeTarget::Report(report) => report.write_all(bytes).await,
        }
    }
}

/// Tee targets for the child's stdout and stderr streams under a given
/// output mode. `Hidden` tees nowhere; capture into the outcome buffer
/// always happens.
#[derive(Debug, Clone, Default)]
pub struct OutputStreams {
    pub stdout: Vec<TeeTarget>,
    pub stderr: Vec<TeeTarget>,
}

pub fn output_streams(mode: SinkMode, report: Option<&Arc<ReportFile>>) -> OutputStreams {
    let mut streams = OutputStreams::default();
    match mode {
        SinkMode::Hidden => {}
        SinkMode::Stdout => {
            streams.stdout.push(TeeTarget::Stdout);
            streams.stderr.push(TeeTarget::Stderr);
        }
        SinkMode::ReportFile => {
            if let Some(report) = report {
                streams.stdout.push(TeeTarget::Report(report.clone()));
                streams.stderr.push(TeeTarget::Report(report.clone()));
            }
        }
        SinkMode::Both => {
            streams.stdout.push(TeeTarget::Stdout);
            streams.stderr.push(TeeTarget::Stderr);
            if let Some(report) = report {
                streams.stdout.push(TeeTarget::Report(report.clone()));
                streams.stderr.push(TeeTarget::Report(report.clone()));
            }
        }
    }
    streams
}

pub fn progress_targets(mode: SinkMode, report: Option<&Arc<ReportFile>>) -> Vec<TeeTarget> {
    let mut targets = Vec::with_capacity(2);
    match mode {
        SinkMode::Hidden => {}
        SinkMode::Stdout => targets.push(TeeTarget::Stdout),
        SinkMode::ReportFile => {
            if let Some(report) = report {
                targets.push(TeeTarget::Report(report.clone()));
            }
        }
        SinkMode::Both => {
            targets.push(TeeTarget::Stdout);
            if let Some(report) = report {
                targets.push(TeeTarget::Report(report.clone()));
            }
        }
    }
    targets
}

/// Shared collector for sink write failures. Writes are best effort; the
/// failures land here and the caller gets them as one aggregate after the
/// run.
#[derive(Debug, Clone, Default)]
pub struct SinkLedger {
    errors: Arc<Mutex<Vec<io::Error>>>,
}

impl SinkLedger {
    pub fn record(&self, err: io::Error) {
        let mut errors = match self.errors.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        errors.push(err);
    }

    /// Drain the ledger into an aggregate error, if anything failed.
    pub fn take(&self) -> Option<SinkError> {
        let mut errors = match self.errors.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if errors.is_empty() {
            None
        } else {
            Some(SinkError {
                errors: std::mem::take(&mut *errors),
            })
        }
    }
}

/// Write one string to every target, recording failures instead of
/// propagating them.
pub async fn write_to_targets(targets: &[TeeTarget], text: &str, ledger: &SinkLedger) {
    for target in targets {
        if let Err(e) = target.write_all(text.as_bytes()).await {
            tracing::warn!(error = %e, "sink write failed");
            ledger.record(e);
        }
    }
}

pub const DEFAULT_PROGRESS_FORMAT: &str = "\rProgress: (Success/Fail/Requested Am)({success}/{fail}/{requested}), Start at: {started}, Remaining: {remaining}s, Est. done at: {eta}";

/// Values available to the progress template after each collected result.
#[derive(Debug, Clone)]
pub struct ProgressSnapshot {
    pub success: u64,
    pub fail: u64,
    pub requested: u64,
    pub started: DateTime<Local>,
    pub remaining_secs: f64,
    pub eta: DateTime<Local>,
}

/// Caller-supplied progress line template. Named placeholders: `{success}`,
/// `{fail}`, `{requested}`, `{started}`, `{remaining}`, `{eta}`. Unknown
/// text passes through verbatim.
#[derive(Debug, Clone)]
pub struct ProgressFormat {
    template: String,
}

impl ProgressFormat {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn render(&self, snap: &ProgressSnapshot) -> String {
        self.template
            .replace("{success}", &snap.success.to_string())
            .replace("{fail}", &snap.fail.to_string())
            .replace("{requested}", &snap.requested.to_string())
            .replace(
                "{started}",
                &snap.started.to_rfc3339_opts(SecondsFormat::Secs, false),
            )
            .replace("{remaining}", &format!("{:.1}", snap.remaining_secs))
            .replace(
                "{eta}",
                &snap.eta.to_rfc3339_opts(SecondsFormat::Secs, false),
            )
    }
}

impl Default for ProgressFormat {
    fn default() -> Self {
        Self::new(DEFAULT_PROGRESS_FORMAT)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn snapshot() -> ProgressSnapshot {
        let started = DateTime::parse_from_rfc3339("2024-05-01T10:00:00+00:00")
            .unwrap()
            .with_timezone(&Local);
        ProgressSnapshot {
            success: 3,
            fail: 1,
            requested: 10,
            started,
            remaining_secs: 12.34,
            eta: started + chrono::Duration::seconds(12),
        }
    }

    #[test]
    fn test_render_named_placeholders() {
        let fmt = ProgressFormat::new("{success}/{fail}/{requested} eta in {remaining}s");
        assert_eq!(fmt.render(&snapshot()), "3/1/10 eta in 12.3s");
    }

    #[test]
    fn test_render_passes_unknown_text_through() {
        let fmt = ProgressFormat::new("plain text, no placeholders");
        assert_eq!(fmt.render(&snapshot()), "plain text, no placeholders");
    }

    #[test]
    fn test_default_format_contains_all_fields() {
        let line = ProgressFormat::default().render(&snapshot());
        assert!(line.contains("(3/1/10)"), "unexpected line: {line}");
        assert!(line.contains("Remaining: 12.3s"));
    }

    #[test]
    fn test_mode_parsing_round_trip() {
        for mode in [
            SinkMode::Hidden,
            SinkMode::Stdout,
            SinkMode::ReportFile,
            SinkMode::Both,
        ] {
            assert_eq!(mode.to_string().parse::<SinkMode>().unwrap(), mode);
        }
        assert!("nope".parse::<SinkMode>().is_err());
    }

    #[test]
    fn test_hidden_mode_has_no_targets() {
        let streams = output_streams(SinkMode::Hidden, None);
        assert!(streams.stdout.is_empty() && streams.stderr.is_empty());
        assert!(progress_targets(SinkMode::Hidden, None).is_empty());
    }
}
