use std::path::PathBuf;

use clap::Parser;
use encore_core::SinkMode;

#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeArg {
    Hidden,
    Stdout,
    ReportFile,
    Both,
}

impl From<ModeArg> for SinkMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Hidden => SinkMode::Hidden,
            ModeArg::Stdout => SinkMode::Stdout,
            ModeArg::ReportFile => SinkMode::ReportFile,
            ModeArg::Both => SinkMode::Both,
        }
    }
}

#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileModeArg {
    Truncate,
    Append,
}

#[derive(Parser, Debug)]
#[command(
    name = "encore",
    about = "Repeat a command across a bounded worker pool, collecting timing statistics"
)]
pub struct Args {
    /// Amount of times you wish to repeat the command.
    #[arg(short = 'n', long = "count", default_value_t = 1)]
    pub count: u64,

    /// Amount of workers to repeat the command with. More than 1 makes
    /// execution parallel; expect diminishing returns near the CPU thread
    /// count.
    #[arg(short = 'w', long)]
    pub workers: Option<usize>,

    /// Where each invocation's captured output is echoed.
    #[arg(long, value_enum, default_value_t = ModeArg::Hidden)]
    pub output: ModeArg,

    /// Where the per-result progress line is written.
    #[arg(long, value_enum, default_value_t = ModeArg::Stdout)]
    pub progress: ModeArg,

    /// Progress line template. Placeholders: {success}, {fail}, {requested},
    /// {started}, {remaining}, {eta}.
    #[arg(long)]
    pub progress_format: Option<String>,

    /// Path to the report file used by the report-file output/progress
    /// modes.
    #[arg(long)]
    pub file: Option<PathBuf>,

    /// How to treat an already existing report file. When unset, you will be
    /// asked.
    #[arg(long, value_enum)]
    pub file_mode: Option<FileModeArg>,

    /// Directory receiving one output capture file per worker
    /// (worker-<id>.out). Created if missing.
    #[arg(long)]
    pub capture_dir: Option<PathBuf>,

    /// Replace every occurrence of 'INC' in the arguments with the task
    /// index.
    #[arg(long, default_value_t = false)]
    pub increment: bool,

    /// Attempt each task exactly once instead of retrying failures until the
    /// requested amount has succeeded.
    #[arg(long, default_value_t = false)]
    pub no_retry: bool,

    /// Skip the statistics summary after the run.
    #[arg(long, default_value_t = false)]
    pub no_statistics: bool,

    /// Write a JSON report of all performed tasks to this file.
    #[arg(long)]
    pub result: Option<PathBuf>,

    /// Disable ANSI-colored status output.
    #[arg(long, default_value_t = false)]
    pub no_color: bool,

    /// Display the configured operation before running.
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// The command to repeat (first element is the executable).
    #[arg(trailing_var_arg = true, required = true)]
    pub command: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_invocation() {
        let args = Args::parse_from(["encore", "-n", "3", "echo", "hi"]);
        assert_eq!(args.count, 3);
        assert_eq!(args.command, vec!["echo", "hi"]);
        assert_eq!(args.output, ModeArg::Hidden);
        assert!(!args.no_retry);
    }

    #[test]
    fn test_parse_modes_and_workers() {
        let args = Args::parse_from([
            "encore",
            "-n",
            "10",
            "-w",
            "4",
            "--output",
            "both",
            "--progress",
            "report-file",
            "--file",
            "out.txt",
            "sleep",
            "1",
        ]);
        assert_eq!(args.workers, Some(4));
        assert_eq!(args.output, ModeArg::Both);
        assert_eq!(args.progress, ModeArg::ReportFile);
        assert_eq!(args.file.unwrap().to_string_lossy(), "out.txt");
    }

    #[test]
    fn test_parse_capture_dir() {
        let args = Args::parse_from(["encore", "--capture-dir", "/tmp/caps", "true"]);
        assert_eq!(args.capture_dir.unwrap().to_string_lossy(), "/tmp/caps");
    }

    #[test]
    fn test_command_is_required() {
        assert!(Args::try_parse_from(["encore", "-n", "2"]).is_err());
    }
}
