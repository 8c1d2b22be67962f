use std::io;

use thiserror::Error;

/// Request validation failures. Detected before any worker starts; the run
/// never begins when one of these is returned.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error(
        "increment is enabled, but args: {args:?} do not contain the placeholder '{placeholder}'"
    )]
    MissingPlaceholder {
        args: Vec<String>,
        placeholder: &'static str,
    },

    #[error("please use fewer workers than repetitions. workers: {workers}, repetitions: {requested}")]
    WorkersExceedCount { workers: usize, requested: u64 },

    #[error("progress: {progress}, or output: {output}, requires a report file, but none is specified")]
    ReportFileRequired { progress: String, output: String },

    #[error("at least one argument is required (the command to run)")]
    EmptyCommand,
}

/// Stream plumbing failures inside the runner. Spawn failures and non-zero
/// exits are not here: those are recorded as failed outcomes, never raised.
#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("stream io error: {stream} {source}")]
    StreamIo {
        stream: &'static str,
        source: io::Error,
    },
}

#[derive(Error, Debug)]
pub enum StatsError {
    #[error("no results to reduce: the result log is empty")]
    EmptyResultSet,
}

/// Aggregate of output/progress sink write failures. Sink errors never abort
/// a run; they are collected here and surfaced once, after the run ends.
#[derive(Error, Debug, Default)]
#[error("{} sink write failure(s), inspect `errors` for details", .errors.len())]
pub struct SinkError {
    pub errors: Vec<io::Error>,
}

#[derive(Error, Debug)]
pub enum RepeatError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("runner error: {0}")]
    Runner(#[from] RunnerError),
    #[error("statistics error: {0}")]
    Stats(#[from] StatsError),
    #[error("worker task failed: {0}")]
    Join(String),
}
