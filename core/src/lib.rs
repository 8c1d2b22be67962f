//! encore-core: the adaptive repeat scheduler.
//!
//! Turns a "run this command N times with W workers" request into a
//! concurrency-safe execution plan: a delegator streaming task indices, a
//! fixed pool of self-throttling workers, a result collector with a live
//! completion estimate, and a statistics reduction over the result log.

pub mod config;
pub mod error;
pub mod output;
pub mod plan;
pub mod repeat;
pub mod runner;
pub mod stats;
pub mod task;

pub use error::{ConfigError, RepeatError, RunnerError, SinkError, StatsError};
pub use output::{ProgressFormat, ReportFile, SinkMode, DEFAULT_PROGRESS_FORMAT};
pub use repeat::{Repeat, RepeatRequest, RunReport};
pub use stats::{Statistics, TaskOutcome};
