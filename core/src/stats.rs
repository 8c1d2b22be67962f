//! Result model and the post-run statistics reduction.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::StatsError;

/// Outcome of one invocation attempt. Produced exactly once per attempt by
/// the worker that ran it, then owned by the result collector. JSON field
/// names are part of the report format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskOutcome {
    #[serde(rename = "workerID")]
    pub worker_id: usize,

    #[serde(rename = "taskIdx")]
    pub task_idx: u64,

    /// Wall-clock execution time, serialized as nanoseconds.
    #[serde(rename = "runtime", with = "duration_nanos")]
    pub runtime: Duration,

    #[serde(rename = "runtimeHumanReadable")]
    pub runtime_human: String,

    /// Combined stdout + stderr of the child, in arrival order. On failure
    /// the process error text is prefixed here.
    pub output: String,

    #[serde(rename = "isError")]
    pub is_error: bool,
}

mod duration_nanos {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        (d.as_nanos() as u64).serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_nanos(u64::deserialize(d)?))
    }
}

/// Immutable snapshot reduced from the final result log once the run ends.
#[derive(Debug, Clone)]
pub struct Statistics {
    /// Wall-clock runtime of the whole run.
    pub runtime: Duration,
    /// Sum of individual invocation runtimes.
    pub total: Duration,
    pub average: Duration,
    pub std_dev: Duration,
    pub min: TaskOutcome,
    pub max: TaskOutcome,
    /// Full result log, completion order.
    pub results: Vec<TaskOutcome>,
}

impl Statistics {
    /// Reduce the result log. Fails with [`StatsError::EmptyResultSet`] when
    /// nothing completed; on runtime ties the first occurrence wins.
    pub fn from_outcomes(
        run_wall_clock: Duration,
        results: Vec<TaskOutcome>,
    ) -> Result<Self, StatsError> {
        if results.is_empty() {
            return Err(StatsError::EmptyResultSet);
        }

        let mut total = Duration::ZERO;
        let mut min = &results[0];
        let mut max = &results[0];
        for r in &results {
            total += r.runtime;
            if r.runtime < min.runtime {
                min = r;
            }
            if r.runtime > max.runtime {
                max = r;
            }
        }

        let n = results.len() as u32;
        let average = total / n;

        let avg_nanos = average.as_nanos() as f64;
        let var_sum: f64 = results
            .iter()
            .map(|r| {
                let d = r.runtime.as_nanos() as f64 - avg_nanos;
                d * d
            })
            .sum();
        let std_dev = Duration::from_nanos((var_sum / n as f64).sqrt() as u64);

        let min = min.clone();
        let max = max.clone();

        Ok(Self {
            runtime: run_wall_clock,
            total,
            average,
            std_dev,
            min,
            max,
            results,
        })
    }
}

impl fmt::Display for Statistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "\nRuntime: {}, Total routine work time: {},\n\
             Average time per task: {}, Std deviation: {}\n\
             Max time, index: {}, time: {}\n\
             Min time, index: {}, time: {}",
            humanize(self.runtime),
            humanize(self.total),
            humanize(self.average),
            humanize(self.std_dev),
            self.max.task_idx,
            humanize(self.max.runtime),
            self.min.task_idx,
            humanize(self.min.runtime),
        )
    }
}

/// Short human-readable rendering of a duration, picking the unit by
/// magnitude.
pub fn humanize(d: Duration) -> String {
    let nanos = d.as_nanos();
    if nanos < 1_000 {
        format!("{nanos}ns")
    } else if nanos < 1_000_000 {
        format!("{:.1}µs", nanos as f64 / 1_000.0)
    } else if nanos < 1_000_000_000 {
        format!("{:.1}ms", nanos as f64 / 1_000_000.0)
    } else if nanos < 60 * 1_000_000_000 {
        format!("{:.2}s", d.as_secs_f64())
    } else {
        let secs = d.as_secs_f64();
        format!("{}m{:.1}s", (secs / 60.0) as u64, secs % 60.0)
    }
}
