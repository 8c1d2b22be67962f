use std::sync::Arc;

use clap::Parser;
use thiserror::Error;
use tokio::sync::watch;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use encore_core::config::LoggingConfig;
use encore_core::repeat::RunReport;
use encore_core::{
    ProgressFormat, Repeat, RepeatError, RepeatRequest, ReportFile, StatsError,
};

mod cli;
mod report;
mod status;

use status::Status;

static LOG_GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
    std::sync::OnceLock::new();

#[derive(Error, Debug)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("{0}")]
    Repeat(#[from] RepeatError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0:#}")]
    Anyhow(#[from] anyhow::Error),
}

#[tokio::main]
async fn main() {
    let exit = match real_main().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{e}");
            exit_code_for_error(&e)
        }
    };

    std::process::exit(exit);
}

fn exit_code_for_error(e: &CliError) -> i32 {
    // 0: success
    // 11: config error
    // 20: runner / IO error
    // 50: internal/uncategorized
    match e {
        CliError::Config(_) => 11,
        CliError::Repeat(re) => match re {
            RepeatError::Config(_) => 11,
            RepeatError::Runner(_) => 20,
            RepeatError::Stats(_) => 50,
            RepeatError::Join(_) => 50,
        },
        CliError::Io(_) => 20,
        CliError::Anyhow(_) => 50,
    }
}

async fn real_main() -> Result<i32, CliError> {
    let args = cli::Args::parse();
    let cfg = encore_core::config::load_default().map_err(|e| CliError::Config(e.to_string()))?;
    init_tracing(&cfg.logging).map_err(CliError::Config)?;

    let status = Status::new(args.no_color);

    let report_file = match &args.file {
        Some(path) => {
            match report::acquire_report_file(path, args.file_mode, &status)? {
                Some(file) => Some(Arc::new(ReportFile::new(path, file))),
                None => {
                    // User chose to quit at the conflict prompt.
                    return Ok(0);
                }
            }
        }
        None => None,
    };

    let request = RepeatRequest {
        requested: args.count,
        workers: args.workers.unwrap_or(cfg.repeat.workers),
        argv: args.command.clone(),
        increment: args.increment,
        retry_on_fail: if args.no_retry {
            false
        } else {
            cfg.repeat.retry_on_fail
        },
        output: args.output.into(),
        progress: args.progress.into(),
        progress_format: ProgressFormat::new(
            args.progress_format
                .clone()
                .unwrap_or(cfg.repeat.progress_format),
        ),
        report_file,
        capture_dir: args.capture_dir.clone(),
    };

    if args.verbose {
        println!("Operation:\n{request}\n------");
    }

    let repeat = match Repeat::new(request) {
        Ok(repeat) => Arc::new(repeat),
        Err(e) => {
            status.err(&format!("{e}\n"));
            return Ok(exit_code_for_error(&CliError::Config(e.to_string())));
        }
    };

    let (cancel_tx, cancel_rx) = watch::channel(false);
    let mut run = {
        let repeat = repeat.clone();
        tokio::spawn(async move { repeat.run(cancel_rx).await })
    };

    let outcome = tokio::select! {
        res = &mut run => res,
        _ = tokio::signal::ctrl_c() => {
            status.warn("interrupt received, draining completed work\n");
            let _ = cancel_tx.send(true);
            tokio::select! {
                res = &mut run => res,
                _ = tokio::signal::ctrl_c() => {
                    status.err("aborting graceful shutdown\n");
                    return Ok(130);
                }
            }
        }
    };

    let run_result = outcome.map_err(|e| CliError::Repeat(RepeatError::Join(e.to_string())))?;
    finish(run_result, &args, &status)
}

fn finish(
    run_result: Result<RunReport, RepeatError>,
    args: &cli::Args,
    status: &Status,
) -> Result<i32, CliError> {
    let report = match run_result {
        Ok(report) => report,
        Err(RepeatError::Stats(StatsError::EmptyResultSet)) => {
            status.warn("no invocation completed, nothing to report\n");
            return Ok(130);
        }
        Err(e) => return Err(e.into()),
    };

    if let Some(sink_err) = &report.sink_failures {
        status.warn(&format!("{sink_err}\n"));
        for e in &sink_err.errors {
            tracing::warn!(error = %e, "sink write failure");
        }
    }

    if !args.no_statistics {
        println!("{}", report.stats);
    }

    if let Some(path) = &args.result {
        report::write_result_json(path, &report.stats.results)?;
        status.ok(&format!("printing results to file: {}\n", path.display()));
    }

    if report.cancelled {
        status.ok("graceful shutdown complete\n");
        Ok(130)
    } else {
        status.ok("the repeat has been done. Farewell.\n");
        Ok(0)
    }
}

fn init_tracing(logging: &LoggingConfig) -> Result<(), String> {
    if !logging.enabled {
        return Ok(());
    }

    let filter = match std::env::var("RUST_LOG") {
        Ok(v) if !v.trim().is_empty() => EnvFilter::from_default_env(),
        _ => EnvFilter::try_new(logging.level.clone()).map_err(|e| e.to_string())?,
    };

    let mut maybe_writer = None;

    if logging.file {
        let dir = match logging
            .directory
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            Some(d) => std::path::PathBuf::from(d),
            None => std::env::temp_dir().join("encore"),
        };

        std::fs::create_dir_all(&dir).map_err(|e| format!("create log dir failed: {e}"))?;
        let file_name = format!("encore.{}.log", std::process::id());
        let appender = tracing_appender::rolling::never(dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(appender);
        let _ = LOG_GUARD.set(guard);
        maybe_writer = Some(non_blocking);
    }

    if !logging.console && maybe_writer.is_none() {
        return Ok(());
    }

    let console_layer = logging.console.then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(atty::is(atty::Stream::Stderr))
    });

    let file_layer = maybe_writer.map(|w| {
        tracing_subscriber::fmt::layer()
            .with_writer(w)
            .with_ansi(false)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    Ok(())
}
