//! Report-file acquisition (with the interactive conflict prompt) and the
//! JSON result file.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

use anyhow::Context;
use encore_core::TaskOutcome;

use crate::cli::FileModeArg;
use crate::status::Status;

/// Open the report file. An existing file is truncated or appended to per
/// `mode`; with no mode set the user is asked. `Ok(None)` means the user
/// chose to quit, which is a clean exit, not an error.
pub fn acquire_report_file(
    path: &Path,
    mode: Option<FileModeArg>,
    status: &Status,
) -> anyhow::Result<Option<File>> {
    if !path.exists() {
        let file = File::create(path)
            .with_context(|| format!("failed to create report file {}", path.display()))?;
        return Ok(Some(file));
    }

    let mode = match mode {
        Some(mode) => mode,
        None => match prompt_for_mode(path, status)? {
            Some(mode) => mode,
            None => return Ok(None),
        },
    };

    let file = match mode {
        FileModeArg::Truncate => File::create(path),
        FileModeArg::Append => OpenOptions::new().append(true).open(path),
    }
    .with_context(|| format!("failed to open report file {}", path.display()))?;
    Ok(Some(file))
}

fn prompt_for_mode(path: &Path, status: &Status) -> anyhow::Result<Option<FileModeArg>> {
    status.warn(&format!(
        "file: \"{}\" already exists. Would you like to [t]runcate, [a]ppend or [q]uit? [tT/aA/qQ]: ",
        path.display()
    ));
    std::io::stdout().flush().ok();

    let mut reply = String::new();
    std::io::stdin().read_line(&mut reply)?;
    match reply.trim().to_ascii_lowercase().as_str() {
        "t" => Ok(Some(FileModeArg::Truncate)),
        "a" => Ok(Some(FileModeArg::Append)),
        "q" => Ok(None),
        other => anyhow::bail!(
            "unrecognized reply: {other:?}, valid options are [tT], [aA] or [qQ]"
        ),
    }
}

/// Write all performed tasks as JSON, sorted by runtime so the fastest
/// invocations come first.
pub fn write_result_json(path: &Path, outcomes: &[TaskOutcome]) -> anyhow::Result<()> {
    let mut sorted = outcomes.to_vec();
    sorted.sort_by_key(|o| o.runtime);
    let json = serde_json::to_string(&sorted)?;
    std::fs::write(path, json)
        .with_context(|| format!("failed to write result file {}", path.display()))?;
    Ok(())
}
