//! Run summaries, exit status, and the JSON report file.

use std::io::{self, Write};

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8::Dir};
use thiserror::Error;

use crate::fleet::FleetReport;
use crate::rotation::RotationResult;

/// Exit status when every volume rotated cleanly.
pub const EXIT_SUCCESS: i32 = 0;
/// Exit status when at least one volume recorded a failure.
pub const EXIT_FAILURE: i32 = 1;
/// Exit status for configuration errors detected before any provider call.
pub const EXIT_CONFIG_ERROR: i32 = 2;

/// Errors raised while writing the JSON report.
#[derive(Debug, Error)]
pub enum ReportError {
    /// Raised when file system operations fail.
    #[error("failed to write report {path}: {message}")]
    Io {
        /// Path that could not be written.
        path: Utf8PathBuf,
        /// Human-readable error message.
        message: String,
    },
    /// Raised when the report cannot be serialised.
    #[error("failed to encode report: {0}")]
    Encode(String),
}

/// Maps a fleet report to the process exit status.
#[must_use]
pub fn exit_code(report: &FleetReport) -> i32 {
    if report.is_success() {
        EXIT_SUCCESS
    } else {
        EXIT_FAILURE
    }
}

/// Writes a human-readable summary: one line per volume, failures and
/// warnings indented beneath it, and a closing totals line.
///
/// # Errors
///
/// Returns any error raised by `out`.
pub fn write_summary(mut out: impl Write, report: &FleetReport) -> io::Result<()> {
    for result in &report.results {
        write_volume(&mut out, result)?;
    }
    writeln!(
        out,
        "run {}: {} volume(s), {} snapshot(s) created, {} deleted, {} volume(s) failed",
        report.run_id,
        report.results.len(),
        report.created_count(),
        report.deleted_count(),
        report.failures().count()
    )
}

fn write_volume(out: &mut impl Write, result: &RotationResult) -> io::Result<()> {
    let status = if result.is_success() { "ok" } else { "FAILED" };
    let created = result
        .created
        .as_ref()
        .map_or("none", |record| record.id.as_str());
    writeln!(
        out,
        "{}: {status} (created {created}, deleted {}, kept {})",
        result.volume_id,
        result.deleted.len(),
        result.survived.len()
    )?;
    for message in result.failure_messages() {
        writeln!(out, "  error: {message}")?;
    }
    for warning in &result.warnings {
        writeln!(out, "  warning: {warning}")?;
    }
    Ok(())
}

/// Renders the report as pretty-printed JSON.
///
/// # Errors
///
/// Returns [`ReportError::Encode`] when serialisation fails.
pub fn render_json(report: &FleetReport) -> Result<String, ReportError> {
    serde_json::to_string_pretty(report).map_err(|err| ReportError::Encode(err.to_string()))
}

/// Writes the report as JSON to `path`, creating parent directories.
///
/// # Errors
///
/// Returns [`ReportError`] when encoding or any file system step fails.
pub fn write_json(path: &Utf8Path, report: &FleetReport) -> Result<(), ReportError> {
    let io_error = |target: &Utf8Path, message: String| ReportError::Io {
        path: target.to_path_buf(),
        message,
    };
    let file_name = path
        .file_name()
        .ok_or_else(|| io_error(path, String::from("report path is missing a filename")))?;
    let parent = match path.parent() {
        Some(dir) if !dir.as_str().is_empty() => dir,
        _ => Utf8Path::new("."),
    };

    Dir::create_ambient_dir_all(parent, ambient_authority())
        .map_err(|err| io_error(parent, err.to_string()))?;
    let dir = Dir::open_ambient_dir(parent, ambient_authority())
        .map_err(|err| io_error(parent, err.to_string()))?;

    let mut rendered = render_json(report)?;
    rendered.push('\n');
    dir.write(file_name, rendered)
        .map_err(|err| io_error(path, err.to_string()))
}
