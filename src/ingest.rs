//! Access-log import.
//!
//! Reads log files line by line, extracts LOGON/LOGOFF records and feeds
//! them to an [`EventStore`]. Lines that don't carry a record are skipped.

use chrono::NaiveDateTime;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use crate::error::{Result, UsageError};
use crate::store::event_store::EventStore;
use crate::store::types::{Event, EventKind};

/// Timestamp layout used in the logs.
const LOG_TIMESTAMP_FORMAT: &str = "%d/%m/%Y %H:%M:%S";

static LOG_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"\[(LOGON\.|LOGOFF)\] (\d{2}/\d{2}/\d{4} \d{2}:\d{2}:\d{2}) Computer="([^"]+)" User="([^"]+)""#,
    )
    .expect("log line pattern is valid")
});

/// Extracts the event carried by a log line, if any.
pub fn parse_line(line: &str) -> Option<Event> {
    let caps = LOG_LINE.captures(line)?;

    let kind = caps[1].parse::<EventKind>().ok()?;
    let timestamp = match NaiveDateTime::parse_from_str(&caps[2], LOG_TIMESTAMP_FORMAT) {
        Ok(ts) => ts,
        Err(e) => {
            tracing::trace!(timestamp = &caps[2], error = %e, "Skipping line with invalid date");
            return None;
        }
    };

    Some(Event::new(kind, timestamp, &caps[3], &caps[4]))
}

/// Outcome of importing a batch of sources.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImportReport {
    /// Sources read in this batch.
    pub imported: Vec<String>,

    /// Sources skipped because they were imported before.
    pub already_imported: Vec<String>,

    /// Lines that carried an event.
    pub events_read: usize,

    /// Events that were not already stored.
    pub events_stored: usize,

    /// Sources that could not be imported. They stay unmarked, so a later
    /// import retries them.
    pub failed: Vec<ImportFailure>,
}

/// A source that failed to import.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportFailure {
    pub source: String,
    pub error: &'static str,
    pub message: String,
}

/// Imports a single log file unless it was imported before.
///
/// Returns `false` when the source was skipped.
pub fn import_source(
    store: &dyn EventStore,
    path: &Path,
    report: &mut ImportReport,
) -> Result<bool> {
    let source = path.to_string_lossy().into_owned();

    if store.is_source_imported(&source)? {
        tracing::info!(source = %source, "Source already imported, skipping");
        report.already_imported.push(source);
        return Ok(false);
    }

    let io_err = |e: std::io::Error| UsageError::Io {
        path: path.to_path_buf(),
        source: e,
    };
    let reader = BufReader::new(File::open(path).map_err(io_err)?);

    let mut read = 0usize;
    let mut stored = 0usize;
    for line in reader.lines() {
        let line = line.map_err(io_err)?;
        let Some(event) = parse_line(&line) else {
            continue;
        };
        read += 1;
        if store.ingest(&event)? {
            stored += 1;
        }
    }

    store.mark_source_imported(&source)?;

    tracing::info!(source = %source, events = read, new = stored, "Imported log source");
    report.events_read += read;
    report.events_stored += stored;
    report.imported.push(source);
    Ok(true)
}

/// Imports every path in order.
///
/// A failing source is recorded in [`ImportReport::failed`] and the
/// remaining sources are still imported.
pub fn import_sources<P: AsRef<Path>>(store: &dyn EventStore, paths: &[P]) -> ImportReport {
    let mut report = ImportReport::default();
    for path in paths {
        let path = path.as_ref();
        if let Err(e) = import_source(store, path, &mut report) {
            tracing::warn!(path = ?path, error = %e, "Failed to import log source");
            report.failed.push(ImportFailure {
                source: path.to_string_lossy().into_owned(),
                error: e.kind(),
                message: e.to_string(),
            });
        }
    }
    report
}

/// Collects `.log` files from a list of files and directories.
///
/// Directories are scanned one level deep.
pub fn collect_log_files(inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for input in inputs {
        if !input.is_dir() {
            files.push(input.clone());
            continue;
        }

        let entries = std::fs::read_dir(input).map_err(|e| UsageError::Io {
            path: input.clone(),
            source: e,
        })?;
        let mut logs: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| {
                p.extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("log"))
            })
            .collect();
        logs.sort();
        files.extend(logs);
    }

    Ok(files)
}
