//! Replaying recorded event logs
//!
//! A log written by [`EventLogger`](crate::core::logger::EventLogger) holds
//! every lock event in the order the instrumentation lock saw them. Feeding
//! those events into a fresh checker reproduces its findings offline.

use crate::core::checker::Checker;
use crate::core::logger::LogRecord;
use crate::core::types::{Events, LockId, ThreadId};
use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Counters of a replay run
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReplaySummary {
    /// Lock and unlock events fed to the checker
    pub events: usize,
    /// Diagnostic records that were already present in the log
    pub recorded_diagnostics: usize,
}

/// Feed every event record of the log at `path` into `checker`
///
/// # Errors
/// Returns an error if the file cannot be read or a line is not a valid
/// log record.
pub fn replay_log<P: AsRef<Path>>(
    path: P,
    checker: &mut Checker<LockId, ThreadId>,
) -> Result<ReplaySummary> {
    let path = path.as_ref();
    let file =
        File::open(path).with_context(|| format!("Failed to open log {}", path.display()))?;

    let mut summary = ReplaySummary::default();
    for (number, line) in BufReader::new(file).lines().enumerate() {
        let line = line.with_context(|| format!("Failed to read line {}", number + 1))?;
        if line.trim().is_empty() {
            continue;
        }
        let record: LogRecord = serde_json::from_str(&line)
            .with_context(|| format!("Invalid log record on line {}", number + 1))?;
        apply(record, checker, &mut summary);
    }
    Ok(summary)
}

/// Feed already parsed records into `checker`
pub fn replay_records<I>(records: I, checker: &mut Checker<LockId, ThreadId>) -> ReplaySummary
where
    I: IntoIterator<Item = LogRecord>,
{
    let mut summary = ReplaySummary::default();
    for record in records {
        apply(record, checker, &mut summary);
    }
    summary
}

fn apply(record: LogRecord, checker: &mut Checker<LockId, ThreadId>, summary: &mut ReplaySummary) {
    match record {
        LogRecord::Event(entry) => {
            match entry.event {
                Events::Lock => checker.on_lock(entry.lock_id, entry.thread_id),
                Events::Unlock => checker.on_unlock(entry.lock_id, entry.thread_id),
            }
            summary.events += 1;
        }
        LogRecord::Diagnostic(_) => summary.recorded_diagnostics += 1,
    }
}
