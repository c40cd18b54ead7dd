// src/oplog.rs
//
// Append-only event log: one NDJSON line per measured iteration, one log
// per provider per run. Each line is self-contained, so a run killed
// mid-flight still leaves every completed iteration on disk — the writer
// flushes before accepting the next record.
//
// The reader is the aggregator's input path: malformed lines are skipped
// and counted, never fatal.

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{BenchError, Result};
use crate::executor::OpKind;

/// Final outcome of one measured iteration, after any retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Success,
    /// Fatal failure, or a retryable failure that exhausted its retries.
    Failure,
    /// The last attempt timed out.
    Timeout,
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success)
    }
}

/// One recorded benchmark iteration. Written exactly once, never mutated.
///
/// `attempts` counts every try including retries; `duration_ms` is the sum
/// of attempt durations (backoff waits excluded); `bytes` is what the final
/// attempt transferred.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub provider: String,
    pub op: OpKind,
    pub iteration: u32,
    #[serde(default = "default_attempts")]
    pub attempts: u32,
    /// Wall-clock start of the iteration's first attempt (unix epoch ms).
    #[serde(default)]
    pub start_ms: u64,
    pub duration_ms: f64,
    pub bytes: u64,
    pub outcome: Outcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn default_attempts() -> u32 {
    1
}

/// Single writer owning exclusive access to one event log.
pub struct OpLogWriter {
    path: PathBuf,
    file: File,
}

impl OpLogWriter {
    /// Open (truncate) the log for a new run.
    pub fn create(path: &Path) -> Result<OpLogWriter> {
        let file =
            File::create(path).map_err(|e| BenchError::io_at("failed to create log", path, e))?;
        Ok(OpLogWriter {
            path: path.to_path_buf(),
            file,
        })
    }

    /// Append one record and flush it to disk before returning. The next
    /// record is not accepted until this one is durable.
    pub fn append(&mut self, record: &EventRecord) -> Result<()> {
        let mut line = serde_json::to_string(record)
            .map_err(|e| BenchError::data(format!("failed to serialize event record: {}", e)))?;
        line.push('\n');
        self.file
            .write_all(line.as_bytes())
            .map_err(|e| BenchError::io_at("failed to append to log", &self.path, e))?;
        self.file
            .flush()
            .map_err(|e| BenchError::io_at("failed to flush log", &self.path, e))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Records parsed from one log, plus how many lines were unusable.
#[derive(Debug, Default)]
pub struct LogContents {
    pub records: Vec<EventRecord>,
    pub malformed: usize,
}

/// Read one event log. Blank lines are ignored; unparsable lines are
/// counted as malformed and skipped.
pub fn read_log(path: &Path) -> Result<LogContents> {
    let file = File::open(path).map_err(|e| BenchError::io_at("failed to open log", path, e))?;
    let reader = BufReader::new(file);

    let mut contents = LogContents::default();
    for (lineno, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| BenchError::io_at("failed to read log", path, e))?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        match serde_json::from_str::<EventRecord>(trimmed) {
            Ok(record) => contents.records.push(record),
            Err(e) => {
                debug!(
                    line = lineno + 1,
                    error = %e,
                    "skipping malformed record in {}",
                    path.display()
                );
                contents.malformed += 1;
            }
        }
    }
    Ok(contents)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(iteration: u32) -> EventRecord {
        EventRecord {
            provider: "ic-eu".to_string(),
            op: OpKind::Put,
            iteration,
            attempts: 1,
            start_ms: 1_700_000_000_000,
            duration_ms: 12.5,
            bytes: 1024,
            outcome: Outcome::Success,
            error: None,
        }
    }

    #[test]
    fn test_append_then_read_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ic-eu.ndjson");

        let mut writer = OpLogWriter::create(&path).unwrap();
        writer.append(&record(1)).unwrap();
        writer.append(&record(2)).unwrap();
        drop(writer);

        let contents = read_log(&path).unwrap();
        assert_eq!(contents.records.len(), 2);
        assert_eq!(contents.malformed, 0);
        assert_eq!(contents.records[0], record(1));
        assert_eq!(contents.records[1].iteration, 2);
    }

    #[test]
    fn test_success_record_omits_error_field() {
        let line = serde_json::to_string(&record(1)).unwrap();
        assert!(!line.contains("\"error\""));
        assert!(line.contains("\"op\":\"PUT\""));
        assert!(line.contains("\"outcome\":\"success\""));
    }

    #[test]
    fn test_malformed_lines_are_counted_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mixed.ndjson");
        let good = serde_json::to_string(&record(1)).unwrap();
        std::fs::write(
            &path,
            format!("{}\nnot json at all\n\n{{\"provider\":\"x\"}}\n{}\n", good, good),
        )
        .unwrap();

        let contents = read_log(&path).unwrap();
        assert_eq!(contents.records.len(), 2);
        assert_eq!(contents.malformed, 2);
    }

    #[test]
    fn test_missing_log_is_io_error() {
        let err = read_log(Path::new("/no/such/log.ndjson")).unwrap_err();
        assert!(matches!(err, BenchError::Io { .. }));
    }
}
