// src/error.rs
//
// Error taxonomy for the benchmark engine.
//
// Structural errors (Config, Io) abort the enclosing operation and surface
// to the caller. Data errors are recovered where they occur (a malformed
// event record is skipped and counted, never fatal to aggregation) and only
// raised when an entire input is unusable. Operation-level failures are not
// errors at all: they are captured as event records and the run continues.

use std::path::Path;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, BenchError>;

#[derive(Debug, Error)]
pub enum BenchError {
    /// Invalid or inconsistent configuration / dataset reference.
    /// Fatal: aborts the run before any operation executes.
    #[error("config error: {0}")]
    Config(String),

    /// Dataset or log path unreadable/unwritable. Fatal.
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// Unusable benchmark data (e.g. an event log with no valid records).
    #[error("data error: {0}")]
    Data(String),
}

impl BenchError {
    pub fn config(msg: impl Into<String>) -> Self {
        BenchError::Config(msg.into())
    }

    pub fn data(msg: impl Into<String>) -> Self {
        BenchError::Data(msg.into())
    }

    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        BenchError::Io {
            context: context.into(),
            source,
        }
    }

    /// Io error carrying the offending path in its context string.
    pub fn io_at(action: &str, path: &Path, source: std::io::Error) -> Self {
        BenchError::Io {
            context: format!("{} {}", action, path.display()),
            source,
        }
    }
}
