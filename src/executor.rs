// src/executor.rs
//
// Pluggable operation executor boundary.
//
// The loop controller treats "issue operation X against the configured
// endpoint, observe duration/bytes/outcome" as an atomic primitive. Concrete
// executors (S3Store, FileStore) implement the trait; the controller never
// learns which protocol backs it. The per-attempt timeout is enforced HERE,
// not by the controller polling from outside: a timed-out attempt is aborted
// (its future is dropped) and reported as `TimedOut`, never left running.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// Storage operation kinds exercised by the benchmark matrix.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum OpKind {
    Put,
    Get,
    List,
    Head,
    Delete,
}

impl OpKind {
    pub fn name(&self) -> &'static str {
        match self {
            OpKind::Put => "PUT",
            OpKind::Get => "GET",
            OpKind::List => "LIST",
            OpKind::Head => "HEAD",
            OpKind::Delete => "DELETE",
        }
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One operation to perform. For PUT, `payload` points at the local dataset
/// file to upload; other kinds carry no payload. LIST addresses the bucket
/// prefix and leaves `key` empty.
#[derive(Debug, Clone)]
pub struct OpRequest {
    pub kind: OpKind,
    pub key: String,
    pub payload: Option<PathBuf>,
    pub timeout: Duration,
}

/// Outcome of a single attempt, as classified by the executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success,
    /// Transient transport-level failure; the controller may retry.
    Retryable(String),
    /// Definitive failure (e.g. missing object); retrying cannot help.
    Fatal(String),
    /// The attempt exceeded its timeout and was aborted.
    TimedOut,
}

impl AttemptOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, AttemptOutcome::Success)
    }

    /// Timeouts and transient transport failures qualify for local retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AttemptOutcome::Retryable(_) | AttemptOutcome::TimedOut)
    }
}

/// Observed result of one attempt: wall duration, bytes moved, outcome.
#[derive(Debug, Clone)]
pub struct Attempt {
    pub duration: Duration,
    pub bytes: u64,
    pub outcome: AttemptOutcome,
}

/// Failure classification bubbled up from a concrete store's dispatch.
#[derive(Debug)]
pub struct OpFailure {
    pub retryable: bool,
    pub message: String,
}

impl OpFailure {
    pub fn retryable(message: impl Into<String>) -> Self {
        OpFailure {
            retryable: true,
            message: message.into(),
        }
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        OpFailure {
            retryable: false,
            message: message.into(),
        }
    }
}

/// Capability interface performing one storage operation per call.
///
/// Credentials are bound into the concrete executor at construction time and
/// stay opaque to everything above this boundary. Implementations must honor
/// `req.timeout` (see `timed_attempt`).
#[async_trait]
pub trait OpExecutor: Send + Sync {
    async fn execute(&self, req: &OpRequest) -> Attempt;
}

/// Shared timeout/measurement wrapper for concrete executors.
///
/// Runs `op` under `tokio::time::timeout`, converting the three terminal
/// states into an `Attempt`. `op` resolves to the number of bytes moved on
/// success or an `OpFailure` carrying the retryable/fatal classification.
pub async fn timed_attempt<F>(timeout: Duration, op: F) -> Attempt
where
    F: Future<Output = std::result::Result<u64, OpFailure>> + Send,
{
    let start = Instant::now();
    match tokio::time::timeout(timeout, op).await {
        Ok(Ok(bytes)) => Attempt {
            duration: start.elapsed(),
            bytes,
            outcome: AttemptOutcome::Success,
        },
        Ok(Err(failure)) => Attempt {
            duration: start.elapsed(),
            bytes: 0,
            outcome: if failure.retryable {
                AttemptOutcome::Retryable(failure.message)
            } else {
                AttemptOutcome::Fatal(failure.message)
            },
        },
        Err(_) => Attempt {
            duration: start.elapsed(),
            bytes: 0,
            outcome: AttemptOutcome::TimedOut,
        },
    }
}
