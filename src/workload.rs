// src/workload.rs
//
// Benchmark loop controller.
//
// Drives warmup and measured iterations over the configured operation matrix
// against a pluggable executor, applying the retry/timeout policy and
// emitting exactly one event record per measured iteration. Operation-level
// failures are captured as data and the run continues; only structural
// configuration errors abort a run, and those abort it before any attempt
// executes.
//
// All mutable run state (the log writer, the cancellation flag) lives in an
// explicit RunContext so several runs can be driven from one process without
// interference.

use futures::stream::FuturesUnordered;
use futures::StreamExt;
use hdrhistogram::Histogram;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::config::TestPlan;
use crate::constants::{INITIAL_RETRY_DELAY_MS, MAX_RETRY_DELAY_MS, RETRY_BACKOFF_MULTIPLIER};
use crate::error::{BenchError, Result};
use crate::executor::{Attempt, AttemptOutcome, OpExecutor, OpKind, OpRequest};
use crate::manifest::Manifest;
use crate::oplog::{EventRecord, OpLogWriter, Outcome};

/// Per-run state shared by the controller and the recorder: provider
/// identity, the immutable plan, the dataset root for PUT payloads, the
/// single log writer, and the cancellation flag.
pub struct RunContext {
    pub provider_id: String,
    pub plan: TestPlan,
    pub dataset_root: PathBuf,
    writer: Mutex<OpLogWriter>,
    cancelled: AtomicBool,
}

impl RunContext {
    pub fn new(
        provider_id: impl Into<String>,
        plan: TestPlan,
        dataset_root: impl Into<PathBuf>,
        writer: OpLogWriter,
    ) -> Self {
        RunContext {
            provider_id: provider_id.into(),
            plan,
            dataset_root: dataset_root.into(),
            writer: Mutex::new(writer),
            cancelled: AtomicBool::new(false),
        }
    }

    /// Stop issuing new attempts. The in-flight attempt completes (or hits
    /// its own timeout) and its record is still written.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    fn record(&self, record: &EventRecord) -> Result<()> {
        self.writer.lock().unwrap().append(record)
    }
}

/// Execute one benchmark run. Returns the emitted records in write order
/// (completion order); each record is flushed to the context's log before
/// the next one is accepted. Restarting a benchmark means calling `run`
/// again with a fresh context.
pub async fn run(
    ctx: &RunContext,
    manifest: &Manifest,
    executor: &dyn OpExecutor,
) -> Result<Vec<EventRecord>> {
    ctx.plan.validate()?;
    if manifest.files.is_empty() {
        return Err(BenchError::config(
            "manifest lists no files; operations would reference no object keys",
        ));
    }

    let order = effective_order(&ctx.plan.operations, ctx.plan.cleanup_after_run);
    info!(
        provider = %ctx.provider_id,
        operations = ?order,
        iterations = ctx.plan.iterations,
        warmup = ctx.plan.warmup_operations,
        "starting benchmark run"
    );

    let mut records = Vec::with_capacity(order.len() * ctx.plan.iterations as usize);
    for kind in order {
        run_warmup(ctx, manifest, executor, kind).await;
        if ctx.plan.concurrency <= 1 {
            run_sequential(ctx, manifest, executor, kind, &mut records).await?;
        } else {
            run_concurrent(ctx, manifest, executor, kind, &mut records).await?;
        }
    }

    if ctx.plan.cleanup_after_run && !ctx.is_cancelled() {
        cleanup(ctx, manifest, executor).await;
    }

    info!(
        provider = %ctx.provider_id,
        records = records.len(),
        "benchmark run complete"
    );
    Ok(records)
}

/// Measured-phase order: with cleanup enabled, DELETE kinds move to the end
/// so later GET/HEAD iterations never race already-deleted keys.
pub fn effective_order(operations: &[OpKind], cleanup_after_run: bool) -> Vec<OpKind> {
    if !cleanup_after_run {
        return operations.to_vec();
    }
    let mut order: Vec<OpKind> = operations
        .iter()
        .copied()
        .filter(|k| *k != OpKind::Delete)
        .collect();
    order.extend(operations.iter().copied().filter(|k| *k == OpKind::Delete));
    order
}

async fn run_warmup(
    ctx: &RunContext,
    manifest: &Manifest,
    executor: &dyn OpExecutor,
    kind: OpKind,
) {
    for w in 0..ctx.plan.warmup_operations {
        if ctx.is_cancelled() {
            return;
        }
        let req = build_request(ctx, manifest, kind, w as usize % manifest.files.len());
        let attempt = executor.execute(&req).await;
        debug!(
            op = %kind,
            warmup = w + 1,
            success = attempt.outcome.is_success(),
            "warmup attempt discarded"
        );
    }
}

async fn run_sequential(
    ctx: &RunContext,
    manifest: &Manifest,
    executor: &dyn OpExecutor,
    kind: OpKind,
    records: &mut Vec<EventRecord>,
) -> Result<()> {
    for iteration in 1..=ctx.plan.iterations {
        if ctx.is_cancelled() {
            warn!(op = %kind, iteration, "run cancelled, not issuing further attempts");
            break;
        }
        let record = run_iteration(ctx, manifest, executor, kind, iteration).await;
        ctx.record(&record)?;
        records.push(record);
    }
    Ok(())
}

/// Bounded fan-out for iterations of one kind. The semaphore is fair, so
/// with concurrency 1 this degrades to sequential order; records are still
/// written strictly in completion order by this single collector.
async fn run_concurrent(
    ctx: &RunContext,
    manifest: &Manifest,
    executor: &dyn OpExecutor,
    kind: OpKind,
    records: &mut Vec<EventRecord>,
) -> Result<()> {
    let sem = Semaphore::new(ctx.plan.concurrency);
    let mut futs = FuturesUnordered::new();
    for iteration in 1..=ctx.plan.iterations {
        let sem = &sem;
        futs.push(async move {
            let _permit = sem.acquire().await.unwrap();
            if ctx.is_cancelled() {
                return None;
            }
            Some(run_iteration(ctx, manifest, executor, kind, iteration).await)
        });
    }
    while let Some(done) = futs.next().await {
        if let Some(record) = done {
            ctx.record(&record)?;
            records.push(record);
        }
    }
    Ok(())
}

/// Attempt state machine for one measured iteration.
enum RetryState {
    Issuing,
    Waiting(Duration),
    Retrying,
    Terminal(Attempt),
}

/// Run one iteration through the retry state machine and summarize it as a
/// single event record: the final attempt's outcome and bytes, the total
/// attempt count, and the summed attempt durations (backoff waits excluded).
async fn run_iteration(
    ctx: &RunContext,
    manifest: &Manifest,
    executor: &dyn OpExecutor,
    kind: OpKind,
    iteration: u32,
) -> EventRecord {
    let key_index = (iteration - 1) as usize % manifest.files.len();
    let req = build_request(ctx, manifest, kind, key_index);
    let start_ms = chrono::Utc::now().timestamp_millis() as u64;

    let mut attempts = 0u32;
    let mut active_ms = 0.0f64;
    let mut state = RetryState::Issuing;
    let terminal = loop {
        state = match state {
            RetryState::Issuing | RetryState::Retrying => {
                attempts += 1;
                let attempt = executor.execute(&req).await;
                active_ms += attempt.duration.as_secs_f64() * 1000.0;
                if attempt.outcome.is_retryable() && attempts <= ctx.plan.retry_attempts {
                    debug!(
                        op = %kind,
                        iteration,
                        attempt = attempts,
                        "retryable failure, backing off"
                    );
                    RetryState::Waiting(backoff_delay(attempts))
                } else {
                    RetryState::Terminal(attempt)
                }
            }
            RetryState::Waiting(delay) => {
                tokio::time::sleep(delay).await;
                RetryState::Retrying
            }
            RetryState::Terminal(attempt) => break attempt,
        };
    };

    let (outcome, error) = match terminal.outcome {
        AttemptOutcome::Success => (Outcome::Success, None),
        AttemptOutcome::TimedOut => (
            Outcome::Timeout,
            Some(format!("attempt timed out after {:?}", req.timeout)),
        ),
        AttemptOutcome::Retryable(msg) | AttemptOutcome::Fatal(msg) => {
            (Outcome::Failure, Some(msg))
        }
    };

    EventRecord {
        provider: ctx.provider_id.clone(),
        op: kind,
        iteration,
        attempts,
        start_ms,
        duration_ms: active_ms,
        bytes: terminal.bytes,
        outcome,
        error,
    }
}

/// Delay before retry N+1 after N completed attempts: exponential from
/// INITIAL_RETRY_DELAY_MS, capped at MAX_RETRY_DELAY_MS. No jitter, so a
/// replayed run waits the same way.
fn backoff_delay(completed_attempts: u32) -> Duration {
    let exp = completed_attempts.saturating_sub(1).min(16) as i32;
    let ms = INITIAL_RETRY_DELAY_MS as f64 * RETRY_BACKOFF_MULTIPLIER.powi(exp);
    Duration::from_millis((ms as u64).min(MAX_RETRY_DELAY_MS))
}

/// Object key and payload for one attempt. Keys cycle through the manifest
/// in entry order; LIST addresses the whole prefix.
fn build_request(
    ctx: &RunContext,
    manifest: &Manifest,
    kind: OpKind,
    key_index: usize,
) -> OpRequest {
    match kind {
        OpKind::List => OpRequest {
            kind,
            key: String::new(),
            payload: None,
            timeout: ctx.plan.timeout,
        },
        OpKind::Put => {
            let entry = &manifest.files[key_index];
            OpRequest {
                kind,
                key: entry.path.clone(),
                payload: Some(ctx.dataset_root.join(&entry.path)),
                timeout: ctx.plan.timeout,
            }
        }
        OpKind::Get | OpKind::Head | OpKind::Delete => OpRequest {
            kind,
            key: manifest.files[key_index].path.clone(),
            payload: None,
            timeout: ctx.plan.timeout,
        },
    }
}

/// Tolerant post-run cleanup: delete every manifest key, unrecorded.
/// Keys the measured DELETE phase already removed fail quietly.
async fn cleanup(ctx: &RunContext, manifest: &Manifest, executor: &dyn OpExecutor) {
    info!(
        provider = %ctx.provider_id,
        objects = manifest.files.len(),
        "cleaning up uploaded objects"
    );
    let mut removed = 0usize;
    for entry in &manifest.files {
        let req = OpRequest {
            kind: OpKind::Delete,
            key: entry.path.clone(),
            payload: None,
            timeout: ctx.plan.timeout,
        };
        let attempt = executor.execute(&req).await;
        if attempt.outcome.is_success() {
            removed += 1;
        } else {
            debug!(key = %entry.path, "cleanup delete failed (object may already be gone)");
        }
    }
    info!(removed, "cleanup complete");
}

/// End-of-run console summary. Informational only — the authoritative
/// numbers come from the metrics aggregator's exact reduction.
pub fn log_run_summary(provider: &str, records: &[EventRecord]) {
    let mut hists: BTreeMap<OpKind, Histogram<u64>> = BTreeMap::new();
    let mut failures = 0u64;

    for record in records {
        if record.outcome.is_success() {
            let hist = hists.entry(record.op).or_insert_with(|| {
                Histogram::<u64>::new_with_bounds(1, 3_600_000_000, 3)
                    .expect("failed to allocate histogram")
            });
            let _ = hist.record(((record.duration_ms * 1000.0) as u64).max(1));
        } else {
            failures += 1;
        }
    }

    println!("\n{} latency (µs):", provider);
    for (op, hist) in &hists {
        println!(
            "  [{:>6}] count={:<8} mean={:<10.0} p50={:<10} p95={:<10} p99={:<10} max={:<10}",
            op.name(),
            hist.len(),
            hist.mean(),
            hist.value_at_quantile(0.50),
            hist.value_at_quantile(0.95),
            hist.value_at_quantile(0.99),
            hist.max()
        );
    }
    if failures > 0 {
        println!("  {} failed or timed-out iterations (see event log)", failures);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_order_moves_delete_last() {
        let ops = vec![OpKind::Delete, OpKind::Get, OpKind::Put];
        assert_eq!(
            effective_order(&ops, true),
            vec![OpKind::Get, OpKind::Put, OpKind::Delete]
        );
        // Without cleanup the listed order stands.
        assert_eq!(effective_order(&ops, false), ops);
    }

    #[test]
    fn test_effective_order_preserves_relative_order() {
        let ops = vec![
            OpKind::Put,
            OpKind::Delete,
            OpKind::Get,
            OpKind::Head,
            OpKind::Delete,
        ];
        assert_eq!(
            effective_order(&ops, true),
            vec![
                OpKind::Put,
                OpKind::Get,
                OpKind::Head,
                OpKind::Delete,
                OpKind::Delete
            ]
        );
    }

    #[test]
    fn test_backoff_delay_doubles_and_caps() {
        assert_eq!(backoff_delay(1), Duration::from_millis(100));
        assert_eq!(backoff_delay(2), Duration::from_millis(200));
        assert_eq!(backoff_delay(3), Duration::from_millis(400));
        // Far enough out, the cap wins.
        assert_eq!(backoff_delay(12), Duration::from_millis(5_000));
    }
}
