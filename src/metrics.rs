// src/metrics.rs
//
// Metrics aggregator: a pure, deterministic reduction of event logs into
// per-(provider, operation) summary rows.
//
// Percentile rule, stated once and used everywhere: nearest-rank — p(q) is
// the ceil(q * n)-th value (1-based) of the ascending duration list.
// Latency percentiles/mean and throughput are computed over successful
// records only; error rate and the sample count cover every record for the
// group. Re-aggregating the same logs therefore yields identical rows.

use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::constants::EVENT_LOG_EXTENSION;
use crate::error::{BenchError, Result};
use crate::executor::OpKind;
use crate::manifest;
use crate::oplog::{self, EventRecord};

/// Statistical summary for one (provider, operation) pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateRow {
    pub provider: String,
    pub op: OpKind,
    /// Every record for the pair, successful or not.
    pub samples: u64,
    pub p50_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
    pub avg_ms: f64,
    /// Mean throughput in decimal MB/s: sum bytes / sum duration, successes only.
    pub throughput_mbps: f64,
    /// Failed-or-timeout records / total records.
    pub error_rate: f64,
}

/// Result of aggregating a set of event logs.
#[derive(Debug, Default)]
pub struct AggregateSummary {
    /// Rows grouped per provider, each sorted by operation.
    pub per_provider: BTreeMap<String, Vec<AggregateRow>>,
    /// Union of all rows, keyed and sorted by (provider, operation).
    pub consolidated: Vec<AggregateRow>,
    /// Malformed lines skipped across all logs.
    pub malformed_records: usize,
    /// SHA-256 of the dataset manifest, when one sits beside the logs.
    /// Links every summary back to the exact dataset that produced it.
    pub manifest_sha256: Option<String>,
}

/// Reduce a flat record set into aggregate rows, one per (provider, op),
/// sorted by that key. Pure: same records in, same rows out.
pub fn aggregate_records(records: &[EventRecord]) -> Vec<AggregateRow> {
    let mut groups: BTreeMap<(&str, OpKind), Vec<&EventRecord>> = BTreeMap::new();
    for record in records {
        groups
            .entry((record.provider.as_str(), record.op))
            .or_default()
            .push(record);
    }

    groups
        .into_iter()
        .map(|((provider, op), group)| {
            let total = group.len() as u64;
            let failed = group.iter().filter(|r| !r.outcome.is_success()).count() as u64;

            let mut durations: Vec<f64> = group
                .iter()
                .filter(|r| r.outcome.is_success())
                .map(|r| r.duration_ms)
                .collect();
            durations.sort_by(f64::total_cmp);

            let success_bytes: u64 = group
                .iter()
                .filter(|r| r.outcome.is_success())
                .map(|r| r.bytes)
                .sum();
            let success_ms: f64 = durations.iter().sum();

            let avg_ms = if durations.is_empty() {
                0.0
            } else {
                success_ms / durations.len() as f64
            };
            let throughput_mbps = if success_ms > 0.0 {
                (success_bytes as f64 / 1e6) / (success_ms / 1000.0)
            } else {
                0.0
            };

            AggregateRow {
                provider: provider.to_string(),
                op,
                samples: total,
                p50_ms: nearest_rank(&durations, 0.50),
                p95_ms: nearest_rank(&durations, 0.95),
                p99_ms: nearest_rank(&durations, 0.99),
                avg_ms,
                throughput_mbps,
                error_rate: failed as f64 / total as f64,
            }
        })
        .collect()
}

/// Nearest-rank percentile over an ascending list; 0.0 for an empty list.
fn nearest_rank(sorted: &[f64], quantile: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = (quantile * sorted.len() as f64).ceil() as usize;
    sorted[rank.clamp(1, sorted.len()) - 1]
}

/// Aggregate a set of event logs: per-provider tables plus the consolidated
/// table (the union of per-provider rows — each group's records live in
/// exactly one log, so consolidation never double-counts).
pub fn aggregate_logs(paths: &[PathBuf]) -> Result<AggregateSummary> {
    let mut all_records = Vec::new();
    let mut malformed = 0usize;

    for path in paths {
        let contents = oplog::read_log(path)?;
        if contents.malformed > 0 {
            warn!(
                malformed = contents.malformed,
                "skipped malformed records in {}",
                path.display()
            );
        }
        malformed += contents.malformed;
        all_records.extend(contents.records);
    }

    if all_records.is_empty() {
        return Err(BenchError::data(
            "event logs contained no valid records to aggregate",
        ));
    }

    let consolidated = aggregate_records(&all_records);
    let mut per_provider: BTreeMap<String, Vec<AggregateRow>> = BTreeMap::new();
    for row in &consolidated {
        per_provider
            .entry(row.provider.clone())
            .or_default()
            .push(row.clone());
    }

    Ok(AggregateSummary {
        per_provider,
        consolidated,
        malformed_records: malformed,
        manifest_sha256: None,
    })
}

/// Aggregate every `*.ndjson` log in a directory (sorted by name for a
/// deterministic read order) and stamp the summary with the manifest hash
/// when the directory also holds the dataset manifest.
pub fn aggregate_dir(dir: &Path) -> Result<AggregateSummary> {
    let entries = std::fs::read_dir(dir)
        .map_err(|e| BenchError::io_at("failed to read log directory", dir, e))?;

    let mut logs: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.extension()
                .map(|ext| ext == EVENT_LOG_EXTENSION)
                .unwrap_or(false)
        })
        .collect();
    logs.sort();

    if logs.is_empty() {
        return Err(BenchError::data(format!(
            "no .{} event logs found in {}",
            EVENT_LOG_EXTENSION,
            dir.display()
        )));
    }
    info!(logs = logs.len(), "aggregating event logs from {}", dir.display());

    let mut summary = aggregate_logs(&logs)?;

    let manifest_path = manifest::Manifest::manifest_path(dir);
    if manifest_path.exists() {
        summary.manifest_sha256 = Some(manifest::sha256_file(&manifest_path)?);
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oplog::Outcome;

    fn record(provider: &str, op: OpKind, duration_ms: f64, bytes: u64, outcome: Outcome) -> EventRecord {
        EventRecord {
            provider: provider.to_string(),
            op,
            iteration: 1,
            attempts: 1,
            start_ms: 0,
            duration_ms,
            bytes,
            outcome,
            error: None,
        }
    }

    #[test]
    fn test_nearest_rank_percentiles() {
        let durations: Vec<f64> = (1..=100).map(|i| i as f64).collect();
        assert_eq!(nearest_rank(&durations, 0.50), 50.0);
        assert_eq!(nearest_rank(&durations, 0.95), 95.0);
        assert_eq!(nearest_rank(&durations, 0.99), 99.0);

        // Small lists: ceil(0.5 * 3) = 2nd value, ceil(0.99 * 3) = 3rd.
        let three = vec![10.0, 20.0, 30.0];
        assert_eq!(nearest_rank(&three, 0.50), 20.0);
        assert_eq!(nearest_rank(&three, 0.99), 30.0);
        assert_eq!(nearest_rank(&[], 0.50), 0.0);
    }

    #[test]
    fn test_aggregation_is_idempotent() {
        let records = vec![
            record("a", OpKind::Put, 10.0, 1000, Outcome::Success),
            record("a", OpKind::Put, 20.0, 1000, Outcome::Success),
            record("a", OpKind::Put, 30.0, 0, Outcome::Timeout),
        ];
        assert_eq!(aggregate_records(&records), aggregate_records(&records));
    }

    #[test]
    fn test_error_rate_and_sample_count_cover_all_records() {
        let records = vec![
            record("a", OpKind::Get, 10.0, 100, Outcome::Success),
            record("a", OpKind::Get, 12.0, 100, Outcome::Success),
            record("a", OpKind::Get, 50.0, 0, Outcome::Failure),
            record("a", OpKind::Get, 60.0, 0, Outcome::Timeout),
        ];
        let rows = aggregate_records(&records);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].samples, 4);
        assert_eq!(rows[0].error_rate, 0.5);
        // Latency stats exclude the failures.
        assert_eq!(rows[0].avg_ms, 11.0);
        assert_eq!(rows[0].p99_ms, 12.0);
    }

    #[test]
    fn test_throughput_sums_successes_only() {
        let records = vec![
            record("a", OpKind::Put, 1000.0, 5_000_000, Outcome::Success),
            record("a", OpKind::Put, 1000.0, 5_000_000, Outcome::Success),
            record("a", OpKind::Put, 1000.0, 9_999_999, Outcome::Failure),
        ];
        let rows = aggregate_records(&records);
        // 10 MB over 2 seconds.
        assert!((rows[0].throughput_mbps - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_all_failures_yield_zeroed_latency_stats() {
        let records = vec![record("a", OpKind::Get, 50.0, 0, Outcome::Failure)];
        let rows = aggregate_records(&records);
        assert_eq!(rows[0].samples, 1);
        assert_eq!(rows[0].error_rate, 1.0);
        assert_eq!(rows[0].p50_ms, 0.0);
        assert_eq!(rows[0].throughput_mbps, 0.0);
    }

    #[test]
    fn test_groups_are_keyed_by_provider_and_op() {
        let records = vec![
            record("a", OpKind::Put, 10.0, 1, Outcome::Success),
            record("b", OpKind::Put, 10.0, 1, Outcome::Success),
            record("a", OpKind::Get, 10.0, 1, Outcome::Success),
        ];
        let rows = aggregate_records(&records);
        assert_eq!(rows.len(), 3);
        // Sorted by (provider, op); OpKind orders PUT before GET in the
        // matrix ordering (declaration order).
        assert_eq!(rows[0].provider, "a");
        assert_eq!(rows[0].op, OpKind::Put);
        assert_eq!(rows[1].provider, "a");
        assert_eq!(rows[1].op, OpKind::Get);
        assert_eq!(rows[2].provider, "b");
    }
}
