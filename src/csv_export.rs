// src/csv_export.rs
//
// CSV export for aggregate rows: one metrics_<provider>.csv per provider
// plus consolidated_metrics.csv across all providers. Consumed by the
// external chart-rendering tooling and by humans.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::constants::{CONSOLIDATED_CSV_FILENAME, PROVIDER_CSV_PREFIX};
use crate::error::{BenchError, Result};
use crate::metrics::{AggregateRow, AggregateSummary};

const CSV_HEADER: &str =
    "provider,op,samples,p50_ms,p95_ms,p99_ms,avg_ms,throughput_mbps,error_rate";

/// Write all CSVs for a summary into `out_dir`. Returns the written paths,
/// consolidated file last.
pub fn export_summary(summary: &AggregateSummary, out_dir: &Path) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(out_dir)
        .map_err(|e| BenchError::io_at("failed to create output directory", out_dir, e))?;

    let mut written = Vec::with_capacity(summary.per_provider.len() + 1);
    for (provider, rows) in &summary.per_provider {
        let path = out_dir.join(format!("{}{}.csv", PROVIDER_CSV_PREFIX, provider));
        write_rows(&path, rows)?;
        written.push(path);
    }

    let consolidated = out_dir.join(CONSOLIDATED_CSV_FILENAME);
    write_rows(&consolidated, &summary.consolidated)?;
    written.push(consolidated);

    info!(files = written.len(), "metrics CSVs exported to {}", out_dir.display());
    Ok(written)
}

fn write_rows(path: &Path, rows: &[AggregateRow]) -> Result<()> {
    let mut file =
        File::create(path).map_err(|e| BenchError::io_at("failed to create", path, e))?;
    writeln!(file, "{}", CSV_HEADER).map_err(|e| BenchError::io_at("failed to write", path, e))?;
    for row in rows {
        writeln!(
            file,
            "{},{},{},{:.3},{:.3},{:.3},{:.3},{:.3},{:.4}",
            row.provider,
            row.op,
            row.samples,
            row.p50_ms,
            row.p95_ms,
            row.p99_ms,
            row.avg_ms,
            row.throughput_mbps,
            row.error_rate
        )
        .map_err(|e| BenchError::io_at("failed to write", path, e))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::OpKind;
    use std::collections::BTreeMap;

    fn row(provider: &str, op: OpKind) -> AggregateRow {
        AggregateRow {
            provider: provider.to_string(),
            op,
            samples: 4,
            p50_ms: 10.0,
            p95_ms: 20.0,
            p99_ms: 25.0,
            avg_ms: 12.0,
            throughput_mbps: 100.0,
            error_rate: 0.25,
        }
    }

    #[test]
    fn test_export_writes_provider_and_consolidated_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut per_provider = BTreeMap::new();
        per_provider.insert("aws".to_string(), vec![row("aws", OpKind::Put)]);
        per_provider.insert("ic-eu".to_string(), vec![row("ic-eu", OpKind::Put)]);
        let summary = AggregateSummary {
            consolidated: vec![row("aws", OpKind::Put), row("ic-eu", OpKind::Put)],
            per_provider,
            malformed_records: 0,
            manifest_sha256: None,
        };

        let written = export_summary(&summary, dir.path()).unwrap();
        assert_eq!(written.len(), 3);
        assert!(dir.path().join("metrics_aws.csv").exists());
        assert!(dir.path().join("metrics_ic-eu.csv").exists());

        let consolidated =
            std::fs::read_to_string(dir.path().join(CONSOLIDATED_CSV_FILENAME)).unwrap();
        let lines: Vec<&str> = consolidated.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], CSV_HEADER);
        assert_eq!(lines[1], "aws,PUT,4,10.000,20.000,25.000,12.000,100.000,0.2500");
    }
}
