// End-to-end benchmark runs against the local file backend
//
// Full pipeline, no credentials needed: generate a seeded dataset, run the
// operation matrix through FileStore, then aggregate the emitted log into
// CSV tables. This is the credential-free equivalent of a provider run.

use std::time::Duration;
use tempfile::TempDir;

use ic_bench::config::{DatasetParams, SizeDistribution, TestPlan};
use ic_bench::csv_export;
use ic_bench::dataset;
use ic_bench::executor::OpKind;
use ic_bench::file_store::FileStore;
use ic_bench::metrics;
use ic_bench::oplog::{self, OpLogWriter, Outcome};
use ic_bench::workload::{self, RunContext};

fn small_params() -> DatasetParams {
    DatasetParams {
        seed: 20250806,
        total_size_gb: 0.003,
        file_count: 3,
        min_file_size_mb: 1,
        max_file_size_mb: 1,
        size_distribution: SizeDistribution::Fixed,
        directory_depth: 1,
        files_per_directory: 2,
    }
}

fn plan(operations: Vec<OpKind>, iterations: u32, warmup: u32, cleanup: bool) -> TestPlan {
    TestPlan {
        operations,
        iterations,
        warmup_operations: warmup,
        retry_attempts: 1,
        timeout: Duration::from_secs(30),
        cleanup_after_run: cleanup,
        concurrency: 1,
    }
}

#[tokio::test]
async fn test_full_matrix_run_records_and_aggregates() {
    let data_dir = TempDir::new().unwrap();
    let store_dir = TempDir::new().unwrap();
    let results_dir = TempDir::new().unwrap();

    let manifest = dataset::generate(&small_params(), data_dir.path(), false).unwrap();
    let store = FileStore::new(store_dir.path()).unwrap();

    let log_path = results_dir.path().join("local.ndjson");
    let writer = OpLogWriter::create(&log_path).unwrap();
    let ctx = RunContext::new(
        "local",
        plan(
            vec![
                OpKind::Put,
                OpKind::Get,
                OpKind::List,
                OpKind::Head,
                OpKind::Delete,
            ],
            2,
            0,
            true,
        ),
        data_dir.path(),
        writer,
    );

    let records = workload::run(&ctx, &manifest, &store).await.unwrap();

    // 5 kinds x 2 iterations, every one successful.
    assert_eq!(records.len(), 10);
    for record in &records {
        assert_eq!(record.outcome, Outcome::Success, "failed: {:?}", record);
        assert_eq!(record.attempts, 1);
    }

    // PUT and GET moved real dataset bytes.
    let put_bytes: u64 = records
        .iter()
        .filter(|r| r.op == OpKind::Put)
        .map(|r| r.bytes)
        .sum();
    let expected: u64 = manifest.files[..2].iter().map(|f| f.size).sum();
    assert_eq!(put_bytes, expected);

    // Cleanup swept every uploaded object out of the store.
    let leftovers: Vec<_> = walk_files(store_dir.path());
    assert!(leftovers.is_empty(), "cleanup left objects: {:?}", leftovers);

    // Aggregate the run's log and export the tables.
    let summary = metrics::aggregate_dir(results_dir.path()).unwrap();
    assert_eq!(summary.per_provider["local"].len(), 5);
    for row in &summary.consolidated {
        assert_eq!(row.samples, 2);
        assert_eq!(row.error_rate, 0.0);
    }
    let written = csv_export::export_summary(&summary, results_dir.path()).unwrap();
    assert!(results_dir.path().join("metrics_local.csv").exists());
    assert!(results_dir
        .path()
        .join("consolidated_metrics.csv")
        .exists());
    assert_eq!(written.len(), 2);
}

#[tokio::test]
async fn test_warmup_runs_against_real_store_without_records() {
    let data_dir = TempDir::new().unwrap();
    let store_dir = TempDir::new().unwrap();
    let log_dir = TempDir::new().unwrap();

    let manifest = dataset::generate(&small_params(), data_dir.path(), false).unwrap();
    let store = FileStore::new(store_dir.path()).unwrap();

    let log_path = log_dir.path().join("local.ndjson");
    let writer = OpLogWriter::create(&log_path).unwrap();
    let ctx = RunContext::new(
        "local",
        plan(vec![OpKind::Put, OpKind::Get], 2, 1, false),
        data_dir.path(),
        writer,
    );

    let records = workload::run(&ctx, &manifest, &store).await.unwrap();
    assert_eq!(records.len(), 4);
    assert!(records.iter().all(|r| r.outcome == Outcome::Success));

    let contents = oplog::read_log(&log_path).unwrap();
    assert_eq!(contents.records.len(), 4);

    // No cleanup: uploaded objects stay for a follow-up run.
    assert!(!walk_files(store_dir.path()).is_empty());
}

#[tokio::test]
async fn test_get_against_empty_store_is_recorded_failure_not_abort() {
    let data_dir = TempDir::new().unwrap();
    let store_dir = TempDir::new().unwrap();
    let log_dir = TempDir::new().unwrap();

    let manifest = dataset::generate(&small_params(), data_dir.path(), false).unwrap();
    let store = FileStore::new(store_dir.path()).unwrap();

    let log_path = log_dir.path().join("local.ndjson");
    let writer = OpLogWriter::create(&log_path).unwrap();
    // GET-only plan: nothing was ever uploaded, every iteration fails
    // against the backend, and the run still completes with full records.
    let ctx = RunContext::new(
        "local",
        plan(vec![OpKind::Get], 3, 0, false),
        data_dir.path(),
        writer,
    );

    let records = workload::run(&ctx, &manifest, &store).await.unwrap();
    assert_eq!(records.len(), 3);
    assert!(records.iter().all(|r| r.outcome == Outcome::Failure));

    let summary = metrics::aggregate_dir(log_dir.path()).unwrap();
    let row = &summary.per_provider["local"][0];
    assert_eq!(row.samples, 3);
    assert_eq!(row.error_rate, 1.0);
    assert_eq!(row.throughput_mbps, 0.0);
}

fn walk_files(root: &std::path::Path) -> Vec<std::path::PathBuf> {
    walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.path().to_path_buf())
        .collect()
}
