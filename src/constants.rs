// src/constants.rs
//
// Central location for all constants used throughout ic-bench.
// Config fields fall back to these via serde defaults; see src/config.rs.

use std::time::Duration;

// =============================================================================
// Test Plan Defaults
// =============================================================================

/// Measured iterations per operation kind
/// User can override via config: test.iterations
pub const DEFAULT_ITERATIONS: u32 = 10;

/// Unrecorded warmup attempts per operation kind
/// User can override via config: test.warmup_operations
pub const DEFAULT_WARMUP_OPERATIONS: u32 = 1;

/// Additional attempts after a retryable failure (total tries = 1 + retries)
/// User can override via config: test.retry_attempts
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 2;

/// Per-attempt timeout, enforced inside the operation executor
/// User can override via config: test.timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Whether DELETE runs last and prepared objects are removed after the run
/// User can override via config: test.cleanup_after_run
pub const DEFAULT_CLEANUP_AFTER_RUN: bool = true;

/// Concurrent in-flight iterations of the same operation kind.
/// 1 = strictly sequential attempts (deterministic timing).
/// User can override via config: test.concurrency
pub const DEFAULT_CONCURRENCY: usize = 1;

// =============================================================================
// Retry with Exponential Backoff
// =============================================================================

/// Initial delay before first retry (milliseconds)
pub const INITIAL_RETRY_DELAY_MS: u64 = 100;

/// Maximum delay between retries (milliseconds)
/// Caps exponential growth to prevent excessive waits
pub const MAX_RETRY_DELAY_MS: u64 = 5_000;

/// Multiplier for exponential backoff (delay * multiplier each retry)
/// 2.0 means delay doubles: 100ms -> 200ms -> 400ms -> 800ms
pub const RETRY_BACKOFF_MULTIPLIER: f64 = 2.0;

// =============================================================================
// Dataset Generator Defaults
// =============================================================================

/// Directory nesting depth for generated files
/// User can override via config: dataset.directory_depth
pub const DEFAULT_DIRECTORY_DEPTH: usize = 2;

/// Files placed per directory before opening a new one
/// User can override via config: dataset.files_per_directory
pub const DEFAULT_FILES_PER_DIRECTORY: usize = 100;

/// Chunk size for streaming generated content to disk (1 MiB)
pub const GEN_CHUNK_SIZE: usize = 1024 * 1024;

/// Chunk size for hashing existing files during verification (8 KiB)
pub const HASH_CHUNK_SIZE: usize = 8 * 1024;

// =============================================================================
// Provider Defaults
// =============================================================================

/// Region handed to the S3 client when the provider omits one
pub const DEFAULT_REGION: &str = "us-east-1";

// =============================================================================
// File Naming Conventions
// =============================================================================

/// Results directory name prefix: ic-{YYYYMMDD}-{HHMM}-{name}/
pub const RESULTS_DIR_PREFIX: &str = "ic-";

/// Dataset manifest filename
pub const MANIFEST_FILENAME: &str = "manifest.json";

/// Event log extension (one NDJSON log per provider per run)
pub const EVENT_LOG_EXTENSION: &str = "ndjson";

/// Consolidated metrics filename (all providers, keyed by provider+op)
pub const CONSOLIDATED_CSV_FILENAME: &str = "consolidated_metrics.csv";

/// Per-provider metrics filename prefix: metrics_{provider}.csv
pub const PROVIDER_CSV_PREFIX: &str = "metrics_";

// =============================================================================
// Size Units
// =============================================================================

pub const KIB: u64 = 1024;
pub const MIB: u64 = 1024 * KIB;
pub const GIB: u64 = 1024 * MIB;
pub const TIB: u64 = 1024 * GIB;

/// Convert bytes to human-readable string (binary units: KiB, MiB, GiB)
pub fn format_bytes_binary(bytes: u64) -> String {
    if bytes >= TIB {
        format!("{:.2} TiB", bytes as f64 / TIB as f64)
    } else if bytes >= GIB {
        format!("{:.2} GiB", bytes as f64 / GIB as f64)
    } else if bytes >= MIB {
        format!("{:.2} MiB", bytes as f64 / MIB as f64)
    } else if bytes >= KIB {
        format!("{:.2} KiB", bytes as f64 / KIB as f64)
    } else {
        format!("{} B", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes_binary() {
        assert_eq!(format_bytes_binary(0), "0 B");
        assert_eq!(format_bytes_binary(512), "512 B");
        assert_eq!(format_bytes_binary(1024), "1.00 KiB");
        assert_eq!(format_bytes_binary(1536), "1.50 KiB");
        assert_eq!(format_bytes_binary(1_048_576), "1.00 MiB");
        assert_eq!(format_bytes_binary(1_073_741_824), "1.00 GiB");
    }
}
