// src/config.rs
//
// Run configuration: dataset parameters, provider endpoints, and the test
// plan. Parsed from YAML; every optional field falls back to a constant in
// src/constants.rs. `Config::load` validates before handing the object to
// the engine, so the loop controller can assume a consistent plan.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use crate::constants;
use crate::error::{BenchError, Result};
use crate::executor::OpKind;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    pub dataset: DatasetSection,

    /// Storage endpoints to benchmark; each gets its own event log.
    pub providers: Vec<ProviderConfig>,

    pub test: TestPlan,
}

/// Dataset identity (seed + shape) plus where it lives on disk.
///
/// `params` alone determines every generated byte; `data_path` is deliberately
/// outside it so moving a dataset does not change its identity.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DatasetSection {
    #[serde(flatten)]
    pub params: DatasetParams,

    /// Local directory receiving the generated files and manifest.
    pub data_path: PathBuf,
}

/// Parameters that fully determine the generated dataset. Together with the
/// seed they are recorded in the manifest; an on-disk manifest whose params
/// match the request lets generation be skipped entirely.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct DatasetParams {
    /// Sole source of randomness. Same seed + same params = identical bytes.
    pub seed: u64,

    /// Total size target for the whole dataset.
    pub total_size_gb: f64,

    pub file_count: usize,

    pub min_file_size_mb: u64,

    pub max_file_size_mb: u64,

    #[serde(default)]
    pub size_distribution: SizeDistribution,

    /// Directory nesting depth for generated files.
    #[serde(default = "default_directory_depth")]
    pub directory_depth: usize,

    /// Files placed per directory before opening a new one.
    #[serde(default = "default_files_per_directory")]
    pub files_per_directory: usize,
}

/// How file sizes are spread across the dataset.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SizeDistribution {
    /// All files the same size (total / count, clamped to min..max).
    #[default]
    Fixed,
    /// Random sizes within min..max, constrained to land on the total.
    Random,
    /// 60% small, 30% medium, 10% large, shuffled and scaled to the total.
    Mixed,
}

/// One storage endpoint under test.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProviderConfig {
    /// Short identifier; names the event log and metrics CSV.
    pub id: String,

    /// Endpoint URL. `https://` / `http://` select the S3 executor;
    /// `file://` selects the local-filesystem executor.
    pub endpoint: String,

    /// Credential namespace: credentials resolve from
    /// `<NAMESPACE>_ACCESS_KEY` / `<NAMESPACE>_SECRET_KEY` env vars.
    pub namespace: String,

    pub bucket: String,

    #[serde(default = "default_region")]
    pub region: String,

    /// TLS policy: when true, an https endpoint is downgraded to http
    /// (the original deployment's fallback for endpoints with broken certs).
    #[serde(default)]
    pub insecure_ssl: bool,
}

impl ProviderConfig {
    /// Endpoint actually handed to the client, after applying the TLS policy.
    pub fn effective_endpoint(&self) -> String {
        if self.insecure_ssl && self.endpoint.starts_with("https://") {
            format!("http://{}", &self.endpoint["https://".len()..])
        } else {
            self.endpoint.clone()
        }
    }

    pub fn is_file_backend(&self) -> bool {
        self.endpoint.starts_with("file://")
    }

    /// Local root for `file://` endpoints.
    pub fn file_root(&self) -> Option<PathBuf> {
        self.endpoint
            .strip_prefix("file://")
            .map(PathBuf::from)
    }
}

/// Immutable per-run execution plan, owned by the loop controller.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TestPlan {
    /// Operation kinds in execution order. With `cleanup_after_run`, DELETE
    /// kinds are moved to the end regardless of the listed order.
    pub operations: Vec<OpKind>,

    #[serde(default = "default_iterations")]
    pub iterations: u32,

    /// Unrecorded attempts per kind before measurement starts.
    #[serde(default = "default_warmup_operations")]
    pub warmup_operations: u32,

    /// Additional tries after a retryable failure (total = 1 + retries).
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    /// Per-attempt timeout, enforced by the operation executor.
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,

    #[serde(default = "default_cleanup_after_run")]
    pub cleanup_after_run: bool,

    /// In-flight iterations of the same kind. 1 = sequential.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

fn default_directory_depth() -> usize {
    constants::DEFAULT_DIRECTORY_DEPTH
}

fn default_files_per_directory() -> usize {
    constants::DEFAULT_FILES_PER_DIRECTORY
}

fn default_region() -> String {
    constants::DEFAULT_REGION.to_string()
}

fn default_iterations() -> u32 {
    constants::DEFAULT_ITERATIONS
}

fn default_warmup_operations() -> u32 {
    constants::DEFAULT_WARMUP_OPERATIONS
}

fn default_retry_attempts() -> u32 {
    constants::DEFAULT_RETRY_ATTEMPTS
}

fn default_timeout() -> Duration {
    constants::DEFAULT_TIMEOUT
}

fn default_cleanup_after_run() -> bool {
    constants::DEFAULT_CLEANUP_AFTER_RUN
}

fn default_concurrency() -> usize {
    constants::DEFAULT_CONCURRENCY
}

impl Config {
    /// Load and validate a YAML config file.
    pub fn load(path: &Path) -> Result<Config> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| BenchError::io_at("failed to read config", path, e))?;
        let config: Config = serde_yaml::from_str(&raw)
            .map_err(|e| BenchError::config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field consistency. Returns the first violation as a
    /// `ConfigError`; nothing executes against a plan that fails here.
    pub fn validate(&self) -> Result<()> {
        self.dataset.params.validate()?;

        if self.providers.is_empty() {
            return Err(BenchError::config("at least one provider is required"));
        }
        for provider in &self.providers {
            provider.validate()?;
        }
        let mut ids: Vec<&str> = self.providers.iter().map(|p| p.id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        if ids.len() != self.providers.len() {
            return Err(BenchError::config("provider ids must be unique"));
        }

        self.test.validate()
    }
}

impl DatasetParams {
    pub fn validate(&self) -> Result<()> {
        if self.file_count == 0 {
            return Err(BenchError::config("dataset.file_count must be > 0"));
        }
        if self.total_size_gb <= 0.0 {
            return Err(BenchError::config("dataset.total_size_gb must be > 0"));
        }
        if self.min_file_size_mb == 0 {
            return Err(BenchError::config("dataset.min_file_size_mb must be > 0"));
        }
        if self.min_file_size_mb > self.max_file_size_mb {
            return Err(BenchError::config(format!(
                "dataset.min_file_size_mb ({}) > max_file_size_mb ({})",
                self.min_file_size_mb, self.max_file_size_mb
            )));
        }
        if self.directory_depth == 0 {
            return Err(BenchError::config("dataset.directory_depth must be > 0"));
        }
        if self.files_per_directory == 0 {
            return Err(BenchError::config(
                "dataset.files_per_directory must be > 0",
            ));
        }
        Ok(())
    }
}

impl ProviderConfig {
    pub fn validate(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(BenchError::config("provider.id must not be empty"));
        }
        Url::parse(&self.endpoint).map_err(|e| {
            BenchError::config(format!(
                "provider '{}': invalid endpoint '{}': {}",
                self.id, self.endpoint, e
            ))
        })?;
        if !self.is_file_backend() && self.bucket.is_empty() {
            return Err(BenchError::config(format!(
                "provider '{}': bucket must not be empty",
                self.id
            )));
        }
        Ok(())
    }
}

impl TestPlan {
    pub fn validate(&self) -> Result<()> {
        if self.operations.is_empty() {
            return Err(BenchError::config("test.operations must not be empty"));
        }
        if self.iterations == 0 {
            return Err(BenchError::config("test.iterations must be > 0"));
        }
        if self.timeout.is_zero() {
            return Err(BenchError::config("test.timeout must be > 0"));
        }
        if self.concurrency == 0 {
            return Err(BenchError::config("test.concurrency must be > 0"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
dataset:
  seed: 42
  total_size_gb: 0.01
  file_count: 4
  min_file_size_mb: 1
  max_file_size_mb: 3
  size_distribution: mixed
  directory_depth: 2
  files_per_directory: 2
  data_path: /tmp/ic-bench-data

providers:
  - id: ic-eu
    endpoint: https://eu-central-2.example.net
    namespace: IC
    bucket: ic-bench
    region: eu-central-2
  - id: local
    endpoint: file:///tmp/ic-bench-store
    namespace: LOCAL
    bucket: unused

test:
  operations: [PUT, GET, LIST, HEAD, DELETE]
  iterations: 5
  warmup_operations: 1
  retry_attempts: 2
  timeout: 30s
  cleanup_after_run: true
"#;

    #[test]
    fn test_parse_full_config() {
        let config: Config = serde_yaml::from_str(SAMPLE).expect("parse sample config");
        config.validate().expect("sample config is valid");

        assert_eq!(config.dataset.params.seed, 42);
        assert_eq!(config.dataset.params.file_count, 4);
        assert_eq!(
            config.dataset.params.size_distribution,
            SizeDistribution::Mixed
        );
        assert_eq!(config.providers.len(), 2);
        assert_eq!(config.test.operations.len(), 5);
        assert_eq!(config.test.timeout, Duration::from_secs(30));
        // Defaults kick in for fields the sample omits.
        assert_eq!(config.test.concurrency, constants::DEFAULT_CONCURRENCY);
    }

    #[test]
    fn test_defaults_applied() {
        let yaml = r#"
dataset:
  seed: 1
  total_size_gb: 0.001
  file_count: 1
  min_file_size_mb: 1
  max_file_size_mb: 1
  data_path: /tmp/d
providers:
  - id: p
    endpoint: https://s3.example.com
    namespace: P
    bucket: b
test:
  operations: [PUT]
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.test.iterations, constants::DEFAULT_ITERATIONS);
        assert_eq!(
            config.test.warmup_operations,
            constants::DEFAULT_WARMUP_OPERATIONS
        );
        assert_eq!(config.test.timeout, constants::DEFAULT_TIMEOUT);
        assert_eq!(
            config.dataset.params.size_distribution,
            SizeDistribution::Fixed
        );
        assert_eq!(config.dataset.params.directory_depth, 2);
        assert!(config.test.cleanup_after_run);
    }

    #[test]
    fn test_validation_rejects_inconsistent_sizes() {
        let mut config: Config = serde_yaml::from_str(SAMPLE).unwrap();
        config.dataset.params.min_file_size_mb = 10;
        config.dataset.params.max_file_size_mb = 5;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("min_file_size_mb"));
    }

    #[test]
    fn test_validation_rejects_duplicate_provider_ids() {
        let mut config: Config = serde_yaml::from_str(SAMPLE).unwrap();
        config.providers[1].id = "ic-eu".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_bad_endpoint() {
        let mut config: Config = serde_yaml::from_str(SAMPLE).unwrap();
        config.providers[0].endpoint = "not a url".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_insecure_ssl_downgrades_endpoint() {
        let mut config: Config = serde_yaml::from_str(SAMPLE).unwrap();
        config.providers[0].insecure_ssl = true;
        assert_eq!(
            config.providers[0].effective_endpoint(),
            "http://eu-central-2.example.net"
        );
        config.providers[0].insecure_ssl = false;
        assert_eq!(
            config.providers[0].effective_endpoint(),
            "https://eu-central-2.example.net"
        );
    }

    #[test]
    fn test_file_backend_root() {
        let config: Config = serde_yaml::from_str(SAMPLE).unwrap();
        assert!(config.providers[1].is_file_backend());
        assert_eq!(
            config.providers[1].file_root(),
            Some(PathBuf::from("/tmp/ic-bench-store"))
        );
        assert!(!config.providers[0].is_file_backend());
    }
}
