// src/results_dir.rs
//
// Results directory management.
//
// Each run gets a structured output directory containing:
// - one NDJSON event log per provider
// - per-provider and consolidated metrics CSVs
// - a copy of the configuration file
// - run metadata (JSON)
//
// Directory format: ic-{YYYYMMDD}-{HHMM}-{test_name}/

use chrono::Local;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::constants::{EVENT_LOG_EXTENSION, RESULTS_DIR_PREFIX};
use crate::error::{BenchError, Result};

/// Metadata about a benchmark run.
#[derive(Debug, Serialize, Deserialize)]
pub struct RunMetadata {
    pub version: String,
    pub test_name: String,
    pub config_path: String,
    pub start_time: String,
    pub end_time: Option<String>,
    pub duration_secs: Option<f64>,
    pub command_line: Vec<String>,
    pub hostname: String,
    pub providers: Vec<String>,
}

impl RunMetadata {
    pub fn new(test_name: String, config_path: String) -> Self {
        let hostname = hostname::get()
            .unwrap_or_else(|_| "unknown".into())
            .to_string_lossy()
            .to_string();

        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            test_name,
            config_path,
            start_time: Local::now().to_rfc3339(),
            end_time: None,
            duration_secs: None,
            command_line: std::env::args().collect(),
            hostname,
            providers: Vec::new(),
        }
    }

    pub fn finalize(&mut self, duration_secs: f64) {
        self.end_time = Some(Local::now().to_rfc3339());
        self.duration_secs = Some(duration_secs);
    }
}

/// Results directory manager.
pub struct ResultsDir {
    path: PathBuf,
    metadata: RunMetadata,
}

impl ResultsDir {
    /// Create a new results directory with the standard naming convention.
    ///
    /// The test name defaults to the config file's stem; `custom_name`
    /// overrides it, `base_dir` overrides the current directory.
    pub fn create(
        config_path: &Path,
        custom_name: Option<&str>,
        base_dir: Option<&Path>,
    ) -> Result<Self> {
        let test_name = custom_name
            .map(str::to_string)
            .unwrap_or_else(|| {
                config_path
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .unwrap_or("test")
                    .to_string()
            });

        let dir_name = format!(
            "{}{}-{}",
            RESULTS_DIR_PREFIX,
            Local::now().format("%Y%m%d-%H%M"),
            test_name
        );
        let base = base_dir.unwrap_or_else(|| Path::new("."));
        let dir_path = base.join(&dir_name);

        fs::create_dir_all(&dir_path)
            .map_err(|e| BenchError::io_at("failed to create results directory", &dir_path, e))?;

        let config_dest = dir_path.join("config.yaml");
        fs::copy(config_path, &config_dest)
            .map_err(|e| BenchError::io_at("failed to copy config to", &config_dest, e))?;

        info!("created results directory: {}", dir_path.display());

        Ok(Self {
            path: dir_path,
            metadata: RunMetadata::new(test_name, config_path.to_string_lossy().to_string()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Event log path for one provider.
    pub fn log_path(&self, provider_id: &str) -> PathBuf {
        self.path
            .join(format!("{}.{}", provider_id, EVENT_LOG_EXTENSION))
    }

    pub fn add_provider(&mut self, provider_id: String) {
        self.metadata.providers.push(provider_id);
    }

    pub fn write_metadata(&self) -> Result<()> {
        let metadata_path = self.path.join("metadata.json");
        let json = serde_json::to_string_pretty(&self.metadata)
            .map_err(|e| BenchError::data(format!("failed to serialize metadata: {}", e)))?;
        fs::write(&metadata_path, json)
            .map_err(|e| BenchError::io_at("failed to write", &metadata_path, e))
    }

    /// Finalize the results directory (write final metadata).
    pub fn finalize(&mut self, duration_secs: f64) -> Result<()> {
        self.metadata.finalize(duration_secs);
        self.write_metadata()?;
        info!("results saved to: {}", self.path.display());
        Ok(())
    }
}
