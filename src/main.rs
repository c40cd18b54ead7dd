// -----------------------------------------------------------------------------
// ic-bench - deterministic S3 provider benchmark CLI
// -----------------------------------------------------------------------------

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio::runtime::Builder as RtBuilder;
use tracing::info;

use ic_bench::config::Config;
use ic_bench::constants::format_bytes_binary;
use ic_bench::credentials::CredentialResolver;
use ic_bench::csv_export;
use ic_bench::dataset;
use ic_bench::executor::OpExecutor;
use ic_bench::file_store::FileStore;
use ic_bench::manifest::{self, Manifest};
use ic_bench::metrics;
use ic_bench::oplog::OpLogWriter;
use ic_bench::results_dir::ResultsDir;
use ic_bench::s3_store::S3Store;
use ic_bench::workload::{self, RunContext};

// -----------------------------------------------------------------------------
// CLI definition
// -----------------------------------------------------------------------------
#[derive(Parser)]
#[command(
    name = "ic-bench",
    version,
    about = "Deterministic S3 provider benchmark engine"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output (-v for info, -vv for debug, -vvv for trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate the seeded benchmark dataset and its manifest
    ///
    /// Examples:
    ///   ic-bench generate --config config.yaml
    ///   ic-bench generate --config config.yaml --force
    Generate {
        #[arg(long)]
        config: PathBuf,

        /// Regenerate even if a matching dataset already exists
        #[arg(long)]
        force: bool,

        /// Override dataset.data_path from the config
        #[arg(long)]
        data_path: Option<PathBuf>,
    },
    /// Verify an existing dataset against its manifest
    ///
    /// Example:
    ///   ic-bench verify --config config.yaml
    Verify {
        #[arg(long)]
        config: PathBuf,

        /// Override dataset.data_path from the config
        #[arg(long)]
        data_path: Option<PathBuf>,
    },
    /// Run the benchmark matrix against the configured providers
    ///
    /// Examples:
    ///   ic-bench run --config config.yaml
    ///   ic-bench run --config config.yaml --provider ic-eu
    ///   ic-bench run --config config.yaml --no-cleanup
    Run {
        #[arg(long)]
        config: PathBuf,

        /// Benchmark only this provider id
        #[arg(long)]
        provider: Option<String>,

        /// Base directory for the timestamped results directory
        #[arg(long)]
        results_dir: Option<PathBuf>,

        /// Skip cleanup of uploaded objects (keep them for repeated runs)
        #[arg(long)]
        no_cleanup: bool,
    },
    /// Aggregate event logs into per-provider and consolidated CSVs
    ///
    /// Examples:
    ///   ic-bench aggregate --data-path ./ic-20250101-1200-config
    ///   ic-bench aggregate --data-path ./logs --out-dir ./csv
    Aggregate {
        /// Directory holding *.ndjson event logs
        #[arg(long)]
        data_path: PathBuf,

        /// Where to write the CSVs (defaults to the log directory)
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },
}

// -----------------------------------------------------------------------------
// main
// -----------------------------------------------------------------------------
fn main() -> Result<()> {
    // .env exported by the deployment layer; absence is fine.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    use tracing_subscriber::{fmt, EnvFilter};
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,ic_bench={}", level)));
    fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Generate {
            config,
            force,
            data_path,
        } => cmd_generate(&config, force, data_path),
        Commands::Verify { config, data_path } => cmd_verify(&config, data_path),
        Commands::Run {
            config,
            provider,
            results_dir,
            no_cleanup,
        } => {
            let rt = RtBuilder::new_multi_thread()
                .enable_all()
                .build()
                .context("failed to build tokio runtime")?;
            rt.block_on(cmd_run(&config, provider, results_dir, no_cleanup))
        }
        Commands::Aggregate { data_path, out_dir } => cmd_aggregate(&data_path, out_dir),
    }
}

fn cmd_generate(config_path: &PathBuf, force: bool, data_path: Option<PathBuf>) -> Result<()> {
    let config = Config::load(config_path)?;
    let data_path = data_path.unwrap_or_else(|| config.dataset.data_path.clone());

    let manifest = dataset::generate(&config.dataset.params, &data_path, force)?;
    println!(
        "dataset ready: {} files, {} at {}",
        manifest.files.len(),
        format_bytes_binary(manifest.total_bytes()),
        data_path.display()
    );
    Ok(())
}

fn cmd_verify(config_path: &PathBuf, data_path: Option<PathBuf>) -> Result<()> {
    let config = Config::load(config_path)?;
    let data_path = data_path.unwrap_or_else(|| config.dataset.data_path.clone());

    let manifest = Manifest::load(&data_path)?;
    let result = manifest::verify(&manifest, &data_path)?;
    if result.is_ok() {
        println!("dataset OK: {} files verified", manifest.files.len());
        Ok(())
    } else {
        for mismatch in &result.mismatched_entries {
            eprintln!("  mismatch: {} ({:?})", mismatch.path, mismatch.kind);
        }
        bail!(
            "dataset verification failed: {} mismatched entries",
            result.mismatched_entries.len()
        );
    }
}

async fn cmd_run(
    config_path: &PathBuf,
    provider_filter: Option<String>,
    results_base: Option<PathBuf>,
    no_cleanup: bool,
) -> Result<()> {
    let mut config = Config::load(config_path)?;
    if no_cleanup {
        config.test.cleanup_after_run = false;
    }
    let data_path = config.dataset.data_path.clone();

    // Dataset must exist and be intact before any operation executes.
    let manifest = match Manifest::try_load(&data_path)? {
        Some(existing) if existing.params == config.dataset.params => {
            info!("dataset with matching seed exists, verifying integrity");
            let verification = manifest::verify(&existing, &data_path)?;
            if !verification.is_ok() {
                for mismatch in &verification.mismatched_entries {
                    eprintln!("  mismatch: {} ({:?})", mismatch.path, mismatch.kind);
                }
                bail!("dataset failed verification; rerun `ic-bench generate --force`");
            }
            existing
        }
        _ => dataset::generate(&config.dataset.params, &data_path, false)?,
    };

    let providers = match &provider_filter {
        Some(id) => {
            let matched: Vec<_> = config
                .providers
                .iter()
                .filter(|p| &p.id == id)
                .cloned()
                .collect();
            if matched.is_empty() {
                bail!("unknown provider id '{}'", id);
            }
            matched
        }
        None => config.providers.clone(),
    };

    let resolver = CredentialResolver::from_env();
    let mut results = ResultsDir::create(config_path, None, results_base.as_deref())?;
    let run_start = std::time::Instant::now();

    for provider in &providers {
        let executor: Box<dyn OpExecutor> = if provider.is_file_backend() {
            let root = provider
                .file_root()
                .with_context(|| format!("provider '{}': bad file endpoint", provider.id))?;
            Box::new(FileStore::new(root)?)
        } else {
            let credentials = resolver.resolve(&provider.namespace)?;
            Box::new(S3Store::connect(provider, &credentials))
        };

        let writer = OpLogWriter::create(&results.log_path(&provider.id))?;
        let ctx = RunContext::new(
            provider.id.clone(),
            config.test.clone(),
            data_path.clone(),
            writer,
        );
        let records = workload::run(&ctx, &manifest, executor.as_ref()).await?;
        workload::log_run_summary(&provider.id, &records);
        results.add_provider(provider.id.clone());
    }

    // Reduce this run's logs and drop the CSVs next to them.
    let mut summary = metrics::aggregate_dir(results.path())?;
    if summary.manifest_sha256.is_none() {
        summary.manifest_sha256 =
            Some(manifest::sha256_file(&Manifest::manifest_path(&data_path))?);
    }
    csv_export::export_summary(&summary, results.path())?;
    results.finalize(run_start.elapsed().as_secs_f64())?;
    Ok(())
}

fn cmd_aggregate(data_path: &PathBuf, out_dir: Option<PathBuf>) -> Result<()> {
    let summary = metrics::aggregate_dir(data_path)?;
    let out_dir = out_dir.unwrap_or_else(|| data_path.clone());
    let written = csv_export::export_summary(&summary, &out_dir)?;

    let report = serde_json::json!({
        "manifest_hash": summary.manifest_sha256,
        "malformed_records": summary.malformed_records,
        "providers": summary.per_provider.keys().collect::<Vec<_>>(),
        "csv_files": written
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>(),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
