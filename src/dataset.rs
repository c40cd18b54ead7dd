// src/dataset.rs
//
// Deterministic dataset generator.
//
// All randomness flows from one seeded stream, consumed in a fixed order so
// any run with the same seed and parameters reproduces the dataset
// byte-for-byte:
//
//   1. file sizes, drawn from StdRng::seed_from_u64(seed) according to the
//      configured distribution (the mixed distribution's shuffle consumes
//      the same stream immediately after the sizes);
//   2. per-file content, each file from its own stream seeded with
//      seed + file_index, written in 1 MiB chunks.
//
// No wall clock or OS randomness participates anywhere. Content hashes are
// computed while writing, so the manifest never needs a second pass.

use indicatif::{ProgressBar, ProgressStyle};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, RngCore, SeedableRng};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::{debug, info};

use crate::config::{DatasetParams, SizeDistribution};
use crate::constants::{format_bytes_binary, GEN_CHUNK_SIZE, GIB, MIB};
use crate::error::{BenchError, Result};
use crate::manifest::{hex_digest, Manifest, ManifestEntry};

/// Generate the dataset described by `params` under `target`.
///
/// Idempotent: when `target` already holds a manifest whose seed and
/// parameters match and `force` is false, generation is skipped and the
/// existing manifest is returned unchanged. Verifying file contents before
/// reuse is the caller's job (see `manifest::verify`).
pub fn generate(params: &DatasetParams, target: &Path, force: bool) -> Result<Manifest> {
    params.validate()?;

    if !force {
        if let Some(existing) = Manifest::try_load(target)? {
            if existing.params == *params {
                info!(
                    seed = params.seed,
                    files = existing.files.len(),
                    "dataset with matching seed and parameters exists, skipping generation"
                );
                return Ok(existing);
            }
            info!(
                old_seed = existing.params.seed,
                new_seed = params.seed,
                "dataset parameters changed, regenerating"
            );
        }
    }

    std::fs::create_dir_all(target)
        .map_err(|e| BenchError::io_at("failed to create dataset directory", target, e))?;

    let mut rng = StdRng::seed_from_u64(params.seed);
    let sizes = file_sizes(params, &mut rng);

    info!(
        seed = params.seed,
        files = sizes.len(),
        total = %format_bytes_binary(sizes.iter().sum()),
        distribution = ?params.size_distribution,
        "generating dataset at {}",
        target.display()
    );

    let pb = ProgressBar::new(sizes.len() as u64);
    pb.set_style(
        ProgressStyle::with_template("{bar:40.cyan/blue} {pos}/{len} files {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );

    let mut files = Vec::with_capacity(sizes.len());
    for (index, &size) in sizes.iter().enumerate() {
        let rel = relative_path(params, index);
        let path = target.join(&rel);
        debug!(index, size, path = %rel, "generating file");

        let checksum = write_file(&path, size, params.seed, index)?;
        files.push(ManifestEntry {
            path: rel,
            size,
            checksum,
        });
        pb.inc(1);
    }
    pb.finish_and_clear();

    let manifest = Manifest {
        params: params.clone(),
        files,
    };
    manifest.save(target)?;

    info!(
        total = %format_bytes_binary(manifest.total_bytes()),
        "dataset generation complete, manifest written to {}",
        Manifest::manifest_path(target).display()
    );
    Ok(manifest)
}

/// Derive all file sizes from the seeded stream.
fn file_sizes(params: &DatasetParams, rng: &mut StdRng) -> Vec<u64> {
    let total = (params.total_size_gb * GIB as f64) as u64;
    let min = params.min_file_size_mb * MIB;
    let max = params.max_file_size_mb * MIB;
    let count = params.file_count;

    match params.size_distribution {
        SizeDistribution::Fixed => {
            let per_file = (total / count as u64).clamp(min, max);
            vec![per_file; count]
        }

        SizeDistribution::Random => {
            // Draw each size under a shrinking budget so the sum lands on the
            // total without the tail dropping below min or blowing past max.
            let mut sizes = Vec::with_capacity(count);
            let mut remaining = total;
            for i in 0..count - 1 {
                let left = (count - i - 1) as u64;
                let hi = max.min(remaining.saturating_sub(left * min)).max(1);
                let lo = min
                    .max(remaining.saturating_sub(left * max))
                    .min(hi);
                let size = rng.random_range(lo..=hi).clamp(min, max);
                remaining = remaining.saturating_sub(size);
                sizes.push(size);
            }
            sizes.push(remaining.clamp(min, max));
            sizes
        }

        SizeDistribution::Mixed => {
            // 60% small, 30% medium, 10% large, then shuffled and scaled
            // proportionally toward the total (scaling down never goes below
            // min).
            let small = min;
            let large = max;
            let medium = (small + large) / 2;

            let n_small = (count as f64 * 0.6) as usize;
            let n_medium = (count as f64 * 0.3) as usize;
            let n_large = count - n_small - n_medium;

            let mut sizes: Vec<u64> = std::iter::repeat(small)
                .take(n_small)
                .chain(std::iter::repeat(medium).take(n_medium))
                .chain(std::iter::repeat(large).take(n_large))
                .collect();
            sizes.shuffle(rng);

            let current: u64 = sizes.iter().sum();
            if current > 0 && current != total {
                let factor = total as f64 / current as f64;
                for size in &mut sizes {
                    let scaled = (*size as f64 * factor) as u64;
                    *size = if factor < 1.0 { scaled.max(min) } else { scaled };
                }
            }
            sizes
        }
    }
}

/// Relative path for file `index`: files fill directories in generation
/// order, `files_per_directory` at a time, nested `directory_depth` deep.
fn relative_path(params: &DatasetParams, index: usize) -> String {
    let dir_index = index / params.files_per_directory;
    let levels = params.directory_depth.min(dir_index + 1);

    let mut segments = Vec::with_capacity(levels + 1);
    for depth in 0..levels {
        segments.push(format!("dir_{}_{}_{}", params.seed, dir_index, depth));
    }
    segments.push(format!("file_{}_{:06}.bin", params.seed, index));
    segments.join("/")
}

/// Stream one file's deterministic content to disk, hashing as it goes.
fn write_file(path: &Path, size: u64, seed: u64, index: usize) -> Result<String> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| BenchError::io_at("failed to create directory", parent, e))?;
    }

    let mut rng = StdRng::seed_from_u64(seed.wrapping_add(index as u64));
    let file = File::create(path).map_err(|e| BenchError::io_at("failed to create", path, e))?;
    let mut writer = BufWriter::new(file);
    let mut hasher = Sha256::new();

    let mut buf = vec![0u8; GEN_CHUNK_SIZE];
    let mut written = 0u64;
    while written < size {
        let n = GEN_CHUNK_SIZE.min((size - written) as usize);
        rng.fill_bytes(&mut buf[..n]);
        hasher.update(&buf[..n]);
        writer
            .write_all(&buf[..n])
            .map_err(|e| BenchError::io_at("failed to write", path, e))?;
        written += n as u64;
    }
    writer
        .flush()
        .map_err(|e| BenchError::io_at("failed to flush", path, e))?;

    Ok(hex_digest(hasher))
}
