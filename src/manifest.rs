// src/manifest.rs
//
// Dataset manifest: the deterministic description of a generated dataset
// (relative paths, sizes, SHA-256 content hashes) tied to the seed and
// parameters that produced it. Created once by the generator, read-only
// afterward; the loop controller reads it for object keys/sizes, and the
// verifier rechecks it before a dataset is reused across runs.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::config::DatasetParams;
use crate::constants::{HASH_CHUNK_SIZE, MANIFEST_FILENAME};
use crate::error::{BenchError, Result};

/// One generated file: path relative to the dataset root, size, content hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub path: String,
    pub size: u64,
    pub checksum: String,
}

/// Ordered description of a generated dataset. Entry order is the generation
/// order, so regenerating from the same seed/params reproduces it exactly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(flatten)]
    pub params: DatasetParams,
    pub files: Vec<ManifestEntry>,
}

impl Manifest {
    pub fn manifest_path(dataset_path: &Path) -> std::path::PathBuf {
        dataset_path.join(MANIFEST_FILENAME)
    }

    /// Load the manifest from a dataset directory.
    pub fn load(dataset_path: &Path) -> Result<Manifest> {
        let path = Self::manifest_path(dataset_path);
        let raw = std::fs::read_to_string(&path)
            .map_err(|e| BenchError::io_at("failed to read manifest", &path, e))?;
        serde_json::from_str(&raw)
            .map_err(|e| BenchError::data(format!("malformed manifest {}: {}", path.display(), e)))
    }

    /// Load the manifest if one exists; `None` when the directory has none.
    pub fn try_load(dataset_path: &Path) -> Result<Option<Manifest>> {
        if Self::manifest_path(dataset_path).exists() {
            Self::load(dataset_path).map(Some)
        } else {
            Ok(None)
        }
    }

    pub fn save(&self, dataset_path: &Path) -> Result<()> {
        let path = Self::manifest_path(dataset_path);
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| BenchError::data(format!("failed to serialize manifest: {}", e)))?;
        std::fs::write(&path, json)
            .map_err(|e| BenchError::io_at("failed to write manifest", &path, e))
    }

    pub fn total_bytes(&self) -> u64 {
        self.files.iter().map(|f| f.size).sum()
    }
}

/// Why a verified entry did not match its manifest record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MismatchKind {
    Missing,
    SizeMismatch { expected: u64, actual: u64 },
    ChecksumMismatch,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mismatch {
    pub path: String,
    pub kind: MismatchKind,
}

/// Result of checking a dataset against its manifest. A non-empty mismatch
/// list is a hard stop for the calling workflow: the dataset cannot be
/// assumed intact.
#[derive(Debug, Clone, Default)]
pub struct VerificationResult {
    pub mismatched_entries: Vec<Mismatch>,
}

impl VerificationResult {
    pub fn is_ok(&self) -> bool {
        self.mismatched_entries.is_empty()
    }
}

/// Recompute the content hash of every file the manifest lists and compare.
/// Files not listed in the manifest are ignored. Size is checked first so a
/// truncated file is reported without hashing it.
pub fn verify(manifest: &Manifest, dataset_path: &Path) -> Result<VerificationResult> {
    let mut result = VerificationResult::default();

    for entry in &manifest.files {
        let path = dataset_path.join(&entry.path);
        if !path.exists() {
            result.mismatched_entries.push(Mismatch {
                path: entry.path.clone(),
                kind: MismatchKind::Missing,
            });
            continue;
        }

        let actual_size = std::fs::metadata(&path)
            .map_err(|e| BenchError::io_at("failed to stat", &path, e))?
            .len();
        if actual_size != entry.size {
            result.mismatched_entries.push(Mismatch {
                path: entry.path.clone(),
                kind: MismatchKind::SizeMismatch {
                    expected: entry.size,
                    actual: actual_size,
                },
            });
            continue;
        }

        if sha256_file(&path)? != entry.checksum {
            result.mismatched_entries.push(Mismatch {
                path: entry.path.clone(),
                kind: MismatchKind::ChecksumMismatch,
            });
        }
    }

    Ok(result)
}

/// SHA-256 of a file, streamed in small chunks.
pub fn sha256_file(path: &Path) -> Result<String> {
    let mut file =
        File::open(path).map_err(|e| BenchError::io_at("failed to open", path, e))?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; HASH_CHUNK_SIZE];
    loop {
        let n = file
            .read(&mut buf)
            .map_err(|e| BenchError::io_at("failed to read", path, e))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex_digest(hasher))
}

pub(crate) fn hex_digest(hasher: Sha256) -> String {
    let digest = hasher.finalize();
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        out.push_str(&format!("{:02x}", byte));
    }
    out
}
