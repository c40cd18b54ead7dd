// src/file_store.rs
//
// Local-filesystem executor: objects are files under a root directory, keys
// are relative paths. Backs `file://` provider endpoints, which makes full
// benchmark runs possible without credentials or a network — the same role
// the file backend plays in the integration test suite.

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::{BenchError, Result};
use crate::executor::{timed_attempt, Attempt, OpExecutor, OpFailure, OpKind, OpRequest};

pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Result<FileStore> {
        let root = root.into();
        std::fs::create_dir_all(&root)
            .map_err(|e| BenchError::io_at("failed to create store root", &root, e))?;
        Ok(FileStore { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn dispatch(&self, req: &OpRequest) -> std::result::Result<u64, OpFailure> {
        let target = self.root.join(&req.key);
        match req.kind {
            OpKind::Put => {
                let payload = req
                    .payload
                    .as_ref()
                    .ok_or_else(|| OpFailure::fatal("PUT request without payload"))?;
                if let Some(parent) = target.parent() {
                    tokio::fs::create_dir_all(parent)
                        .await
                        .map_err(classify_io)?;
                }
                tokio::fs::copy(payload, &target).await.map_err(classify_io)
            }
            OpKind::Get => {
                let data = tokio::fs::read(&target).await.map_err(classify_io)?;
                Ok(data.len() as u64)
            }
            OpKind::Head => {
                tokio::fs::metadata(&target).await.map_err(classify_io)?;
                Ok(0)
            }
            OpKind::List => {
                // Recursive walk of the whole prefix; LIST transfers no
                // payload bytes, only entry metadata.
                let root = self.root.clone();
                tokio::task::spawn_blocking(move || {
                    for entry in WalkDir::new(&root) {
                        entry.map_err(|e| {
                            OpFailure::retryable(format!("list walk failed: {}", e))
                        })?;
                    }
                    Ok(0)
                })
                .await
                .map_err(|e| OpFailure::fatal(format!("list task failed: {}", e)))?
            }
            OpKind::Delete => {
                tokio::fs::remove_file(&target).await.map_err(classify_io)?;
                Ok(0)
            }
        }
    }
}

#[async_trait]
impl OpExecutor for FileStore {
    async fn execute(&self, req: &OpRequest) -> Attempt {
        timed_attempt(req.timeout, self.dispatch(req)).await
    }
}

/// A missing object or denied access will not improve on retry; everything
/// else is treated as transient.
fn classify_io(err: std::io::Error) -> OpFailure {
    match err.kind() {
        ErrorKind::NotFound | ErrorKind::PermissionDenied => OpFailure::fatal(err.to_string()),
        _ => OpFailure::retryable(err.to_string()),
    }
}
