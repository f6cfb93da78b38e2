//! Resource lifecycle management for acquisitions
//!
//! Every acquisition gets exactly one uniquely named temp directory under the
//! configured root. The [`ResourceScope`] returned by
//! [`ResourceLifecycleManager::open_scope`] is the only thing that deletes
//! files: single discarded partial downloads via [`ResourceScope::discard`],
//! the whole directory via [`ResourceScope::release`].
//!
//! Release is idempotent. A scope that is dropped without an explicit
//! release still removes its directory (the underlying `tempfile::TempDir`
//! cleans up on drop), so an abandoned acquisition does not leak files.
//!
//! Filesystem work goes through `tokio::fs`; directory creation and removal
//! run on the blocking pool.

use crate::error::{AcquireError, AcquireResult};
use crate::types::AssetKind;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Prefix for per-acquisition directories
pub const SCOPE_DIR_PREFIX: &str = "bundle-";

/// Creates per-acquisition scopes under one root directory
#[derive(Debug, Clone)]
pub struct ResourceLifecycleManager {
    root: PathBuf,
}

impl ResourceLifecycleManager {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the temp directory for one acquisition
    ///
    /// # Errors
    /// `ResourceFatal` when the root or the scope directory cannot be created.
    pub async fn open_scope(&self) -> AcquireResult<ResourceScope> {
        tokio::fs::create_dir_all(&self.root).await.map_err(|e| {
            AcquireError::ResourceFatal(format!(
                "cannot create temp root {}: {}",
                self.root.display(),
                e
            ))
        })?;

        let id = Uuid::new_v4();
        let prefix = format!("{}{}-", SCOPE_DIR_PREFIX, id.simple());
        let root = self.root.clone();

        let dir = tokio::task::spawn_blocking(move || tempfile::Builder::new().prefix(&prefix).tempdir_in(&root))
            .await
            .map_err(|e| AcquireError::ResourceFatal(format!("scope creation task failed: {}", e)))?
            .map_err(|e| {
                AcquireError::ResourceFatal(format!(
                    "cannot create scope directory in {}: {}",
                    self.root.display(),
                    e
                ))
            })?;

        let path = dir.path().to_path_buf();
        debug!(scope = %id, path = %path.display(), "Opened resource scope");

        Ok(ResourceScope {
            id,
            path,
            dir: Some(dir),
            files: Vec::new(),
        })
    }
}

/// Owner of one acquisition's temp directory and the files inside it
#[derive(Debug)]
pub struct ResourceScope {
    id: Uuid,
    path: PathBuf,
    dir: Option<TempDir>,
    files: Vec<PathBuf>,
}

impl ResourceScope {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_released(&self) -> bool {
        self.dir.is_none()
    }

    /// Files currently registered in this scope
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// Reserve a fresh, uniquely named file path inside the scope
    pub fn allocate(&mut self, kind: AssetKind, extension: &str) -> AcquireResult<PathBuf> {
        if self.is_released() {
            return Err(AcquireError::ResourceFatal(format!(
                "scope {} already released",
                self.id
            )));
        }

        let path = self
            .path
            .join(format!("{}-{}.{}", kind.as_str(), Uuid::new_v4().simple(), extension));
        self.files.push(path.clone());
        Ok(path)
    }

    /// Rename a registered file to carry a different extension
    pub async fn finalize(&mut self, path: &Path, extension: &str) -> AcquireResult<PathBuf> {
        let target = path.with_extension(extension);
        if target == path {
            return Ok(target);
        }

        tokio::fs::rename(path, &target).await.map_err(|e| {
            AcquireError::ResourceFatal(format!("cannot rename {}: {}", path.display(), e))
        })?;

        if let Some(entry) = self.files.iter_mut().find(|p| p.as_path() == path) {
            *entry = target.clone();
        }
        Ok(target)
    }

    /// Copy a registered file to a new file of the same kind and extension
    ///
    /// Returns the new path and its size in bytes.
    pub async fn duplicate(&mut self, source: &Path, kind: AssetKind) -> AcquireResult<(PathBuf, u64)> {
        if !self.files.iter().any(|p| p.as_path() == source) {
            return Err(AcquireError::ResourceFatal(format!(
                "{} is not part of scope {}",
                source.display(),
                self.id
            )));
        }

        let extension = source
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_else(|| kind.default_extension())
            .to_string();
        let target = self.allocate(kind, &extension)?;

        match tokio::fs::copy(source, &target).await {
            Ok(bytes) => {
                debug!(source = %source.display(), target = %target.display(), bytes, "Duplicated file");
                Ok((target, bytes))
            }
            Err(e) => {
                self.discard(&target).await;
                Err(AcquireError::ResourceFatal(format!(
                    "cannot copy {}: {}",
                    source.display(),
                    e
                )))
            }
        }
    }

    /// Delete one registered file (e.g. a failed partial download)
    pub async fn discard(&mut self, path: &Path) {
        let Some(index) = self.files.iter().position(|p| p.as_path() == path) else {
            return;
        };
        self.files.remove(index);

        match tokio::fs::remove_file(path).await {
            Ok(()) => debug!(path = %path.display(), "Discarded file"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %path.display(), error = %e, "Failed to discard file"),
        }
    }

    /// Delete the scope directory and everything in it
    ///
    /// Returns `Ok(true)` when this call removed the directory and
    /// `Ok(false)` when the scope was already released.
    pub async fn release(&mut self) -> AcquireResult<bool> {
        let Some(dir) = self.dir.take() else {
            debug!(scope = %self.id, "Scope already released");
            return Ok(false);
        };

        let file_count = self.files.len();
        self.files.clear();

        tokio::task::spawn_blocking(move || dir.close())
            .await
            .map_err(|e| AcquireError::ResourceFatal(format!("scope removal task failed: {}", e)))?
            .map_err(|e| {
                AcquireError::ResourceFatal(format!(
                    "cannot remove scope directory {}: {}",
                    self.path.display(),
                    e
                ))
            })?;

        info!(scope = %self.id, files = file_count, "Released resource scope");
        Ok(true)
    }
}
