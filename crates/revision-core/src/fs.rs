//! FileSystem trait abstraction for the sync engine.
//!
//! Implementations:
//! - `NativeFs` - tokio::fs against the real filesystem
//! - `InMemoryFs` - for testing, with switches to script permission failures

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FsError {
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    #[error("IO error on {path}: {message}")]
    Io { path: PathBuf, message: String },
}

pub type Result<T> = std::result::Result<T, FsError>;

/// Minimal filesystem surface the engine needs: whole-file reads and writes.
#[async_trait]
pub trait FileSystem: Send + Sync {
    /// Read full file contents.
    async fn read(&self, path: &Path) -> Result<Vec<u8>>;

    /// Overwrite file contents.
    async fn write(&self, path: &Path, content: &[u8]) -> Result<()>;
}

/// Real filesystem over tokio::fs.
pub struct NativeFs;

fn map_io_error(path: &Path, err: std::io::Error) -> FsError {
    match err.kind() {
        std::io::ErrorKind::NotFound => FsError::NotFound(path.to_path_buf()),
        std::io::ErrorKind::PermissionDenied => FsError::PermissionDenied(path.to_path_buf()),
        _ => FsError::Io {
            path: path.to_path_buf(),
            message: err.to_string(),
        },
    }
}

#[async_trait]
impl FileSystem for NativeFs {
    async fn read(&self, path: &Path) -> Result<Vec<u8>> {
        tokio::fs::read(path).await.map_err(|e| map_io_error(path, e))
    }

    async fn write(&self, path: &Path, content: &[u8]) -> Result<()> {
        tokio::fs::write(path, content)
            .await
            .map_err(|e| map_io_error(path, e))
    }
}

/// In-memory filesystem for testing.
pub struct InMemoryFs {
    files: RwLock<HashMap<PathBuf, Vec<u8>>>,
    deny_read: RwLock<HashSet<PathBuf>>,
    deny_write: RwLock<HashSet<PathBuf>>,
}

impl InMemoryFs {
    pub fn new() -> Self {
        Self {
            files: RwLock::new(HashMap::new()),
            deny_read: RwLock::new(HashSet::new()),
            deny_write: RwLock::new(HashSet::new()),
        }
    }

    /// Make subsequent reads of `path` fail with `PermissionDenied`.
    pub fn deny_read(&self, path: impl Into<PathBuf>) {
        self.deny_read.write().unwrap().insert(path.into());
    }

    /// Make subsequent writes to `path` fail with `PermissionDenied`.
    pub fn deny_write(&self, path: impl Into<PathBuf>) {
        self.deny_write.write().unwrap().insert(path.into());
    }

    pub fn remove(&self, path: &Path) {
        self.files.write().unwrap().remove(path);
    }
}

impl Default for InMemoryFs {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FileSystem for InMemoryFs {
    async fn read(&self, path: &Path) -> Result<Vec<u8>> {
        if self.deny_read.read().unwrap().contains(path) {
            return Err(FsError::PermissionDenied(path.to_path_buf()));
        }
        self.files
            .read()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| FsError::NotFound(path.to_path_buf()))
    }

    async fn write(&self, path: &Path, content: &[u8]) -> Result<()> {
        if self.deny_write.read().unwrap().contains(path) {
            return Err(FsError::PermissionDenied(path.to_path_buf()));
        }
        self.files
            .write()
            .unwrap()
            .insert(path.to_path_buf(), content.to_vec());
        Ok(())
    }
}

// Allows sharing one filesystem between the engine and test assertions.
#[async_trait]
impl<T: FileSystem + Send + Sync> FileSystem for std::sync::Arc<T> {
    async fn read(&self, path: &Path) -> Result<Vec<u8>> {
        (**self).read(path).await
    }

    async fn write(&self, path: &Path, content: &[u8]) -> Result<()> {
        (**self).write(path, content).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_inmemory_read_write() {
        let fs = InMemoryFs::new();
        let path = Path::new("/plugins/hello/hello.php");

        fs.write(path, b"<?php echo 'hi';").await.unwrap();
        assert_eq!(fs.read(path).await.unwrap(), b"<?php echo 'hi';");

        fs.remove(path);
        assert!(matches!(fs.read(path).await, Err(FsError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_inmemory_permission_switches() {
        let fs = InMemoryFs::new();
        let path = Path::new("/plugins/locked.php");
        fs.write(path, b"content").await.unwrap();

        fs.deny_read(path);
        assert!(matches!(fs.read(path).await, Err(FsError::PermissionDenied(_))));

        fs.deny_write(path);
        assert!(matches!(
            fs.write(path, b"new").await,
            Err(FsError::PermissionDenied(_))
        ));
    }

    #[tokio::test]
    async fn test_native_fs_round_trip() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("style.css");

        NativeFs.write(&path, b"body {}").await.unwrap();
        assert_eq!(NativeFs.read(&path).await.unwrap(), b"body {}");
    }

    #[tokio::test]
    async fn test_native_fs_missing_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("missing.php");

        assert!(matches!(NativeFs.read(&path).await, Err(FsError::NotFound(_))));
    }
}
