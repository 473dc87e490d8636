//! Local filesystem lifecycle for artifact folders

use async_trait::async_trait;
use std::io;
use std::path::Path;
use stevedore_interfaces::FileSystemManager;
use tokio::fs;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// [`FileSystemManager`] over the local disk
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFileSystemManager;

impl LocalFileSystemManager {
    pub fn new() -> Self {
        Self
    }
}

fn cancelled() -> io::Error {
    io::Error::new(io::ErrorKind::Interrupted, "operation was cancelled")
}

#[async_trait]
impl FileSystemManager for LocalFileSystemManager {
    async fn cleanup_directory(&self, path: &Path, cancel: &CancellationToken) -> io::Result<()> {
        if !self.directory_exists(path).await {
            debug!("Creating directory {}", path.display());
            return fs::create_dir_all(path).await;
        }

        let mut entries = fs::read_dir(path).await?;
        while let Some(entry) = entries.next_entry().await? {
            if cancel.is_cancelled() {
                return Err(cancelled());
            }
            let entry_path = entry.path();
            if entry.file_type().await?.is_dir() {
                fs::remove_dir_all(&entry_path).await?;
            } else {
                fs::remove_file(&entry_path).await?;
            }
        }
        debug!("Cleaned directory {}", path.display());
        Ok(())
    }

    async fn delete_directory(&self, path: &Path, cancel: &CancellationToken) -> io::Result<()> {
        if cancel.is_cancelled() {
            return Err(cancelled());
        }
        debug!("Deleting directory {}", path.display());
        fs::remove_dir_all(path).await
    }

    async fn create_directory(&self, path: &Path) -> io::Result<()> {
        fs::create_dir_all(path).await
    }

    async fn directory_exists(&self, path: &Path) -> bool {
        fs::metadata(path)
            .await
            .map(|metadata| metadata.is_dir())
            .unwrap_or(false)
    }
}
