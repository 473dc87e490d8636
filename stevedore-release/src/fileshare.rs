//! Artifacts published to a shared folder

use async_trait::async_trait;
use serde::Deserialize;
use std::any::Any;
use std::io;
use std::path::{Path, PathBuf};
use stevedore_core::{
    AgentArtifactDefinition, AgentError, ArtifactDefinition, ArtifactDetails, ExecutionContext,
    Result,
};
use stevedore_interfaces::ArtifactExtension;
use tokio_util::sync::CancellationToken;
use tracing::info;
use walkdir::WalkDir;

pub const FILE_SHARE_ARTIFACT_TYPE: &str = "FileShare";

/// Details payload of a file share artifact
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FileShareDetails {
    pub path: PathBuf,
}

impl ArtifactDetails for FileShareDetails {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Copies the shared folder's tree into the download folder
#[derive(Debug, Clone, Copy, Default)]
pub struct FileShareArtifactExtension;

#[async_trait]
impl ArtifactExtension for FileShareArtifactExtension {
    fn artifact_type(&self) -> &str {
        FILE_SHARE_ARTIFACT_TYPE
    }

    fn get_details(
        &self,
        context: &ExecutionContext,
        artifact: &AgentArtifactDefinition,
    ) -> Result<Box<dyn ArtifactDetails>> {
        let details: FileShareDetails = serde_json::from_str(&artifact.details).map_err(|e| {
            AgentError::ArtifactDownload(format!(
                "Invalid details for artifact '{}': {}",
                artifact.alias, e
            ))
        })?;

        // Share paths may reference job variables
        let expanded = context.variables().expand(&details.path.to_string_lossy());
        Ok(Box::new(FileShareDetails {
            path: PathBuf::from(expanded),
        }))
    }

    async fn download(
        &self,
        context: &ExecutionContext,
        artifact: &ArtifactDefinition,
        destination: &Path,
    ) -> Result<()> {
        let details = artifact.details::<FileShareDetails>().ok_or_else(|| {
            AgentError::Other(format!("Artifact '{}' has no file share details", artifact.name))
        })?;

        let source = details.path.clone();
        let is_directory = tokio::fs::metadata(&source)
            .await
            .map(|metadata| metadata.is_dir())
            .unwrap_or(false);
        if !is_directory {
            return Err(AgentError::ArtifactDownload(format!(
                "File share {} does not exist or is not a directory",
                source.display()
            )));
        }

        context.output(format!("Copying artifact from {}", source.display()));
        let target = destination.to_path_buf();
        let cancel = context.cancellation_token().clone();
        let copied = tokio::task::spawn_blocking(move || copy_tree(&source, &target, &cancel))
            .await
            .map_err(|e| AgentError::Other(format!("Copy task failed: {}", e)))?;

        match copied {
            Ok(files) => {
                info!("Copied {} files into {}", files, destination.display());
                context.output(format!("Copied {} files", files));
                Ok(())
            }
            Err(_) if context.is_cancelled() => Err(AgentError::Cancelled),
            Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
                Err(AgentError::ArtifactDownload(format!("Cannot read file share: {}", e)))
            }
            Err(e) => Err(AgentError::Io(e)),
        }
    }
}

/// Copy every entry below `source` into `target`, returning the file count
fn copy_tree(source: &Path, target: &Path, cancel: &CancellationToken) -> io::Result<usize> {
    let mut files = 0;
    for entry in WalkDir::new(source).min_depth(1) {
        if cancel.is_cancelled() {
            return Err(io::Error::new(io::ErrorKind::Interrupted, "copy was cancelled"));
        }
        let entry = entry?;
        let relative = entry.path().strip_prefix(source).map_err(io::Error::other)?;
        let destination = target.join(relative);

        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&destination)?;
        } else {
            if let Some(parent) = destination.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::copy(entry.path(), &destination)?;
            files += 1;
        }
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use stevedore_core::{HostType, MemorySink, Variables};
    use tempfile::TempDir;

    fn context(share_root: &Path) -> ExecutionContext {
        let mut variables = Variables::new();
        variables.set("share.root", share_root.to_string_lossy());
        ExecutionContext::new(HostType::Release, variables, Arc::new(MemorySink::new()))
    }

    fn declared(details: &str) -> AgentArtifactDefinition {
        AgentArtifactDefinition::new("drop", FILE_SHARE_ARTIFACT_TYPE).with_details(details)
    }

    #[tokio::test]
    async fn test_copies_share_tree() {
        let share = TempDir::new().unwrap();
        std::fs::create_dir_all(share.path().join("bin")).unwrap();
        std::fs::write(share.path().join("bin").join("app.dll"), "app").unwrap();
        std::fs::write(share.path().join("readme.txt"), "hi").unwrap();
        let target = TempDir::new().unwrap();

        let context = context(share.path());
        let extension = FileShareArtifactExtension;
        let details = extension
            .get_details(&context, &declared(r#"{"path":"$(share.root)"}"#))
            .unwrap();
        let artifact = ArtifactDefinition::new(&declared(""), details);
        assert_eq!(
            artifact.details::<FileShareDetails>().map(|d| d.path.clone()),
            Some(share.path().to_path_buf())
        );

        extension.download(&context, &artifact, target.path()).await.unwrap();

        assert_eq!(
            std::fs::read_to_string(target.path().join("bin").join("app.dll")).unwrap(),
            "app"
        );
        assert!(target.path().join("readme.txt").is_file());
    }

    #[tokio::test]
    async fn test_missing_share_is_download_error() {
        let share = TempDir::new().unwrap();
        let context = context(share.path());
        let extension = FileShareArtifactExtension;
        let details = extension
            .get_details(&context, &declared(r#"{"path":"$(share.root)/missing"}"#))
            .unwrap();
        let artifact = ArtifactDefinition::new(&declared(""), details);

        let err = extension
            .download(&context, &artifact, share.path())
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::ArtifactDownload(_)));
    }

    #[test]
    fn test_invalid_details_are_user_errors() {
        let share = TempDir::new().unwrap();
        let result = FileShareArtifactExtension.get_details(&context(share.path()), &declared("[]"));
        assert!(matches!(result, Err(AgentError::ArtifactDownload(_))));
    }
}
