//! Release artifact interfaces

use async_trait::async_trait;
use std::io;
use std::path::Path;
use stevedore_core::{
    AgentArtifactDefinition, ArtifactDefinition, ArtifactDetails, ExecutionContext, Result,
};
use tokio_util::sync::CancellationToken;

/// Download strategy for one artifact type
#[async_trait]
pub trait ArtifactExtension: Send + Sync {
    /// Type tag this extension handles, matched exactly
    fn artifact_type(&self) -> &str;

    /// Turn the opaque details payload into typed details
    fn get_details(
        &self,
        context: &ExecutionContext,
        artifact: &AgentArtifactDefinition,
    ) -> Result<Box<dyn ArtifactDetails>>;

    /// Download `artifact` into `destination`
    ///
    /// Failures the user must fix are reported as
    /// [`AgentError::ArtifactDownload`](stevedore_core::AgentError::ArtifactDownload);
    /// anything else may be retried.
    async fn download(
        &self,
        context: &ExecutionContext,
        artifact: &ArtifactDefinition,
        destination: &Path,
    ) -> Result<()>;
}

/// Source of the artifacts a release declares
#[async_trait]
pub trait ArtifactBackend: Send + Sync {
    async fn get_release_artifacts(&self, release_id: i64) -> Result<Vec<AgentArtifactDefinition>>;
}

/// Folder lifecycle operations used around artifact downloads
///
/// Errors keep their `io::ErrorKind` so callers can tell not-found and
/// permission failures apart from transient ones.
#[async_trait]
pub trait FileSystemManager: Send + Sync {
    /// Ensure `path` exists and is empty
    async fn cleanup_directory(&self, path: &Path, cancel: &CancellationToken) -> io::Result<()>;

    async fn delete_directory(&self, path: &Path, cancel: &CancellationToken) -> io::Result<()>;

    async fn create_directory(&self, path: &Path) -> io::Result<()>;

    async fn directory_exists(&self, path: &Path) -> bool;
}
