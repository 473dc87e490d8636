//! Artifact retrieval against the local filesystem

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::any::Any;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use stevedore_core::{
    AgentArtifactDefinition, AgentError, ArtifactDefinition, ArtifactDetails, ExecutionContext,
    HostType, IssueType, MemorySink, Variables,
};
use stevedore_interfaces::{ArtifactExtension, FileSystemManager};
use stevedore_release::{
    ArtifactExtensionRegistry, ArtifactRetrievalOrchestrator, FileShareArtifactExtension,
    LocalFileSystemManager, StaticArtifactBackend, FILE_SHARE_ARTIFACT_TYPE,
};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

const RELEASE_ID: i64 = 31;

#[derive(Debug)]
struct CustomDetails;

impl ArtifactDetails for CustomDetails {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Writes a marker file and remembers which folders it downloaded into
#[derive(Default)]
struct CustomExtension {
    downloaded: Mutex<Vec<String>>,
}

#[async_trait]
impl ArtifactExtension for CustomExtension {
    fn artifact_type(&self) -> &str {
        "Custom"
    }

    fn get_details(
        &self,
        _context: &ExecutionContext,
        _artifact: &AgentArtifactDefinition,
    ) -> stevedore_core::Result<Box<dyn ArtifactDetails>> {
        Ok(Box::new(CustomDetails))
    }

    async fn download(
        &self,
        _context: &ExecutionContext,
        artifact: &ArtifactDefinition,
        destination: &Path,
    ) -> stevedore_core::Result<()> {
        let folder = destination
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        tokio::fs::write(destination.join("marker"), &artifact.artifact_type).await?;
        self.downloaded.lock().push(folder);
        Ok(())
    }
}

/// Local filesystem with injected failures
#[derive(Default)]
struct FlakyFileSystem {
    inner: LocalFileSystemManager,
    deny_delete: bool,
    cleanup_failures: AtomicUsize,
    cleanups: AtomicUsize,
}

#[async_trait]
impl FileSystemManager for FlakyFileSystem {
    async fn cleanup_directory(&self, path: &Path, cancel: &CancellationToken) -> io::Result<()> {
        self.cleanups.fetch_add(1, Ordering::SeqCst);
        let remaining = self.cleanup_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.cleanup_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(io::Error::new(io::ErrorKind::Other, "share is busy"));
        }
        self.inner.cleanup_directory(path, cancel).await
    }

    async fn delete_directory(&self, path: &Path, cancel: &CancellationToken) -> io::Result<()> {
        if self.deny_delete {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "access denied"));
        }
        self.inner.delete_directory(path, cancel).await
    }

    async fn create_directory(&self, path: &Path) -> io::Result<()> {
        self.inner.create_directory(path).await
    }

    async fn directory_exists(&self, path: &Path) -> bool {
        self.inner.directory_exists(path).await
    }
}

fn context() -> (ExecutionContext, Arc<MemorySink>) {
    let sink = Arc::new(MemorySink::new());
    let context = ExecutionContext::new(HostType::Release, Variables::new(), sink.clone());
    (context, sink)
}

fn share_artifact(alias: &str, share: &Path) -> AgentArtifactDefinition {
    AgentArtifactDefinition::new(alias, FILE_SHARE_ARTIFACT_TYPE)
        .with_details(serde_json::json!({ "path": share }).to_string())
}

fn custom_artifact(alias: &str, details: &str) -> AgentArtifactDefinition {
    AgentArtifactDefinition::new(alias, "Custom").with_details(details)
}

fn make_share(root: &Path, name: &str, file: &str) -> Result<PathBuf> {
    let share = root.join(name);
    std::fs::create_dir_all(&share)?;
    std::fs::write(share.join(file), name)?;
    Ok(share)
}

fn orchestrator(
    artifacts: Vec<AgentArtifactDefinition>,
    custom: Arc<CustomExtension>,
    file_system: Arc<dyn FileSystemManager>,
) -> Result<ArtifactRetrievalOrchestrator> {
    let mut registry = ArtifactExtensionRegistry::new();
    registry.register(Arc::new(FileShareArtifactExtension))?;
    registry.register(custom)?;
    Ok(ArtifactRetrievalOrchestrator::new(
        Arc::new(StaticArtifactBackend::new().with_release(RELEASE_ID, artifacts)),
        Arc::new(registry),
        file_system,
    ))
}

#[tokio::test]
async fn test_downloads_in_order_and_filters_foreign_custom_artifacts() -> Result<()> {
    let temp = TempDir::new()?;
    let share = make_share(temp.path(), "web-share", "index.html")?;
    let working = temp.path().join("a");
    std::fs::create_dir_all(&working)?;
    std::fs::write(working.join("stale.txt"), "old")?;

    let custom = Arc::new(CustomExtension::default());
    let orchestrator = orchestrator(
        vec![
            custom_artifact("build", r#"{"ArtifactType":"build"}"#),
            share_artifact("web", &share),
            custom_artifact("nuget", r#"{"ArtifactType":"NuGet"}"#),
            custom_artifact("untyped", r#"{"feed":"internal"}"#),
            custom_artifact("garbled", "{ not json"),
        ],
        custom.clone(),
        Arc::new(LocalFileSystemManager::new()),
    )?;
    let (context, sink) = context();

    orchestrator
        .download_artifacts(&context, RELEASE_ID, &working)
        .await?;

    assert_eq!(*custom.downloaded.lock(), vec!["build", "untyped", "garbled"]);
    assert!(!working.join("stale.txt").exists());
    assert!(!working.join("nuget").exists());
    assert_eq!(
        std::fs::read_to_string(working.join("web").join("index.html"))?,
        "web-share"
    );
    assert!(sink.contains("Finished downloading all artifacts"));
    assert!(sink.issues().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_download_error_on_second_artifact_stops_the_release() -> Result<()> {
    let temp = TempDir::new()?;
    let first = make_share(temp.path(), "first", "one.txt")?;
    let third = make_share(temp.path(), "third", "three.txt")?;
    let working = temp.path().join("a");

    let orchestrator = orchestrator(
        vec![
            share_artifact("first", &first),
            share_artifact("second", &temp.path().join("missing-share")),
            share_artifact("third", &third),
        ],
        Arc::new(CustomExtension::default()),
        Arc::new(LocalFileSystemManager::new()),
    )?;
    let (context, sink) = context();

    let err = orchestrator
        .download_artifacts(&context, RELEASE_ID, &working)
        .await
        .unwrap_err();

    assert!(matches!(err, AgentError::ArtifactDownload(_)));
    assert!(working.join("first").join("one.txt").is_file());
    assert!(!working.join("third").exists());
    assert_eq!(sink.count_containing("Retrying artifact download"), 0);

    let issues = sink.issues();
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].issue_type, IssueType::Error);
    assert_eq!(
        issues[0].data.get("code").map(String::as_str),
        Some("DownloadArtifactsFailureUserError")
    );
    assert_eq!(
        issues[0].data.get("TaskId").map(String::as_str),
        Some("b152feaa-7e65-43c9-bcc4-07f6883ee793")
    );
    assert!(issues[0].data.contains_key("AgentVersion"));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_transient_cleanup_errors_are_retried_until_success() -> Result<()> {
    let temp = TempDir::new()?;
    let share = make_share(temp.path(), "drop", "app.zip")?;
    let working = temp.path().join("a");
    let file_system = Arc::new(FlakyFileSystem {
        cleanup_failures: AtomicUsize::new(2),
        ..FlakyFileSystem::default()
    });

    let orchestrator = orchestrator(
        vec![share_artifact("drop", &share)],
        Arc::new(CustomExtension::default()),
        file_system.clone(),
    )?;
    let (context, sink) = context();

    orchestrator
        .download_artifacts(&context, RELEASE_ID, &working)
        .await?;

    assert_eq!(file_system.cleanups.load(Ordering::SeqCst), 3);
    assert_eq!(sink.count_containing("Retrying artifact download"), 2);
    assert!(working.join("drop").join("app.zip").is_file());
    Ok(())
}

#[tokio::test]
async fn test_permission_denied_on_working_folder_aborts_before_any_download() -> Result<()> {
    let temp = TempDir::new()?;
    let share = make_share(temp.path(), "drop", "app.zip")?;
    let working = temp.path().join("a");
    std::fs::create_dir_all(&working)?;
    let file_system = Arc::new(FlakyFileSystem {
        deny_delete: true,
        ..FlakyFileSystem::default()
    });
    let custom = Arc::new(CustomExtension::default());

    let orchestrator = orchestrator(
        vec![
            custom_artifact("tools", "{}"),
            share_artifact("drop", &share),
        ],
        custom.clone(),
        file_system.clone(),
    )?;
    let (context, sink) = context();

    let err = orchestrator
        .download_artifacts(&context, RELEASE_ID, &working)
        .await
        .unwrap_err();

    assert!(matches!(err, AgentError::ArtifactCleanupFailed { .. }));
    assert!(custom.downloaded.lock().is_empty());
    assert_eq!(file_system.cleanups.load(Ordering::SeqCst), 0);
    assert!(!working.join("drop").exists());
    assert_eq!(
        sink.issues()[0].data.get("code").map(String::as_str),
        Some("DownloadArtifactsFailureUserError")
    );
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_during_backoff_stops_retrying() -> Result<()> {
    let temp = TempDir::new()?;
    let share = make_share(temp.path(), "drop", "app.zip")?;
    let working = temp.path().join("a");
    let file_system = Arc::new(FlakyFileSystem {
        cleanup_failures: AtomicUsize::new(usize::MAX),
        ..FlakyFileSystem::default()
    });

    let orchestrator = orchestrator(
        vec![share_artifact("drop", &share)],
        Arc::new(CustomExtension::default()),
        file_system.clone(),
    )?;
    let (context, sink) = context();

    let token = context.cancellation_token().clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(1500)).await;
        token.cancel();
    });

    let err = orchestrator
        .download_artifacts(&context, RELEASE_ID, &working)
        .await
        .unwrap_err();

    // Attempts at 0s and 1s; the token fires during the 2s wait
    assert!(err.is_cancelled());
    assert_eq!(file_system.cleanups.load(Ordering::SeqCst), 2);
    assert!(sink.issues().is_empty());
    Ok(())
}
