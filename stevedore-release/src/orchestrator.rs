//! Artifact retrieval for release jobs
//!
//! One pass per job: fetch the declared artifacts, filter them, recreate the
//! working folder, then download each artifact into its alias folder in the
//! order received. The first unrecoverable failure ends the pass.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use stevedore_core::paths::full_path;
use stevedore_core::{
    AgentArtifactDefinition, AgentError, ArtifactDefinition, ExecutionContext, FailureClass,
    Issue, Result, AGENT_VERSION,
};
use stevedore_interfaces::{ArtifactBackend, FileSystemManager};
use stevedore_resilience::{RetryDecision, RetryError, RetryExecutor, RetryPolicy};
use tracing::{debug, error, info, warn};

use crate::filter::filter_artifacts;
use crate::registry::ArtifactExtensionRegistry;

const USER_ERROR_CODE: &str = "DownloadArtifactsFailureUserError";
const SYSTEM_ERROR_CODE: &str = "DownloadArtifactsFailureSystemError";

/// Identifies the download step in structured issues
pub const DOWNLOAD_ARTIFACTS_TASK_ID: &str = "b152feaa-7e65-43c9-bcc4-07f6883ee793";

/// Unrecovered failure with the class it is reported under
#[derive(Debug)]
struct RetrievalFailure {
    error: AgentError,
    class: FailureClass,
}

impl From<AgentError> for RetrievalFailure {
    fn from(error: AgentError) -> Self {
        let class = error.classification();
        Self { error, class }
    }
}

impl From<RetryError<AgentError>> for RetrievalFailure {
    /// The retry predicate's verdict wins over the error's own class
    fn from(err: RetryError<AgentError>) -> Self {
        if err.is_cancelled() {
            return AgentError::Cancelled.into();
        }
        let decided = err.class();
        match err.into_inner() {
            Some(error) => Self {
                class: decided.unwrap_or_else(|| error.classification()),
                error,
            },
            None => AgentError::Cancelled.into(),
        }
    }
}

pub struct ArtifactRetrievalOrchestrator {
    backend: Arc<dyn ArtifactBackend>,
    registry: Arc<ArtifactExtensionRegistry>,
    file_system: Arc<dyn FileSystemManager>,
    retry: RetryExecutor,
}

impl ArtifactRetrievalOrchestrator {
    pub fn new(
        backend: Arc<dyn ArtifactBackend>,
        registry: Arc<ArtifactExtensionRegistry>,
        file_system: Arc<dyn FileSystemManager>,
    ) -> Self {
        Self {
            backend,
            registry,
            file_system,
            retry: RetryExecutor::with_default_policy(),
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = RetryExecutor::new(policy);
        self
    }

    /// Download every artifact of `release_id` below `working_folder`.
    ///
    /// Unrecovered failures are reported as a structured issue on the job
    /// before being returned.
    pub async fn download_artifacts(
        &self,
        context: &ExecutionContext,
        release_id: i64,
        working_folder: &Path,
    ) -> Result<()> {
        match self.retrieve(context, release_id, working_folder).await {
            Ok(()) => Ok(()),
            Err(RetrievalFailure { error, class }) => {
                if !error.is_cancelled() {
                    report_failure(context, &error, class);
                }
                Err(error)
            }
        }
    }

    async fn retrieve(
        &self,
        context: &ExecutionContext,
        release_id: i64,
        working_folder: &Path,
    ) -> std::result::Result<(), RetrievalFailure> {
        context.output("Downloading artifacts");

        let artifacts = self.backend.get_release_artifacts(release_id).await?;
        let artifacts = filter_artifacts(artifacts);
        ensure_unique_aliases(&artifacts)?;
        for artifact in &artifacts {
            info!("Found artifact {} of type {}", artifact.alias, artifact.artifact_type);
        }

        self.prepare_working_folder(context, working_folder).await?;

        for artifact in &artifacts {
            self.download_artifact(context, artifact, working_folder).await?;
        }

        context.output("Finished downloading all artifacts");
        Ok(())
    }

    async fn prepare_working_folder(
        &self,
        context: &ExecutionContext,
        folder: &Path,
    ) -> std::result::Result<(), RetrievalFailure> {
        let file_system = self.file_system.as_ref();
        let cancel = context.cancellation_token();

        self.retry
            .execute(
                cancel,
                move |_attempt| async move {
                    context.output(format!("Cleaning artifacts directory: {}", folder.display()));
                    if file_system.directory_exists(folder).await {
                        file_system
                            .delete_directory(folder, cancel)
                            .await
                            .map_err(|e| cleanup_error(context, folder, e))?;
                    }
                    file_system
                        .create_directory(folder)
                        .await
                        .map_err(|e| cleanup_error(context, folder, e))
                },
                |err: &AgentError| {
                    if !err.is_retryable() {
                        context.output(format!("Error cleaning up artifacts directory: {}", err));
                        return RetryDecision::Fail(err.classification());
                    }
                    context.output(format!(
                        "Retrying clean up of artifacts directory {}: {}",
                        folder.display(),
                        err
                    ));
                    error!("Artifact directory cleanup failed: {}", err);
                    RetryDecision::Retry
                },
            )
            .await?;

        context.output(format!("Cleaned up artifacts directory: {}", folder.display()));
        Ok(())
    }

    async fn download_artifact(
        &self,
        context: &ExecutionContext,
        artifact: &AgentArtifactDefinition,
        working_folder: &Path,
    ) -> std::result::Result<(), RetrievalFailure> {
        let extension = self.registry.resolve(&artifact.artifact_type)?;
        debug!("Found artifact extension of type {}", extension.artifact_type());
        context.output("Starting artifact download");

        let details = extension.get_details(context, artifact)?;
        let definition = ArtifactDefinition::new(artifact, details);
        context.output(format!(
            "Downloading artifact '{}' of type {}",
            artifact.alias, artifact.artifact_type
        ));

        let download_folder = download_folder(working_folder, &artifact.alias);
        let folder = download_folder.as_path();
        let definition = &definition;
        let extension = extension.as_ref();
        let file_system = self.file_system.as_ref();
        let cancel = context.cancellation_token();

        self.retry
            .execute(
                cancel,
                move |_attempt| async move {
                    context.output(format!(
                        "Ensuring artifact folder {} exists and is clean",
                        folder.display()
                    ));
                    file_system
                        .cleanup_directory(folder, cancel)
                        .await
                        .map_err(|e| cleanup_error(context, folder, e))?;
                    extension.download(context, definition, folder).await
                },
                |err: &AgentError| {
                    context.output(format!("Error during artifact download: {}", err));
                    if !err.is_retryable() {
                        return RetryDecision::Fail(err.classification());
                    }
                    context.output("Retrying artifact download");
                    warn!("Artifact {} download failed, retrying: {}", artifact.alias, err);
                    RetryDecision::Retry
                },
            )
            .await?;

        context.output(format!("Finished artifact download: {}", artifact.alias));
        Ok(())
    }
}

/// `working_folder/alias`; an empty alias is the working folder itself
fn download_folder(working_folder: &Path, alias: &str) -> PathBuf {
    let joined = working_folder.join(alias);
    full_path(&joined).unwrap_or(joined)
}

/// Not-found and permission failures cannot be fixed by retrying
fn cleanup_error(context: &ExecutionContext, path: &Path, source: io::Error) -> AgentError {
    if context.is_cancelled() {
        return AgentError::Cancelled;
    }
    match source.kind() {
        io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied => {
            AgentError::cleanup_failed(path, source)
        }
        _ => AgentError::Io(source),
    }
}

/// Two artifacts sharing an alias would share, and wipe, one download folder
fn ensure_unique_aliases(artifacts: &[AgentArtifactDefinition]) -> Result<()> {
    for (index, artifact) in artifacts.iter().enumerate() {
        let duplicate = artifacts[..index]
            .iter()
            .any(|earlier| earlier.alias.eq_ignore_ascii_case(&artifact.alias));
        if duplicate {
            return Err(AgentError::InvalidJob(format!(
                "Artifact alias '{}' is used more than once",
                artifact.alias
            )));
        }
    }
    Ok(())
}

fn report_failure(context: &ExecutionContext, err: &AgentError, class: FailureClass) {
    let code = match class {
        FailureClass::User => USER_ERROR_CODE,
        FailureClass::System => SYSTEM_ERROR_CODE,
    };
    error!("Artifact download failed ({}): {}", code, err);
    context.add_issue(
        Issue::error(format!("Failed to download artifacts: {}", err))
            .with_data("AgentVersion", AGENT_VERSION)
            .with_data("code", code)
            .with_data("TaskId", DOWNLOAD_ARTIFACTS_TASK_ID),
    );
}
