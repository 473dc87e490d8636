//! Job extension for release jobs

use async_trait::async_trait;
use parking_lot::Mutex;
use regex::Regex;
use std::path::{Path, PathBuf};
use stevedore_core::variables::names;
use stevedore_core::{AgentError, ExecutionContext, HostType, Result};
use stevedore_interfaces::JobExtension;
use tracing::info;

use crate::directory::ReleaseDirectoryManager;
use crate::orchestrator::ArtifactRetrievalOrchestrator;

/// Artifacts folder name inside a release directory
pub const ARTIFACTS_DIRECTORY: &str = "a";

const INVALID_FILE_NAME_CHARS: &str = r#"[<>:"/\\|?*\x00-\x1F]"#;

#[derive(Debug, Clone)]
struct ReleaseJobState {
    release_id: i64,
    artifacts_folder: PathBuf,
    skip_download: bool,
}

/// Prepares the release directory on initialize and downloads the
/// release's artifacts as the pre-job step.
pub struct ReleaseJobExtension {
    directories: ReleaseDirectoryManager,
    orchestrator: ArtifactRetrievalOrchestrator,
    state: Mutex<Option<ReleaseJobState>>,
}

impl ReleaseJobExtension {
    pub fn new(work_directory: impl Into<PathBuf>, orchestrator: ArtifactRetrievalOrchestrator) -> Self {
        Self {
            directories: ReleaseDirectoryManager::new(work_directory),
            orchestrator,
            state: Mutex::new(None),
        }
    }

    /// Artifacts folder chosen by the last `initialize`
    pub fn artifacts_folder(&self) -> Option<PathBuf> {
        self.state.lock().as_ref().map(|state| state.artifacts_folder.clone())
    }

    fn print_public_variables(context: &ExecutionContext) {
        let public = context.variables().public();
        context.output("Environment variables available are below:");
        for (name, value) in public {
            context.output(format!("[{}] --> [{}]", name, value));
        }
    }
}

/// Remove characters that cannot appear in a file name
pub fn sanitize_file_name(value: &str) -> Result<String> {
    let pattern = Regex::new(INVALID_FILE_NAME_CHARS)
        .map_err(|e| AgentError::Other(format!("Invalid file name pattern: {}", e)))?;
    Ok(pattern.replace_all(value, "").into_owned())
}

#[async_trait]
impl JobExtension for ReleaseJobExtension {
    fn host_type(&self) -> HostType {
        HostType::Release
    }

    fn path_root(&self, context: &ExecutionContext) -> Option<PathBuf> {
        context
            .variable(names::RELEASE_ARTIFACTS_DIRECTORY)
            .filter(|root| !root.is_empty())
            .map(PathBuf::from)
    }

    async fn initialize(&self, context: &ExecutionContext) -> Result<()> {
        context.output("Preparing release directory");

        let (release_id, project_id, skip_download, definition_name, definition_id, collection_id) = {
            let variables = context.variables();
            (
                variables.get_int(names::RELEASE_ID).unwrap_or(0),
                variables.get_uuid(names::SYSTEM_TEAM_PROJECT_ID).unwrap_or_default(),
                variables
                    .get_bool(names::RELEASE_SKIP_ARTIFACTS_DOWNLOAD)
                    .unwrap_or(false),
                variables
                    .get(names::RELEASE_DEFINITION_NAME)
                    .unwrap_or_default()
                    .to_string(),
                variables
                    .get(names::RELEASE_DEFINITION_ID)
                    .unwrap_or_default()
                    .to_string(),
                variables
                    .get(names::SYSTEM_COLLECTION_ID)
                    .unwrap_or_default()
                    .to_string(),
            )
        };
        context.output(format!(
            "ReleaseId={}, TeamProjectId={}, ReleaseDefinitionName={}",
            release_id, project_id, definition_name
        ));

        let definition = if definition_id.is_empty() {
            sanitize_file_name(&definition_name)?
        } else {
            definition_id
        };

        let directories = self.directories.clone();
        let cancel = context.cancellation_token().clone();
        let project = project_id.to_string();
        let mapping = tokio::task::spawn_blocking(move || {
            directories.prepare_artifacts_directory(&collection_id, &project, &definition, &cancel)
        })
        .await
        .map_err(|e| AgentError::Other(format!("Release directory preparation failed: {}", e)))??;

        let artifacts_folder = self
            .directories
            .work_directory()
            .join(&mapping.release_directory)
            .join(ARTIFACTS_DIRECTORY);
        context.output(format!("Release folder: {}", artifacts_folder.display()));

        let folder = artifacts_folder.to_string_lossy().into_owned();
        context.set_variable(names::AGENT_RELEASE_DIRECTORY, folder.as_str());
        context.set_variable(names::RELEASE_ARTIFACTS_DIRECTORY, folder.as_str());
        context.set_variable(names::SYSTEM_DEFAULT_WORKING_DIRECTORY, folder.as_str());

        Self::print_public_variables(context);

        if skip_download {
            create_folder_if_missing(context, &artifacts_folder).await?;
            context.output("Skipping artifact download as requested by the release");
            info!("Skipping artifact download based on release settings");
        }

        *self.state.lock() = Some(ReleaseJobState {
            release_id,
            artifacts_folder,
            skip_download,
        });
        Ok(())
    }

    async fn pre_job(&self, context: &ExecutionContext) -> Result<()> {
        let state = self.state.lock().clone().ok_or_else(|| {
            AgentError::InvalidJob("Release job extension was not initialized".to_string())
        })?;

        if state.skip_download {
            return Ok(());
        }

        self.orchestrator
            .download_artifacts(context, state.release_id, &state.artifacts_folder)
            .await
    }
}

async fn create_folder_if_missing(context: &ExecutionContext, folder: &Path) -> Result<()> {
    if !tokio::fs::try_exists(folder).await.unwrap_or(false) {
        context.output(format!("Creating artifacts folder: {}", folder.display()));
        tokio::fs::create_dir_all(folder).await?;
    }
    Ok(())
}
