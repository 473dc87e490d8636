//! Release directory allocation
//!
//! Each (collection, project, definition) triple owns one numbered directory
//! below the agent work folder, remembered across jobs in a mapping file.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use stevedore_core::{AgentError, FailureClass, Result};
use stevedore_resilience::{RetryDecision, RetryExecutor, RetryPolicy};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub const MAPPING_DIRECTORY: &str = "SourceRootMapping";
pub const MAPPING_FILE: &str = "ReleaseDirectoryMapping.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseDirectoryMapping {
    pub collection_id: String,
    pub project_id: String,
    pub definition_id: String,

    /// Directory name relative to the work folder, e.g. `r1`
    pub release_directory: String,
}

impl ReleaseDirectoryMapping {
    fn matches(&self, collection_id: &str, project_id: &str, definition_id: &str) -> bool {
        self.collection_id.eq_ignore_ascii_case(collection_id)
            && self.project_id.eq_ignore_ascii_case(project_id)
            && self.definition_id.eq_ignore_ascii_case(definition_id)
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MappingFile {
    #[serde(default)]
    last_release_directory_number: u32,

    #[serde(default)]
    mappings: Vec<ReleaseDirectoryMapping>,
}

/// Hands out `r1`, `r2`, ... below the work folder
#[derive(Debug, Clone)]
pub struct ReleaseDirectoryManager {
    work_directory: PathBuf,
    retry: RetryExecutor,
}

impl ReleaseDirectoryManager {
    pub fn new(work_directory: impl Into<PathBuf>) -> Self {
        Self {
            work_directory: work_directory.into(),
            retry: RetryExecutor::new(RetryPolicy::fixed(3, Duration::from_millis(100))),
        }
    }

    pub fn work_directory(&self) -> &Path {
        &self.work_directory
    }

    pub fn mapping_file(&self) -> PathBuf {
        self.work_directory.join(MAPPING_DIRECTORY).join(MAPPING_FILE)
    }

    /// Find or allocate the release directory for a definition.
    ///
    /// Blocking; run it off the async runtime.
    pub fn prepare_artifacts_directory(
        &self,
        collection_id: &str,
        project_id: &str,
        definition_id: &str,
        cancel: &CancellationToken,
    ) -> Result<ReleaseDirectoryMapping> {
        let path = self.mapping_file();
        let mut mapping_file = read_mapping_file(&path)?;

        if let Some(existing) = mapping_file
            .mappings
            .iter()
            .find(|m| m.matches(collection_id, project_id, definition_id))
        {
            info!("Reusing release directory {}", existing.release_directory);
            return Ok(existing.clone());
        }

        mapping_file.last_release_directory_number += 1;
        let mapping = ReleaseDirectoryMapping {
            collection_id: collection_id.to_string(),
            project_id: project_id.to_string(),
            definition_id: definition_id.to_string(),
            release_directory: format!("r{}", mapping_file.last_release_directory_number),
        };
        mapping_file.mappings.push(mapping.clone());

        let content = serde_json::to_string_pretty(&mapping_file)?;
        self.retry
            .execute_blocking(
                cancel,
                |_attempt| write_mapping_file(&path, &content),
                |err: &io::Error| match err.kind() {
                    io::ErrorKind::PermissionDenied => RetryDecision::Fail(FailureClass::System),
                    _ => {
                        warn!("Failed to write {}, retrying: {}", path.display(), err);
                        RetryDecision::Retry
                    }
                },
            )
            .map_err(|err| match err.into_inner() {
                Some(source) => AgentError::Io(source),
                None => AgentError::Cancelled,
            })?;

        info!(
            "Allocated release directory {} for definition {}",
            mapping.release_directory, definition_id
        );
        Ok(mapping)
    }
}

fn read_mapping_file(path: &Path) -> Result<MappingFile> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(serde_json::from_str(&content)?),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(MappingFile::default()),
        Err(e) => Err(AgentError::Io(e)),
    }
}

fn write_mapping_file(path: &Path, content: &str) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_allocates_and_reuses_directories() {
        let work = TempDir::new().unwrap();
        let manager = ReleaseDirectoryManager::new(work.path());
        let cancel = CancellationToken::new();

        let first = manager
            .prepare_artifacts_directory("collection", "project", "12", &cancel)
            .unwrap();
        let second = manager
            .prepare_artifacts_directory("collection", "project", "13", &cancel)
            .unwrap();
        let again = manager
            .prepare_artifacts_directory("COLLECTION", "project", "12", &cancel)
            .unwrap();

        assert_eq!(first.release_directory, "r1");
        assert_eq!(second.release_directory, "r2");
        assert_eq!(again, first);
        assert!(manager.mapping_file().is_file());
    }

    #[test]
    fn test_mapping_survives_new_manager() {
        let work = TempDir::new().unwrap();
        let cancel = CancellationToken::new();
        ReleaseDirectoryManager::new(work.path())
            .prepare_artifacts_directory("c", "p", "d", &cancel)
            .unwrap();

        let reopened = ReleaseDirectoryManager::new(work.path())
            .prepare_artifacts_directory("c", "p", "other", &cancel)
            .unwrap();
        assert_eq!(reopened.release_directory, "r2");
    }

    #[test]
    fn test_corrupt_mapping_file_is_an_error() {
        let work = TempDir::new().unwrap();
        let manager = ReleaseDirectoryManager::new(work.path());
        fs::create_dir_all(work.path().join(MAPPING_DIRECTORY)).unwrap();
        fs::write(manager.mapping_file(), "not json").unwrap();

        let result =
            manager.prepare_artifacts_directory("c", "p", "d", &CancellationToken::new());
        assert!(matches!(result, Err(AgentError::Serialization(_))));
    }
}
