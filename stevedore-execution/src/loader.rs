use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use stevedore_core::{AgentError, Definition, ExecutionContext, Result, TaskInstance};
use stevedore_interfaces::DefinitionLoader;
use tokio::fs;
use tracing::{debug, info};

const DEFINITION_FILE: &str = "task.json";

/// Loads `task.json` definitions from a local tasks directory.
///
/// A task lives in `<root>/<name>/<version>/`, or directly in
/// `<root>/<name>/` when it is not versioned.
pub struct FilesystemDefinitionLoader {
    root: PathBuf,
}

impl FilesystemDefinitionLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn find_task_directory(&self, task: &TaskInstance) -> Result<PathBuf> {
        if !is_plain_segment(&task.name) {
            return Err(AgentError::definition_load(&task.name, "invalid task name"));
        }

        let task_root = self.root.join(&task.name);
        let mut candidates = Vec::with_capacity(2);
        if is_plain_segment(&task.version) {
            candidates.push(task_root.join(&task.version));
        }
        candidates.push(task_root);

        for candidate in candidates {
            if fs::try_exists(candidate.join(DEFINITION_FILE)).await.unwrap_or(false) {
                return Ok(candidate);
            }
        }

        Err(AgentError::definition_load(
            &task.name,
            format!("no {} found under {}", DEFINITION_FILE, self.root.display()),
        ))
    }
}

#[async_trait]
impl DefinitionLoader for FilesystemDefinitionLoader {
    async fn load(&self, _context: &ExecutionContext, task: &TaskInstance) -> Result<Definition> {
        let directory = self.find_task_directory(task).await?;
        let path = directory.join(DEFINITION_FILE);
        debug!("Reading task definition {}", path.display());

        let content = fs::read_to_string(&path)
            .await
            .map_err(|e| AgentError::definition_load(&task.name, e))?;
        let mut definition: Definition = serde_json::from_str(&content)
            .map_err(|e| AgentError::definition_load(&task.name, e))?;
        definition.directory = directory;

        info!("Loaded task definition {} from {}", task.name, definition.directory.display());
        Ok(definition)
    }
}

/// A single normal path component
fn is_plain_segment(value: &str) -> bool {
    let mut components = Path::new(value).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    ) && !value.contains(['/', '\\'])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use stevedore_core::{HandlerKind, HostType, JobRunStage, MemorySink, Variables};
    use tempfile::TempDir;

    const DEFINITION: &str = r#"{
        "name": "CopyFiles",
        "friendlyName": "Copy files",
        "author": "Stevedore",
        "inputs": [
            { "name": "SourceFolder", "type": "filePath", "defaultValue": "" }
        ],
        "execution": {
            "Node": { "target": "copy.js" },
            "PowerShell": { "target": "copy.ps1", "platforms": ["windows"] }
        }
    }"#;

    fn context() -> ExecutionContext {
        ExecutionContext::new(HostType::Build, Variables::new(), Arc::new(MemorySink::new()))
    }

    async fn write_definition(dir: &Path, content: &str) {
        fs::create_dir_all(dir).await.unwrap();
        fs::write(dir.join(DEFINITION_FILE), content).await.unwrap();
    }

    #[tokio::test]
    async fn test_loads_versioned_definition() {
        let temp = TempDir::new().unwrap();
        let versioned = temp.path().join("CopyFiles").join("2.1.0");
        write_definition(&versioned, DEFINITION).await;

        let loader = FilesystemDefinitionLoader::new(temp.path());
        let task = TaskInstance::new("CopyFiles", "2.1.0");
        let definition = loader.load(&context(), &task).await.unwrap();

        assert_eq!(definition.friendly_name, "Copy files");
        assert_eq!(definition.directory, versioned);
        assert!(definition.inputs[0].is_file_path());
        let execution = definition.execution_for(JobRunStage::Main).unwrap();
        assert_eq!(execution.handlers.len(), 2);
        assert!(execution.handlers.iter().any(|h| h.kind == HandlerKind::Node));
    }

    #[tokio::test]
    async fn test_falls_back_to_unversioned_directory() {
        let temp = TempDir::new().unwrap();
        let unversioned = temp.path().join("CopyFiles");
        write_definition(&unversioned, DEFINITION).await;

        let loader = FilesystemDefinitionLoader::new(temp.path());
        let task = TaskInstance::new("CopyFiles", "9.9.9");
        let definition = loader.load(&context(), &task).await.unwrap();
        assert_eq!(definition.directory, unversioned);
    }

    #[tokio::test]
    async fn test_missing_or_malformed_definition() {
        let temp = TempDir::new().unwrap();
        write_definition(&temp.path().join("Broken"), "{ not json").await;
        let loader = FilesystemDefinitionLoader::new(temp.path());

        for name in ["Absent", "Broken", "../escape", ""] {
            let task = TaskInstance::new(name, "1.0.0");
            let err = loader.load(&context(), &task).await.unwrap_err();
            assert!(
                matches!(err, AgentError::DefinitionLoad { .. }),
                "{name}: {err:?}"
            );
        }
    }
}
