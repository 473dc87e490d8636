//! Artifact type tag to download strategy

use std::collections::HashMap;
use std::sync::Arc;
use stevedore_core::{AgentError, ExtensionRegistry, Result};
use stevedore_interfaces::ArtifactExtension;
use tracing::debug;

/// Download strategies keyed by their exact artifact type tag
#[derive(Default, Clone)]
pub struct ArtifactExtensionRegistry {
    extensions: HashMap<String, Arc<dyn ArtifactExtension>>,
}

impl ArtifactExtensionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect every artifact extension registered with the process registry
    pub fn from_extensions(registry: &ExtensionRegistry) -> Result<Self> {
        let mut artifacts = Self::new();
        for extension in registry.get_extensions::<dyn ArtifactExtension>() {
            artifacts.register(extension)?;
        }
        Ok(artifacts)
    }

    /// Register a strategy; a second strategy for the same tag is rejected
    pub fn register(&mut self, extension: Arc<dyn ArtifactExtension>) -> Result<()> {
        let artifact_type = extension.artifact_type().to_string();
        if self.extensions.contains_key(&artifact_type) {
            return Err(AgentError::Other(format!(
                "An artifact extension for type '{}' is already registered",
                artifact_type
            )));
        }
        debug!("Registered artifact extension {}", artifact_type);
        self.extensions.insert(artifact_type, extension);
        Ok(())
    }

    pub fn resolve(&self, artifact_type: &str) -> Result<Arc<dyn ArtifactExtension>> {
        self.extensions
            .get(artifact_type)
            .cloned()
            .ok_or_else(|| AgentError::UnsupportedArtifactType(artifact_type.to_string()))
    }

    pub fn artifact_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.extensions.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }

    pub fn len(&self) -> usize {
        self.extensions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }
}

impl std::fmt::Debug for ArtifactExtensionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArtifactExtensionRegistry")
            .field("artifact_types", &self.artifact_types())
            .finish()
    }
}
