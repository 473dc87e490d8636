use async_trait::async_trait;
use std::collections::HashMap;
use stevedore_core::{AgentArtifactDefinition, AgentError, Result};
use stevedore_interfaces::ArtifactBackend;

/// In-memory artifact lists keyed by release id
#[derive(Debug, Clone, Default)]
pub struct StaticArtifactBackend {
    releases: HashMap<i64, Vec<AgentArtifactDefinition>>,
}

impl StaticArtifactBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_release(mut self, release_id: i64, artifacts: Vec<AgentArtifactDefinition>) -> Self {
        self.insert(release_id, artifacts);
        self
    }

    pub fn insert(&mut self, release_id: i64, artifacts: Vec<AgentArtifactDefinition>) {
        self.releases.insert(release_id, artifacts);
    }
}

#[async_trait]
impl ArtifactBackend for StaticArtifactBackend {
    async fn get_release_artifacts(&self, release_id: i64) -> Result<Vec<AgentArtifactDefinition>> {
        self.releases
            .get(&release_id)
            .cloned()
            .ok_or_else(|| AgentError::Backend(format!("Release {} was not found", release_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unknown_release_is_backend_error() {
        let backend = StaticArtifactBackend::new()
            .with_release(3, vec![AgentArtifactDefinition::new("app", "FileShare")]);

        assert_eq!(backend.get_release_artifacts(3).await.unwrap().len(), 1);
        assert!(matches!(
            backend.get_release_artifacts(4).await,
            Err(AgentError::Backend(_))
        ));
    }
}
