//! Release artifact definitions

use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt::Debug;

/// Type tag of the generic artifact type that may self-identify a sub-type
pub const CUSTOM_ARTIFACT_TYPE: &str = "Custom";

/// An artifact declared by a release job, as delivered by the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentArtifactDefinition {
    /// Folder name the artifact is downloaded into
    pub alias: String,

    pub artifact_type: String,

    /// Opaque, type-specific JSON payload
    #[serde(default)]
    pub details: String,

    #[serde(default)]
    pub version: String,

    #[serde(default)]
    pub name: String,
}

impl AgentArtifactDefinition {
    pub fn new(alias: impl Into<String>, artifact_type: impl Into<String>) -> Self {
        Self {
            alias: alias.into(),
            artifact_type: artifact_type.into(),
            details: String::new(),
            version: String::new(),
            name: String::new(),
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = details.into();
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn is_custom(&self) -> bool {
        self.artifact_type.eq_ignore_ascii_case(CUSTOM_ARTIFACT_TYPE)
    }
}

/// Strategy-specific details produced by an artifact extension
pub trait ArtifactDetails: Any + Debug + Send + Sync {
    fn as_any(&self) -> &dyn Any;
}

/// Normalized artifact handed to a download strategy
#[derive(Debug)]
pub struct ArtifactDefinition {
    pub artifact_type: String,
    pub name: String,
    pub version: String,
    pub details: Box<dyn ArtifactDetails>,
}

impl ArtifactDefinition {
    pub fn new(declared: &AgentArtifactDefinition, details: Box<dyn ArtifactDetails>) -> Self {
        Self {
            artifact_type: declared.artifact_type.clone(),
            name: declared.name.clone(),
            version: declared.version.clone(),
            details,
        }
    }

    /// Downcast the details to the strategy's concrete type
    pub fn details<T: ArtifactDetails>(&self) -> Option<&T> {
        self.details.as_any().downcast_ref::<T>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct ShareDetails {
        path: String,
    }

    impl ArtifactDetails for ShareDetails {
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[derive(Debug)]
    struct OtherDetails;

    impl ArtifactDetails for OtherDetails {
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[test]
    fn test_details_downcast() {
        let declared = AgentArtifactDefinition::new("drop", "FileShare").with_version("12");
        let definition = ArtifactDefinition::new(
            &declared,
            Box::new(ShareDetails {
                path: "/shares/drop".to_string(),
            }),
        );

        assert_eq!(definition.version, "12");
        assert_eq!(
            definition.details::<ShareDetails>().map(|d| d.path.as_str()),
            Some("/shares/drop")
        );
        assert!(definition.details::<OtherDetails>().is_none());
    }

    #[test]
    fn test_custom_detection() {
        assert!(AgentArtifactDefinition::new("a", "custom").is_custom());
        assert!(!AgentArtifactDefinition::new("a", "Build").is_custom());
    }

    #[test]
    fn test_deserialize_camel_case() {
        let declared: AgentArtifactDefinition = serde_json::from_str(
            r#"{"alias": "drop", "artifactType": "FileShare", "details": "{\"path\":\"/x\"}"}"#,
        )
        .unwrap();
        assert_eq!(declared.artifact_type, "FileShare");
        assert_eq!(declared.details, r#"{"path":"/x"}"#);
        assert!(declared.version.is_empty());
    }
}
