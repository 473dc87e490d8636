//! Core error types for the agent

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Core error type shared by the planner, the runtime and artifact retrieval
#[derive(Debug, Error)]
pub enum AgentError {
    /// The task definition could not be found or parsed
    #[error("Failed to load task definition '{task}': {message}")]
    DefinitionLoad { task: String, message: String },

    /// No handler variant is available for the requested stage
    #[error("A supported task execution handler was not found for task '{0}'")]
    NoSupportedHandler(String),

    /// No artifact extension is registered for the type tag
    #[error("Artifact type '{0}' is not supported")]
    UnsupportedArtifactType(String),

    /// A folder could not be cleaned because it vanished or access was denied
    #[error("Failed to clean up artifact directory {path:?}: {source}")]
    ArtifactCleanupFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Download strategy reported a failure the user must act on
    #[error("Artifact download failed: {0}")]
    ArtifactDownload(String),

    /// The job cancellation signal fired
    #[error("Operation was cancelled")]
    Cancelled,

    /// Handler process or entry point failed
    #[error("Handler failed: {0}")]
    Handler(String),

    /// Task exceeded its timeout
    #[error("Task timed out after {0} minutes")]
    Timeout(u32),

    /// Artifact metadata service errors
    #[error("Artifact backend error: {0}")]
    Backend(String),

    /// Job message is missing required data
    #[error("Invalid job: {0}")]
    InvalidJob(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

/// Result type alias for the agent
pub type Result<T> = std::result::Result<T, AgentError>;

/// Who is expected to act on a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureClass {
    /// Caused by the job's inputs or environment
    User,
    /// Caused by the agent or its collaborators
    System,
}

impl std::fmt::Display for FailureClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureClass::User => write!(f, "user"),
            FailureClass::System => write!(f, "system"),
        }
    }
}

impl AgentError {
    pub fn definition_load(task: impl Into<String>, message: impl std::fmt::Display) -> Self {
        AgentError::DefinitionLoad {
            task: task.into(),
            message: message.to_string(),
        }
    }

    pub fn cleanup_failed(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        AgentError::ArtifactCleanupFailed {
            path: path.into(),
            source,
        }
    }

    /// Classify the failure for issue reporting
    pub fn classification(&self) -> FailureClass {
        match self {
            AgentError::ArtifactCleanupFailed { .. } | AgentError::ArtifactDownload(_) => {
                FailureClass::User
            }
            _ => FailureClass::System,
        }
    }

    /// Whether the generic retry predicate may try again after this error
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            AgentError::DefinitionLoad { .. }
                | AgentError::NoSupportedHandler(_)
                | AgentError::UnsupportedArtifactType(_)
                | AgentError::ArtifactCleanupFailed { .. }
                | AgentError::ArtifactDownload(_)
                | AgentError::Cancelled
                | AgentError::InvalidJob(_)
        )
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, AgentError::Cancelled)
    }

    /// Stable error code used in structured issues
    pub fn error_code(&self) -> &'static str {
        match self {
            AgentError::DefinitionLoad { .. } => "DEFINITION_LOAD_FAILED",
            AgentError::NoSupportedHandler(_) => "NO_SUPPORTED_HANDLER",
            AgentError::UnsupportedArtifactType(_) => "UNSUPPORTED_ARTIFACT_TYPE",
            AgentError::ArtifactCleanupFailed { .. } => "ARTIFACT_CLEANUP_FAILED",
            AgentError::ArtifactDownload(_) => "ARTIFACT_DOWNLOAD_FAILED",
            AgentError::Cancelled => "CANCELLED",
            AgentError::Handler(_) => "HANDLER_FAILED",
            AgentError::Timeout(_) => "TIMEOUT",
            AgentError::Backend(_) => "BACKEND_ERROR",
            AgentError::InvalidJob(_) => "INVALID_JOB",
            _ => "INTERNAL_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_classification() {
        let cleanup = AgentError::cleanup_failed(
            "/work/a",
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        );
        assert_eq!(cleanup.classification(), FailureClass::User);
        assert_eq!(
            AgentError::ArtifactDownload("missing".to_string()).classification(),
            FailureClass::User
        );
        assert_eq!(
            AgentError::Backend("503".to_string()).classification(),
            FailureClass::System
        );
        assert_eq!(
            AgentError::UnsupportedArtifactType("Jenkins".to_string()).classification(),
            FailureClass::System
        );
    }

    #[test]
    fn test_error_retryable() {
        assert!(AgentError::Backend("timeout".to_string()).is_retryable());
        assert!(AgentError::Io(io::Error::new(io::ErrorKind::Other, "busy")).is_retryable());
        assert!(!AgentError::ArtifactDownload("bad".to_string()).is_retryable());
        assert!(!AgentError::Cancelled.is_retryable());
        assert!(!AgentError::NoSupportedHandler("t".to_string()).is_retryable());
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(
            AgentError::definition_load("Build", "not found").error_code(),
            "DEFINITION_LOAD_FAILED"
        );
        assert_eq!(AgentError::Cancelled.error_code(), "CANCELLED");
        assert_eq!(
            AgentError::Other("boom".to_string()).error_code(),
            "INTERNAL_ERROR"
        );
    }

    #[test]
    fn test_cleanup_failed_keeps_source() {
        use std::error::Error;

        let err = AgentError::cleanup_failed(
            "/work/a",
            io::Error::new(io::ErrorKind::NotFound, "gone"),
        );
        assert!(err.source().is_some());
        assert!(err.to_string().contains("/work/a"));
    }
}
