//! Core domain models and types for the Stevedore agent
//!
//! This crate contains the task and artifact model, the error taxonomy and
//! the job-scoped execution context shared by every other crate.

pub mod artifact;
pub mod context;
pub mod diagnostics;
pub mod error;
pub mod extension;
pub mod inputs;
pub mod job;
pub mod paths;
pub mod task;
pub mod variables;

// Re-export commonly used types at the crate root
pub use artifact::{AgentArtifactDefinition, ArtifactDefinition, ArtifactDetails};
pub use context::{ExecutionContext, HostType};
pub use diagnostics::{DiagnosticSink, Issue, IssueType, MemorySink};
pub use error::{AgentError, FailureClass, Result};
pub use extension::ExtensionRegistry;
pub use inputs::InputMap;
pub use job::{JobMessage, JobStep};
pub use task::{Definition, ExecutionData, HandlerData, HandlerKind, JobRunStage, TaskInstance};
pub use variables::Variables;

/// Version reported in structured issues
pub const AGENT_VERSION: &str = env!("CARGO_PKG_VERSION");
