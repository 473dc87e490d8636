//! Task execution interface definitions

use async_trait::async_trait;
use std::path::PathBuf;
use stevedore_core::{Definition, ExecutionContext, HandlerData, InputMap, Result, TaskInstance};

/// Resolves a task instance to its static definition
#[async_trait]
pub trait DefinitionLoader: Send + Sync {
    /// Load the definition for `task`
    ///
    /// Fails with [`AgentError::DefinitionLoad`] when the definition is
    /// missing or malformed.
    ///
    /// [`AgentError::DefinitionLoad`]: stevedore_core::AgentError::DefinitionLoad
    async fn load(&self, context: &ExecutionContext, task: &TaskInstance) -> Result<Definition>;
}

/// Everything a handler factory needs to build a handler
#[derive(Debug, Clone)]
pub struct HandlerSpec {
    /// Selected variant with its handler inputs already expanded
    pub handler_data: HandlerData,

    /// Resolved task inputs, read-only from here on
    pub inputs: InputMap,

    /// Directory the task definition was loaded from
    pub task_directory: PathBuf,

    /// The job's default rooted directory, or empty when no extension roots paths
    pub file_path_input_root: String,
}

/// A runnable task implementation
#[async_trait]
pub trait Handler: Send + Sync {
    /// Run to completion, observing the context's cancellation token
    async fn run(&self, context: &ExecutionContext) -> Result<()>;
}

/// Builds handlers for selected variants
pub trait HandlerFactory: Send + Sync {
    fn create(&self, context: &ExecutionContext, spec: HandlerSpec) -> Result<Box<dyn Handler>>;
}
