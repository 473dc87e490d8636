//! Stevedore Execution Engine
//!
//! Turns a task instance into a running handler: definition loading,
//! handler selection, input resolution, path rooting and the job driver
//! that sequences steps.

pub mod inputs;
pub mod job;
pub mod loader;
pub mod path;
pub mod planner;
pub mod process;
pub mod runtime;
pub mod selection;

// Re-export main types
pub use inputs::ResolvedInputs;
pub use job::{JobResult, JobRunner, StepOutcome, TaskResult};
pub use loader::FilesystemDefinitionLoader;
pub use path::PathResolutionChain;
pub use planner::{ExecutionPlan, TaskExecutionPlanner};
pub use process::{ProcessHandler, ProcessHandlerFactory};
pub use runtime::HandlerRuntime;
pub use selection::{apply_legacy_shell_rule, select_handler};
