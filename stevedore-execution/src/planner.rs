//! Task execution planning: definition, handler and inputs

use std::path::PathBuf;
use std::sync::Arc;
use stevedore_core::task::current_platform;
use stevedore_core::variables::names;
use stevedore_core::{
    AgentError, Definition, ExecutionContext, ExtensionRegistry, HandlerData, InputMap,
    JobRunStage, Result, TaskInstance,
};
use stevedore_interfaces::{DefinitionLoader, HandlerSpec};
use tracing::{debug, info};

use crate::inputs::resolve_inputs;
use crate::path::PathResolutionChain;
use crate::selection::{apply_legacy_shell_rule, select_handler};

const BANNER: &str =
    "==============================================================================";

/// Everything decided about a task run before its handler is built
#[derive(Debug, Clone)]
pub struct ExecutionPlan {
    pub task_id: uuid::Uuid,

    pub task_name: String,

    /// Selected variant; its inputs are already expanded
    pub handler_data: HandlerData,

    pub inputs: InputMap,

    pub task_directory: PathBuf,

    /// The job's default rooted directory
    pub file_path_input_root: String,
}

impl ExecutionPlan {
    pub fn into_spec(self) -> HandlerSpec {
        HandlerSpec {
            handler_data: self.handler_data,
            inputs: self.inputs,
            task_directory: self.task_directory,
            file_path_input_root: self.file_path_input_root,
        }
    }
}

/// Loads a task's definition, selects its handler and resolves its inputs
pub struct TaskExecutionPlanner {
    loader: Arc<dyn DefinitionLoader>,
    extensions: Arc<ExtensionRegistry>,
    platform: String,
}

impl TaskExecutionPlanner {
    pub fn new(loader: Arc<dyn DefinitionLoader>, extensions: Arc<ExtensionRegistry>) -> Self {
        Self {
            loader,
            extensions,
            platform: current_platform().to_string(),
        }
    }

    /// Plan as if running on `platform`
    pub fn with_platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = platform.into();
        self
    }

    /// Plan `task` for `stage`.
    ///
    /// Returns `Ok(None)` when the task has nothing to run at that stage.
    pub async fn plan(
        &self,
        context: &ExecutionContext,
        task: &TaskInstance,
        stage: JobRunStage,
    ) -> Result<Option<ExecutionPlan>> {
        context.set_variable(names::TASK_DISPLAY_NAME, task.label());

        let definition = self.loader.load(context, task).await?;
        print_task_metadata(context, task, &definition);

        let Some(execution) = definition.execution_for(stage) else {
            debug!("Task {} has no {} execution", task.label(), stage);
            return Ok(None);
        };

        let execution = apply_legacy_shell_rule(execution.clone());
        let handler = select_handler(&execution, &self.platform)
            .ok_or_else(|| AgentError::NoSupportedHandler(task.label().to_string()))?;
        info!("Selected {} handler for task {}", handler.kind, task.label());

        let paths = PathResolutionChain::for_host(&self.extensions, context.host_type());
        let resolved = resolve_inputs(context, &definition, task, &handler, &paths);

        for output in &definition.output_variables {
            if !output.name.is_empty() {
                context.register_output_variable(output.name.as_str());
            }
        }

        let file_path_input_root = paths.resolve(context, "");
        let handler_data = HandlerData {
            inputs: resolved.handler_inputs,
            ..handler
        };

        Ok(Some(ExecutionPlan {
            task_id: task.id,
            task_name: task.label().to_string(),
            handler_data,
            inputs: resolved.inputs,
            task_directory: definition.directory.clone(),
            file_path_input_root,
        }))
    }
}

fn print_task_metadata(context: &ExecutionContext, task: &TaskInstance, definition: &Definition) {
    context.output(BANNER);
    context.output(format!("Task         : {}", definition.friendly_name));
    context.output(format!("Description  : {}", definition.description));
    context.output(format!("Version      : {}", task.version));
    context.output(format!("Author       : {}", definition.author));
    context.output(format!("Help         : {}", definition.help_mark_down));
    context.output(BANNER);
}
