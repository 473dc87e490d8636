//! Handler runtime

use std::sync::Arc;
use stevedore_core::{ExecutionContext, Result};
use stevedore_interfaces::HandlerFactory;
use tracing::{debug, info};

use crate::planner::ExecutionPlan;

/// Builds the handler for a plan and runs it.
///
/// Errors from the factory or the handler propagate unchanged.
#[derive(Clone)]
pub struct HandlerRuntime {
    factory: Arc<dyn HandlerFactory>,
}

impl HandlerRuntime {
    pub fn new(factory: Arc<dyn HandlerFactory>) -> Self {
        Self { factory }
    }

    pub async fn run(&self, context: &ExecutionContext, plan: ExecutionPlan) -> Result<()> {
        let task_name = plan.task_name.clone();
        let kind = plan.handler_data.kind;
        debug!("Creating {} handler for task {}", kind, task_name);

        let handler = self.factory.create(context, plan.into_spec())?;
        handler.run(context).await?;

        info!("Task {} handler finished", task_name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use stevedore_core::{AgentError, HandlerData, HandlerKind, HostType, InputMap, MemorySink, Variables};
    use stevedore_interfaces::{Handler, HandlerSpec};

    struct EchoHandler {
        fail: bool,
    }

    #[async_trait]
    impl Handler for EchoHandler {
        async fn run(&self, context: &ExecutionContext) -> Result<()> {
            context.output("handler ran");
            if self.fail {
                return Err(AgentError::Handler("exit code 2".to_string()));
            }
            Ok(())
        }
    }

    struct RecordingFactory {
        specs: Mutex<Vec<HandlerSpec>>,
        fail_create: bool,
        fail_run: bool,
    }

    impl HandlerFactory for RecordingFactory {
        fn create(&self, _context: &ExecutionContext, spec: HandlerSpec) -> Result<Box<dyn Handler>> {
            if self.fail_create {
                return Err(AgentError::Other("no runner".to_string()));
            }
            self.specs.lock().unwrap().push(spec);
            Ok(Box::new(EchoHandler { fail: self.fail_run }))
        }
    }

    fn plan() -> ExecutionPlan {
        ExecutionPlan {
            task_id: uuid::Uuid::new_v4(),
            task_name: "Copy".to_string(),
            handler_data: HandlerData::new(HandlerKind::Node).with_input("target", "copy.js"),
            inputs: [("Contents", "**")].into_iter().collect::<InputMap>(),
            task_directory: PathBuf::from("/tasks/copy"),
            file_path_input_root: "/work/r1/a".to_string(),
        }
    }

    fn factory(fail_create: bool, fail_run: bool) -> Arc<RecordingFactory> {
        Arc::new(RecordingFactory {
            specs: Mutex::new(Vec::new()),
            fail_create,
            fail_run,
        })
    }

    #[tokio::test]
    async fn test_runs_handler_with_plan() {
        let sink = Arc::new(MemorySink::new());
        let context = ExecutionContext::new(HostType::Build, Variables::new(), sink.clone());
        let factory = factory(false, false);

        HandlerRuntime::new(factory.clone()).run(&context, plan()).await.unwrap();

        let specs = factory.specs.lock().unwrap();
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].handler_data.target(), Some("copy.js"));
        assert_eq!(specs[0].inputs.get("contents"), Some("**"));
        assert_eq!(specs[0].file_path_input_root, "/work/r1/a");
        assert!(sink.contains("handler ran"));
    }

    #[tokio::test]
    async fn test_errors_propagate_unchanged() {
        let context = ExecutionContext::new(HostType::Build, Variables::new(), Arc::new(MemorySink::new()));

        let err = HandlerRuntime::new(factory(true, false))
            .run(&context, plan())
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Other(ref m) if m == "no runner"));

        let err = HandlerRuntime::new(factory(false, true))
            .run(&context, plan())
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Handler(_)));
    }
}
