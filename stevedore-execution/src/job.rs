//! Job driver: extensions first, then steps stage by stage

use serde::Serialize;
use std::sync::Arc;
use stevedore_core::{
    AgentError, ExecutionContext, ExtensionRegistry, Issue, JobRunStage, JobStep, Result,
    TaskInstance, AGENT_VERSION,
};
use stevedore_interfaces::JobExtension;
use tracing::{error, info, warn};

use crate::planner::TaskExecutionPlanner;
use crate::runtime::HandlerRuntime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum TaskResult {
    Succeeded,
    SucceededWithIssues,
    Failed,
    Skipped,
    Cancelled,
}

impl std::fmt::Display for TaskResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            TaskResult::Succeeded => "Succeeded",
            TaskResult::SucceededWithIssues => "SucceededWithIssues",
            TaskResult::Failed => "Failed",
            TaskResult::Skipped => "Skipped",
            TaskResult::Cancelled => "Canceled",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepOutcome {
    pub name: String,
    pub stage: JobRunStage,
    pub result: TaskResult,
}

/// Outcome of a whole job
#[derive(Debug)]
pub struct JobResult {
    pub result: TaskResult,
    pub steps: Vec<StepOutcome>,

    /// Error that ended the job, if any
    pub failure: Option<AgentError>,
}

impl JobResult {
    pub fn succeeded(&self) -> bool {
        matches!(
            self.result,
            TaskResult::Succeeded | TaskResult::SucceededWithIssues
        )
    }
}

/// Runs the steps of one job against a shared execution context
pub struct JobRunner {
    planner: TaskExecutionPlanner,
    runtime: HandlerRuntime,
    extensions: Arc<ExtensionRegistry>,
}

impl JobRunner {
    pub fn new(
        planner: TaskExecutionPlanner,
        runtime: HandlerRuntime,
        extensions: Arc<ExtensionRegistry>,
    ) -> Self {
        Self {
            planner,
            runtime,
            extensions,
        }
    }

    pub async fn run(&self, context: &ExecutionContext, steps: &[JobStep]) -> JobResult {
        info!(job_id = %context.job_id(), "Starting {} job with {} steps", context.host_type(), steps.len());

        let mut outcomes = Vec::with_capacity(steps.len());
        match self.run_steps(context, steps, &mut outcomes).await {
            Ok(()) => {
                let result = if outcomes
                    .iter()
                    .any(|outcome| outcome.result == TaskResult::SucceededWithIssues)
                {
                    TaskResult::SucceededWithIssues
                } else {
                    TaskResult::Succeeded
                };
                info!(job_id = %context.job_id(), "Job finished: {}", result);
                JobResult {
                    result,
                    steps: outcomes,
                    failure: None,
                }
            }
            Err(err) => {
                let result = if err.is_cancelled() {
                    TaskResult::Cancelled
                } else {
                    TaskResult::Failed
                };
                error!(job_id = %context.job_id(), "Job finished: {}: {}", result, err);
                JobResult {
                    result,
                    steps: outcomes,
                    failure: Some(err),
                }
            }
        }
    }

    async fn run_steps(
        &self,
        context: &ExecutionContext,
        steps: &[JobStep],
        outcomes: &mut Vec<StepOutcome>,
    ) -> Result<()> {
        let extensions: Vec<Arc<dyn JobExtension>> = self
            .extensions
            .get_extensions::<dyn JobExtension>()
            .into_iter()
            .filter(|extension| extension.host_type() == context.host_type())
            .collect();

        for extension in &extensions {
            extension.initialize(context).await?;
        }
        for extension in &extensions {
            if context.is_cancelled() {
                return Err(AgentError::Cancelled);
            }
            extension.pre_job(context).await?;
        }

        for stage in JobRunStage::ALL {
            for step in steps.iter().filter(|step| step.stage == stage) {
                if context.is_cancelled() {
                    return Err(AgentError::Cancelled);
                }

                let task = &step.task;
                if !task.enabled {
                    context.output(format!("Skipping disabled task {}", task.label()));
                    outcomes.push(outcome(task, stage, TaskResult::Skipped));
                    continue;
                }

                match self.run_task(context, task, stage).await {
                    Ok(result) => outcomes.push(outcome(task, stage, result)),
                    Err(err) if task.continue_on_error && !err.is_cancelled() => {
                        warn!("Task {} failed, continuing: {}", task.label(), err);
                        context.add_issue(task_issue(Issue::warning(err.to_string()), task, &err));
                        outcomes.push(outcome(task, stage, TaskResult::SucceededWithIssues));
                    }
                    Err(err) => {
                        let result = if err.is_cancelled() {
                            TaskResult::Cancelled
                        } else {
                            context.add_issue(task_issue(Issue::error(err.to_string()), task, &err));
                            TaskResult::Failed
                        };
                        outcomes.push(outcome(task, stage, result));
                        return Err(err);
                    }
                }
            }
        }

        Ok(())
    }

    async fn run_task(
        &self,
        context: &ExecutionContext,
        task: &TaskInstance,
        stage: JobRunStage,
    ) -> Result<TaskResult> {
        let Some(plan) = self.planner.plan(context, task, stage).await? else {
            return Ok(TaskResult::Skipped);
        };

        let run = async {
            match task.timeout() {
                Some(limit) => tokio::time::timeout(limit, self.runtime.run(context, plan))
                    .await
                    .map_err(|_| AgentError::Timeout(task.timeout_in_minutes))?,
                None => self.runtime.run(context, plan).await,
            }
        };

        tokio::select! {
            biased;
            _ = context.cancellation_token().cancelled() => Err(AgentError::Cancelled),
            result = run => result.map(|()| TaskResult::Succeeded),
        }
    }
}

/// Attach the fields that identify a task failure
fn task_issue(issue: Issue, task: &TaskInstance, err: &AgentError) -> Issue {
    issue
        .with_data("AgentVersion", AGENT_VERSION)
        .with_data("code", err.error_code())
        .with_data("TaskId", task.id.to_string())
}

fn outcome(task: &TaskInstance, stage: JobRunStage, result: TaskResult) -> StepOutcome {
    StepOutcome {
        name: task.label().to_string(),
        stage,
        result,
    }
}
