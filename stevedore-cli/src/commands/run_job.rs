//! `stevedore run-job`

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use stevedore_config::AgentConfig;
use stevedore_core::variables::names;
use stevedore_core::{ExecutionContext, ExtensionRegistry, JobMessage};
use stevedore_execution::{
    FilesystemDefinitionLoader, HandlerRuntime, JobResult, JobRunner, ProcessHandlerFactory,
    TaskExecutionPlanner,
};
use stevedore_interfaces::{ArtifactExtension, JobExtension};
use stevedore_logging::TracingSink;
use stevedore_release::{
    ArtifactExtensionRegistry, ArtifactRetrievalOrchestrator, FileShareArtifactExtension,
    LocalFileSystemManager, ReleaseJobExtension, StaticArtifactBackend,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub async fn load_job(path: &Path) -> Result<JobMessage> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read job file {:?}", path))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse job file {:?}", path))
}

/// Wire the engine for one job
pub fn build_runner(config: &AgentConfig, job: &JobMessage) -> Result<JobRunner> {
    let release_id = job.to_variables().get_int(names::RELEASE_ID).unwrap_or(0);
    let backend = StaticArtifactBackend::new().with_release(release_id, job.release_artifacts.clone());

    let mut extensions = ExtensionRegistry::new();
    extensions.register::<dyn ArtifactExtension>(Arc::new(FileShareArtifactExtension));

    let artifacts = ArtifactExtensionRegistry::from_extensions(&extensions)
        .context("Failed to register artifact extensions")?;
    let orchestrator = ArtifactRetrievalOrchestrator::new(
        Arc::new(backend),
        Arc::new(artifacts),
        Arc::new(LocalFileSystemManager::new()),
    )
    .with_retry_policy(config.retry.to_policy());
    extensions.register::<dyn JobExtension>(Arc::new(ReleaseJobExtension::new(
        &config.agent.work_directory,
        orchestrator,
    )));

    let extensions = Arc::new(extensions);
    let loader = Arc::new(FilesystemDefinitionLoader::new(&config.agent.tasks_directory));
    let planner = TaskExecutionPlanner::new(loader, extensions.clone());
    let runtime = HandlerRuntime::new(Arc::new(ProcessHandlerFactory::new(
        &config.handlers.node,
        &config.handlers.powershell,
    )));

    Ok(JobRunner::new(planner, runtime, extensions))
}

/// Run a job until it finishes or `cancel` fires
pub async fn run_job(
    config: &AgentConfig,
    job: &JobMessage,
    cancel: CancellationToken,
) -> Result<JobResult> {
    let runner = build_runner(config, job)?;
    let context = ExecutionContext::new(
        job.host_type,
        job.to_variables(),
        Arc::new(TracingSink::new(job.job_id)),
    )
    .with_job_id(job.job_id)
    .with_cancellation(cancel);

    Ok(runner.run(&context, &job.steps).await)
}

pub async fn handle_run_job(config: &AgentConfig, job_path: &Path) -> Result<()> {
    let job = load_job(job_path).await?;
    info!(
        "Running {} job {} with {} steps on agent {}",
        job.host_type,
        job.job_id,
        job.steps.len(),
        config.agent.name
    );

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling job");
            on_signal.cancel();
        }
    });

    let result = run_job(config, &job, cancel).await?;
    for step in &result.steps {
        println!("{:<8} {:<24} {}", step.stage, step.name, step.result);
    }
    println!("Job result: {}", result.result);

    let succeeded = result.succeeded();
    match result.failure {
        None if succeeded => Ok(()),
        Some(err) => Err(anyhow::anyhow!("Job {} failed: {}", job.job_id, err)),
        None => Err(anyhow::anyhow!("Job {} finished as {}", job.job_id, result.result)),
    }
}
