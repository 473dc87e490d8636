//! Out-of-process task handlers

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use stevedore_core::{AgentError, ExecutionContext, HandlerKind, Result};
use stevedore_interfaces::{Handler, HandlerFactory, HandlerSpec};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};

const ARGUMENT_FORMAT_INPUT: &str = "argumentFormat";
const WORKING_DIRECTORY_INPUT: &str = "workingDirectory";

/// Builds [`ProcessHandler`]s, choosing the interpreter from the handler kind
#[derive(Debug, Clone)]
pub struct ProcessHandlerFactory {
    node: PathBuf,
    powershell: PathBuf,
}

impl Default for ProcessHandlerFactory {
    fn default() -> Self {
        Self::new("node", "pwsh")
    }
}

impl ProcessHandlerFactory {
    pub fn new(node: impl Into<PathBuf>, powershell: impl Into<PathBuf>) -> Self {
        Self {
            node: node.into(),
            powershell: powershell.into(),
        }
    }

    /// Build the concrete handler for `spec`
    pub fn build(&self, context: &ExecutionContext, spec: HandlerSpec) -> Result<ProcessHandler> {
        let handler = &spec.handler_data;
        let target = handler
            .target()
            .filter(|target| !target.trim().is_empty())
            .ok_or_else(|| AgentError::Handler(format!("{} handler has no target", handler.kind)))?;
        let target = resolve_target(&spec.task_directory, target.trim());

        let arguments: Vec<String> = handler
            .inputs
            .get(ARGUMENT_FORMAT_INPUT)
            .map(|format| format.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default();

        let (program, args) = match handler.kind {
            HandlerKind::Node => {
                let mut args = vec![target.to_string_lossy().into_owned()];
                args.extend(arguments);
                (self.node.clone(), args)
            }
            HandlerKind::PowerShell3
            | HandlerKind::PowerShellExe
            | HandlerKind::AzurePowerShell
            | HandlerKind::PowerShell => {
                let mut args: Vec<String> = ["-NoLogo", "-NoProfile", "-NonInteractive", "-File"]
                    .into_iter()
                    .map(str::to_string)
                    .collect();
                args.push(target.to_string_lossy().into_owned());
                args.extend(arguments);
                (self.powershell.clone(), args)
            }
            HandlerKind::Process => (target, arguments),
        };

        let mut environment: Vec<(String, String)> = context
            .variables()
            .public()
            .into_iter()
            .map(|(name, value)| (environment_name(&name), value))
            .collect();
        environment.extend(
            spec.inputs
                .iter()
                .map(|(name, value)| (format!("INPUT_{}", environment_name(name)), value.to_string())),
        );

        let working_directory = handler
            .inputs
            .get(WORKING_DIRECTORY_INPUT)
            .filter(|dir| !dir.trim().is_empty())
            .map(PathBuf::from)
            .or_else(|| {
                (!spec.file_path_input_root.is_empty())
                    .then(|| PathBuf::from(&spec.file_path_input_root))
            })
            .unwrap_or_else(|| spec.task_directory.clone());

        Ok(ProcessHandler {
            program,
            args,
            environment,
            working_directory,
        })
    }
}

impl HandlerFactory for ProcessHandlerFactory {
    fn create(&self, context: &ExecutionContext, spec: HandlerSpec) -> Result<Box<dyn Handler>> {
        Ok(Box::new(self.build(context, spec)?))
    }
}

/// Relative targets shipped inside the task package run from there
fn resolve_target(task_directory: &Path, target: &str) -> PathBuf {
    let candidate = Path::new(target);
    if candidate.is_relative() {
        let packaged = task_directory.join(candidate);
        if packaged.is_file() {
            return packaged;
        }
    }
    candidate.to_path_buf()
}

fn environment_name(name: &str) -> String {
    name.trim()
        .chars()
        .map(|c| match c {
            '.' | ' ' => '_',
            c => c.to_ascii_uppercase(),
        })
        .collect()
}

/// Runs a child process, streaming its output lines into the job
#[derive(Debug)]
pub struct ProcessHandler {
    program: PathBuf,
    args: Vec<String>,
    environment: Vec<(String, String)>,
    working_directory: PathBuf,
}

impl ProcessHandler {
    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn working_directory(&self) -> &Path {
        &self.working_directory
    }

    pub fn environment_variable(&self, name: &str) -> Option<&str> {
        self.environment
            .iter()
            .rev()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

#[async_trait]
impl Handler for ProcessHandler {
    async fn run(&self, context: &ExecutionContext) -> Result<()> {
        info!(
            "Starting process {} in {}",
            self.program.display(),
            self.working_directory.display()
        );
        context.output(format!("##[command]{} {}", self.program.display(), self.args.join(" ")));

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .envs(self.environment.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .current_dir(&self.working_directory)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                AgentError::Handler(format!("Failed to start {}: {}", self.program.display(), e))
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| AgentError::Handler("Failed to capture stdout".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| AgentError::Handler("Failed to capture stderr".to_string()))?;

        let cancel = context.cancellation_token().clone();
        let outcome = {
            let finished = async {
                let (_, _, status) = tokio::join!(
                    pump_lines(context, stdout),
                    pump_lines(context, stderr),
                    child.wait()
                );
                status
            };
            tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                status = finished => Some(status),
            }
        };

        match outcome {
            None => {
                warn!("Cancelling process {}", self.program.display());
                if let Err(e) = child.kill().await {
                    debug!("Failed to kill process {}: {}", self.program.display(), e);
                }
                Err(AgentError::Cancelled)
            }
            Some(Ok(status)) if status.success() => Ok(()),
            Some(Ok(status)) => {
                let code = status
                    .code()
                    .map(|code| code.to_string())
                    .unwrap_or_else(|| "none".to_string());
                Err(AgentError::Handler(format!(
                    "Process '{}' exited with code {}",
                    self.program.display(),
                    code
                )))
            }
            Some(Err(e)) => Err(AgentError::Handler(format!(
                "Failed waiting for {}: {}",
                self.program.display(),
                e
            ))),
        }
    }
}

async fn pump_lines<R>(context: &ExecutionContext, reader: R)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => context.output(line),
            Ok(None) => break,
            Err(e) => {
                debug!("Stopped reading process output: {}", e);
                break;
            }
        }
    }
}
