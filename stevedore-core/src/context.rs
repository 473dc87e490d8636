//! Job-scoped execution context

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::diagnostics::{DiagnosticSink, Issue};
use crate::variables::Variables;

/// Kind of pipeline hosting the job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HostType {
    Build,
    Release,
}

impl std::fmt::Display for HostType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HostType::Build => write!(f, "build"),
            HostType::Release => write!(f, "release"),
        }
    }
}

/// State shared by every step of a single job.
///
/// Variables and the output-variable allow list are guarded so extensions
/// and handlers can update them through a shared reference.
pub struct ExecutionContext {
    job_id: Uuid,
    host_type: HostType,
    variables: RwLock<Variables>,
    output_variables: RwLock<Vec<String>>,
    environment: BTreeMap<String, String>,
    sink: Arc<dyn DiagnosticSink>,
    cancellation: CancellationToken,
}

impl ExecutionContext {
    /// Create a context that snapshots the process environment
    pub fn new(host_type: HostType, variables: Variables, sink: Arc<dyn DiagnosticSink>) -> Self {
        Self {
            job_id: Uuid::new_v4(),
            host_type,
            variables: RwLock::new(variables),
            output_variables: RwLock::new(Vec::new()),
            environment: std::env::vars().collect(),
            sink,
            cancellation: CancellationToken::new(),
        }
    }

    pub fn with_job_id(mut self, job_id: Uuid) -> Self {
        self.job_id = job_id;
        self
    }

    /// Replace the environment snapshot used for `$(NAME)` expansion
    pub fn with_environment(mut self, environment: BTreeMap<String, String>) -> Self {
        self.environment = environment;
        self
    }

    pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.cancellation = cancellation;
        self
    }

    pub fn job_id(&self) -> Uuid {
        self.job_id
    }

    pub fn host_type(&self) -> HostType {
        self.host_type
    }

    pub fn variables(&self) -> RwLockReadGuard<'_, Variables> {
        self.variables.read()
    }

    pub fn variables_mut(&self) -> RwLockWriteGuard<'_, Variables> {
        self.variables.write()
    }

    pub fn variable(&self, name: &str) -> Option<String> {
        self.variables.read().get(name).map(str::to_string)
    }

    pub fn set_variable(&self, name: impl Into<String>, value: impl Into<String>) {
        self.variables.write().set(name, value);
    }

    pub fn environment(&self) -> &BTreeMap<String, String> {
        &self.environment
    }

    /// Look up an environment variable, ignoring case on Windows
    pub fn environment_variable(&self, name: &str) -> Option<&str> {
        if cfg!(windows) {
            self.environment
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(name))
                .map(|(_, value)| value.as_str())
        } else {
            self.environment.get(name).map(String::as_str)
        }
    }

    /// Allow handlers to publish an output variable under `name`
    pub fn register_output_variable(&self, name: impl Into<String>) {
        let name = name.into();
        let mut outputs = self.output_variables.write();
        if !outputs.iter().any(|existing| existing.eq_ignore_ascii_case(&name)) {
            outputs.push(name);
        }
    }

    pub fn is_output_variable(&self, name: &str) -> bool {
        self.output_variables
            .read()
            .iter()
            .any(|existing| existing.eq_ignore_ascii_case(name))
    }

    pub fn output_variables(&self) -> Vec<String> {
        self.output_variables.read().clone()
    }

    /// Publish an output variable; names that were never registered are rejected
    pub fn set_output_variable(&self, name: &str, value: impl Into<String>) -> bool {
        if !self.is_output_variable(name) {
            tracing::warn!(job_id = %self.job_id, "Ignoring unregistered output variable {}", name);
            return false;
        }
        self.set_variable(name, value);
        true
    }

    pub fn output(&self, message: impl AsRef<str>) {
        self.sink.output(message.as_ref());
    }

    pub fn add_issue(&self, issue: Issue) {
        self.sink.add_issue(issue);
    }

    pub fn sink(&self) -> Arc<dyn DiagnosticSink> {
        self.sink.clone()
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}

impl std::fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("job_id", &self.job_id)
            .field("host_type", &self.host_type)
            .field("variables", &self.variables.read().len())
            .field("cancelled", &self.cancellation.is_cancelled())
            .finish()
    }
}
