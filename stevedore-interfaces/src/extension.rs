//! Job extension interface

use async_trait::async_trait;
use std::path::PathBuf;
use stevedore_core::{ExecutionContext, HostType, Result};

/// Host-type specific behavior attached to a job
///
/// Extensions are looked up through the extension registry and only take
/// part in jobs whose host type matches [`host_type`](JobExtension::host_type).
#[async_trait]
pub trait JobExtension: Send + Sync {
    fn host_type(&self) -> HostType;

    /// Root directory for relative file path inputs, if this extension has one
    fn path_root(&self, context: &ExecutionContext) -> Option<PathBuf>;

    /// Prepare job-level state before any step runs
    async fn initialize(&self, context: &ExecutionContext) -> Result<()>;

    /// Work that must finish before the first task runs
    async fn pre_job(&self, context: &ExecutionContext) -> Result<()>;
}
