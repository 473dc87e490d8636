//! Agent identity and folders

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::ConfigResult;
use crate::validation::{validate_required_string, Validatable};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    /// Name reported in logs
    pub name: String,

    /// Version stamped on failure issues
    pub version: String,

    /// Root for release directories and the mapping file
    pub work_directory: PathBuf,

    /// Folder holding `<name>/<version>/task.json` definitions
    pub tasks_directory: PathBuf,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            name: "stevedore".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            work_directory: PathBuf::from("_work"),
            tasks_directory: PathBuf::from("_work").join("_tasks"),
        }
    }
}

impl Validatable for AgentSettings {
    fn validate(&self) -> ConfigResult<()> {
        validate_required_string(&self.name, "name", self.domain_name())?;
        validate_required_string(&self.version, "version", self.domain_name())?;
        validate_required_string(
            &self.work_directory.to_string_lossy(),
            "work_directory",
            self.domain_name(),
        )?;
        validate_required_string(
            &self.tasks_directory.to_string_lossy(),
            "tasks_directory",
            self.domain_name(),
        )?;
        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "agent"
    }
}
