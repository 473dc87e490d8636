//! Interpreters used by the process handlers

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::ConfigResult;
use crate::validation::{validate_required_string, Validatable};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HandlersConfig {
    /// Runtime for node handlers
    pub node: PathBuf,

    /// Shell for the PowerShell handler kinds
    pub powershell: PathBuf,
}

impl Default for HandlersConfig {
    fn default() -> Self {
        Self {
            node: PathBuf::from("node"),
            powershell: PathBuf::from("pwsh"),
        }
    }
}

impl Validatable for HandlersConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_required_string(&self.node.to_string_lossy(), "node", self.domain_name())?;
        validate_required_string(
            &self.powershell.to_string_lossy(),
            "powershell",
            self.domain_name(),
        )?;
        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "handlers"
    }
}
