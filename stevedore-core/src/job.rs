//! Job message delivered to the agent

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::artifact::AgentArtifactDefinition;
use crate::context::HostType;
use crate::task::{JobRunStage, TaskInstance};
use crate::variables::Variables;

/// A task bound to the stage it runs in
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStep {
    #[serde(default = "default_stage")]
    pub stage: JobRunStage,

    #[serde(flatten)]
    pub task: TaskInstance,
}

fn default_stage() -> JobRunStage {
    JobRunStage::Main
}

impl JobStep {
    pub fn main(task: TaskInstance) -> Self {
        Self {
            stage: JobRunStage::Main,
            task,
        }
    }

    pub fn at(stage: JobRunStage, task: TaskInstance) -> Self {
        Self { stage, task }
    }
}

/// Everything needed to run one job
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobMessage {
    #[serde(default = "Uuid::new_v4")]
    pub job_id: Uuid,

    pub host_type: HostType,

    #[serde(default)]
    pub variables: BTreeMap<String, String>,

    #[serde(default)]
    pub secret_variables: BTreeMap<String, String>,

    #[serde(default)]
    pub steps: Vec<JobStep>,

    /// Artifacts the backend reports for this job's release
    #[serde(default)]
    pub release_artifacts: Vec<AgentArtifactDefinition>,
}

impl JobMessage {
    pub fn new(host_type: HostType) -> Self {
        Self {
            job_id: Uuid::new_v4(),
            host_type,
            variables: BTreeMap::new(),
            secret_variables: BTreeMap::new(),
            steps: Vec::new(),
            release_artifacts: Vec::new(),
        }
    }

    /// Build the job's variable store
    pub fn to_variables(&self) -> Variables {
        let mut variables: Variables = self.variables.iter().collect();
        for (name, value) in &self.secret_variables {
            variables.set_secret(name.as_str(), value.as_str());
        }
        variables
    }
}
