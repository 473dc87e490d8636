//! Task domain model: instances, definitions and handler variants

use serde::de::{IgnoredAny, MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use uuid::Uuid;

use crate::inputs::InputMap;

/// Input type whose values are translated to local paths
pub const FILE_PATH_INPUT_TYPE: &str = "filePath";

/// Pipeline stage a step runs in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum JobRunStage {
    PreJob,
    Main,
    PostJob,
}

impl JobRunStage {
    pub const ALL: [JobRunStage; 3] = [JobRunStage::PreJob, JobRunStage::Main, JobRunStage::PostJob];
}

impl fmt::Display for JobRunStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobRunStage::PreJob => write!(f, "pre-job"),
            JobRunStage::Main => write!(f, "main"),
            JobRunStage::PostJob => write!(f, "post-job"),
        }
    }
}

fn default_enabled() -> bool {
    true
}

/// One occurrence of a task within a job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskInstance {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,

    /// Task package name used to locate the definition
    pub name: String,

    #[serde(default)]
    pub display_name: String,

    pub version: String,

    #[serde(default = "default_enabled")]
    pub enabled: bool,

    #[serde(default)]
    pub continue_on_error: bool,

    /// Zero means no timeout
    #[serde(default)]
    pub timeout_in_minutes: u32,

    #[serde(default)]
    pub inputs: InputMap,
}

impl TaskInstance {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: Uuid::new_v4(),
            display_name: name.clone(),
            name,
            version: version.into(),
            enabled: true,
            continue_on_error: false,
            timeout_in_minutes: 0,
            inputs: InputMap::new(),
        }
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = display_name.into();
        self
    }

    pub fn with_input(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.inputs.insert(name, value);
        self
    }

    pub fn with_timeout_minutes(mut self, minutes: u32) -> Self {
        self.timeout_in_minutes = minutes;
        self
    }

    pub fn with_continue_on_error(mut self, continue_on_error: bool) -> Self {
        self.continue_on_error = continue_on_error;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_in_minutes > 0)
            .then(|| Duration::from_secs(u64::from(self.timeout_in_minutes) * 60))
    }

    /// Name shown in job output
    pub fn label(&self) -> &str {
        if self.display_name.is_empty() {
            &self.name
        } else {
            &self.display_name
        }
    }
}

/// Declared task input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskInputDefinition {
    pub name: String,

    #[serde(default)]
    pub default_value: Option<String>,

    #[serde(default, rename = "type")]
    pub input_type: String,
}

impl TaskInputDefinition {
    pub fn is_file_path(&self) -> bool {
        self.input_type.eq_ignore_ascii_case(FILE_PATH_INPUT_TYPE)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputVariable {
    pub name: String,

    #[serde(default)]
    pub description: String,
}

/// Static metadata loaded from a task package's `task.json`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Definition {
    /// Directory the definition was loaded from
    #[serde(skip)]
    pub directory: PathBuf,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub friendly_name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub author: String,

    #[serde(default)]
    pub help_mark_down: String,

    #[serde(default)]
    pub inputs: Vec<TaskInputDefinition>,

    #[serde(default)]
    pub output_variables: Vec<OutputVariable>,

    #[serde(default, rename = "prejobexecution")]
    pub pre_job_execution: Option<ExecutionData>,

    #[serde(default)]
    pub execution: Option<ExecutionData>,

    #[serde(default, rename = "postjobexecution")]
    pub post_job_execution: Option<ExecutionData>,
}

impl Definition {
    pub fn execution_for(&self, stage: JobRunStage) -> Option<&ExecutionData> {
        match stage {
            JobRunStage::PreJob => self.pre_job_execution.as_ref(),
            JobRunStage::Main => self.execution.as_ref(),
            JobRunStage::PostJob => self.post_job_execution.as_ref(),
        }
    }
}

/// Runtime family a handler variant targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HandlerKind {
    Node,
    PowerShell3,
    PowerShellExe,
    Process,
    AzurePowerShell,
    PowerShell,
}

impl HandlerKind {
    /// Tie-break priority; lower wins
    pub fn priority(&self) -> u32 {
        match self {
            HandlerKind::Node => 1,
            HandlerKind::PowerShell3 => 2,
            HandlerKind::PowerShellExe => 3,
            HandlerKind::Process => 4,
            HandlerKind::AzurePowerShell => 5,
            HandlerKind::PowerShell => 6,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            HandlerKind::Node => "Node",
            HandlerKind::PowerShell3 => "PowerShell3",
            HandlerKind::PowerShellExe => "PowerShellExe",
            HandlerKind::Process => "Process",
            HandlerKind::AzurePowerShell => "AzurePowerShell",
            HandlerKind::PowerShell => "PowerShell",
        }
    }

    /// Parse a `task.json` execution key, ignoring case
    pub fn parse(value: &str) -> Option<Self> {
        [
            HandlerKind::Node,
            HandlerKind::PowerShell3,
            HandlerKind::PowerShellExe,
            HandlerKind::Process,
            HandlerKind::AzurePowerShell,
            HandlerKind::PowerShell,
        ]
        .into_iter()
        .find(|kind| kind.name().eq_ignore_ascii_case(value))
    }
}

impl fmt::Display for HandlerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Name of the operating system this agent runs on, as used in platform lists
pub fn current_platform() -> &'static str {
    std::env::consts::OS
}

/// One handler variant offered for a stage
#[derive(Debug, Clone, PartialEq)]
pub struct HandlerData {
    pub kind: HandlerKind,

    /// Platforms the variant is pinned to; `None` means any platform
    pub platforms: Option<Vec<String>>,

    /// Handler-specific inputs such as `target` or `workingDirectory`
    pub inputs: InputMap,
}

impl HandlerData {
    pub fn new(kind: HandlerKind) -> Self {
        Self {
            kind,
            platforms: None,
            inputs: InputMap::new(),
        }
    }

    pub fn with_platforms<I, S>(mut self, platforms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.platforms = Some(platforms.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_input(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.inputs.insert(name, value);
        self
    }

    pub fn priority(&self) -> u32 {
        self.kind.priority()
    }

    pub fn target(&self) -> Option<&str> {
        self.inputs.get("target")
    }

    pub fn is_pinned_to(&self, platform: &str) -> bool {
        self.platforms
            .as_ref()
            .is_some_and(|platforms| platforms.iter().any(|p| p.eq_ignore_ascii_case(platform)))
    }

    pub fn preferred_on_platform(&self, platform: &str) -> bool {
        self.platforms.is_none() || self.is_pinned_to(platform)
    }

    pub fn preferred_on_current_platform(&self) -> bool {
        self.preferred_on_platform(current_platform())
    }
}

/// Handler variants a task offers for one stage, in declaration order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionData {
    pub handlers: Vec<HandlerData>,
}

impl ExecutionData {
    pub fn new(handlers: Vec<HandlerData>) -> Self {
        Self { handlers }
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

/// Raw handler body as written in `task.json`
#[derive(Deserialize)]
struct HandlerBody(serde_json::Map<String, serde_json::Value>);

impl HandlerBody {
    fn into_handler(self, kind: HandlerKind) -> HandlerData {
        let mut handler = HandlerData::new(kind);
        for (key, value) in self.0 {
            if key.eq_ignore_ascii_case("platforms") {
                if let serde_json::Value::Array(items) = value {
                    handler.platforms = Some(
                        items
                            .into_iter()
                            .filter_map(|item| item.as_str().map(str::to_string))
                            .collect(),
                    );
                }
                continue;
            }
            let value = match value {
                serde_json::Value::String(text) => text,
                serde_json::Value::Null => String::new(),
                other => other.to_string(),
            };
            handler.inputs.insert(key, value);
        }
        handler
    }
}

impl<'de> Deserialize<'de> for ExecutionData {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ExecutionVisitor;

        impl<'de> Visitor<'de> for ExecutionVisitor {
            type Value = ExecutionData;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a map of handler kinds to handler settings")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<ExecutionData, A::Error> {
                let mut handlers = Vec::new();
                while let Some(key) = access.next_key::<String>()? {
                    match HandlerKind::parse(&key) {
                        Some(kind) => {
                            let body: HandlerBody = access.next_value()?;
                            handlers.push(body.into_handler(kind));
                        }
                        None => {
                            tracing::debug!("Skipping unknown handler kind {}", key);
                            access.next_value::<IgnoredAny>()?;
                        }
                    }
                }
                Ok(ExecutionData { handlers })
            }
        }

        deserializer.deserialize_map(ExecutionVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TASK_JSON: &str = r#"{
        "name": "CopyFiles",
        "friendlyName": "Copy files",
        "description": "Copy files from a source folder",
        "author": "Stevedore",
        "helpMarkDown": "See docs",
        "inputs": [
            { "name": "SourceFolder", "type": "filePath", "defaultValue": "" },
            { "name": "Contents", "type": "multiLine", "defaultValue": "**" }
        ],
        "outputVariables": [{ "name": "copiedCount" }],
        "execution": {
            "PowerShell": { "target": "copy.ps1", "platforms": ["windows"] },
            "Mystery": { "target": "x" },
            "Node": { "target": "copy.js", "argumentFormat": "", "retries": 2 }
        }
    }"#;

    #[test]
    fn test_definition_deserialization() {
        let definition: Definition = serde_json::from_str(TASK_JSON).unwrap();
        assert_eq!(definition.friendly_name, "Copy files");
        assert!(definition.inputs[0].is_file_path());
        assert!(!definition.inputs[1].is_file_path());
        assert_eq!(definition.output_variables[0].name, "copiedCount");
        assert!(definition.execution_for(JobRunStage::PreJob).is_none());

        let execution = definition.execution_for(JobRunStage::Main).unwrap();
        let kinds: Vec<_> = execution.handlers.iter().map(|h| h.kind).collect();
        assert_eq!(kinds, vec![HandlerKind::PowerShell, HandlerKind::Node]);

        let powershell = &execution.handlers[0];
        assert_eq!(powershell.platforms, Some(vec!["windows".to_string()]));
        assert_eq!(powershell.target(), Some("copy.ps1"));

        let node = &execution.handlers[1];
        assert!(node.platforms.is_none());
        assert_eq!(node.inputs.get("retries"), Some("2"));
    }

    #[test]
    fn test_platform_preference() {
        let unpinned = HandlerData::new(HandlerKind::Node);
        assert!(unpinned.preferred_on_platform("linux"));
        assert!(unpinned.preferred_on_current_platform());

        let windows = HandlerData::new(HandlerKind::PowerShell).with_platforms(["Windows"]);
        assert!(windows.preferred_on_platform("windows"));
        assert!(!windows.preferred_on_platform("linux"));
        assert!(windows.is_pinned_to("WINDOWS"));
    }

    #[test]
    fn test_handler_kind_parse_and_priority() {
        assert_eq!(HandlerKind::parse("powershell3"), Some(HandlerKind::PowerShell3));
        assert_eq!(HandlerKind::parse("Unknown"), None);
        assert!(HandlerKind::PowerShell3.priority() < HandlerKind::PowerShell.priority());
        assert!(HandlerKind::Node.priority() < HandlerKind::Process.priority());
    }

    #[test]
    fn test_task_instance_defaults() {
        let instance: TaskInstance =
            serde_json::from_str(r#"{"name": "CopyFiles", "version": "2.0.0"}"#).unwrap();
        assert!(instance.enabled);
        assert!(instance.timeout().is_none());
        assert_eq!(instance.label(), "CopyFiles");

        let timed = TaskInstance::new("CopyFiles", "2.0.0").with_timeout_minutes(2);
        assert_eq!(timed.timeout(), Some(Duration::from_secs(120)));
    }
}
