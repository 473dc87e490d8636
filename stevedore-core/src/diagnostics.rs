//! Job-visible output and structured issues

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueType {
    Error,
    Warning,
}

/// Structured issue attached to a job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub issue_type: IssueType,
    pub message: String,
    pub data: BTreeMap<String, String>,
}

impl Issue {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            issue_type: IssueType::Error,
            message: message.into(),
            data: BTreeMap::new(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            issue_type: IssueType::Warning,
            message: message.into(),
            data: BTreeMap::new(),
        }
    }

    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }
}

/// Destination for job output lines and issues
pub trait DiagnosticSink: Send + Sync {
    fn output(&self, message: &str);

    fn add_issue(&self, issue: Issue);
}

/// Sink that keeps everything in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    lines: Mutex<Vec<String>>,
    issues: Mutex<Vec<Issue>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }

    pub fn issues(&self) -> Vec<Issue> {
        self.issues.lock().clone()
    }

    /// Whether any output line contains `needle`
    pub fn contains(&self, needle: &str) -> bool {
        self.lines.lock().iter().any(|line| line.contains(needle))
    }

    pub fn count_containing(&self, needle: &str) -> usize {
        self.lines
            .lock()
            .iter()
            .filter(|line| line.contains(needle))
            .count()
    }
}

impl DiagnosticSink for MemorySink {
    fn output(&self, message: &str) {
        self.lines.lock().push(message.to_string());
    }

    fn add_issue(&self, issue: Issue) {
        self.issues.lock().push(issue);
    }
}
