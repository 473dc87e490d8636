//! Diagnostic sink backed by `tracing`

use stevedore_core::{DiagnosticSink, Issue, IssueType};
use tracing::{error, info, warn};
use uuid::Uuid;

/// Forwards job output and issues to the global subscriber, tagged with the job id
#[derive(Debug, Clone)]
pub struct TracingSink {
    job_id: Uuid,
}

impl TracingSink {
    pub fn new(job_id: Uuid) -> Self {
        Self { job_id }
    }

    pub fn job_id(&self) -> Uuid {
        self.job_id
    }
}

impl DiagnosticSink for TracingSink {
    fn output(&self, message: &str) {
        info!(target: "stevedore::job", job_id = %self.job_id, "{}", message);
    }

    fn add_issue(&self, issue: Issue) {
        let data = format!("{:?}", issue.data);
        match issue.issue_type {
            IssueType::Error => {
                error!(target: "stevedore::job", job_id = %self.job_id, data = %data, "{}", issue.message)
            }
            IssueType::Warning => {
                warn!(target: "stevedore::job", job_id = %self.job_id, data = %data, "{}", issue.message)
            }
        }
    }
}
