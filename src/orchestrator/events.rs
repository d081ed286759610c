//! Job lifecycle notifications published by the orchestrator.

use serde::{Deserialize, Serialize};

/// Job lifecycle notification, published in the order things actually happen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum JobEvent {
    Queued { job_id: String },
    Started { job_id: String },
    Completed { job_id: String, renditions: usize },
    Failed { job_id: String, error: String },
}

impl JobEvent {
    pub fn job_id(&self) -> &str {
        match self {
            JobEvent::Queued { job_id }
            | JobEvent::Started { job_id }
            | JobEvent::Completed { job_id, .. }
            | JobEvent::Failed { job_id, .. } => job_id,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobEvent::Completed { .. } | JobEvent::Failed { .. })
    }
}
