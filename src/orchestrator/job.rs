//! Job record and its status state machine.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use goggles_av::AspectRatio;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Rendition key -> rendered file, or `None` when that rendition failed.
pub type Outputs = BTreeMap<String, Option<PathBuf>>;

/// Key identifying one rendition of a job, e.g. `youtube_16:9`.
pub fn rendition_key(platform_id: &str, ratio: AspectRatio) -> String {
    format!("{platform_id}_{ratio}")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    /// Whether the state machine allows moving from `self` to `next`.
    ///
    /// `Pending -> Processing -> {Completed | Failed}`, plus `Failed -> Pending`
    /// for retries.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, next),
            (Pending, Processing) | (Processing, Completed) | (Processing, Failed) | (Failed, Pending)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Processing => write!(f, "processing"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// One audio file, one image and the platforms to render it for.
///
/// `error_message` is set exactly when the status is `Failed`; every status
/// change goes through [`Job::transition`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    #[serde(rename = "job_id")]
    id: String,
    #[serde(rename = "audio_file")]
    audio_source: PathBuf,
    #[serde(rename = "image_file")]
    image_source: PathBuf,
    platforms: Vec<String>,
    status: JobStatus,
    #[serde(rename = "output_files")]
    outputs: Outputs,
    error_message: Option<String>,
    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
}

impl Job {
    /// Platforms must already be normalized against the catalog.
    pub(crate) fn new(
        id: String,
        audio_source: PathBuf,
        image_source: PathBuf,
        platforms: Vec<String>,
    ) -> Self {
        Self {
            id,
            audio_source,
            image_source,
            platforms,
            status: JobStatus::Pending,
            outputs: Outputs::new(),
            error_message: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn audio_source(&self) -> &Path {
        &self.audio_source
    }

    pub fn image_source(&self) -> &Path {
        &self.image_source
    }

    pub fn platforms(&self) -> &[String] {
        &self.platforms
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn outputs(&self) -> &Outputs {
        &self.outputs
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    /// Move to `next`, rejecting transitions the state machine does not allow.
    pub fn transition(&mut self, next: JobStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(Error::InvalidTransition {
                job_id: self.id.clone(),
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    /// Claim the job for processing.
    pub fn start(&mut self) -> Result<()> {
        self.transition(JobStatus::Processing)?;
        self.started_at = Some(Utc::now());
        Ok(())
    }

    pub fn complete(&mut self, outputs: Outputs) -> Result<()> {
        self.transition(JobStatus::Completed)?;
        self.outputs = outputs;
        self.error_message = None;
        self.completed_at = Some(Utc::now());
        Ok(())
    }

    /// Record a failure. `outputs` holds whatever renditions were attempted.
    pub fn fail(&mut self, message: impl Into<String>, outputs: Outputs) -> Result<()> {
        self.transition(JobStatus::Failed)?;
        self.outputs = outputs;
        self.error_message = Some(message.into());
        self.completed_at = Some(Utc::now());
        Ok(())
    }

    /// Return a failed job to the queue with its previous results cleared.
    pub fn reset(&mut self) -> Result<()> {
        self.transition(JobStatus::Pending)?;
        self.outputs.clear();
        self.error_message = None;
        self.started_at = None;
        self.completed_at = None;
        Ok(())
    }
}

/// Number of jobs in each status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub pending: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
}

impl StatusCounts {
    pub fn from_jobs<'a>(jobs: impl IntoIterator<Item = &'a Job>) -> Self {
        let mut counts = Self::default();
        for job in jobs {
            match job.status() {
                JobStatus::Pending => counts.pending += 1,
                JobStatus::Processing => counts.processing += 1,
                JobStatus::Completed => counts.completed += 1,
                JobStatus::Failed => counts.failed += 1,
            }
        }
        counts
    }

    pub fn total(&self) -> usize {
        self.pending + self.processing + self.completed + self.failed
    }

    pub fn get(&self, status: JobStatus) -> usize {
        match status {
            JobStatus::Pending => self.pending,
            JobStatus::Processing => self.processing,
            JobStatus::Completed => self.completed,
            JobStatus::Failed => self.failed,
        }
    }
}
