//! JSON snapshot of a run: configuration, every job, and a status summary.

use std::path::{Path, PathBuf};

use goggles_av::{MasteringSettings, RenderSettings};
use serde::{Deserialize, Serialize};

use super::job::{Job, StatusCounts};
use crate::config::WorkflowConfig;
use crate::error::{Error, Result};

/// The parts of [`WorkflowConfig`] that shape outputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigEcho {
    pub max_concurrent_jobs: usize,
    pub output_base_dir: PathBuf,
    pub resume_on_failure: bool,
    pub audio_mastering: MasteringSettings,
    pub video_generation: RenderSettings,
}

impl From<&WorkflowConfig> for ConfigEcho {
    fn from(config: &WorkflowConfig) -> Self {
        Self {
            max_concurrent_jobs: config.max_concurrent_jobs,
            output_base_dir: config.output_base_dir.clone(),
            resume_on_failure: config.resume_on_failure,
            audio_mastering: config.audio_mastering.clone(),
            video_generation: config.video_generation.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub total_jobs: usize,
    pub completed: usize,
    pub failed: usize,
    pub pending: usize,
}

impl From<StatusCounts> for ReportSummary {
    fn from(counts: StatusCounts) -> Self {
        Self {
            total_jobs: counts.total(),
            completed: counts.completed,
            failed: counts.failed,
            pending: counts.pending,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub workflow_config: ConfigEcho,
    pub jobs: Vec<Job>,
    pub summary: ReportSummary,
}

impl Report {
    pub fn new(config: &WorkflowConfig, jobs: Vec<Job>) -> Self {
        let summary = StatusCounts::from_jobs(&jobs).into();
        Self {
            workflow_config: config.into(),
            jobs,
            summary,
        }
    }

    /// Write pretty-printed JSON to `path`, creating parent directories.
    pub fn write(&self, path: &Path) -> Result<()> {
        let report_err = |source| Error::Report {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(report_err)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(report_err)?;

        tracing::info!("Job report exported to {:?}", path);
        Ok(())
    }

    /// Read a report previously written with [`Report::write`].
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}
