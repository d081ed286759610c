use goggles_av::{MasteringSettings, RenderSettings, ToolsConfig};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration. Every field has a default, so an empty file is valid.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorkflowConfig {
    /// Upper bound on jobs processed at the same time.
    #[serde(default = "default_max_concurrent_jobs")]
    pub max_concurrent_jobs: usize,

    /// Root of the `mastered_audio/` and `videos/` trees.
    #[serde(default = "default_output_base_dir")]
    pub output_base_dir: PathBuf,

    /// Reuse an existing mastered file instead of mastering again.
    #[serde(default = "default_true")]
    pub resume_on_failure: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_file: Option<PathBuf>,

    #[serde(default)]
    pub audio_mastering: MasteringSettings,

    #[serde(default)]
    pub video_generation: RenderSettings,

    #[serde(default)]
    pub tools: ToolsConfig,
}

fn default_max_concurrent_jobs() -> usize {
    4
}

fn default_output_base_dir() -> PathBuf {
    PathBuf::from("./output")
}

fn default_true() -> bool {
    true
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: default_max_concurrent_jobs(),
            output_base_dir: default_output_base_dir(),
            resume_on_failure: default_true(),
            log_file: None,
            audio_mastering: MasteringSettings::default(),
            video_generation: RenderSettings::default(),
            tools: ToolsConfig::default(),
        }
    }
}

impl WorkflowConfig {
    /// Directory holding one mastered file per job.
    pub fn mastered_audio_dir(&self) -> PathBuf {
        self.output_base_dir.join("mastered_audio")
    }

    /// Directory holding one sub-tree of renditions per job.
    pub fn videos_dir(&self) -> PathBuf {
        self.output_base_dir.join("videos")
    }
}
