//! Worker loop and the per-job mastering -> rendering pipeline.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use goggles_av::AspectRatio;
use parking_lot::Mutex;

use super::events::JobEvent;
use super::job::{rendition_key, Job, Outputs};
use super::Shared;
use crate::platforms::{self, PlatformConfig};
use crate::stages::RenderRequest;
use crate::Result;

pub const MASTERING_FAILED: &str = "Audio mastering failed";

/// Inputs a worker needs, copied out of the job so no lock is held while
/// stages run.
#[derive(Debug, Clone)]
pub(super) struct JobSpec {
    id: String,
    audio_source: PathBuf,
    image_source: PathBuf,
    platforms: Vec<String>,
}

impl From<&Job> for JobSpec {
    fn from(job: &Job) -> Self {
        Self {
            id: job.id().to_string(),
            audio_source: job.audio_source().to_path_buf(),
            image_source: job.image_source().to_path_buf(),
            platforms: job.platforms().to_vec(),
        }
    }
}

#[derive(Debug)]
pub(super) enum JobOutcome {
    Completed(Outputs),
    Failed { message: String, outputs: Outputs },
}

impl JobOutcome {
    fn failed(message: impl Into<String>) -> Self {
        JobOutcome::Failed {
            message: message.into(),
            outputs: Outputs::new(),
        }
    }
}

pub(super) type DispatchQueue = Arc<Mutex<VecDeque<String>>>;

impl Shared {
    /// Pull job ids until the queue is empty. Each id is popped by exactly one
    /// worker, so a job is never processed twice in the same run.
    pub(super) async fn run_worker(self: Arc<Self>, queue: DispatchQueue, worker: usize) {
        tracing::debug!("Worker {} started", worker);

        loop {
            let Some(job_id) = queue.lock().pop_front() else {
                break;
            };
            let Some(spec) = self.claim(&job_id) else {
                continue;
            };

            // A panicking stage only takes down this task.
            let ctx = Arc::clone(&self);
            let outcome = match tokio::spawn(async move { ctx.run_pipeline(&spec).await }).await {
                Ok(outcome) => outcome,
                Err(e) => JobOutcome::failed(format!("Unexpected error: {}", describe_join_error(e))),
            };

            self.finish(&job_id, outcome);
        }

        tracing::debug!("Worker {} finished", worker);
    }

    fn claim(&self, job_id: &str) -> Option<JobSpec> {
        let spec = {
            let mut jobs = self.jobs.write();
            let Some(job) = jobs.iter_mut().find(|j| j.id() == job_id) else {
                tracing::debug!("Job {} was removed before it started", job_id);
                return None;
            };
            if let Err(e) = job.start() {
                tracing::warn!("Skipping job {}: {}", job_id, e);
                return None;
            }
            JobSpec::from(&*job)
        };

        tracing::info!("Processing job {}", job_id);
        self.emit(JobEvent::Started {
            job_id: job_id.to_string(),
        });
        Some(spec)
    }

    async fn run_pipeline(&self, spec: &JobSpec) -> JobOutcome {
        let mastered = self.mastered_audio_path(&spec.id);

        if self.config.resume_on_failure && mastered.exists() {
            tracing::info!("Job {}: reusing mastered audio {:?}", spec.id, mastered);
        } else if let Err(e) = self.master_audio(spec, &mastered).await {
            tracing::error!("Job {}: audio mastering failed: {}", spec.id, e);
            return JobOutcome::failed(MASTERING_FAILED);
        }

        let mut outputs = Outputs::new();
        let mut failed = Vec::new();

        for platform_id in &spec.platforms {
            let platform = match platforms::get_config(platform_id) {
                Ok(platform) => platform,
                Err(e) => {
                    return JobOutcome::Failed {
                        message: e.to_string(),
                        outputs,
                    }
                }
            };

            for &ratio in platform.aspect_ratios {
                let key = rendition_key(platform.id, ratio);
                let output = self.rendition_path(&spec.id, platform, ratio);
                let request = RenderRequest {
                    image: &spec.image_source,
                    audio: &mastered,
                    output: &output,
                    platform,
                    aspect_ratio: ratio,
                };

                match self.renderer.render(&request).await {
                    Ok(()) => {
                        tracing::debug!("Job {}: rendered {}", spec.id, key);
                        outputs.insert(key, Some(output));
                    }
                    Err(e) => {
                        tracing::warn!("Job {}: rendition {} failed: {}", spec.id, key, e);
                        failed.push(key.clone());
                        outputs.insert(key, None);
                    }
                }
            }
        }

        if failed.is_empty() {
            JobOutcome::Completed(outputs)
        } else {
            JobOutcome::Failed {
                message: format!("Failed to create videos: {}", failed.join(", ")),
                outputs,
            }
        }
    }

    fn finish(&self, job_id: &str, outcome: JobOutcome) {
        let recorded = {
            let mut jobs = self.jobs.write();
            let Some(job) = jobs.iter_mut().find(|j| j.id() == job_id) else {
                tracing::warn!("Job {} was removed while processing", job_id);
                return;
            };
            match outcome {
                JobOutcome::Completed(outputs) => {
                    let renditions = outputs.len();
                    job.complete(outputs).map(|()| JobEvent::Completed {
                        job_id: job_id.to_string(),
                        renditions,
                    })
                }
                JobOutcome::Failed { message, outputs } => {
                    job.fail(message.clone(), outputs).map(|()| JobEvent::Failed {
                        job_id: job_id.to_string(),
                        error: message,
                    })
                }
            }
        };

        match recorded {
            Ok(event) => {
                match &event {
                    JobEvent::Failed { error, .. } => tracing::error!("Job {} failed: {}", job_id, error),
                    _ => tracing::info!("Job {} completed successfully", job_id),
                }
                self.emit(event);
            }
            Err(e) => tracing::error!("Could not record result of job {}: {}", job_id, e),
        }
    }

    pub(super) fn mastered_audio_path(&self, job_id: &str) -> PathBuf {
        self.mastered_audio_dir.join(format!(
            "{}_mastered.{}",
            job_id, self.config.audio_mastering.output_format
        ))
    }

    /// Where a mastering run writes before it is promoted to `mastered`.
    /// Keeps the real extension so format detection still works.
    fn staging_path(mastered: &Path) -> PathBuf {
        let stem = mastered
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        match mastered.extension() {
            Some(ext) => mastered.with_file_name(format!("{}.partial.{}", stem, ext.to_string_lossy())),
            None => mastered.with_file_name(format!("{}.partial", stem)),
        }
    }

    /// Master into a staging file and rename it over `mastered` only on
    /// success, so a resumable artifact is always a complete one.
    async fn master_audio(&self, spec: &JobSpec, mastered: &Path) -> Result<()> {
        let staging = Self::staging_path(mastered);
        // A stale master must not survive a failed redo
        remove_if_present(mastered).await;

        let result = self
            .mastering
            .master(&spec.audio_source, &staging, &self.config.audio_mastering)
            .await;
        if let Err(e) = result {
            remove_if_present(&staging).await;
            return Err(e);
        }

        if let Err(e) = tokio::fs::rename(&staging, mastered).await {
            remove_if_present(&staging).await;
            return Err(e.into());
        }
        Ok(())
    }

    pub(super) fn rendition_path(
        &self,
        job_id: &str,
        platform: &PlatformConfig,
        ratio: AspectRatio,
    ) -> PathBuf {
        self.videos_dir.join(job_id).join(platform.id).join(format!(
            "{}_{}_{}.{}",
            job_id,
            platform.id,
            ratio.file_suffix(),
            self.config.video_generation.output_format
        ))
    }
}

fn describe_join_error(err: tokio::task::JoinError) -> String {
    if !err.is_panic() {
        return err.to_string();
    }
    let payload = err.into_panic();
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "task panicked".to_string()
    }
}

async fn remove_if_present(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => tracing::debug!("Removed {:?}", path),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!("Failed to remove {:?}: {}", path, e),
    }
}
