//! Job orchestration: job registry, bounded worker pool, retries and reports.
//!
//! Jobs live in a single collection guarded by one [`RwLock`]. A run snapshots
//! the pending job ids into a FIFO, and up to `max_concurrent_jobs` workers pop
//! from it. A worker marks its job `Processing` when it claims it and records
//! the terminal status before claiming the next, so at most
//! `max_concurrent_jobs` jobs are ever `Processing`.

mod events;
mod job;
mod pipeline;
mod report;

pub use events::JobEvent;
pub use job::{rendition_key, Job, JobStatus, Outputs, StatusCounts};
pub use pipeline::MASTERING_FAILED;
pub use report::{ConfigEcho, Report, ReportSummary};

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use goggles_av::ToolRegistry;
use parking_lot::{Mutex, RwLock};
use tokio::sync::broadcast;
use tokio::task::JoinSet;

use crate::config::WorkflowConfig;
use crate::error::{Error, Result};
use crate::files;
use crate::platforms;
use crate::stages::{AudioMasteringStage, FfmpegMasteringStage, FfmpegRenderStage, VideoRenderStage};

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// State shared between the orchestrator handle and its workers.
pub(crate) struct Shared {
    config: WorkflowConfig,
    jobs: RwLock<Vec<Job>>,
    /// Jobs ever added. Feeds auto ids and survives `clear_jobs`, so an id
    /// (and its mastered audio) is never handed to a second source.
    added: AtomicUsize,
    mastering: Arc<dyn AudioMasteringStage>,
    renderer: Arc<dyn VideoRenderStage>,
    events: broadcast::Sender<JobEvent>,
    mastered_audio_dir: PathBuf,
    videos_dir: PathBuf,
}

impl Shared {
    fn emit(&self, event: JobEvent) {
        if self.events.send(event).is_err() {
            tracing::trace!("No subscribers for job event");
        }
    }
}

/// Owns a batch of jobs and drives them through mastering and rendering.
pub struct Orchestrator {
    shared: Arc<Shared>,
    /// Serializes runs so two callers never dispatch the same snapshot.
    dispatch_lock: tokio::sync::Mutex<()>,
}

impl Orchestrator {
    /// Create an orchestrator with explicit stage implementations.
    ///
    /// Creates `<output>/mastered_audio` and `<output>/videos`.
    pub fn new(
        config: WorkflowConfig,
        mastering: Arc<dyn AudioMasteringStage>,
        renderer: Arc<dyn VideoRenderStage>,
    ) -> Result<Self> {
        let mastered_audio_dir = config.mastered_audio_dir();
        let videos_dir = config.videos_dir();
        std::fs::create_dir_all(&mastered_audio_dir)?;
        std::fs::create_dir_all(&videos_dir)?;

        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        tracing::debug!(
            "Orchestrator ready: output {:?}, {} workers",
            config.output_base_dir,
            config.max_concurrent_jobs
        );

        Ok(Self {
            shared: Arc::new(Shared {
                config,
                jobs: RwLock::new(Vec::new()),
                added: AtomicUsize::new(0),
                mastering,
                renderer,
                events,
                mastered_audio_dir,
                videos_dir,
            }),
            dispatch_lock: tokio::sync::Mutex::new(()),
        })
    }

    /// Create an orchestrator backed by the external tools found on this host.
    pub fn with_ffmpeg(config: WorkflowConfig) -> Result<Self> {
        let tools = Arc::new(ToolRegistry::discover(&config.tools));
        if !tools.has_required() {
            tracing::warn!("ffmpeg/ffprobe not found; rendering will fail until they are installed");
        }
        let mastering = Arc::new(FfmpegMasteringStage::new(Arc::clone(&tools)));
        let renderer = Arc::new(FfmpegRenderStage::new(tools, config.video_generation.clone()));
        Self::new(config, mastering, renderer)
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.shared.config
    }

    /// Receive job lifecycle events from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.shared.events.subscribe()
    }

    /// Register a job. Without `job_id`, the id is `<audio stem>_<n>` where
    /// `n` counts every job this orchestrator has accepted, cleared ones
    /// included.
    ///
    /// # Errors
    ///
    /// - [`Error::SourceNotFound`] if the audio or image path is missing.
    /// - [`Error::EmptyPlatforms`] / [`Error::UnsupportedPlatform`] for a bad
    ///   platform list.
    /// - [`Error::DuplicateJobId`] if the id is already taken.
    ///
    /// No job is added on error.
    pub fn add_job<S: AsRef<str>>(
        &self,
        audio: &Path,
        image: &Path,
        platforms: &[S],
        job_id: Option<&str>,
    ) -> Result<Job> {
        if !audio.exists() {
            return Err(Error::source_not_found("audio file", audio));
        }
        if !image.exists() {
            return Err(Error::source_not_found("image file", image));
        }
        let platforms = platforms::normalize(platforms)?;

        let job = {
            let mut jobs = self.shared.jobs.write();
            let id = match job_id {
                Some(id) => id.to_string(),
                None => {
                    let stem = audio
                        .file_stem()
                        .map(|s| s.to_string_lossy().to_string())
                        .unwrap_or_else(|| "job".to_string());
                    format!("{}_{}", stem, self.shared.added.load(Ordering::Relaxed))
                }
            };
            if jobs.iter().any(|j| j.id() == id) {
                return Err(Error::DuplicateJobId(id));
            }

            let job = Job::new(id, audio.to_path_buf(), image.to_path_buf(), platforms);
            jobs.push(job.clone());
            // Only bumped under the write lock
            self.shared.added.fetch_add(1, Ordering::Relaxed);
            job
        };

        tracing::info!(
            "Added job {}: {:?} -> {}",
            job.id(),
            job.audio_source(),
            job.platforms().join(", ")
        );
        self.shared.emit(JobEvent::Queued {
            job_id: job.id().to_string(),
        });
        Ok(job)
    }

    /// Register one job per file in `audio_dir` matching `pattern`, in file
    /// name order.
    ///
    /// Returns an empty list when nothing matches. A file whose job cannot be
    /// created is logged and skipped.
    pub fn add_batch_jobs<S: AsRef<str>>(
        &self,
        audio_dir: &Path,
        image: &Path,
        platforms: &[S],
        pattern: &str,
    ) -> Result<Vec<Job>> {
        if !audio_dir.is_dir() {
            return Err(Error::source_not_found("audio directory", audio_dir));
        }
        if !image.exists() {
            return Err(Error::source_not_found("image file", image));
        }
        platforms::normalize(platforms)?;

        let audio_files = files::list_matching(audio_dir, pattern)?;
        if audio_files.is_empty() {
            tracing::warn!("No audio files matching {:?} in {:?}", pattern, audio_dir);
            return Ok(Vec::new());
        }

        let mut added = Vec::with_capacity(audio_files.len());
        for audio in &audio_files {
            match self.add_job(audio, image, platforms, None) {
                Ok(job) => added.push(job),
                Err(e) => tracing::error!("Failed to add job for {:?}: {}", audio, e),
            }
        }

        tracing::info!("Added {} batch jobs from {:?}", added.len(), audio_dir);
        Ok(added)
    }

    /// Run every currently pending job and return the status histogram of
    /// all jobs once they have finished.
    pub async fn process_all_jobs(&self) -> StatusCounts {
        let _run = self.dispatch_lock.lock().await;

        let queue: VecDeque<String> = self
            .shared
            .jobs
            .read()
            .iter()
            .filter(|j| j.status() == JobStatus::Pending)
            .map(|j| j.id().to_string())
            .collect();

        if queue.is_empty() {
            tracing::info!("No pending jobs to process");
            return self.status_counts();
        }

        let worker_count = self.shared.config.max_concurrent_jobs.max(1).min(queue.len());
        tracing::info!(
            "Processing {} jobs with {} concurrent workers",
            queue.len(),
            worker_count
        );

        let queue = Arc::new(Mutex::new(queue));
        let mut workers = JoinSet::new();
        for worker in 0..worker_count {
            workers.spawn(Arc::clone(&self.shared).run_worker(Arc::clone(&queue), worker));
        }
        while let Some(result) = workers.join_next().await {
            if let Err(e) = result {
                tracing::error!("Worker task failed: {}", e);
            }
        }

        let counts = self.status_counts();
        tracing::info!(
            "Processing complete: {} completed, {} failed, {} pending",
            counts.completed,
            counts.failed,
            counts.pending
        );
        counts
    }

    /// Reset every failed job to pending and run again.
    pub async fn retry_failed_jobs(&self) -> StatusCounts {
        let reset = {
            let mut jobs = self.shared.jobs.write();
            let mut reset = 0;
            for job in jobs.iter_mut().filter(|j| j.status() == JobStatus::Failed) {
                match job.reset() {
                    Ok(()) => reset += 1,
                    Err(e) => tracing::warn!("{}", e),
                }
            }
            reset
        };

        tracing::info!("Retrying {} failed jobs", reset);
        self.process_all_jobs().await
    }

    pub fn get_failed_jobs(&self) -> Vec<Job> {
        self.shared
            .jobs
            .read()
            .iter()
            .filter(|j| j.status() == JobStatus::Failed)
            .cloned()
            .collect()
    }

    pub fn get_job_status(&self, job_id: &str) -> Option<JobStatus> {
        self.shared
            .jobs
            .read()
            .iter()
            .find(|j| j.id() == job_id)
            .map(Job::status)
    }

    pub fn get_job(&self, job_id: &str) -> Option<Job> {
        self.shared
            .jobs
            .read()
            .iter()
            .find(|j| j.id() == job_id)
            .cloned()
    }

    /// Snapshot of every job, in insertion order.
    pub fn jobs(&self) -> Vec<Job> {
        self.shared.jobs.read().clone()
    }

    pub fn status_counts(&self) -> StatusCounts {
        StatusCounts::from_jobs(self.shared.jobs.read().iter())
    }

    /// Build a report from a consistent snapshot of the job collection.
    pub fn report(&self) -> Report {
        Report::new(&self.shared.config, self.jobs())
    }

    /// Write the report as JSON to `path`, creating parent directories.
    pub fn export_report(&self, path: &Path) -> Result<()> {
        self.report().write(path)
    }

    /// Forget every job. Files already written stay on disk.
    pub fn clear_jobs(&self) {
        let mut jobs = self.shared.jobs.write();
        let removed = jobs.len();
        jobs.clear();
        tracing::info!("Cleared {} jobs", removed);
    }
}
