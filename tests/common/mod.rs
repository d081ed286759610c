//! Shared test harness for orchestrator integration tests.
//!
//! Provides fake mastering and render stages that record how they were
//! called, plus a [`TestHarness`] that lays out audio/image fixtures in a
//! temp directory and builds an [`Orchestrator`] over them.

#![allow(dead_code)]

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tempfile::TempDir;

use beer_goggles::config::WorkflowConfig;
use beer_goggles::orchestrator::rendition_key;
use beer_goggles::stages::{AudioMasteringStage, RenderRequest, VideoRenderStage};
use beer_goggles::{Error, Orchestrator, Result};
use goggles_av::MasteringSettings;

/// Tracks how many stage calls are running at once across every fake stage
/// sharing it.
#[derive(Debug, Default)]
pub struct InFlight {
    current: AtomicUsize,
    max: AtomicUsize,
}

impl InFlight {
    fn enter(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.max.fetch_max(now, Ordering::SeqCst);
    }

    fn exit(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn max(&self) -> usize {
        self.max.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    Succeed,
    Fail,
    Panic,
}

// ---------------------------------------------------------------------------
// Fake mastering stage
// ---------------------------------------------------------------------------

/// Writes a small placeholder file instead of mastering.
pub struct FakeMastering {
    calls: AtomicUsize,
    inputs: Mutex<Vec<PathBuf>>,
    behavior: Behavior,
    /// Inputs (by file name) that fail regardless of `behavior`.
    failing: Mutex<HashSet<String>>,
    /// Inputs (by file name) that write part of their output, then fail.
    truncating: Mutex<HashSet<String>>,
    /// Inputs (by file name) that panic regardless of `behavior`.
    panicking: HashSet<String>,
    delay: Duration,
    in_flight: Arc<InFlight>,
}

impl FakeMastering {
    pub fn new(behavior: Behavior) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            inputs: Mutex::new(Vec::new()),
            behavior,
            failing: Mutex::new(HashSet::new()),
            truncating: Mutex::new(HashSet::new()),
            panicking: HashSet::new(),
            delay: Duration::ZERO,
            in_flight: Arc::new(InFlight::default()),
        }
    }

    pub fn succeeding() -> Self {
        Self::new(Behavior::Succeed)
    }

    pub fn failing_for(self, file_name: &str) -> Self {
        self.failing.lock().insert(file_name.to_string());
        self
    }

    /// Leave a truncated file at the output path, then fail, like a tool
    /// killed mid-write.
    pub fn truncating_for(self, file_name: &str) -> Self {
        self.truncating.lock().insert(file_name.to_string());
        self
    }

    /// Stop failing on inputs registered with [`FakeMastering::failing_for`]
    /// or [`FakeMastering::truncating_for`].
    pub fn heal(&self) {
        self.failing.lock().clear();
        self.truncating.lock().clear();
    }

    pub fn panicking_for(mut self, file_name: &str) -> Self {
        self.panicking.insert(file_name.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_in_flight(mut self, in_flight: Arc<InFlight>) -> Self {
        self.in_flight = in_flight;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn inputs(&self) -> Vec<PathBuf> {
        self.inputs.lock().clone()
    }
}

#[async_trait]
impl AudioMasteringStage for FakeMastering {
    async fn master(&self, input: &Path, output: &Path, _options: &MasteringSettings) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inputs.lock().push(input.to_path_buf());

        self.in_flight.enter();
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.exit();

        let name = file_name(input);
        if self.behavior == Behavior::Panic || self.panicking.contains(&name) {
            panic!("mastering exploded on {name}");
        }
        if self.behavior == Behavior::Fail || self.failing.lock().contains(&name) {
            return Err(Error::stage("mastering", format!("cannot master {name}")));
        }

        if let Some(parent) = output.parent() {
            std::fs::create_dir_all(parent)?;
        }
        if self.truncating.lock().contains(&name) {
            std::fs::write(output, b"trunc")?;
            return Err(Error::stage("mastering", format!("killed while mastering {name}")));
        }
        std::fs::write(output, b"mastered")?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Fake render stage
// ---------------------------------------------------------------------------

/// Writes a small placeholder video instead of running an encoder.
pub struct FakeRenderer {
    calls: AtomicUsize,
    rendered: Mutex<Vec<(String, PathBuf)>>,
    /// Rendition keys (e.g. `twitter_1:1`) that fail.
    failing_keys: HashSet<String>,
    delay: Duration,
    in_flight: Arc<InFlight>,
}

impl FakeRenderer {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            rendered: Mutex::new(Vec::new()),
            failing_keys: HashSet::new(),
            delay: Duration::ZERO,
            in_flight: Arc::new(InFlight::default()),
        }
    }

    pub fn failing_key(mut self, key: &str) -> Self {
        self.failing_keys.insert(key.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_in_flight(mut self, in_flight: Arc<InFlight>) -> Self {
        self.in_flight = in_flight;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// `(rendition key, output path)` for every render call, in call order.
    pub fn rendered(&self) -> Vec<(String, PathBuf)> {
        self.rendered.lock().clone()
    }
}

#[async_trait]
impl VideoRenderStage for FakeRenderer {
    async fn render(&self, request: &RenderRequest<'_>) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let key = rendition_key(request.platform.id, request.aspect_ratio);
        self.rendered
            .lock()
            .push((key.clone(), request.output.to_path_buf()));

        self.in_flight.enter();
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.exit();

        if !request.platform.supports(request.aspect_ratio) {
            return Err(Error::stage("render", "unsupported aspect ratio"));
        }
        if self.failing_keys.contains(&key) {
            return Err(Error::stage("render", format!("encoder crashed on {key}")));
        }

        if let Some(parent) = request.output.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(request.output, b"video")?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

/// Temp directory with `audio/`, a cover image and an `output/` tree.
pub struct TestHarness {
    pub dir: TempDir,
    pub mastering: Arc<FakeMastering>,
    pub renderer: Arc<FakeRenderer>,
    pub orchestrator: Orchestrator,
}

impl TestHarness {
    pub fn new(max_concurrent_jobs: usize) -> Self {
        Self::with_stages(max_concurrent_jobs, FakeMastering::succeeding(), FakeRenderer::new())
    }

    pub fn with_stages(
        max_concurrent_jobs: usize,
        mastering: FakeMastering,
        renderer: FakeRenderer,
    ) -> Self {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let config = WorkflowConfig {
            max_concurrent_jobs,
            output_base_dir: dir.path().join("output"),
            ..WorkflowConfig::default()
        };
        Self::with_config(dir, config, mastering, renderer)
    }

    pub fn with_config(
        dir: TempDir,
        config: WorkflowConfig,
        mastering: FakeMastering,
        renderer: FakeRenderer,
    ) -> Self {
        std::fs::create_dir_all(dir.path().join("audio")).expect("failed to create audio dir");
        write_fixture(&dir.path().join("cover.png"));

        let mastering = Arc::new(mastering);
        let renderer = Arc::new(renderer);
        let orchestrator = Orchestrator::new(
            config,
            Arc::clone(&mastering) as Arc<dyn AudioMasteringStage>,
            Arc::clone(&renderer) as Arc<dyn VideoRenderStage>,
        )
        .expect("failed to create orchestrator");

        Self {
            dir,
            mastering,
            renderer,
            orchestrator,
        }
    }

    pub fn audio_dir(&self) -> PathBuf {
        self.dir.path().join("audio")
    }

    pub fn image(&self) -> PathBuf {
        self.dir.path().join("cover.png")
    }

    pub fn output_dir(&self) -> PathBuf {
        self.dir.path().join("output")
    }

    /// Create an audio fixture in `audio/` and return its path.
    pub fn audio(&self, name: &str) -> PathBuf {
        let path = self.audio_dir().join(name);
        write_fixture(&path);
        path
    }

    pub fn mastered_path(&self, job_id: &str) -> PathBuf {
        self.output_dir()
            .join("mastered_audio")
            .join(format!("{job_id}_mastered.wav"))
    }
}

/// 2 KiB of filler, enough to pass the minimum media size check.
pub fn write_fixture(path: &Path) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("failed to create fixture dir");
    }
    std::fs::write(path, vec![0u8; 2048]).expect("failed to write fixture");
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}
