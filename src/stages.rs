//! The two pipeline stages a job runs through, and their ffmpeg-backed
//! implementations.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use goggles_av::{AspectRatio, MasteringSettings, RenderSettings, ToolRegistry};

use crate::error::{Error, Result};
use crate::platforms::PlatformConfig;

// ---------------------------------------------------------------------------
// Stage contracts
// ---------------------------------------------------------------------------

/// Produces a mastered copy of an audio file.
#[async_trait]
pub trait AudioMasteringStage: Send + Sync {
    /// Master `input` into `output`, creating `output`'s parent directory and
    /// overwriting any existing file.
    ///
    /// `Ok` means `output` holds the complete master. The orchestrator passes
    /// a staging path and only keeps the file after `Ok`.
    async fn master(&self, input: &Path, output: &Path, options: &MasteringSettings) -> Result<()>;
}

/// Everything needed to render one rendition.
#[derive(Debug, Clone, Copy)]
pub struct RenderRequest<'a> {
    pub image: &'a Path,
    pub audio: &'a Path,
    pub output: &'a Path,
    pub platform: &'a PlatformConfig,
    pub aspect_ratio: AspectRatio,
}

/// Produces one video from an image and mastered audio.
#[async_trait]
pub trait VideoRenderStage: Send + Sync {
    /// Render one rendition. Must reject aspect ratios the platform does not
    /// support and must leave no temporary files behind.
    async fn render(&self, request: &RenderRequest<'_>) -> Result<()>;
}

// ---------------------------------------------------------------------------
// ffmpeg implementations
// ---------------------------------------------------------------------------

/// Masters with Ozone when installed, otherwise with ffmpeg's loudnorm.
pub struct FfmpegMasteringStage {
    tools: Arc<ToolRegistry>,
}

impl FfmpegMasteringStage {
    pub fn new(tools: Arc<ToolRegistry>) -> Self {
        Self { tools }
    }
}

#[async_trait]
impl AudioMasteringStage for FfmpegMasteringStage {
    async fn master(&self, input: &Path, output: &Path, options: &MasteringSettings) -> Result<()> {
        let backend = goggles_av::master_audio(&self.tools, input, output, options).await?;
        tracing::debug!("mastered {:?} with {:?}", output, backend);
        Ok(())
    }
}

/// Loops a prepared cover image over the mastered audio with ffmpeg.
pub struct FfmpegRenderStage {
    tools: Arc<ToolRegistry>,
    settings: RenderSettings,
}

impl FfmpegRenderStage {
    pub fn new(tools: Arc<ToolRegistry>, settings: RenderSettings) -> Self {
        Self { tools, settings }
    }
}

#[async_trait]
impl VideoRenderStage for FfmpegRenderStage {
    async fn render(&self, request: &RenderRequest<'_>) -> Result<()> {
        if !request.platform.supports(request.aspect_ratio) {
            return Err(Error::stage(
                "render",
                format!(
                    "aspect ratio {} not supported by {}",
                    request.aspect_ratio, request.platform.name
                ),
            ));
        }

        let target = request.platform.render_target(request.aspect_ratio)?;
        goggles_av::render_video(
            &self.tools,
            &self.settings,
            &target,
            request.image,
            request.audio,
            request.output,
        )
        .await?;
        Ok(())
    }
}
