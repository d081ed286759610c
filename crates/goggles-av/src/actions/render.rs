//! Still-image video rendering: one cover image looped over one audio track.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::actions::cover::prepare_image;
use crate::actions::probe::probe_duration;
use crate::error::{Error, Result};
use crate::media::{AspectRatio, AudioCodec, Resolution, VideoCodec};
use crate::tools::ToolRegistry;
use crate::workspace::Workspace;

/// Share of the size budget spent on video; the rest covers audio and muxing.
const VIDEO_SIZE_SHARE: f64 = 0.8;
const MIN_VIDEO_KBPS: f64 = 500.0;
const MAX_VIDEO_KBPS: f64 = 10_000.0;
/// Sample rate every platform accepts.
const OUTPUT_SAMPLE_RATE: &str = "44100";

/// Encoder settings, usually the `[video_generation]` config section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    /// Output container extension.
    pub output_format: String,
    /// Fixed video bitrate (e.g. `2M`); derived from the size limit when unset.
    pub video_bitrate: Option<String>,
    pub audio_bitrate: String,
    pub fps: u32,
    pub use_gpu_acceleration: bool,
    /// Parent directory for scratch files; the system temp dir when unset.
    pub temp_dir: Option<PathBuf>,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            output_format: "mp4".to_string(),
            video_bitrate: None,
            audio_bitrate: "128k".to_string(),
            fps: 30,
            use_gpu_acceleration: true,
            temp_dir: None,
        }
    }
}

/// Platform constraints for a single rendition.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderTarget {
    /// Platform display name, for logs.
    pub label: String,
    pub aspect_ratio: AspectRatio,
    pub supported_ratios: Vec<AspectRatio>,
    pub resolution: Resolution,
    pub video_codec: VideoCodec,
    pub audio_codec: AudioCodec,
    pub max_duration_secs: u32,
    pub max_file_size_mb: u32,
}

/// Result of a successful render.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedVideo {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub duration_secs: f64,
    pub video_bitrate: String,
}

/// Pick a video bitrate that keeps the output inside `max_file_size_mb`.
///
/// An explicit override always wins. Otherwise 80 % of the size budget is
/// spread over `duration_secs`, clamped to 500k–10000k.
pub fn compute_video_bitrate(
    explicit: Option<&str>,
    duration_secs: f64,
    max_file_size_mb: u32,
) -> String {
    if let Some(rate) = explicit {
        return rate.to_string();
    }
    if duration_secs <= 0.0 {
        return format!("{}k", MAX_VIDEO_KBPS as u64);
    }

    let budget_bits = f64::from(max_file_size_mb) * VIDEO_SIZE_SHARE * 8.0 * 1024.0 * 1024.0;
    let kbps = (budget_bits / duration_secs / 1000.0).clamp(MIN_VIDEO_KBPS, MAX_VIDEO_KBPS);
    format!("{}k", kbps as u64)
}

/// ffmpeg arguments for muxing a prepared image with audio.
pub fn render_args(
    settings: &RenderSettings,
    target: &RenderTarget,
    image: &Path,
    audio: &Path,
    output: &Path,
    duration_secs: f64,
    video_bitrate: &str,
) -> Vec<String> {
    let mut args: Vec<String> = vec!["-y".into()];
    if settings.use_gpu_acceleration {
        args.extend(["-hwaccel".into(), "auto".into()]);
    }
    args.extend([
        "-loop".into(),
        "1".into(),
        "-i".into(),
        image.to_string_lossy().to_string(),
        "-i".into(),
        audio.to_string_lossy().to_string(),
        "-c:v".into(),
        target.video_codec.encoder().into(),
        "-b:v".into(),
        video_bitrate.to_string(),
        "-s".into(),
        target.resolution.to_string(),
        "-r".into(),
        settings.fps.to_string(),
        "-pix_fmt".into(),
        "yuv420p".into(),
        "-c:a".into(),
        target.audio_codec.encoder().into(),
    ]);
    if let Some(profile) = target.audio_codec.profile() {
        args.extend(["-profile:a".into(), profile.into()]);
    }
    args.extend([
        "-b:a".into(),
        settings.audio_bitrate.clone(),
        "-ar".into(),
        OUTPUT_SAMPLE_RATE.into(),
        "-t".into(),
        format!("{duration_secs:.3}"),
        "-shortest".into(),
        output.to_string_lossy().to_string(),
    ]);
    args
}

/// Render `image` + `audio` into `output` for one platform rendition.
///
/// The cover image is prepared inside a [`Workspace`] that is removed when
/// this function returns, on success or failure.
///
/// # Errors
///
/// - [`Error::Unsupported`] if the aspect ratio is not one the target accepts.
/// - [`Error::FileNotFound`] if the image or audio is missing.
/// - [`Error::ToolNotFound`] / [`Error::ToolFailed`] from ffprobe or ffmpeg.
pub async fn render_video(
    tools: &ToolRegistry,
    settings: &RenderSettings,
    target: &RenderTarget,
    image: &Path,
    audio: &Path,
    output: &Path,
) -> Result<RenderedVideo> {
    if !target.supported_ratios.contains(&target.aspect_ratio) {
        return Err(Error::Unsupported(format!(
            "aspect ratio {} on {}",
            target.aspect_ratio, target.label
        )));
    }
    for path in [image, audio] {
        if !path.exists() {
            return Err(Error::file_not_found(path));
        }
    }
    let ffmpeg = tools.require("ffmpeg")?;

    if let Some(parent) = output.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let mut duration = probe_duration(tools, audio).await?;
    let max_duration = f64::from(target.max_duration_secs);
    if duration > max_duration {
        tracing::warn!(
            "audio duration {:.1}s exceeds {} limit of {}s; truncating",
            duration,
            target.label,
            target.max_duration_secs
        );
        duration = max_duration;
    }

    let workspace = Workspace::new_in(settings.temp_dir.as_deref())?;
    let prepared = workspace.temp_file(&format!("cover_{}.png", target.resolution));
    {
        let image = image.to_path_buf();
        let prepared = prepared.clone();
        let resolution = target.resolution;
        tokio::task::spawn_blocking(move || prepare_image(&image, resolution, &prepared))
            .await
            .map_err(|e| Error::Workspace(format!("image preparation task failed: {e}")))??;
    }

    let bitrate = compute_video_bitrate(
        settings.video_bitrate.as_deref(),
        duration,
        target.max_file_size_mb,
    );

    tracing::info!(
        "rendering {} {} video: {:.1}s at {}",
        target.label,
        target.aspect_ratio,
        duration,
        bitrate
    );

    ffmpeg
        .command()
        .args(render_args(settings, target, &prepared, audio, output, duration, &bitrate))
        .execute()
        .await?;

    let size_bytes = tokio::fs::metadata(output).await?.len();
    let size_mb = size_bytes as f64 / (1024.0 * 1024.0);
    if size_mb > f64::from(target.max_file_size_mb) {
        tracing::warn!(
            "{:?} is {:.1} MB, over the {} limit of {} MB",
            output,
            size_mb,
            target.label,
            target.max_file_size_mb
        );
    }

    tracing::info!("rendered {:?} ({:.1} MB)", output, size_mb);

    Ok(RenderedVideo {
        path: output.to_path_buf(),
        size_bytes,
        duration_secs: duration,
        video_bitrate: bitrate,
    })
}
