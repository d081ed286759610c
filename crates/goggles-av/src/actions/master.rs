//! Loudness mastering of a single audio file.
//!
//! Ozone is used when the registry found it; otherwise ffmpeg's `loudnorm`
//! filter provides a single-pass fallback.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::tools::ToolRegistry;

/// Mastering parameters, usually the `[audio_mastering]` config section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MasteringSettings {
    /// Ozone preset to load.
    pub preset_name: String,
    /// Container of the mastered file (`wav` or `flac`).
    pub output_format: String,
    pub bit_depth: u16,
    pub sample_rate: u32,
    pub normalize_loudness: bool,
    /// Integrated loudness target in LUFS.
    pub target_lufs: f64,
}

impl Default for MasteringSettings {
    fn default() -> Self {
        Self {
            preset_name: "Master Assistant".to_string(),
            output_format: "wav".to_string(),
            bit_depth: 24,
            sample_rate: 44100,
            normalize_loudness: true,
            target_lufs: -14.0,
        }
    }
}

impl MasteringSettings {
    /// ffmpeg audio encoder for the configured format and bit depth.
    pub fn encoder(&self) -> Result<&'static str> {
        match (self.output_format.to_ascii_lowercase().as_str(), self.bit_depth) {
            ("wav", 16) => Ok("pcm_s16le"),
            ("wav", 24) => Ok("pcm_s24le"),
            ("wav", 32) => Ok("pcm_s32le"),
            ("flac", 16 | 24) => Ok("flac"),
            (format, depth) => Err(Error::Unsupported(format!(
                "{depth}-bit {format} output"
            ))),
        }
    }
}

/// Which tool produced a mastered file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MasteringBackend {
    Ozone,
    Ffmpeg,
}

/// Master `input` into `output`, creating the output's parent directory.
///
/// An existing `output` is overwritten.
///
/// # Errors
///
/// - [`Error::FileNotFound`] if `input` does not exist.
/// - [`Error::ToolNotFound`] if neither Ozone nor ffmpeg is available.
/// - [`Error::ToolFailed`] if the tool exits non-zero or times out.
pub async fn master_audio(
    tools: &ToolRegistry,
    input: &Path,
    output: &Path,
    settings: &MasteringSettings,
) -> Result<MasteringBackend> {
    if !input.exists() {
        return Err(Error::file_not_found(input));
    }

    if let Some(parent) = output.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    if let Some(ozone) = tools.get("ozone") {
        tracing::info!("mastering {:?} with Ozone ({})", input, settings.preset_name);
        ozone.command().args(ozone_args(input, output, settings)).execute().await?;
        return Ok(MasteringBackend::Ozone);
    }

    let ffmpeg = tools.require("ffmpeg")?;
    tracing::info!(
        "mastering {:?} with ffmpeg loudnorm (target {} LUFS)",
        input,
        settings.target_lufs
    );
    ffmpeg
        .command()
        .args(ffmpeg_args(input, output, settings)?)
        .execute()
        .await?;

    Ok(MasteringBackend::Ffmpeg)
}

/// Ozone command-line arguments.
pub fn ozone_args(input: &Path, output: &Path, settings: &MasteringSettings) -> Vec<String> {
    let mut args = vec![
        "--input".to_string(),
        input.to_string_lossy().to_string(),
        "--output".to_string(),
        output.to_string_lossy().to_string(),
        "--preset".to_string(),
        settings.preset_name.clone(),
        "--format".to_string(),
        settings.output_format.clone(),
        "--bit-depth".to_string(),
        settings.bit_depth.to_string(),
        "--sample-rate".to_string(),
        settings.sample_rate.to_string(),
    ];
    if settings.normalize_loudness {
        args.push("--normalize".to_string());
        args.push("--target-lufs".to_string());
        args.push(settings.target_lufs.to_string());
    }
    args
}

/// ffmpeg arguments for the loudnorm fallback.
pub fn ffmpeg_args(
    input: &Path,
    output: &Path,
    settings: &MasteringSettings,
) -> Result<Vec<String>> {
    let mut args = vec![
        "-y".to_string(),
        "-i".to_string(),
        input.to_string_lossy().to_string(),
    ];
    if settings.normalize_loudness {
        args.push("-af".to_string());
        args.push(format!(
            "loudnorm=I={}:TP=-1:LRA=7:dual_mono=true",
            settings.target_lufs
        ));
    }
    args.extend([
        "-ar".to_string(),
        settings.sample_rate.to_string(),
        "-acodec".to_string(),
        settings.encoder()?.to_string(),
        output.to_string_lossy().to_string(),
    ]);
    Ok(args)
}
