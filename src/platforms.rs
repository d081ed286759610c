//! Static catalog of target platforms and their upload constraints.

use goggles_av::{AspectRatio, AudioCodec, RenderTarget, Resolution, VideoCodec};
use serde::Serialize;

use crate::error::{Error, Result};

const LANDSCAPE_1080: Resolution = Resolution::new(1920, 1080);
const PORTRAIT_1080: Resolution = Resolution::new(1080, 1920);
const SQUARE_1080: Resolution = Resolution::new(1080, 1080);

/// Upload constraints for one platform.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlatformConfig {
    /// Lower-case identifier used on the command line and in rendition keys.
    pub id: &'static str,
    pub name: &'static str,
    pub supported_formats: &'static [&'static str],
    /// Accepted frame shapes, in rendering order.
    pub aspect_ratios: &'static [AspectRatio],
    pub max_duration_secs: u32,
    pub max_file_size_mb: u32,
    pub video_codec: VideoCodec,
    pub audio_codec: AudioCodec,
    pub recommended_resolutions: &'static [(AspectRatio, Resolution)],
    pub max_bitrate_kbps: Option<u32>,
    pub audio_bitrate_kbps: u32,
    pub notes: &'static str,
}

impl PlatformConfig {
    /// Recommended frame size for `ratio`, if the platform accepts it.
    pub fn resolution_for(&self, ratio: AspectRatio) -> Option<Resolution> {
        self.recommended_resolutions
            .iter()
            .find(|(r, _)| *r == ratio)
            .map(|(_, res)| *res)
    }

    pub fn supports(&self, ratio: AspectRatio) -> bool {
        self.aspect_ratios.contains(&ratio)
    }

    /// Render constraints for one of this platform's aspect ratios.
    pub fn render_target(&self, ratio: AspectRatio) -> Result<RenderTarget> {
        let resolution = self
            .resolution_for(ratio)
            .filter(|_| self.supports(ratio))
            .ok_or_else(|| {
                Error::Media(goggles_av::Error::Unsupported(format!(
                    "aspect ratio {ratio} on {}",
                    self.name
                )))
            })?;

        Ok(RenderTarget {
            label: self.name.to_string(),
            aspect_ratio: ratio,
            supported_ratios: self.aspect_ratios.to_vec(),
            resolution,
            video_codec: self.video_codec,
            audio_codec: self.audio_codec,
            max_duration_secs: self.max_duration_secs,
            max_file_size_mb: self.max_file_size_mb,
        })
    }
}

static PLATFORMS: &[PlatformConfig] = &[
    PlatformConfig {
        id: "facebook",
        name: "Facebook",
        supported_formats: &["mp4", "mov"],
        aspect_ratios: &[AspectRatio::Landscape, AspectRatio::Portrait],
        max_duration_secs: 14_400,
        max_file_size_mb: 4096,
        video_codec: VideoCodec::H264,
        audio_codec: AudioCodec::AacLc,
        recommended_resolutions: &[
            (AspectRatio::Landscape, LANDSCAPE_1080),
            (AspectRatio::Portrait, PORTRAIT_1080),
        ],
        max_bitrate_kbps: None,
        audio_bitrate_kbps: 128,
        notes: "Stories limited to 2 minutes",
    },
    PlatformConfig {
        id: "instagram",
        name: "Instagram",
        supported_formats: &["mp4"],
        aspect_ratios: &[AspectRatio::Square, AspectRatio::Portrait],
        max_duration_secs: 600,
        max_file_size_mb: 4096,
        video_codec: VideoCodec::H264,
        audio_codec: AudioCodec::Aac,
        recommended_resolutions: &[
            (AspectRatio::Square, SQUARE_1080),
            (AspectRatio::Portrait, PORTRAIT_1080),
        ],
        max_bitrate_kbps: None,
        audio_bitrate_kbps: 128,
        notes: "Stories/Reels 15-90 seconds recommended",
    },
    PlatformConfig {
        id: "youtube",
        name: "YouTube",
        supported_formats: &["mp4", "mov", "avi", "webm"],
        aspect_ratios: &[AspectRatio::Landscape, AspectRatio::Portrait],
        max_duration_secs: 900,
        max_file_size_mb: 131_072,
        video_codec: VideoCodec::H264,
        audio_codec: AudioCodec::Aac,
        recommended_resolutions: &[
            (AspectRatio::Landscape, LANDSCAPE_1080),
            (AspectRatio::Portrait, PORTRAIT_1080),
        ],
        max_bitrate_kbps: None,
        audio_bitrate_kbps: 128,
        notes: "Shorts limited to 60 seconds, render at 1080p minimum",
    },
    PlatformConfig {
        id: "tiktok",
        name: "TikTok",
        supported_formats: &["mp4", "mov"],
        aspect_ratios: &[AspectRatio::Portrait],
        max_duration_secs: 180,
        max_file_size_mb: 288,
        video_codec: VideoCodec::H264,
        audio_codec: AudioCodec::AacLc,
        recommended_resolutions: &[(AspectRatio::Portrait, PORTRAIT_1080)],
        max_bitrate_kbps: None,
        audio_bitrate_kbps: 128,
        notes: "Forced vertical videos, keep file size small",
    },
    PlatformConfig {
        id: "twitter",
        name: "Twitter",
        supported_formats: &["mp4", "mov"],
        aspect_ratios: &[AspectRatio::Square, AspectRatio::Landscape],
        max_duration_secs: 140,
        max_file_size_mb: 512,
        video_codec: VideoCodec::H264,
        audio_codec: AudioCodec::Aac,
        recommended_resolutions: &[
            (AspectRatio::Square, SQUARE_1080),
            (AspectRatio::Landscape, Resolution::new(1280, 720)),
        ],
        max_bitrate_kbps: None,
        audio_bitrate_kbps: 128,
        notes: "Optimized square videos, shorter lengths recommended",
    },
    PlatformConfig {
        id: "linkedin",
        name: "LinkedIn",
        supported_formats: &["mp4"],
        aspect_ratios: &[AspectRatio::Landscape, AspectRatio::Square, AspectRatio::Portrait],
        max_duration_secs: 180,
        max_file_size_mb: 5120,
        video_codec: VideoCodec::H264,
        audio_codec: AudioCodec::Aac,
        recommended_resolutions: &[
            (AspectRatio::Landscape, LANDSCAPE_1080),
            (AspectRatio::Square, SQUARE_1080),
            (AspectRatio::Portrait, PORTRAIT_1080),
        ],
        max_bitrate_kbps: None,
        audio_bitrate_kbps: 128,
        notes: "16:9 default, supports all ratios, high-quality audio",
    },
];

/// Platform identifiers in catalog order.
pub fn list_platforms() -> Vec<&'static str> {
    PLATFORMS.iter().map(|p| p.id).collect()
}

/// Every platform configuration, in catalog order.
pub fn all() -> &'static [PlatformConfig] {
    PLATFORMS
}

/// Look up a platform by identifier, ignoring case.
pub fn get_config(id: &str) -> Result<&'static PlatformConfig> {
    let wanted = id.trim().to_ascii_lowercase();
    PLATFORMS
        .iter()
        .find(|p| p.id == wanted)
        .ok_or_else(|| Error::UnknownPlatform(id.to_string()))
}

/// Normalize requested platform ids: lower-case, de-duplicated, first
/// occurrence wins.
///
/// # Errors
///
/// - [`Error::EmptyPlatforms`] if `ids` is empty.
/// - [`Error::UnsupportedPlatform`] naming every id missing from the catalog.
pub fn normalize<S: AsRef<str>>(ids: &[S]) -> Result<Vec<String>> {
    if ids.is_empty() {
        return Err(Error::EmptyPlatforms);
    }

    let mut normalized: Vec<String> = Vec::with_capacity(ids.len());
    let mut unsupported = Vec::new();

    for id in ids {
        let lowered = id.as_ref().trim().to_ascii_lowercase();
        if get_config(&lowered).is_err() {
            unsupported.push(id.as_ref().to_string());
        } else if !normalized.contains(&lowered) {
            normalized.push(lowered);
        }
    }

    if !unsupported.is_empty() {
        return Err(Error::UnsupportedPlatform {
            platforms: unsupported,
        });
    }
    Ok(normalized)
}
