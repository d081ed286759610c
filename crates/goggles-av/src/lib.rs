//! # goggles-av
//!
//! External tool plumbing for turning audio tracks and a cover image into
//! platform-ready videos.
//!
//! This crate provides:
//!
//! - **Tool discovery** ([`ToolRegistry`]) -- find and cache paths to ffmpeg,
//!   ffprobe and the optional Ozone mastering tool.
//! - **Command execution** ([`ToolCommand`]) -- async builder with timeout
//!   support for running external processes.
//! - **Workspace management** ([`Workspace`]) -- scratch directory removed on drop.
//! - **Media types** ([`media`]) -- aspect ratios, resolutions and codecs.
//! - **Action functions** ([`actions`]) -- loudness mastering, duration
//!   probing, cover preparation and still-image rendering.

pub mod actions;
pub mod command;
pub mod error;
pub mod media;
pub mod tools;
pub mod workspace;

// ---- Re-exports for convenience ----

pub use command::{ToolCommand, ToolOutput};
pub use error::{Error, Result};
pub use media::{AspectRatio, AudioCodec, Resolution, VideoCodec};
pub use tools::{ToolConfig, ToolInfo, ToolRegistry, ToolsConfig};
pub use workspace::Workspace;

pub use actions::{
    compute_video_bitrate, master_audio, prepare_image, probe_duration, render_video,
    MasteringBackend, MasteringSettings, RenderSettings, RenderTarget, RenderedVideo,
};
