//! Media actions: mastering, probing, cover preparation and rendering.
//!
//! Tool-driven actions are free async functions taking the
//! [`crate::ToolRegistry`] they need, so callers decide which tools are in play.

pub mod cover;
pub mod master;
pub mod probe;
pub mod render;

pub use cover::prepare_image;
pub use master::{master_audio, MasteringBackend, MasteringSettings};
pub use probe::probe_duration;
pub use render::{compute_video_bitrate, render_video, RenderSettings, RenderTarget, RenderedVideo};
