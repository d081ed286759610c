//! Beer Goggles - batch audio-to-video orchestration
//!
//! Turns a batch of audio tracks plus one cover image into loudness-mastered,
//! per-platform videos. The library exposes the orchestrator, the platform
//! catalog and the stage traits so the binary and the integration tests can
//! drive them.

pub mod config;
pub mod error;
pub mod files;
pub mod orchestrator;
pub mod platforms;
pub mod stages;

pub use error::{Error, Result};
pub use orchestrator::{Job, JobEvent, JobStatus, Orchestrator, Report, StatusCounts};
