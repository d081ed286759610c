//! Error type for job creation, processing and reporting.

use std::path::PathBuf;

use crate::orchestrator::JobStatus;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An input file or directory does not exist.
    #[error("{kind} not found: {}", path.display())]
    SourceNotFound {
        /// What the path was supposed to be ("audio file", "image file", ...).
        kind: &'static str,
        path: PathBuf,
    },

    /// An input file exists but is not usable media.
    #[error("Invalid {kind} {}: {reason}", path.display())]
    InvalidFile {
        kind: &'static str,
        path: PathBuf,
        reason: String,
    },

    /// A file-name pattern could not be compiled.
    #[error("Invalid pattern {pattern:?}: {message}")]
    InvalidPattern { pattern: String, message: String },

    /// One or more requested platforms are not in the catalog.
    #[error("Unsupported platforms: {}", platforms.join(", "))]
    UnsupportedPlatform { platforms: Vec<String> },

    /// A single platform lookup failed.
    #[error("Unknown platform: {0}")]
    UnknownPlatform(String),

    /// A job was requested without any target platform.
    #[error("At least one platform is required")]
    EmptyPlatforms,

    /// A job with this id is already registered.
    #[error("Job id already exists: {0}")]
    DuplicateJobId(String),

    /// A job status change that the state machine does not allow.
    #[error("Invalid transition for job {job_id}: {from} -> {to}")]
    InvalidTransition {
        job_id: String,
        from: JobStatus,
        to: JobStatus,
    },

    /// A pipeline stage reported failure.
    #[error("{stage} failed: {message}")]
    Stage { stage: &'static str, message: String },

    /// An external tool or media operation failed.
    #[error(transparent)]
    Media(#[from] goggles_av::Error),

    /// The report could not be written.
    #[error("Failed to write report {}: {source}", path.display())]
    Report {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a missing-input error.
    pub fn source_not_found(kind: &'static str, path: impl Into<PathBuf>) -> Self {
        Self::SourceNotFound {
            kind,
            path: path.into(),
        }
    }

    /// Create a stage failure.
    pub fn stage(stage: &'static str, message: impl Into<String>) -> Self {
        Self::Stage {
            stage,
            message: message.into(),
        }
    }
}
