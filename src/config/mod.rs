mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::Path;

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<WorkflowConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config = parse_config(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    validate_config(&config)?;

    Ok(config)
}

/// Parse configuration from TOML text without validating it
pub fn parse_config(content: &str) -> Result<WorkflowConfig> {
    Ok(toml::from_str(content)?)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<WorkflowConfig> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    let default_paths = [
        "./beer-goggles.toml",
        "./config.toml",
        "~/.config/beer-goggles/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            tracing::debug!("Using config file {:?}", path);
            return load_config(path);
        }
    }

    Ok(WorkflowConfig::default())
}

/// Validate configuration
pub fn validate_config(config: &WorkflowConfig) -> Result<()> {
    if config.max_concurrent_jobs == 0 {
        anyhow::bail!("max_concurrent_jobs must be at least 1");
    }

    if config.video_generation.fps == 0 {
        anyhow::bail!("video_generation.fps must be at least 1");
    }

    if config.tools.timeout_secs == 0 {
        anyhow::bail!("tools.timeout_secs must be at least 1");
    }

    // Surfaces the unsupported combination before any job runs.
    config.audio_mastering.encoder()?;

    let tool_paths = [
        ("ffmpeg", &config.tools.ffmpeg_path),
        ("ffprobe", &config.tools.ffprobe_path),
        ("ozone", &config.tools.ozone_path),
    ];
    for (name, path) in tool_paths {
        if let Some(path) = path {
            if !path.exists() {
                tracing::warn!("Configured {} path does not exist: {:?}", name, path);
            }
        }
    }

    Ok(())
}
