//! External tool detection and management.
//!
//! The [`ToolRegistry`] discovers and caches the locations of the external
//! CLI tools the pipeline shells out to (ffmpeg, ffprobe and the optional
//! iZotope Ozone mastering tool) and provides lookup methods for the rest of
//! the crate.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::command::{ToolCommand, DEFAULT_TIMEOUT};
use crate::error::{Error, Result};

/// Known tool names that the registry manages.
pub const KNOWN_TOOLS: &[&str] = &["ffmpeg", "ffprobe", "ozone"];

/// Tools the pipeline cannot run without.
pub const REQUIRED_TOOLS: &[&str] = &["ffmpeg", "ffprobe"];

/// Where Ozone 11 lands when installed with the vendor installer.
const OZONE_INSTALL_PATHS: &[&str] = &[
    "/Applications/iZotope Ozone 11.app/Contents/MacOS/iZotope Ozone 11",
    "C:\\Program Files\\iZotope\\Ozone 11\\Ozone.exe",
    "C:\\Program Files (x86)\\iZotope\\Ozone 11\\Ozone.exe",
];

/// User-facing tool overrides, usually the `[tools]` section of the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub ffmpeg_path: Option<PathBuf>,
    pub ffprobe_path: Option<PathBuf>,
    pub ozone_path: Option<PathBuf>,
    /// Upper bound for any single tool invocation, in seconds.
    pub timeout_secs: u64,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: None,
            ffprobe_path: None,
            ozone_path: None,
            timeout_secs: DEFAULT_TIMEOUT.as_secs(),
        }
    }
}

/// Configuration for a single discovered tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolConfig {
    /// Human-readable tool name (e.g. "ffmpeg").
    pub name: String,
    /// Resolved path to the executable.
    pub path: PathBuf,
    /// Maximum execution time before the tool is killed.
    #[serde(with = "duration_secs")]
    pub timeout: Duration,
}

impl ToolConfig {
    /// Start a [`ToolCommand`] for this tool with its timeout applied.
    pub fn command(&self) -> ToolCommand {
        let mut cmd = ToolCommand::new(self.path.clone());
        cmd.timeout(self.timeout);
        cmd
    }
}

/// Serde helpers to (de)serialize `Duration` as whole seconds.
mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

/// Availability information for a tool, returned by [`ToolRegistry::check_all`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInfo {
    /// Tool name.
    pub name: String,
    /// Whether the tool was found.
    pub available: bool,
    /// Whether the pipeline needs this tool to run at all.
    pub required: bool,
    /// Version string (first line of `-version` output), if available.
    pub version: Option<String>,
    /// Resolved path to the executable.
    pub path: Option<PathBuf>,
}

/// Registry holding discovered tool configurations.
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, ToolConfig>,
}

impl ToolRegistry {
    /// Discover tools by searching `PATH` (or using overrides from config).
    ///
    /// For ffmpeg and ffprobe, a configured path is used when it exists,
    /// otherwise [`which::which`] locates the tool in `PATH`. Ozone is looked
    /// up at its configured path and then at its usual install locations.
    /// Tools that are not found are omitted from the registry.
    pub fn discover(config: &ToolsConfig) -> Self {
        let timeout = Duration::from_secs(config.timeout_secs.max(1));
        let mut tools = HashMap::new();

        for &name in KNOWN_TOOLS {
            let resolved = match name {
                "ffmpeg" => resolve_on_path(name, config.ffmpeg_path.as_deref()),
                "ffprobe" => resolve_on_path(name, config.ffprobe_path.as_deref()),
                "ozone" => resolve_ozone(config.ozone_path.as_deref()),
                _ => None,
            };

            match resolved {
                Some(path) => {
                    tracing::debug!("found {} at {}", name, path.display());
                    tools.insert(
                        name.to_string(),
                        ToolConfig {
                            name: name.to_string(),
                            path,
                            timeout,
                        },
                    );
                }
                None => tracing::debug!("{} not found", name),
            }
        }

        Self { tools }
    }

    /// Build a registry from explicit tool entries, bypassing discovery.
    pub fn from_tools(entries: impl IntoIterator<Item = ToolConfig>) -> Self {
        Self {
            tools: entries.into_iter().map(|t| (t.name.clone(), t)).collect(),
        }
    }

    /// Return the [`ToolConfig`] for the given tool, or
    /// [`Error::ToolNotFound`] if it was not found during discovery.
    pub fn require(&self, name: &str) -> Result<&ToolConfig> {
        self.tools.get(name).ok_or_else(|| Error::tool_not_found(name))
    }

    /// Look up a tool without treating its absence as an error.
    pub fn get(&self, name: &str) -> Option<&ToolConfig> {
        self.tools.get(name)
    }

    /// Whether every tool in [`REQUIRED_TOOLS`] was found.
    pub fn has_required(&self) -> bool {
        REQUIRED_TOOLS.iter().all(|name| self.tools.contains_key(*name))
    }

    /// Check all known tools and return availability information.
    pub fn check_all(&self) -> Vec<ToolInfo> {
        KNOWN_TOOLS
            .iter()
            .map(|&name| {
                let required = REQUIRED_TOOLS.contains(&name);
                match self.tools.get(name) {
                    Some(cfg) => ToolInfo {
                        name: name.to_string(),
                        available: true,
                        required,
                        version: detect_version(name, &cfg.path),
                        path: Some(cfg.path.clone()),
                    },
                    None => ToolInfo {
                        name: name.to_string(),
                        available: false,
                        required,
                        version: None,
                        path: None,
                    },
                }
            })
            .collect()
    }
}

fn resolve_on_path(name: &str, custom: Option<&Path>) -> Option<PathBuf> {
    match custom {
        Some(p) if p.exists() => Some(p.to_path_buf()),
        Some(p) => {
            tracing::warn!(
                "configured {} path {} does not exist; searching PATH",
                name,
                p.display()
            );
            which::which(name).ok()
        }
        None => which::which(name).ok(),
    }
}

fn resolve_ozone(custom: Option<&Path>) -> Option<PathBuf> {
    if let Some(p) = custom.filter(|p| p.exists()) {
        return Some(p.to_path_buf());
    }
    OZONE_INSTALL_PATHS
        .iter()
        .map(Path::new)
        .find(|p| p.exists())
        .map(Path::to_path_buf)
}

/// Run `<tool> -version` and return the first line of stdout.
///
/// Ozone has no version flag, so it is reported without one.
fn detect_version(name: &str, path: &Path) -> Option<String> {
    if name == "ozone" {
        return None;
    }

    let output = std::process::Command::new(path)
        .arg("-version")
        .output()
        .ok()?;

    if !output.status.success() {
        return None;
    }

    String::from_utf8_lossy(&output.stdout)
        .lines()
        .next()
        .map(|s| s.to_string())
}
