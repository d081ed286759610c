//! Duration probing via ffprobe.

use std::path::Path;

use crate::error::{Error, Result};
use crate::tools::ToolRegistry;

/// Return the container duration of `path` in seconds.
pub async fn probe_duration(tools: &ToolRegistry, path: &Path) -> Result<f64> {
    if !path.exists() {
        return Err(Error::file_not_found(path));
    }

    let ffprobe = tools.require("ffprobe")?;
    let output = ffprobe
        .command()
        .args([
            "-v",
            "quiet",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ])
        .arg(path.to_string_lossy().as_ref())
        .execute()
        .await?;

    parse_duration(&output.stdout)
}

/// Parse ffprobe's bare `format=duration` output.
pub fn parse_duration(stdout: &str) -> Result<f64> {
    let trimmed = stdout.trim();
    let secs: f64 = trimmed
        .parse()
        .map_err(|_| Error::parse_error("ffprobe", format!("not a duration: {trimmed:?}")))?;

    if !secs.is_finite() || secs < 0.0 {
        return Err(Error::parse_error("ffprobe", format!("invalid duration: {secs}")));
    }
    Ok(secs)
}
