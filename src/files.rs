//! Input discovery and validation.
//!
//! Directory listings are non-recursive and sorted by file name, so batch
//! job order is reproducible across runs.

use std::path::{Path, PathBuf};

use regex::Regex;
use walkdir::WalkDir;

use crate::error::{Error, Result};

pub const AUDIO_EXTENSIONS: &[&str] = &["wav", "mp3", "flac", "aac", "m4a", "ogg"];
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "tiff", "tif"];

/// Files smaller than this are treated as truncated or placeholder media.
pub const MIN_MEDIA_FILE_SIZE: u64 = 1024;

/// Compile a shell-style file-name pattern into an anchored regex.
///
/// Supports `*`, `?` and bracket classes (`[abc]`, `[a-z]`, `[!abc]`). An
/// unterminated `[` matches itself.
pub fn glob_to_regex(pattern: &str) -> Result<Regex> {
    let chars: Vec<char> = pattern.chars().collect();
    let mut re = String::with_capacity(pattern.len() * 2 + 2);
    re.push('^');

    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '*' => re.push_str(".*"),
            '?' => re.push('.'),
            '[' => match class_end(&chars, i) {
                Some(end) => {
                    let mut body = &chars[i + 1..end];
                    re.push('[');
                    if let Some((&('!' | '^'), rest)) = body.split_first() {
                        re.push('^');
                        body = rest;
                    }
                    for &c in body {
                        if matches!(c, '\\' | '[' | ']' | '&' | '~' | '^') {
                            re.push('\\');
                        }
                        re.push(c);
                    }
                    re.push(']');
                    i = end;
                }
                None => re.push_str(r"\["),
            },
            c => re.push_str(&regex::escape(c.encode_utf8(&mut [0; 4]))),
        }
        i += 1;
    }
    re.push('$');

    Regex::new(&re).map_err(|e| Error::InvalidPattern {
        pattern: pattern.to_string(),
        message: e.to_string(),
    })
}

/// Index of the `]` closing the class opened at `open`. A `]` directly after
/// the opening bracket (or its negation) is literal.
fn class_end(chars: &[char], open: usize) -> Option<usize> {
    let mut j = open + 1;
    if matches!(chars.get(j), Some(&('!' | '^'))) {
        j += 1;
    }
    if chars.get(j) == Some(&']') {
        j += 1;
    }
    chars[j.min(chars.len())..]
        .iter()
        .position(|&c| c == ']')
        .map(|p| p + j)
}

/// Regular files directly inside `dir` whose name matches `pattern`, in
/// lexicographic order.
pub fn list_matching(dir: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(Error::source_not_found("directory", dir));
    }
    let matcher = glob_to_regex(pattern)?;

    let mut matches = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| Error::Io { source: e.into() })?;
        if !entry.path().is_file() {
            continue;
        }
        if matcher.is_match(&entry.file_name().to_string_lossy()) {
            matches.push(entry.into_path());
        }
    }
    Ok(matches)
}

fn validate_media_file(path: &Path, kind: &'static str, extensions: &[&str]) -> Result<()> {
    if !path.exists() {
        return Err(Error::source_not_found(kind, path));
    }

    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    if !extensions.contains(&ext.as_str()) {
        return Err(Error::InvalidFile {
            kind,
            path: path.to_path_buf(),
            reason: format!("unsupported extension {ext:?}"),
        });
    }

    let size = std::fs::metadata(path)?.len();
    if size < MIN_MEDIA_FILE_SIZE {
        return Err(Error::InvalidFile {
            kind,
            path: path.to_path_buf(),
            reason: format!("only {size} bytes"),
        });
    }
    Ok(())
}

/// Check that `path` exists, has an audio extension and is not trivially small.
pub fn validate_audio_file(path: &Path) -> Result<()> {
    validate_media_file(path, "audio file", AUDIO_EXTENSIONS)
}

/// Check that `path` exists, has an image extension and is not trivially small.
pub fn validate_image_file(path: &Path) -> Result<()> {
    validate_media_file(path, "image file", IMAGE_EXTENSIONS)
}

/// Valid audio files in `dir` matching `pattern`. Invalid matches are logged
/// and skipped.
pub fn find_audio_files(dir: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    let candidates = list_matching(dir, pattern)?;
    let valid: Vec<PathBuf> = candidates
        .into_iter()
        .filter(|path| match validate_audio_file(path) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Skipping {}", e);
                false
            }
        })
        .collect();

    tracing::info!("Found {} valid audio files in {:?}", valid.len(), dir);
    Ok(valid)
}

/// Human-readable size, e.g. `450.0 KB`, `1.2 GB`.
pub fn format_file_size(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    const GB: f64 = MB * 1024.0;

    let b = bytes as f64;
    if b < KB {
        format!("{bytes} B")
    } else if b < MB {
        format!("{:.1} KB", b / KB)
    } else if b < GB {
        format!("{:.1} MB", b / MB)
    } else {
        format!("{:.1} GB", b / GB)
    }
}

/// `M:SS` or `H:MM:SS`.
pub fn format_duration(seconds: f64) -> String {
    if seconds < 0.0 {
        return "0:00".to_string();
    }
    let total = seconds as u64;
    let (hours, minutes, secs) = (total / 3600, (total % 3600) / 60, total % 60);
    if hours > 0 {
        format!("{hours}:{minutes:02}:{secs:02}")
    } else {
        format!("{minutes}:{secs:02}")
    }
}
