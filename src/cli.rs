use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "beer-goggles")]
#[command(author, version, about = "Turn audio tracks and a cover image into platform-ready videos")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Also write logs to this file
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show supported platforms and external tool availability
    Info,

    /// Master a single audio file
    MasterAudio {
        /// Audio file to master
        audio: PathBuf,

        /// Where to write the mastered file
        output: PathBuf,

        /// Ozone preset name
        #[arg(long)]
        preset: Option<String>,

        /// Target integrated loudness in LUFS
        #[arg(long, allow_hyphen_values = true)]
        target_lufs: Option<f64>,

        /// Path to the Ozone executable
        #[arg(long)]
        ozone_path: Option<PathBuf>,
    },

    /// Render one video from an image and an audio file
    CreateVideo {
        /// Cover image
        image: PathBuf,

        /// Audio file (used as-is, not mastered)
        audio: PathBuf,

        /// Output video path
        output: PathBuf,

        /// Target platform
        #[arg(short, long)]
        platform: String,

        /// Aspect ratio (defaults to the platform's first)
        #[arg(short, long)]
        aspect_ratio: Option<String>,

        /// Video bitrate override, e.g. 2M
        #[arg(long)]
        video_bitrate: Option<String>,

        /// Audio bitrate, e.g. 192k
        #[arg(long)]
        audio_bitrate: Option<String>,

        /// Frames per second
        #[arg(long)]
        fps: Option<u32>,
    },

    /// Master every matching audio file and render it for each platform
    BatchProcess {
        /// Directory containing the audio files
        audio_dir: PathBuf,

        /// Cover image shared by every job
        image: PathBuf,

        /// Output directory
        output_dir: PathBuf,

        /// Target platforms
        #[arg(short, long, num_args = 1.., required = true)]
        platforms: Vec<String>,

        /// Glob selecting audio files in the directory
        #[arg(long, default_value = "*.wav")]
        audio_pattern: String,

        /// Maximum jobs processed at once (config value, 4 by default)
        #[arg(long)]
        max_jobs: Option<usize>,

        /// Reuse mastered audio left by a previous run
        #[arg(long)]
        resume: bool,

        /// Write a JSON report of the run to this path
        #[arg(long)]
        report_file: Option<PathBuf>,
    },

    /// Master every matching audio file in a directory
    BatchMaster {
        /// Directory containing the audio files
        audio_dir: PathBuf,

        /// Output directory
        output_dir: PathBuf,

        /// Glob selecting audio files in the directory
        #[arg(long, default_value = "*.wav")]
        audio_pattern: String,

        /// Ozone preset name
        #[arg(long)]
        preset: Option<String>,

        /// Target integrated loudness in LUFS
        #[arg(long, allow_hyphen_values = true)]
        target_lufs: Option<f64>,

        /// Path to the Ozone executable
        #[arg(long)]
        ozone_path: Option<PathBuf>,
    },
}
