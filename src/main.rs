mod cli;

use beer_goggles::{
    config::{self, WorkflowConfig},
    files, platforms, JobEvent, JobStatus, Orchestrator,
};
use goggles_av::{AspectRatio, ToolRegistry};

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = config::load_config_or_default(cli.config.as_deref())?;
    let log_file = cli.log_file.clone().or_else(|| config.log_file.clone());
    init_logging(cli.verbose, log_file.as_deref())?;

    match cli.command {
        Commands::Info => info(&config),
        Commands::MasterAudio {
            audio,
            output,
            preset,
            target_lufs,
            ozone_path,
        } => {
            let config = with_mastering_overrides(config, preset, target_lufs, ozone_path);
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(master_audio(&config, &audio, &output))
        }
        Commands::CreateVideo {
            image,
            audio,
            output,
            platform,
            aspect_ratio,
            video_bitrate,
            audio_bitrate,
            fps,
        } => {
            let mut config = config;
            if video_bitrate.is_some() {
                config.video_generation.video_bitrate = video_bitrate;
            }
            if let Some(bitrate) = audio_bitrate {
                config.video_generation.audio_bitrate = bitrate;
            }
            if let Some(fps) = fps {
                config.video_generation.fps = fps;
            }
            config::validate_config(&config)?;

            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(create_video(
                &config,
                &image,
                &audio,
                &output,
                &platform,
                aspect_ratio.as_deref(),
            ))
        }
        Commands::BatchProcess {
            audio_dir,
            image,
            output_dir,
            platforms,
            audio_pattern,
            max_jobs,
            resume,
            report_file,
        } => {
            let mut config = config;
            config.output_base_dir = output_dir;
            config.resume_on_failure = resume;
            if let Some(max_jobs) = max_jobs {
                config.max_concurrent_jobs = max_jobs;
            }
            config::validate_config(&config)?;

            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(batch_process(
                config,
                &audio_dir,
                &image,
                &platforms,
                &audio_pattern,
                report_file.as_deref(),
            ))
        }
        Commands::BatchMaster {
            audio_dir,
            output_dir,
            audio_pattern,
            preset,
            target_lufs,
            ozone_path,
        } => {
            let config = with_mastering_overrides(config, preset, target_lufs, ozone_path);
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(batch_master(&config, &audio_dir, &output_dir, &audio_pattern))
        }
    }
}

/// Console logging to stderr, plus an optional plain-text copy in `log_file`.
fn init_logging(verbose: bool, log_file: Option<&Path>) -> Result<()> {
    // Respect RUST_LOG if set, otherwise pick defaults from the verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if verbose {
            "beer_goggles=debug,goggles_av=debug".to_string()
        } else {
            "beer_goggles=info,goggles_av=info".to_string()
        }
    });

    let file_layer = match log_file {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create log directory: {:?}", parent))?;
            }
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file: {:?}", path))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(std::sync::Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(EnvFilter::new(env_filter))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();

    Ok(())
}

fn with_mastering_overrides(
    mut config: WorkflowConfig,
    preset: Option<String>,
    target_lufs: Option<f64>,
    ozone_path: Option<PathBuf>,
) -> WorkflowConfig {
    if let Some(preset) = preset {
        config.audio_mastering.preset_name = preset;
    }
    if let Some(lufs) = target_lufs {
        config.audio_mastering.target_lufs = lufs;
    }
    if ozone_path.is_some() {
        config.tools.ozone_path = ozone_path;
    }
    config
}

fn info(config: &WorkflowConfig) -> Result<()> {
    println!("Supported platforms:\n");
    println!(
        "{:<18} {:<20} {:<14} {}",
        "Platform", "Aspect Ratios", "Max Duration", "Max File Size"
    );
    for platform in platforms::all() {
        let ratios: Vec<&str> = platform.aspect_ratios.iter().map(AspectRatio::as_str).collect();
        let duration = format!(
            "{}m {}s",
            platform.max_duration_secs / 60,
            platform.max_duration_secs % 60
        );
        let size = files::format_file_size(u64::from(platform.max_file_size_mb) * 1024 * 1024);
        println!(
            "{:<18} {:<20} {:<14} {}",
            platform.name,
            ratios.join(", "),
            duration,
            size
        );
    }

    println!("\nExternal tools:\n");
    let tools = ToolRegistry::discover(&config.tools);
    let mut required_ok = true;
    for tool in tools.check_all() {
        let status = if tool.available {
            "✓"
        } else {
            if tool.required {
                required_ok = false;
            }
            "✗"
        };

        print!("{} {}", status, tool.name);
        if !tool.required {
            print!(" (optional)");
        }
        if let Some(ref version) = tool.version {
            print!(" ({})", version);
        }
        if let Some(ref path) = tool.path {
            print!(" - {}", path.display());
        }
        println!();
    }

    println!();
    if required_ok {
        println!("All required tools are available!");
    } else {
        println!("ffmpeg and ffprobe are required to render videos.");
    }

    Ok(())
}

async fn master_audio(config: &WorkflowConfig, audio: &Path, output: &Path) -> Result<()> {
    files::validate_audio_file(audio)?;

    let tools = ToolRegistry::discover(&config.tools);
    println!("Mastering {}...", audio.display());
    let backend = goggles_av::master_audio(&tools, audio, output, &config.audio_mastering)
        .await
        .context("Audio mastering failed")?;

    let size = std::fs::metadata(output).map(|m| m.len()).unwrap_or(0);
    println!(
        "✓ Audio mastered with {:?}: {} ({})",
        backend,
        output.display(),
        files::format_file_size(size)
    );
    Ok(())
}

async fn create_video(
    config: &WorkflowConfig,
    image: &Path,
    audio: &Path,
    output: &Path,
    platform: &str,
    aspect_ratio: Option<&str>,
) -> Result<()> {
    files::validate_image_file(image)?;
    files::validate_audio_file(audio)?;

    let platform = platforms::get_config(platform)?;
    let ratio = match aspect_ratio {
        Some(raw) => {
            let ratio: AspectRatio = raw.parse()?;
            if !platform.supports(ratio) {
                anyhow::bail!("Aspect ratio {} not supported by {}", ratio, platform.id);
            }
            ratio
        }
        None => *platform
            .aspect_ratios
            .first()
            .context("Platform has no aspect ratios")?,
    };

    let tools = ToolRegistry::discover(&config.tools);
    let target = platform.render_target(ratio)?;

    println!("Creating {} {} video...", platform.name, ratio);
    let video =
        goggles_av::render_video(&tools, &config.video_generation, &target, image, audio, output)
            .await
            .context("Video creation failed")?;

    println!(
        "✓ Video created: {} ({}, {})",
        video.path.display(),
        files::format_file_size(video.size_bytes),
        files::format_duration(video.duration_secs)
    );
    Ok(())
}

async fn batch_process(
    config: WorkflowConfig,
    audio_dir: &Path,
    image: &Path,
    platforms: &[String],
    audio_pattern: &str,
    report_file: Option<&Path>,
) -> Result<()> {
    files::validate_image_file(image)?;
    let platforms = platforms::normalize(platforms)?;

    let audio_files = files::find_audio_files(audio_dir, audio_pattern)?;
    if audio_files.is_empty() {
        anyhow::bail!(
            "No audio files found in {:?} matching {}",
            audio_dir,
            audio_pattern
        );
    }
    println!("Found {} audio files to process", audio_files.len());

    let orchestrator = Orchestrator::with_ffmpeg(config)?;
    for audio in &audio_files {
        orchestrator.add_job(audio, image, &platforms, None)?;
    }
    let total = audio_files.len();
    println!(
        "Added {} processing jobs for platforms: {}",
        total,
        platforms.join(", ")
    );

    let mut events = orchestrator.subscribe();
    let progress = tokio::spawn(async move {
        let mut done = 0;
        while done < total {
            match events.recv().await {
                Ok(event @ (JobEvent::Completed { .. } | JobEvent::Failed { .. })) => {
                    done += 1;
                    let mark = if matches!(event, JobEvent::Completed { .. }) { "✓" } else { "✗" };
                    println!("[{}/{}] {} {}", done, total, mark, event.job_id());
                }
                Ok(_) => {}
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!("Progress display skipped {} events", skipped);
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let counts = orchestrator.process_all_jobs().await;
    if tokio::time::timeout(Duration::from_secs(1), progress).await.is_err() {
        tracing::debug!("Progress display did not catch up");
    }

    println!("\nProcessing results:");
    for status in [
        JobStatus::Completed,
        JobStatus::Failed,
        JobStatus::Pending,
        JobStatus::Processing,
    ] {
        let count = counts.get(status);
        if count > 0 {
            println!("  {:<12} {}", status, count);
        }
    }

    let failed = orchestrator.get_failed_jobs();
    if !failed.is_empty() {
        println!("\nFailed jobs ({}):", failed.len());
        for job in &failed {
            println!("  • {}: {}", job.id(), job.error_message().unwrap_or("unknown error"));
        }
    }

    if let Some(path) = report_file {
        orchestrator.export_report(path)?;
        println!("Report exported to: {}", path.display());
    }

    if counts.failed > 0 {
        anyhow::bail!("{} of {} jobs failed", counts.failed, counts.total());
    }
    Ok(())
}

async fn batch_master(
    config: &WorkflowConfig,
    audio_dir: &Path,
    output_dir: &Path,
    audio_pattern: &str,
) -> Result<()> {
    let audio_files = files::find_audio_files(audio_dir, audio_pattern)?;
    if audio_files.is_empty() {
        anyhow::bail!(
            "No audio files found in {:?} matching {}",
            audio_dir,
            audio_pattern
        );
    }
    println!("Found {} audio files to master", audio_files.len());

    let tools = ToolRegistry::discover(&config.tools);
    let settings = &config.audio_mastering;
    let mut mastered = 0;

    for (i, audio) in audio_files.iter().enumerate() {
        let stem = audio
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| format!("track_{i}"));
        let output = output_dir.join(format!("{}_mastered.{}", stem, settings.output_format));

        match goggles_av::master_audio(&tools, audio, &output, settings).await {
            Ok(_) => {
                mastered += 1;
                println!("[{}/{}] ✓ {}", i + 1, audio_files.len(), output.display());
            }
            Err(e) => {
                tracing::error!("Failed to master {:?}: {}", audio, e);
                println!("[{}/{}] ✗ {}", i + 1, audio_files.len(), audio.display());
            }
        }
    }

    println!(
        "\nMastered {} out of {} files",
        mastered,
        audio_files.len()
    );
    if mastered < audio_files.len() {
        anyhow::bail!("{} files failed to master", audio_files.len() - mastered);
    }
    Ok(())
}
