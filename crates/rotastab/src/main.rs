mod cli;

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{error, info, warn};

use rotastab_core::config::SamplingGeometry;
use rotastab_core::discovery::{self, VideoId};
use rotastab_core::pipeline::{error_chain, Collaborators, Pipeline, PipelineConfig, ProgressSink};
use rotastab_core::services::{DurationProbe, FfmpegTools};
use rotastab_core::video::MediaIo;

use cli::{StabilizeOptions, ToolOptions};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = cli::Cli::parse();

    match cli.command {
        cli::Command::Stabilize { input_dir, options } => {
            let videos = discovery::discover(&input_dir)?;
            if videos.is_empty() {
                warn!(?input_dir, "no input videos found");
            }
            stabilize_all(&input_dir, &videos, &options)
        }
        cli::Command::File { input, options } => {
            let video = VideoId::from_path(&input)
                .with_context(|| format!("not a video file name: {}", input.display()))?;
            let input_dir = input
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
            stabilize_all(&input_dir, &[video], &options)
        }
        cli::Command::Probe { input, tools } => {
            let tools = ffmpeg_tools(&tools);
            let meta = tools.probe(&input)?;
            let duration = tools.duration(&input)?;
            info!(
                ?input,
                width = meta.width,
                height = meta.height,
                fps = meta.fps,
                frame_count = meta.frame_count,
                duration_seconds = duration,
                "probe complete"
            );
            println!(
                "{}x{} @ {:.3} fps, {} frames, {:.3}s",
                meta.width, meta.height, meta.fps, meta.frame_count, duration
            );
            Ok(())
        }
    }
}

fn ffmpeg_tools(options: &ToolOptions) -> FfmpegTools {
    FfmpegTools {
        ffmpeg: options.ffmpeg.clone(),
        ffprobe: options.ffprobe.clone(),
    }
}

/// Run the pipeline for each video in turn. A failed video does not stop the batch.
fn stabilize_all(input_dir: &Path, videos: &[VideoId], options: &StabilizeOptions) -> Result<()> {
    let config = PipelineConfig {
        input_dir: input_dir.to_path_buf(),
        output_dir: options.output_dir.clone(),
        target_frame_rate: options.target_fps,
        sampling: SamplingGeometry {
            offset: options.offset,
            size: options.size,
        },
        debug_frames_dir: options.debug_frames.clone(),
        debug_every: options.debug_every,
        debug_font: options.debug_font.clone(),
        mux_audio: !options.no_audio,
    };
    info!(?config, videos = videos.len(), "starting stabilization");

    let tools = ffmpeg_tools(&options.tools);
    let collaborators = Collaborators {
        media: &tools,
        normalizer: &tools,
        muxer: &tools,
        duration_probe: Some(&tools),
    };

    let mut failed = Vec::new();
    for video in videos {
        let mut progress = LogProgress::new(video.file_name());
        let mut pipeline = Pipeline::new(&config, collaborators);
        match pipeline.run(video, &mut progress) {
            Ok(summary) => info!(
                video = video.file_name(),
                frames_written = summary.frames_written,
                frames_skipped = summary.frames_skipped,
                output = ?summary.final_path.as_ref().unwrap_or(&summary.stabilized_path),
                "video stabilized"
            ),
            Err(e) => {
                error!(video = video.file_name(), error = %error_chain(&e), "video failed");
                failed.push(video.file_name());
            }
        }
    }

    if !failed.is_empty() {
        bail!("{} of {} videos failed: {}", failed.len(), videos.len(), failed.join(", "));
    }
    info!(videos = videos.len(), "all videos stabilized");
    Ok(())
}

/// Logs processing progress at most once per whole percent.
struct LogProgress<'a> {
    video: &'a str,
    last_percent: Option<u32>,
    skipped: u32,
}

impl<'a> LogProgress<'a> {
    fn new(video: &'a str) -> Self {
        Self {
            video,
            last_percent: None,
            skipped: 0,
        }
    }
}

impl ProgressSink for LogProgress<'_> {
    fn on_frame(&mut self, processed: u32, total: u32) {
        let percent = (u64::from(processed) * 100 / u64::from(total.max(1))) as u32;
        if self.last_percent.is_some_and(|p| p >= percent) {
            return;
        }
        self.last_percent = Some(percent);
        info!(
            video = self.video,
            processed,
            total,
            percent,
            skipped = self.skipped,
            "progress"
        );
    }

    fn on_skipped(&mut self, _index: u32) {
        self.skipped += 1;
    }
}
