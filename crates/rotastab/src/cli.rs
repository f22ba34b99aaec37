use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "rotastab", about = "Rotation stabilizer for rhythm game recordings")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Stabilize every .mp4 in the input directory.
    Stabilize {
        /// Directory containing the source videos.
        #[arg(long, default_value = "videos")]
        input_dir: PathBuf,

        #[command(flatten)]
        options: StabilizeOptions,
    },

    /// Stabilize a single video file.
    File {
        /// Path to the input video file.
        #[arg(short, long)]
        input: PathBuf,

        #[command(flatten)]
        options: StabilizeOptions,
    },

    /// Print stream metadata for a video file.
    Probe {
        #[arg(short, long)]
        input: PathBuf,

        #[command(flatten)]
        tools: ToolOptions,
    },
}

#[derive(Args)]
pub struct StabilizeOptions {
    /// Directory to write corrected videos to.
    #[arg(short, long, default_value = "output")]
    pub output_dir: PathBuf,

    /// Normalize to this frame rate instead of the probed source rate.
    #[arg(long)]
    pub target_fps: Option<f64>,

    /// Distance of the sample squares from the frame edges, in pixels.
    #[arg(long, default_value_t = 5)]
    pub offset: u32,

    /// Side length of the sample squares, in pixels.
    #[arg(long, default_value_t = 3)]
    pub size: u32,

    /// Directory to save debug frames with the sample regions outlined.
    #[arg(long)]
    pub debug_frames: Option<PathBuf>,

    /// Save every Nth frame when --debug-frames is set.
    #[arg(long, default_value_t = 30)]
    pub debug_every: u32,

    /// TrueType font for debug frame text.
    #[arg(long)]
    pub debug_font: Option<PathBuf>,

    /// Skip attaching the source audio.
    #[arg(long)]
    pub no_audio: bool,

    #[command(flatten)]
    pub tools: ToolOptions,
}

#[derive(Args)]
pub struct ToolOptions {
    /// ffmpeg executable.
    #[arg(long, default_value = "ffmpeg")]
    pub ffmpeg: String,

    /// ffprobe executable.
    #[arg(long, default_value = "ffprobe")]
    pub ffprobe: String,
}
