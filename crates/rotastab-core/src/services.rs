use std::path::Path;
use std::process::{Command, Stdio};

use anyhow::{bail, Context, Result};
use tracing::{error, info};

use crate::video::decoder::VideoDecoder;
use crate::video::encoder::VideoEncoder;
use crate::video::frame::VideoInfo;
use crate::video::probe::{probe, probe_duration};
use crate::video::{FrameSink, FrameSource, MediaIo};

/// Resamples a video to a constant frame rate, copying audio unchanged.
pub trait NormalizeService {
    fn normalize(&self, input: &Path, output: &Path, fps: f64) -> Result<()>;
}

/// Combines a silent video with the audio track of another file.
pub trait MuxService {
    fn mux(&self, video: &Path, audio_source: &Path, output: &Path) -> Result<()>;
}

/// Reports a container's duration. Diagnostics only.
pub trait DurationProbe {
    fn duration(&self, path: &Path) -> Result<f64>;
}

/// Every external collaborator, backed by the ffmpeg and ffprobe executables.
#[derive(Debug, Clone)]
pub struct FfmpegTools {
    pub ffmpeg: String,
    pub ffprobe: String,
}

impl Default for FfmpegTools {
    fn default() -> Self {
        Self {
            ffmpeg: "ffmpeg".to_string(),
            ffprobe: "ffprobe".to_string(),
        }
    }
}

impl FfmpegTools {
    /// Run an ffmpeg invocation to completion, failing with its stderr on a non-zero exit.
    fn run(&self, what: &str, cmd: &mut Command) -> Result<()> {
        let result = cmd
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .with_context(|| format!("failed to run {}, is ffmpeg installed?", self.ffmpeg))?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            error!(what, status = %result.status, stderr = stderr.trim(), "ffmpeg failed");
            bail!("{what} failed ({}): {}", result.status, stderr.trim());
        }

        info!(what, "ffmpeg finished");
        Ok(())
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.ffmpeg);
        cmd.args(["-v", "error", "-y"]);
        cmd
    }
}

impl NormalizeService for FfmpegTools {
    fn normalize(&self, input: &Path, output: &Path, fps: f64) -> Result<()> {
        if !input.exists() {
            bail!("input video does not exist: {}", input.display());
        }

        info!(?input, ?output, fps, "normalizing to constant frame rate");

        let filter = format!("fps={fps}");
        let mut cmd = self.command();
        cmd.arg("-i")
            .arg(input)
            .args(["-vf", filter.as_str(), "-c:a", "copy"])
            .arg(output);
        self.run("frame rate normalization", &mut cmd)
    }
}

impl MuxService for FfmpegTools {
    fn mux(&self, video: &Path, audio_source: &Path, output: &Path) -> Result<()> {
        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }

        info!(?video, ?audio_source, ?output, "muxing audio");

        // The trailing `?` keeps sources without an audio track from failing the mux.
        let mut cmd = self.command();
        cmd.arg("-i")
            .arg(video)
            .arg("-i")
            .arg(audio_source)
            .args([
                "-map", "0:v:0",
                "-map", "1:a:0?",
                "-c:v", "copy",
                "-c:a", "aac",
            ])
            .arg(output);
        self.run("audio mux", &mut cmd)
    }
}

impl DurationProbe for FfmpegTools {
    fn duration(&self, path: &Path) -> Result<f64> {
        probe_duration(&self.ffprobe, path)
    }
}

impl MediaIo for FfmpegTools {
    fn probe(&self, path: &Path) -> Result<VideoInfo> {
        if !path.exists() {
            bail!("video file does not exist: {}", path.display());
        }
        probe(&self.ffprobe, path)
    }

    fn open_source(&self, path: &Path) -> Result<Box<dyn FrameSource>> {
        Ok(Box::new(VideoDecoder::open(&self.ffmpeg, &self.ffprobe, path)?))
    }

    fn open_sink(
        &self,
        path: &Path,
        width: u32,
        height: u32,
        fps: f64,
    ) -> Result<Box<dyn FrameSink>> {
        Ok(Box::new(VideoEncoder::create(
            &self.ffmpeg,
            path,
            width,
            height,
            fps,
        )?))
    }
}
