use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::thread::JoinHandle;

use anyhow::{bail, Context, Result};
use image::RgbImage;
use tracing::{debug, error, info, warn};

use super::FrameSink;

/// Encodes frames by piping raw RGB24 data into the ffmpeg CLI.
///
/// Output is MPEG-4 Part 2 (`mp4v`) with no audio track, at exactly the
/// rate it was opened with: one input frame becomes one output frame.
pub struct VideoEncoder {
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stderr_task: Option<JoinHandle<String>>,
    path: PathBuf,
    width: u32,
    height: u32,
    frames_written: u32,
}

impl VideoEncoder {
    pub fn create(ffmpeg: &str, path: &Path, width: u32, height: u32, fps: f64) -> Result<Self> {
        if width == 0 || height == 0 {
            bail!("invalid output dimensions: {width}x{height}");
        }
        if fps.is_nan() || fps <= 0.0 {
            bail!("invalid output frame rate: {fps}");
        }

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create output directory {}", parent.display())
            })?;
        }

        info!(?path, width, height, fps, "spawning ffmpeg encoder process");

        let size = format!("{width}x{height}");
        let rate = fps.to_string();

        let mut child = Command::new(ffmpeg)
            .args([
                "-v", "error",
                "-f", "rawvideo",
                "-pix_fmt", "rgb24",
                "-s", size.as_str(),
                "-r", rate.as_str(),
                "-i", "pipe:0",
                "-an",
                "-c:v", "mpeg4",
                "-q:v", "2",
                "-pix_fmt", "yuv420p",
                "-y",
            ])
            .arg(path)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("failed to spawn {ffmpeg}, is ffmpeg installed?"))?;

        let stdin = child.stdin.take().context("ffmpeg stdin not available")?;
        let stderr_task = child.stderr.take().map(|mut stderr| {
            std::thread::spawn(move || {
                let mut output = String::new();
                let _ = stderr.read_to_string(&mut output);
                output
            })
        });

        Ok(Self {
            child: Some(child),
            stdin: Some(stdin),
            stderr_task,
            path: path.to_path_buf(),
            width,
            height,
            frames_written: 0,
        })
    }

    fn collect_stderr(&mut self) -> String {
        self.stderr_task
            .take()
            .and_then(|task| task.join().ok())
            .unwrap_or_default()
    }
}

impl FrameSink for VideoEncoder {
    fn write_frame(&mut self, image: &RgbImage) -> Result<()> {
        if image.dimensions() != (self.width, self.height) {
            bail!(
                "frame is {}x{} but encoder was opened at {}x{}",
                image.width(),
                image.height(),
                self.width,
                self.height
            );
        }

        let stdin = self.stdin.as_mut().context("encoder already finished")?;
        if let Err(e) = stdin.write_all(image.as_raw()) {
            error!(frame = self.frames_written, %e, "failed to write to ffmpeg pipe");
            let stderr = self.collect_stderr();
            return Err(e).with_context(|| {
                format!("failed to write frame to ffmpeg: {}", stderr.trim())
            });
        }

        self.frames_written += 1;
        debug!(frames_written = self.frames_written, "encoded frame");
        Ok(())
    }

    fn finish(mut self: Box<Self>) -> Result<u32> {
        // Closing stdin is what tells ffmpeg the stream is over.
        drop(self.stdin.take());

        let mut child = self.child.take().context("encoder already finished")?;
        let status = child.wait().context("failed to wait on ffmpeg encoder")?;
        let stderr = self.collect_stderr();

        if !status.success() {
            error!(%status, stderr = stderr.trim(), path = ?self.path, "ffmpeg encoder failed");
            bail!("ffmpeg encoder exited with {status}: {}", stderr.trim());
        }

        info!(
            frames_written = self.frames_written,
            path = ?self.path,
            "video encoder finished"
        );
        Ok(self.frames_written)
    }
}

impl Drop for VideoEncoder {
    fn drop(&mut self) {
        drop(self.stdin.take());
        if let Some(mut child) = self.child.take() {
            warn!(
                frames_written = self.frames_written,
                path = ?self.path,
                "encoder dropped before finish, killing ffmpeg"
            );
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}
