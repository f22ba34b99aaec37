use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};

use anyhow::{bail, Context, Result};
use image::RgbImage;
use tracing::{debug, error, info, warn};

use super::frame::{Frame, VideoInfo};
use super::probe::probe;
use super::FrameSource;

/// Reads a video as a stream of RGB24 frames, decoded by an ffmpeg child process.
///
/// The frame geometry comes from ffprobe before ffmpeg is spawned, so every
/// read is exactly `width * height * 3` bytes.
pub struct VideoDecoder {
    child: Child,
    path: PathBuf,
    info: VideoInfo,
    decoded: u32,
}

impl VideoDecoder {
    pub fn open(ffmpeg: &str, ffprobe: &str, path: &Path) -> Result<Self> {
        if !path.exists() {
            bail!("video file does not exist: {}", path.display());
        }

        let info = probe(ffprobe, path)?;

        info!(?path, "spawning ffmpeg decoder process");

        let child = Command::new(ffmpeg)
            .args(["-v", "error", "-i"])
            .arg(path)
            .args([
                "-f", "rawvideo",
                "-pix_fmt", "rgb24",
                "pipe:1",
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| format!("failed to spawn {ffmpeg}, is ffmpeg installed?"))?;

        debug!(?info, frame_bytes = info.frame_bytes(), "frame source ready");

        Ok(Self {
            child,
            path: path.to_path_buf(),
            info,
            decoded: 0,
        })
    }
}

impl FrameSource for VideoDecoder {
    fn info(&self) -> &VideoInfo {
        &self.info
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let frame_bytes = self.info.frame_bytes();
        let stdout = self
            .child
            .stdout
            .as_mut()
            .context("ffmpeg stdout not available")?;

        let mut buf = vec![0u8; frame_bytes];
        let mut read = 0;

        while read < frame_bytes {
            match stdout.read(&mut buf[read..]) {
                Ok(0) => {
                    if read == 0 {
                        debug!(decoded = self.decoded, "end of stream");
                        return Ok(None);
                    }
                    error!(
                        read_bytes = read,
                        expected_bytes = frame_bytes,
                        frame_number = self.decoded,
                        "truncated frame at end of stream"
                    );
                    bail!("truncated frame {}: got {read} of {frame_bytes} bytes", self.decoded);
                }
                Ok(n) => read += n,
                Err(e) => {
                    error!(frame_number = self.decoded, error = %e, "decoder pipe read failed");
                    return Err(e).with_context(|| {
                        format!("failed to read frame {} from ffmpeg", self.decoded)
                    });
                }
            }
        }

        let image = RgbImage::from_raw(self.info.width, self.info.height, buf)
            .context("decoded buffer does not match the probed frame size")?;

        let frame = Frame::at(image, self.decoded, self.info.fps);
        self.decoded += 1;

        debug!(frame_number = frame.frame_number, "frame decoded");

        Ok(Some(frame))
    }
}

impl Drop for VideoDecoder {
    fn drop(&mut self) {
        if let Ok(None) = self.child.try_wait() {
            if self.decoded < self.info.frame_count {
                warn!(
                    path = ?self.path,
                    decoded = self.decoded,
                    expected = self.info.frame_count,
                    "stopping decoder before end of stream"
                );
            }
            let _ = self.child.kill();
        }
        let _ = self.child.wait();
        info!(path = ?self.path, decoded = self.decoded, "frame source closed");
    }
}
