use image::RgbImage;

/// A single decoded video frame with metadata.
#[derive(Debug, Clone)]
pub struct Frame {
    /// The frame's image data.
    pub image: RgbImage,
    /// Frame number from the start of the source (0-based).
    pub frame_number: u32,
    /// Elapsed seconds from the start of the source.
    pub timestamp_seconds: f64,
}

impl Frame {
    /// Build a frame whose timestamp is derived from its index and the stream rate.
    pub fn at(image: RgbImage, frame_number: u32, fps: f64) -> Self {
        let timestamp_seconds = if fps > 0.0 {
            frame_number as f64 / fps
        } else {
            0.0
        };
        Self {
            image,
            frame_number,
            timestamp_seconds,
        }
    }

    /// Same position in the stream, new pixels.
    pub fn with_image(&self, image: RgbImage) -> Self {
        Self {
            image,
            frame_number: self.frame_number,
            timestamp_seconds: self.timestamp_seconds,
        }
    }
}

/// Stream metadata, read once per input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoInfo {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    /// Number of video frames in the stream.
    pub frame_count: u32,
    pub duration_seconds: f64,
}

impl VideoInfo {
    /// Bytes in one packed RGB24 frame.
    pub fn frame_bytes(&self) -> usize {
        (self.width as usize) * (self.height as usize) * 3
    }
}
