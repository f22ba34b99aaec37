pub mod decoder;
pub mod encoder;
pub mod frame;
pub mod probe;

use std::path::Path;

use anyhow::Result;
use image::RgbImage;

use frame::{Frame, VideoInfo};

/// A decoded stream that yields frames in decode order.
pub trait FrameSource {
    /// Metadata of the stream being decoded.
    fn info(&self) -> &VideoInfo;

    /// Next frame, or `None` once the stream has no more data.
    fn next_frame(&mut self) -> Result<Option<Frame>>;
}

/// An encoder that accepts frames of one fixed size.
pub trait FrameSink {
    fn write_frame(&mut self, image: &RgbImage) -> Result<()>;

    /// Flush and close the output, returning the number of frames written.
    fn finish(self: Box<Self>) -> Result<u32>;
}

/// Opens video files for reading and writing.
pub trait MediaIo {
    fn probe(&self, path: &Path) -> Result<VideoInfo>;

    fn open_source(&self, path: &Path) -> Result<Box<dyn FrameSource>>;

    fn open_sink(
        &self,
        path: &Path,
        width: u32,
        height: u32,
        fps: f64,
    ) -> Result<Box<dyn FrameSink>>;
}

/// One slot of a stream with a declared frame count.
#[derive(Debug)]
pub enum FrameRead {
    Decoded(Frame),
    /// The source had no frame for this slot, or failed to decode it.
    Missing {
        index: u32,
        error: Option<anyhow::Error>,
    },
}

/// Lazily pulls exactly `count` slots from `source`.
pub fn frames(source: &mut dyn FrameSource, count: u32) -> Frames<'_> {
    Frames {
        source,
        next: 0,
        count,
    }
}

pub struct Frames<'a> {
    source: &'a mut dyn FrameSource,
    next: u32,
    count: u32,
}

impl Iterator for Frames<'_> {
    type Item = FrameRead;

    fn next(&mut self) -> Option<FrameRead> {
        if self.next >= self.count {
            return None;
        }
        let index = self.next;
        self.next += 1;

        Some(match self.source.next_frame() {
            Ok(Some(frame)) => FrameRead::Decoded(frame),
            Ok(None) => FrameRead::Missing { index, error: None },
            Err(e) => FrameRead::Missing {
                index,
                error: Some(e),
            },
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.count - self.next) as usize;
        (remaining, Some(remaining))
    }
}
