use anyhow::{bail, Result};

use crate::rect::{Corner, CornerRect, PixelRect};

/// Default distance in pixels from each frame corner to its sample square.
pub const DEFAULT_OFFSET: u32 = 5;
/// Default side length in pixels of each sample square.
pub const DEFAULT_SIZE: u32 = 3;

/// Placement of the four calibration sample squares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplingGeometry {
    /// `O`: distance from the corner to the square's origin.
    pub offset: u32,
    /// `S`: side length of the square.
    pub size: u32,
}

impl Default for SamplingGeometry {
    fn default() -> Self {
        Self {
            offset: DEFAULT_OFFSET,
            size: DEFAULT_SIZE,
        }
    }
}

/// The four calibration squares resolved for one frame size.
///
/// The names are the roles the rotation formula assigns them, not their
/// on-screen positions: `center` is the top-right square.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalibrationRegions {
    /// Bottom-left.
    pub sample: PixelRect,
    /// Top-left.
    pub left: PixelRect,
    /// Bottom-right.
    pub right: PixelRect,
    /// Top-right.
    pub center: PixelRect,
}

impl SamplingGeometry {
    fn at(self, corner: Corner) -> CornerRect {
        CornerRect {
            corner,
            offset: self.offset,
            size: self.size,
        }
    }

    /// Resolve the squares for a frame, failing if any of them would leave the frame.
    pub fn regions(self, frame_width: u32, frame_height: u32) -> Result<CalibrationRegions> {
        if self.size == 0 {
            bail!("sample size must be >= 1");
        }
        if self.offset < self.size {
            bail!(
                "sample offset ({}) must be >= sample size ({})",
                self.offset,
                self.size
            );
        }

        let regions = CalibrationRegions {
            sample: self.at(Corner::BottomLeft).to_pixel_rect(frame_width, frame_height),
            left: self.at(Corner::TopLeft).to_pixel_rect(frame_width, frame_height),
            right: self.at(Corner::BottomRight).to_pixel_rect(frame_width, frame_height),
            center: self.at(Corner::TopRight).to_pixel_rect(frame_width, frame_height),
        };

        for (name, rect) in regions.named() {
            if !rect.fits_within(frame_width, frame_height) {
                bail!(
                    "{name} sample region {rect:?} does not fit in a {frame_width}x{frame_height} frame"
                );
            }
        }

        Ok(regions)
    }
}

impl CalibrationRegions {
    pub fn named(&self) -> [(&'static str, PixelRect); 4] {
        [
            ("sample", self.sample),
            ("left", self.left),
            ("right", self.right),
            ("center", self.center),
        ]
    }
}
