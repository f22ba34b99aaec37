pub mod common;
pub mod rotation;

use image::Rgb;

use crate::rect::PixelRect;
use crate::video::frame::Frame;

pub use common::ColorSample;
pub use rotation::{compute_rotation, CornerMarkerEstimator, OFFSET_DEGREE};

/// Mean colors of the four calibration squares for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarkerSamples {
    pub sample: ColorSample,
    pub left: ColorSample,
    pub right: ColorSample,
    pub center: ColorSample,
}

/// A region to draw on debug frames.
pub struct DebugRegion {
    pub rect: PixelRect,
    pub color: Rgb<u8>,
}

/// Reads the rotation a frame was rendered with.
pub trait AngleEstimator {
    /// Rotation in degrees that cancels the frame's rotation when applied by the corrector.
    fn estimate(&self, frame: &Frame) -> f64;

    /// Return the regions to draw on debug frames.
    fn debug_regions(&self) -> Vec<DebugRegion>;
}
