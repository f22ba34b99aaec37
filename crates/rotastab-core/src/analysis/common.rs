use std::fmt::{self, Formatter};

use image::RgbImage;

use crate::rect::PixelRect;

/// Per-channel mean of the pixels inside a sample region.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorSample(pub [f64; 3]);

impl ColorSample {
    /// Euclidean distance in 3-channel color space.
    pub fn distance(self, other: ColorSample) -> f64 {
        self.0
            .iter()
            .zip(other.0.iter())
            .map(|(a, b)| (a - b) * (a - b))
            .sum::<f64>()
            .sqrt()
    }
}

impl fmt::Display for ColorSample {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let [r, g, b] = self.0;
        write!(f, "[R: {r:.1}, G: {g:.1}, B: {b:.1}]")
    }
}

/// Average color of `rect`. The rect must lie inside the image.
pub fn mean_color(image: &RgbImage, rect: PixelRect) -> ColorSample {
    assert!(
        rect.fits_within(image.width(), image.height()),
        "sample rect {rect:?} exceeds {}x{} image",
        image.width(),
        image.height()
    );

    let mut sum = [0u64; 3];
    for y in rect.y..rect.bottom() {
        for x in rect.x..rect.right() {
            let pixel = image.get_pixel(x, y);
            for (acc, channel) in sum.iter_mut().zip(pixel.0) {
                *acc += channel as u64;
            }
        }
    }

    let count = (rect.w as u64 * rect.h as u64) as f64;
    ColorSample(sum.map(|s| s as f64 / count))
}
