use image::{Rgb, RgbImage};

use crate::video::frame::Frame;

/// Fill for output pixels whose source lies outside the frame.
pub const BACKGROUND: Rgb<u8> = Rgb([0, 0, 0]);

/// Rotate a frame about its center by `angle_degrees` (positive = counter-clockwise on screen).
///
/// The output keeps the input dimensions. The input frame is left untouched.
pub fn correct(frame: &Frame, angle_degrees: f64) -> Frame {
    frame.with_image(rotate_about_center(&frame.image, angle_degrees))
}

/// Rigid rotation about `(width / 2, height / 2)` with bilinear resampling.
///
/// Each output pixel is mapped back into the source. Taps that fall outside the
/// source contribute [`BACKGROUND`], so edges fade into the fill instead of
/// being cut off hard.
pub fn rotate_about_center(image: &RgbImage, angle_degrees: f64) -> RgbImage {
    let (width, height) = image.dimensions();
    let cx = width as f64 / 2.0;
    let cy = height as f64 / 2.0;

    let theta = angle_degrees.to_radians();
    let (sin, cos) = theta.sin_cos();

    // Forward map is p' = R (p - c) + c with R = [[cos, sin], [-sin, cos]]
    // in y-down pixel coordinates; sample through its inverse.
    RgbImage::from_fn(width, height, |x, y| {
        let dx = x as f64 - cx;
        let dy = y as f64 - cy;
        let sx = cos * dx - sin * dy + cx;
        let sy = sin * dx + cos * dy + cy;
        sample_bilinear(image, sx, sy)
    })
}

fn sample_bilinear(image: &RgbImage, x: f64, y: f64) -> Rgb<u8> {
    if !x.is_finite() || !y.is_finite() {
        return BACKGROUND;
    }

    let x0 = x.floor();
    let y0 = y.floor();
    let fx = x - x0;
    let fy = y - y0;

    let taps = [
        (x0, y0, (1.0 - fx) * (1.0 - fy)),
        (x0 + 1.0, y0, fx * (1.0 - fy)),
        (x0, y0 + 1.0, (1.0 - fx) * fy),
        (x0 + 1.0, y0 + 1.0, fx * fy),
    ];

    let mut acc = [0.0f64; 3];
    for (tx, ty, weight) in taps {
        if weight == 0.0 {
            continue;
        }
        let pixel = tap(image, tx, ty);
        for (a, channel) in acc.iter_mut().zip(pixel.0) {
            *a += weight * channel as f64;
        }
    }

    Rgb(acc.map(|v| v.round().clamp(0.0, 255.0) as u8))
}

fn tap(image: &RgbImage, x: f64, y: f64) -> Rgb<u8> {
    if x < 0.0 || y < 0.0 || x >= image.width() as f64 || y >= image.height() as f64 {
        return BACKGROUND;
    }
    *image.get_pixel(x as u32, y as u32)
}
