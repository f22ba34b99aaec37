use image::Rgb;
use tracing::{debug, info};

use crate::analysis::common::{mean_color, ColorSample};
use crate::analysis::{AngleEstimator, DebugRegion, MarkerSamples};
use crate::config::regions::CalibrationRegions;
use crate::video::frame::Frame;

/// Added to every raw angle. Also the raw result when the reference length is zero.
pub const OFFSET_DEGREE: f64 = 180.0;

/// Rotation in degrees encoded by the four marker colors, already negated for the corrector.
///
/// `left`..`center` is the reference length. The distance from `sample` to `center`
/// relative to it gives the magnitude, and whichever of `left`/`right` is closer to
/// `sample` gives the direction. A zero reference length yields `-OFFSET_DEGREE`.
/// Non-finite colors are not filtered and propagate into the result.
pub fn compute_rotation(
    left: ColorSample,
    right: ColorSample,
    center: ColorSample,
    sample: ColorSample,
) -> f64 {
    let center_dist = center.distance(sample);
    let left_length = left.distance(center);
    let left_dist = left.distance(sample);
    let right_dist = right.distance(sample);

    let dir = if left_dist < right_dist { -1.0 } else { 1.0 };

    let angle = if left_length == 0.0 {
        OFFSET_DEGREE
    } else {
        (center_dist - left_length) / left_length * 180.0 * dir + OFFSET_DEGREE
    };

    debug!(
        center_dist,
        left_length, left_dist, right_dist, dir, angle, "rotation components"
    );

    -angle
}

/// Estimates rotation from the four fixed corner markers.
pub struct CornerMarkerEstimator {
    regions: CalibrationRegions,
}

impl CornerMarkerEstimator {
    pub fn new(regions: CalibrationRegions) -> Self {
        info!(?regions, "corner marker estimator initialized");
        Self { regions }
    }

    pub fn sample(&self, frame: &Frame) -> MarkerSamples {
        MarkerSamples {
            sample: mean_color(&frame.image, self.regions.sample),
            left: mean_color(&frame.image, self.regions.left),
            right: mean_color(&frame.image, self.regions.right),
            center: mean_color(&frame.image, self.regions.center),
        }
    }
}

impl AngleEstimator for CornerMarkerEstimator {
    fn estimate(&self, frame: &Frame) -> f64 {
        let s = self.sample(frame);

        debug!(
            frame_number = frame.frame_number,
            sample = %s.sample,
            left = %s.left,
            right = %s.right,
            center = %s.center,
            "marker colors"
        );

        compute_rotation(s.left, s.right, s.center, s.sample)
    }

    fn debug_regions(&self) -> Vec<DebugRegion> {
        vec![
            DebugRegion {
                rect: self.regions.sample,
                color: Rgb([255, 255, 0]),
            },
            DebugRegion {
                rect: self.regions.left,
                color: Rgb([0, 255, 0]),
            },
            DebugRegion {
                rect: self.regions.right,
                color: Rgb([0, 100, 255]),
            },
            DebugRegion {
                rect: self.regions.center,
                color: Rgb([255, 0, 255]),
            },
        ]
    }
}

#[cfg(test)]
mod tests {
    use image::RgbImage;
    use tracing_test::traced_test;

    use super::*;
    use crate::config::regions::SamplingGeometry;
    use crate::rect::PixelRect;

    fn c(r: f64, g: f64, b: f64) -> ColorSample {
        ColorSample([r, g, b])
    }

    fn paint(image: &mut RgbImage, rect: PixelRect, color: [u8; 3]) {
        for y in rect.y..rect.bottom() {
            for x in rect.x..rect.right() {
                image.put_pixel(x, y, Rgb(color));
            }
        }
    }

    /// A 64x48 frame with each marker square filled with the given color.
    fn marker_frame(sample: [u8; 3], left: [u8; 3], right: [u8; 3], center: [u8; 3]) -> Frame {
        let regions = SamplingGeometry::default().regions(64, 48).unwrap();
        let mut image = RgbImage::from_pixel(64, 48, Rgb([40, 40, 40]));
        paint(&mut image, regions.sample, sample);
        paint(&mut image, regions.left, left);
        paint(&mut image, regions.right, right);
        paint(&mut image, regions.center, center);
        Frame::at(image, 0, 60.0)
    }

    #[test]
    fn zero_reference_length_falls_back_to_offset() {
        let left = c(10.0, 20.0, 30.0);
        let angle = compute_rotation(left, c(200.0, 0.0, 0.0), left, c(0.0, 0.0, 0.0));
        assert_eq!(angle, -OFFSET_DEGREE);
        assert_eq!(angle, -180.0);
    }

    #[test]
    fn center_dist_equal_to_reference_gives_offset() {
        // centerDist = leftLength = 100, so the fraction term vanishes.
        let sample = c(0.0, 0.0, 0.0);
        let left = c(100.0, 100.0, 0.0);
        let center = c(100.0, 0.0, 0.0);
        let right = c(0.0, 0.0, 255.0);
        let angle = compute_rotation(left, right, center, sample);
        assert_eq!(angle, -180.0);
    }

    #[test]
    fn known_values() {
        // centerDist = 50, leftLength = 100, leftDist = 100 < rightDist = 200 => dir = -1.
        let sample = c(0.0, 0.0, 0.0);
        let center = c(50.0, 0.0, 0.0);
        let left = c(50.0, 100.0, 0.0);
        let right = c(200.0, 0.0, 0.0);
        let left_dist = left.distance(sample);
        assert!(left_dist < 200.0);

        let left_length = 100.0;
        let expected = -((50.0 - left_length) / left_length * 180.0 * -1.0 + 180.0);
        let angle = compute_rotation(left, right, center, sample);
        assert_eq!(angle, expected);
        assert_eq!(angle, -270.0);
    }

    #[test]
    fn swapping_left_and_right_flips_direction() {
        let sample = c(0.0, 0.0, 0.0);
        let center = c(30.0, 0.0, 0.0);
        let a = c(0.0, 40.0, 0.0);
        let b = c(0.0, 0.0, 200.0);

        // Only the side distances change when left and right swap, so compare
        // the signed offset from the fallback angle for the same reference length.
        let left_length = a.distance(center);
        let center_dist = center.distance(sample);
        let magnitude = (center_dist - left_length) / left_length * 180.0;

        let near_left = compute_rotation(a, b, center, sample);
        assert_eq!(near_left, -(magnitude * -1.0 + OFFSET_DEGREE));

        // Swap which side is closer to `sample` while keeping the reference length.
        let far_left = c(0.0, 40.0, 0.0);
        let near_right = c(0.0, 10.0, 0.0);
        let swapped = compute_rotation(far_left, near_right, center, sample);
        assert_eq!(swapped, -(magnitude + OFFSET_DEGREE));
        assert_eq!(near_left + OFFSET_DEGREE, -(swapped + OFFSET_DEGREE));
    }

    #[test]
    fn equal_side_distances_choose_positive_direction() {
        let sample = c(0.0, 0.0, 0.0);
        let center = c(10.0, 0.0, 0.0);
        let left = c(0.0, 10.0, 0.0);
        let right = c(0.0, 0.0, 10.0);
        // leftLength = sqrt(200), centerDist = 10, dir = +1.
        let left_length = 200f64.sqrt();
        let expected = -((10.0 - left_length) / left_length * 180.0 + 180.0);
        assert_eq!(compute_rotation(left, right, center, sample), expected);
    }

    #[test]
    fn sample_on_center_is_unclamped() {
        // centerDist = 0 makes the raw angle 180 - 180 * dir, i.e. a full turn when dir = -1.
        let sample = c(50.0, 50.0, 50.0);
        let left = c(0.0, 0.0, 0.0);
        let right = c(255.0, 255.0, 255.0);
        let angle = compute_rotation(left, right, sample, sample);
        assert_eq!(angle, -360.0);
    }

    #[test]
    fn non_finite_colors_propagate() {
        let nan = c(f64::NAN, 0.0, 0.0);
        let angle = compute_rotation(c(1.0, 0.0, 0.0), c(2.0, 0.0, 0.0), nan, c(0.0, 0.0, 0.0));
        assert!(angle.is_nan());
    }

    #[test]
    #[traced_test]
    fn estimate_reads_marker_squares() {
        let frame = marker_frame([0, 0, 0], [50, 100, 0], [200, 0, 0], [50, 0, 0]);
        let regions = SamplingGeometry::default().regions(64, 48).unwrap();
        let estimator = CornerMarkerEstimator::new(regions);
        assert_eq!(estimator.estimate(&frame), -270.0);
        assert!(logs_contain("marker colors"));
    }

    #[test]
    fn estimate_is_deterministic() {
        let frame = marker_frame([12, 34, 56], [200, 10, 10], [10, 200, 10], [10, 10, 200]);
        let regions = SamplingGeometry::default().regions(64, 48).unwrap();
        let estimator = CornerMarkerEstimator::new(regions);
        let first = estimator.estimate(&frame);
        for _ in 0..5 {
            assert_eq!(estimator.estimate(&frame).to_bits(), first.to_bits());
        }
    }

    #[test]
    fn estimate_degenerate_frame_is_minus_offset() {
        let frame = marker_frame([0, 0, 0], [90, 90, 90], [255, 0, 0], [90, 90, 90]);
        let regions = SamplingGeometry::default().regions(64, 48).unwrap();
        let estimator = CornerMarkerEstimator::new(regions);
        assert_eq!(estimator.estimate(&frame), -180.0);
    }

    #[test]
    fn estimate_swapped_side_markers_negate_offset_from_fallback() {
        let regions = SamplingGeometry::default().regions(64, 48).unwrap();
        let estimator = CornerMarkerEstimator::new(regions);

        // left and right have equal distance to center so leftLength is unchanged by the swap.
        let original = marker_frame([0, 0, 0], [0, 40, 0], [0, 0, 40], [30, 0, 0]);
        let swapped = marker_frame([0, 0, 0], [0, 0, 40], [0, 40, 0], [30, 0, 0]);
        let a = estimator.estimate(&original) + OFFSET_DEGREE;
        let b = estimator.estimate(&swapped) + OFFSET_DEGREE;
        // Equal side distances pick +1 both ways; perturb to make one side nearer.
        assert_eq!(a, b);

        let near_left = marker_frame([0, 0, 0], [0, 40, 0], [0, 0, 41], [30, 0, 0]);
        let near_right = marker_frame([0, 0, 0], [0, 0, 41], [0, 40, 0], [30, 0, 0]);
        let l = estimator.estimate(&near_left) + OFFSET_DEGREE;
        let r = estimator.estimate(&near_right) + OFFSET_DEGREE;
        assert!(l != 0.0);
        assert!(r != 0.0);
        assert_eq!(l.signum(), -r.signum());
    }
}
