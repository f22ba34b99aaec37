use std::path::{Path, PathBuf};

use ab_glyph::{FontVec, PxScale};
use anyhow::{Context, Result};
use image::{imageops, Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use tracing::{debug, info, warn};

use crate::analysis::AngleEstimator;
use crate::video::frame::Frame;

/// Fonts tried in order when no font is configured.
const DEFAULT_FONT_PATHS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSansMono.ttf",
    "/usr/share/fonts/TTF/DejaVuSansMono.ttf",
    "C:\\Windows\\Fonts\\consola.ttf",
    "/System/Library/Fonts/Menlo.ttc",
];

const TEXT_SCALE: f32 = 28.0;
const TEXT_COLOR: Rgb<u8> = Rgb([255, 255, 255]);
const TEXT_LINE_HEIGHT: i32 = 30;

/// Sample squares are only a few pixels wide; outline them with some margin.
const REGION_MARGIN: u32 = 4;

/// Writes side-by-side images of a source frame (with the sample regions
/// outlined) and its corrected counterpart.
pub struct DebugRenderer {
    font: Option<FontVec>,
}

impl DebugRenderer {
    pub fn new(font_path: Option<&Path>) -> Self {
        let font = match font_path {
            Some(path) => Self::load_font(path),
            None => DEFAULT_FONT_PATHS
                .iter()
                .map(Path::new)
                .filter(|p| p.exists())
                .find_map(Self::load_font),
        };
        if font.is_none() {
            warn!("no debug font available, debug frames will have no text");
        }
        Self { font }
    }

    pub fn save_frame(
        &self,
        source: &Frame,
        corrected: &Frame,
        estimator: &dyn AngleEstimator,
        angle: f64,
        dir: &Path,
    ) -> Result<PathBuf> {
        let img = self.render(source, corrected, estimator, angle);

        let path = dir.join(format!("frame_{:08}.png", source.frame_number));
        img.save(&path)
            .with_context(|| format!("failed to save debug frame to {}", path.display()))?;

        debug!(?path, "saved debug frame");
        Ok(path)
    }

    fn render(
        &self,
        source: &Frame,
        corrected: &Frame,
        estimator: &dyn AngleEstimator,
        angle: f64,
    ) -> RgbImage {
        let (w, h) = source.image.dimensions();
        let mut canvas = RgbImage::new(w * 2, h);

        let mut left = source.image.clone();
        for region in estimator.debug_regions() {
            let x = region.rect.x.saturating_sub(REGION_MARGIN);
            let y = region.rect.y.saturating_sub(REGION_MARGIN);
            let rect = Rect::at(x as i32, y as i32).of_size(
                region.rect.w + 2 * REGION_MARGIN,
                region.rect.h + 2 * REGION_MARGIN,
            );
            draw_hollow_rect_mut(&mut left, rect, region.color);
        }

        imageops::replace(&mut canvas, &left, 0, 0);
        imageops::replace(&mut canvas, &corrected.image, w as i64, 0);

        if let Some(font) = &self.font {
            let scale = PxScale::from(TEXT_SCALE);
            let x = 20;
            let y = 20;
            let header = format!("F:{}", source.frame_number);
            draw_text_mut(&mut canvas, TEXT_COLOR, x, y, scale, font, &header);
            let angle_text = format!("angle:{angle:.2}");
            draw_text_mut(
                &mut canvas,
                TEXT_COLOR,
                x,
                y + TEXT_LINE_HEIGHT,
                scale,
                font,
                &angle_text,
            );
        }

        canvas
    }

    fn load_font(path: &Path) -> Option<FontVec> {
        let data = match std::fs::read(path) {
            Ok(data) => data,
            Err(e) => {
                warn!(?path, error = %e, "failed to read font file");
                return None;
            }
        };
        match FontVec::try_from_vec(data) {
            Ok(font) => {
                info!(?path, "loaded debug font");
                Some(font)
            }
            Err(e) => {
                warn!(?path, error = %e, "failed to parse font file");
                None
            }
        }
    }
}
