/// A rectangle in absolute pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

impl PixelRect {
    /// Exclusive right edge.
    pub fn right(self) -> u32 {
        self.x + self.w
    }

    /// Exclusive bottom edge.
    pub fn bottom(self) -> u32 {
        self.y + self.h
    }

    /// True when the rect is non-empty and lies entirely inside a frame of the given size.
    pub fn fits_within(self, frame_width: u32, frame_height: u32) -> bool {
        self.w > 0 && self.h > 0 && self.right() <= frame_width && self.bottom() <= frame_height
    }
}

/// Frame corner a [`CornerRect`] is measured from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Corner {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

/// A square of `size` pixels whose origin sits `offset` pixels in from a frame corner.
///
/// The origin is always the square's top-left pixel, so a square anchored to a
/// bottom or right edge starts `offset` pixels before that edge and extends
/// `size` pixels back toward it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CornerRect {
    pub corner: Corner,
    pub offset: u32,
    pub size: u32,
}

impl CornerRect {
    pub fn to_pixel_rect(self, frame_width: u32, frame_height: u32) -> PixelRect {
        let near = self.offset;
        let far_x = frame_width.saturating_sub(self.offset);
        let far_y = frame_height.saturating_sub(self.offset);

        let (x, y) = match self.corner {
            Corner::TopLeft => (near, near),
            Corner::TopRight => (far_x, near),
            Corner::BottomLeft => (near, far_y),
            Corner::BottomRight => (far_x, far_y),
        };

        PixelRect {
            x,
            y,
            w: self.size,
            h: self.size,
        }
    }
}
