//! Silhouette bitmaps that atom auto-generation samples.

/// Read-only opaque/transparent mask of one sprite frame.
///
/// Row-major, `true` = opaque. The sprite's geometric center is the origin
/// atoms are offset from.
#[derive(Clone, Debug)]
pub struct SpriteFrame {
    width: u32,
    height: u32,
    mask: Vec<bool>,
}

impl SpriteFrame {
    /// Build from a row-major mask. Panics if the mask length does not match
    /// the dimensions; that is a caller bug, not a runtime condition.
    pub fn from_mask(width: u32, height: u32, mask: Vec<bool>) -> Self {
        assert_eq!(
            mask.len(),
            (width as usize) * (height as usize),
            "sprite mask does not match dimensions"
        );
        Self { width, height, mask }
    }

    /// Build from packed bytes where any non-zero byte is opaque (the layout
    /// JS hands over: one byte per pixel).
    pub fn from_bytes(width: u32, height: u32, bytes: &[u8]) -> Self {
        Self::from_mask(width, height, bytes.iter().map(|&b| b != 0).collect())
    }

    /// Fully opaque rectangle, handy for blunt test bodies.
    pub fn filled(width: u32, height: u32) -> Self {
        Self::from_mask(width, height, vec![true; (width * height) as usize])
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn in_bounds(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && (x as u32) < self.width && (y as u32) < self.height
    }

    /// Opaque test; out-of-bounds reads as transparent.
    #[inline]
    pub fn is_opaque(&self, x: i32, y: i32) -> bool {
        if !self.in_bounds(x, y) {
            return false;
        }
        self.mask[(y as u32 * self.width + x as u32) as usize]
    }

    /// Geometric center in sprite coordinates.
    pub fn center(&self) -> (i32, i32) {
        ((self.width / 2) as i32, (self.height / 2) as i32)
    }
}
