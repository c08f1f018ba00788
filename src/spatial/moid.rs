//! Per-frame movable-object-ID pixel layer.
//!
//! Rebuilt at the start of every simulation tick from each body's atom
//! silhouette; travel reads it to detect body-versus-body hits.

/// Movable object id. 0 means "no body here"; real ids start at 1.
pub type MoId = u32;

pub const NO_MOID: MoId = 0;

pub struct MoidLayer {
    width: u32,
    height: u32,
    ids: Vec<MoId>,
}

impl MoidLayer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ids: vec![NO_MOID; (width as usize) * (height as usize)],
        }
    }

    #[inline]
    pub fn in_bounds(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && (x as u32) < self.width && (y as u32) < self.height
    }

    /// Id registered at a pixel; outside the scene there is no body.
    #[inline]
    pub fn get(&self, x: i32, y: i32) -> MoId {
        if !self.in_bounds(x, y) {
            return NO_MOID;
        }
        self.ids[(y as u32 * self.width + x as u32) as usize]
    }

    #[inline]
    pub fn set(&mut self, x: i32, y: i32, id: MoId) {
        if !self.in_bounds(x, y) {
            return;
        }
        self.ids[(y as u32 * self.width + x as u32) as usize] = id;
    }

    /// Wipe the layer for the next frame.
    pub fn clear(&mut self) {
        self.ids.fill(NO_MOID);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clear_resets_every_pixel() {
        let mut layer = MoidLayer::new(4, 4);
        layer.set(1, 1, 7);
        assert_eq!(layer.get(1, 1), 7);
        layer.clear();
        assert_eq!(layer.get(1, 1), NO_MOID);
    }
}
