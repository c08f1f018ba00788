//! Per-pixel terrain material grid.
//!
//! The destructible half of the world: travel reads materials per pixel and
//! successful penetrations knock pixels out.

use crate::domain::materials::{MaterialId, MAT_AIR};

pub struct Terrain {
    width: u32,
    height: u32,
    materials: Vec<MaterialId>,
}

impl Terrain {
    /// All-air terrain of the given size.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            materials: vec![MAT_AIR; (width as usize) * (height as usize)],
        }
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

    /// Material at a pixel; outside the scene reads as air.
    #[inline]
    pub fn get_material(&self, x: i32, y: i32) -> MaterialId {
        if !self.in_bounds(x, y) {
            return MAT_AIR;
        }
        self.materials[(y as u32 * self.width + x as u32) as usize]
    }

    #[inline]
    pub fn set_material(&mut self, x: i32, y: i32, mat: MaterialId) {
        if !self.in_bounds(x, y) {
            return;
        }
        self.materials[(y as u32 * self.width + x as u32) as usize] = mat;
    }

    #[inline]
    pub fn is_solid(&self, x: i32, y: i32) -> bool {
        self.get_material(x, y) != MAT_AIR
    }

    /// Fill an axis-aligned rectangle, clamped to the scene (brush-style
    /// world building).
    pub fn fill_rect(&mut self, x: i32, y: i32, w: i32, h: i32, mat: MaterialId) {
        for yy in y..y + h {
            for xx in x..x + w {
                self.set_material(xx, yy, mat);
            }
        }
    }
}
