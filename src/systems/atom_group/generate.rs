//! Silhouette dotting: derive a group's atoms from a sprite mask.
//!
//! Scan lines sweep the sprite from all four sides, dropping an atom on the
//! first opaque pixel each one meets. With a positive depth the atoms sit
//! that many pixels inside the surface instead, so fast movers collide with
//! their meat rather than their paint.

use thiserror::Error;

use crate::core::math::Vec2;
use crate::domain::materials::MaterialId;
use crate::domain::sprite::SpriteFrame;
use crate::systems::atom::Atom;

use super::AtomGroup;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GenerateError {
    #[error("atom resolution must be at least 1")]
    ZeroResolution,
    #[error("sprite has no pixels to outline")]
    EmptySprite,
}

struct Dotter<'a> {
    sprite: &'a SpriteFrame,
    material: MaterialId,
    depth: i32,
    visited: Vec<bool>,
    atoms: Vec<Atom>,
}

impl<'a> Dotter<'a> {
    fn new(sprite: &'a SpriteFrame, material: MaterialId, depth: u32) -> Self {
        let size = (sprite.width() * sprite.height()) as usize;
        Self {
            sprite,
            material,
            depth: depth as i32,
            visited: vec![false; size],
            atoms: Vec::new(),
        }
    }

    /// Walk one scan line from `(x, y)` along `(dx, dy)` and place at most
    /// one atom on it.
    fn scan(&mut self, mut x: i32, mut y: i32, dx: i32, dy: i32) {
        // Find the surface first.
        while self.sprite.in_bounds(x, y) && !self.sprite.is_opaque(x, y) {
            x += dx;
            y += dy;
        }
        if !self.sprite.in_bounds(x, y) {
            return;
        }
        if self.depth == 0 {
            self.place(x, y, true);
            return;
        }
        // Sink inward; the candidate must have meat around it in every
        // direction so thin fringes do not collect interior atoms.
        x += dx * self.depth;
        y += dy * self.depth;
        while self.sprite.in_bounds(x, y) {
            if self.sprite.is_opaque(x, y)
                && self.sprite.is_opaque(x + dy * self.depth, y + dx * self.depth)
                && self.sprite.is_opaque(x - dy * self.depth, y - dx * self.depth)
            {
                self.place(x, y, false);
                return;
            }
            x += dx;
            y += dy;
        }
    }

    fn place(&mut self, x: i32, y: i32, on_surface: bool) {
        let idx = (y as u32 * self.sprite.width() + x as u32) as usize;
        if self.visited[idx] {
            return;
        }
        self.visited[idx] = true;

        let (cx, cy) = self.sprite.center();
        let offset = Vec2::new((x - cx) as f32, (y - cy) as f32);
        let normal = if on_surface {
            Atom::calculate_normal(self.sprite, x, y)
        } else {
            Vec2::zero()
        };
        self.atoms
            .push(Atom::new(offset, self.material, 0).with_normal(normal));
    }
}

impl AtomGroup {
    /// Generate a group by dotting the sprite's silhouette every
    /// `resolution` pixels, sunk `depth` pixels under the surface. A sprite
    /// with no opaque pixels yields the single fallback atom at the center.
    pub fn from_sprite(
        sprite: &SpriteFrame,
        material: MaterialId,
        resolution: u32,
        depth: u32,
    ) -> Result<Self, GenerateError> {
        if resolution == 0 {
            return Err(GenerateError::ZeroResolution);
        }
        if sprite.width() == 0 || sprite.height() == 0 {
            return Err(GenerateError::EmptySprite);
        }

        let w = sprite.width() as i32;
        let h = sprite.height() as i32;
        let mut dotter = Dotter::new(sprite, material, depth);

        let mut y = 0;
        while y < h {
            dotter.scan(0, y, 1, 0);
            dotter.scan(w - 1, y, -1, 0);
            y += resolution as i32;
        }
        let mut x = 0;
        while x < w {
            dotter.scan(x, 0, 0, 1);
            dotter.scan(x, h - 1, 0, -1);
            x += resolution as i32;
        }

        let mut atoms = dotter.atoms;
        if atoms.is_empty() {
            atoms.push(Atom::new(Vec2::zero(), material, 0));
        }

        let mut group = Self::from_atoms(atoms);
        group.resolution = resolution;
        group.depth = depth;
        Ok(group)
    }
}
