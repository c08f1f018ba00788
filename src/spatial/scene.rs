//! The scene context handed into every travel call.
//!
//! Bundles the terrain grid, the per-frame MOID layer, the material
//! registry, edge wrap and the coarse scene lock, so the physics core never
//! touches hidden global state and can run against a plain in-memory scene
//! in tests.

use std::sync::Arc;

use crate::core::math::Vec2;
use crate::domain::materials::{MaterialId, MaterialRegistry, MAT_AIR};

use super::moid::{MoId, MoidLayer, NO_MOID};
use super::raycast::DdaRay;
use super::terrain::Terrain;

pub struct Scene {
    terrain: Terrain,
    moid_layer: MoidLayer,
    materials: Arc<MaterialRegistry>,
    wrap_x: bool,
    locked: bool,
}

impl Scene {
    pub fn new(width: u32, height: u32, materials: Arc<MaterialRegistry>) -> Self {
        Self {
            terrain: Terrain::new(width, height),
            moid_layer: MoidLayer::new(width, height),
            materials,
            wrap_x: false,
            locked: false,
        }
    }

    pub fn width(&self) -> u32 {
        self.terrain.width()
    }

    pub fn height(&self) -> u32 {
        self.terrain.height()
    }

    pub fn set_wrap_x(&mut self, wrap: bool) {
        self.wrap_x = wrap;
    }

    pub fn materials(&self) -> &MaterialRegistry {
        &self.materials
    }

    pub fn set_materials(&mut self, materials: Arc<MaterialRegistry>) {
        self.materials = materials;
    }

    pub fn terrain(&self) -> &Terrain {
        &self.terrain
    }

    pub fn terrain_mut(&mut self) -> &mut Terrain {
        &mut self.terrain
    }

    pub fn moid_layer(&self) -> &MoidLayer {
        &self.moid_layer
    }

    pub fn moid_layer_mut(&mut self) -> &mut MoidLayer {
        &mut self.moid_layer
    }

    // === LOCKING ===

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Run `f` with the scene lock held. When `pre_locked` is true the
    /// caller already holds the lock and the bracket is skipped; otherwise
    /// the lock is taken for the duration of `f` and released on every exit
    /// path out of it.
    pub fn with_lock<R>(&mut self, pre_locked: bool, f: impl FnOnce(&mut Scene) -> R) -> R {
        if pre_locked {
            debug_assert!(self.locked, "scene_pre_locked without holding the lock");
            return f(self);
        }
        self.locked = true;
        let out = f(self);
        self.locked = false;
        out
    }

    // === WRAP ===

    /// Apply scene edge wrap to a position in place; returns whether the
    /// position wrapped.
    pub fn wrap_position(&self, pos: &mut Vec2) -> bool {
        if !self.wrap_x {
            return false;
        }
        let w = self.width() as f32;
        if pos.x < 0.0 {
            pos.x += w;
            true
        } else if pos.x >= w {
            pos.x -= w;
            true
        } else {
            false
        }
    }

    // === TERRAIN QUERIES ===

    #[inline]
    pub fn get_terr_material(&self, x: i32, y: i32) -> MaterialId {
        self.terrain.get_material(x, y)
    }

    #[inline]
    pub fn terr_is_solid(&self, x: i32, y: i32) -> bool {
        self.terrain.is_solid(x, y)
    }

    /// Would an impulse of this magnitude (kg*m/s) punch through the pixel?
    pub fn will_penetrate(&self, x: i32, y: i32, impulse_mag: f32) -> bool {
        let mat = self.terrain.get_material(x, y);
        if mat == MAT_AIR {
            return true;
        }
        impulse_mag >= self.materials.strength(mat)
    }

    /// Carry out a penetration: knocks the pixel out and returns the
    /// fraction of the colliding velocity the material absorbs. `None` when
    /// the terrain holds. Requires the scene lock.
    pub fn try_penetrate(&mut self, x: i32, y: i32, impulse_mag: f32) -> Option<f32> {
        debug_assert!(self.locked, "terrain mutation outside the scene lock");
        let mat = self.terrain.get_material(x, y);
        if mat == MAT_AIR {
            return Some(0.0);
        }
        let strength = self.materials.strength(mat);
        if impulse_mag < strength {
            return None;
        }
        self.terrain.set_material(x, y, MAT_AIR);
        Some((strength / impulse_mag).clamp(0.0, 1.0))
    }

    // === MOID QUERIES ===

    #[inline]
    pub fn get_moid_pixel(&self, x: i32, y: i32) -> MoId {
        self.moid_layer.get(x, y)
    }

    // === RAY CASTS ===

    /// Distance to the first pixel of `target` material along the ray.
    pub fn cast_material_ray(&self, start: Vec2, ray: Vec2, target: MaterialId) -> Option<f32> {
        for (x, y) in DdaRay::new(start, ray) {
            if self.terrain.get_material(x, y) == target {
                return Some(pixel_distance(start, x, y));
            }
        }
        None
    }

    /// Distance to the first pixel whose material strength is at or below
    /// `max_strength` - the nearest spot weak enough to escape into.
    pub fn cast_weakness_ray(&self, start: Vec2, ray: Vec2, max_strength: f32) -> Option<f32> {
        for (x, y) in DdaRay::new(start, ray) {
            let mat = self.terrain.get_material(x, y);
            if mat == MAT_AIR || self.materials.strength(mat) <= max_strength {
                return Some(pixel_distance(start, x, y));
            }
        }
        None
    }

    /// First registered body pixel along the ray, skipping `ignore`.
    pub fn cast_find_mo_ray(&self, start: Vec2, ray: Vec2, ignore: MoId) -> Option<(MoId, f32)> {
        for (x, y) in DdaRay::new(start, ray) {
            let id = self.moid_layer.get(x, y);
            if id != NO_MOID && id != ignore {
                return Some((id, pixel_distance(start, x, y)));
            }
        }
        None
    }

    /// Distance to the first pixel no longer registered to `moid` - how far
    /// an embedded atom must move to clear that body's silhouette.
    pub fn cast_mo_exit_ray(&self, start: Vec2, ray: Vec2, moid: MoId) -> Option<f32> {
        for (x, y) in DdaRay::new(start, ray) {
            if self.moid_layer.get(x, y) != moid {
                return Some(pixel_distance(start, x, y));
            }
        }
        None
    }
}

#[inline]
fn pixel_distance(start: Vec2, x: i32, y: i32) -> f32 {
    (Vec2::new(x as f32 + 0.5, y as f32 + 0.5) - start).length()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::materials::{MAT_EARTH, MAT_STONE};

    fn scene_64() -> Scene {
        Scene::new(64, 64, Arc::new(MaterialRegistry::from_builtin()))
    }

    #[test]
    fn will_penetrate_compares_against_material_strength() {
        let mut scene = scene_64();
        scene.terrain_mut().set_material(10, 10, MAT_EARTH);
        assert!(scene.will_penetrate(10, 10, 100.0));
        assert!(!scene.will_penetrate(10, 10, 1.0));
        // air always "penetrates"
        assert!(scene.will_penetrate(0, 0, 0.0));
    }

    #[test]
    fn try_penetrate_digs_the_pixel_out() {
        let mut scene = scene_64();
        scene.terrain_mut().set_material(5, 5, MAT_EARTH);
        let retardation = scene.with_lock(false, |s| s.try_penetrate(5, 5, 100.0));
        assert!(retardation.is_some());
        assert!(!scene.terr_is_solid(5, 5));
    }

    #[test]
    fn try_penetrate_holds_on_strong_terrain() {
        let mut scene = scene_64();
        scene.terrain_mut().set_material(5, 5, MAT_STONE);
        let retardation = scene.with_lock(false, |s| s.try_penetrate(5, 5, 10.0));
        assert!(retardation.is_none());
        assert!(scene.terr_is_solid(5, 5));
    }

    #[test]
    fn wrap_position_only_when_enabled() {
        let mut scene = scene_64();
        let mut pos = Vec2::new(-3.0, 10.0);
        assert!(!scene.wrap_position(&mut pos));
        scene.set_wrap_x(true);
        assert!(scene.wrap_position(&mut pos));
        assert_eq!(pos.x, 61.0);
    }

    #[test]
    fn weakness_ray_finds_first_clear_pixel() {
        let mut scene = scene_64();
        scene.terrain_mut().fill_rect(10, 0, 5, 64, MAT_STONE);
        // cast from inside the wall to the right: exits at x=15
        let d = scene
            .cast_weakness_ray(Vec2::new(12.5, 10.5), Vec2::new(20.0, 0.0), 1.0)
            .unwrap();
        assert!((d - 3.0).abs() < 0.6, "distance {d} should be about 3px");
    }
}
