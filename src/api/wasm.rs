//! JS-facing facade over `SimulationCore`.
//!
//! Thin delegation only; everything here must stay callable from a worker
//! without touching the DOM.

use wasm_bindgen::prelude::*;

use crate::core::math::Vec2;
use crate::domain::sprite::SpriteFrame;
use crate::simulation::SimulationCore;

#[wasm_bindgen]
pub struct TravelPerf {
    segments: u32,
    steps: f64,
    hits: u32,
}

#[wasm_bindgen]
impl TravelPerf {
    #[wasm_bindgen(getter)]
    pub fn segments(&self) -> u32 {
        self.segments
    }
    #[wasm_bindgen(getter)]
    pub fn steps(&self) -> f64 {
        self.steps
    }
    #[wasm_bindgen(getter)]
    pub fn hits(&self) -> u32 {
        self.hits
    }
}

#[wasm_bindgen]
pub struct World {
    core: SimulationCore,
}

#[wasm_bindgen]
impl World {
    /// Create a new scene with the given pixel dimensions.
    #[wasm_bindgen(constructor)]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            core: SimulationCore::new(width, height),
        }
    }

    #[wasm_bindgen(getter)]
    pub fn width(&self) -> u32 {
        self.core.width()
    }

    #[wasm_bindgen(getter)]
    pub fn height(&self) -> u32 {
        self.core.height()
    }

    #[wasm_bindgen(getter)]
    pub fn frame(&self) -> f64 {
        self.core.frame() as f64
    }

    #[wasm_bindgen(getter)]
    pub fn body_count(&self) -> u32 {
        self.core.body_count() as u32
    }

    pub fn set_gravity(&mut self, x: f32, y: f32) {
        self.core.set_gravity(x, y);
    }

    pub fn set_wrap_x(&mut self, wrap: bool) {
        self.core.set_wrap_x(wrap);
    }

    /// Replace the material table from a JSON bundle.
    pub fn load_material_bundle_json(&mut self, json: &str) -> Result<(), JsValue> {
        self.core
            .load_material_bundle_json(json)
            .map_err(|e| JsValue::from_str(&e.to_string()))
    }

    // === TERRAIN ===

    pub fn fill_terrain_rect(&mut self, x: i32, y: i32, w: u32, h: u32, material: u8) {
        self.core
            .scene_mut()
            .terrain_mut()
            .fill_rect(x, y, w as i32, h as i32, material);
    }

    pub fn clear_terrain_rect(&mut self, x: i32, y: i32, w: u32, h: u32) {
        self.core
            .scene_mut()
            .terrain_mut()
            .fill_rect(x, y, w as i32, h as i32, crate::domain::materials::MAT_AIR);
    }

    pub fn get_terrain_material(&self, x: i32, y: i32) -> u8 {
        self.core.scene().get_terr_material(x, y)
    }

    // === BODIES ===

    /// Spawn a body from a one-byte-per-pixel sprite mask (non-zero =
    /// opaque). Returns the new body's id.
    #[allow(clippy::too_many_arguments)]
    pub fn spawn_body(
        &mut self,
        sprite: &[u8],
        sprite_width: u32,
        sprite_height: u32,
        material: u8,
        resolution: u32,
        depth: u32,
        mass: f32,
        x: f32,
        y: f32,
    ) -> Result<u32, JsValue> {
        if sprite.len() != (sprite_width as usize) * (sprite_height as usize) {
            return Err(JsValue::from_str("sprite buffer does not match dimensions"));
        }
        let frame = SpriteFrame::from_bytes(sprite_width, sprite_height, sprite);
        self.core
            .spawn_body(frame, material, resolution, depth, mass, Vec2::new(x, y))
            .map_err(|e| JsValue::from_str(&e.to_string()))
    }

    pub fn remove_body(&mut self, id: u32) -> bool {
        self.core.remove_body(id)
    }

    pub fn body_x(&self, id: u32) -> f32 {
        self.core
            .body(id)
            .map_or(f32::NAN, |b| b.kinematics().pos.x)
    }

    pub fn body_y(&self, id: u32) -> f32 {
        self.core
            .body(id)
            .map_or(f32::NAN, |b| b.kinematics().pos.y)
    }

    pub fn body_angle(&self, id: u32) -> f32 {
        self.core.body(id).map_or(f32::NAN, |b| b.kinematics().angle)
    }

    pub fn set_body_velocity(&mut self, id: u32, vx: f32, vy: f32) -> bool {
        match self.core.body_mut(id) {
            Some(body) => {
                body.set_velocity(Vec2::new(vx, vy));
                true
            }
            None => false,
        }
    }

    pub fn set_body_pinned(&mut self, id: u32, pinned: bool) -> bool {
        match self.core.body_mut(id) {
            Some(body) => {
                body.set_pinned(pinned);
                true
            }
            None => false,
        }
    }

    // === FRAME LOOP ===

    pub fn step(&mut self, dt: f32) {
        self.core.step(dt);
    }

    /// Travel counters since the last call; reading resets them.
    pub fn take_travel_perf(&self) -> TravelPerf {
        let stats = self.core.take_travel_stats();
        TravelPerf {
            segments: stats.segments,
            steps: stats.steps as f64,
            hits: stats.hits,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::materials::{MAT_AIR, MAT_STONE};

    #[test]
    fn terrain_rect_round_trips_through_the_facade() {
        let mut world = World::new(64, 64);
        world.fill_terrain_rect(10, 10, 4, 4, MAT_STONE);
        assert_eq!(world.get_terrain_material(11, 11), MAT_STONE);
        assert_eq!(world.get_terrain_material(14, 14), MAT_AIR);
        world.clear_terrain_rect(10, 10, 4, 4);
        assert_eq!(world.get_terrain_material(11, 11), MAT_AIR);
    }
}
