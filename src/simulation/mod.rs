//! Frame loop: owns the scene and every body, repaints the MOID layer and
//! runs each body's travel once per tick.

use std::sync::Arc;

use crate::core::math::Vec2;
use crate::domain::materials::{MaterialBundleError, MaterialId, MaterialRegistry};
use crate::domain::sprite::SpriteFrame;
use crate::spatial::moid::MoId;
use crate::spatial::scene::Scene;
use crate::systems::atom_group::perf::{self, TravelStats};
use crate::systems::atom_group::GenerateError;
use crate::systems::body::{Body, MoRegistry};

mod body;

pub use body::PixelBody;

pub struct SimulationCore {
    scene: Scene,
    materials: Arc<MaterialRegistry>,
    /// Slot per body; `None` marks a removed body (ids are never reused
    /// within a frame, so mid-frame lookups stay stable).
    bodies: Vec<Option<PixelBody>>,
    next_id: MoId,
    gravity: Vec2,
    frame: u64,
}

/// View over everyone except the body currently being updated (its slot is
/// taken out for the duration of its travel).
struct RegistryView<'a>(&'a mut [Option<PixelBody>]);

impl MoRegistry for RegistryView<'_> {
    fn body_mut(&mut self, id: MoId) -> Option<&mut dyn Body> {
        self.0
            .iter_mut()
            .flatten()
            .find(|b| b.moid() == id)
            .map(|b| b as &mut dyn Body)
    }
}

impl SimulationCore {
    pub fn new(width: u32, height: u32) -> Self {
        let materials = Arc::new(MaterialRegistry::from_builtin());
        Self {
            scene: Scene::new(width, height, Arc::clone(&materials)),
            materials,
            bodies: Vec::new(),
            next_id: 1,
            gravity: Vec2::new(0.0, 9.8),
            frame: 0,
        }
    }

    pub fn width(&self) -> u32 {
        self.scene.width()
    }

    pub fn height(&self) -> u32 {
        self.scene.height()
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn scene_mut(&mut self) -> &mut Scene {
        &mut self.scene
    }

    pub fn set_gravity(&mut self, x: f32, y: f32) {
        self.gravity = Vec2::new(x, y);
    }

    pub fn set_wrap_x(&mut self, wrap: bool) {
        self.scene.set_wrap_x(wrap);
    }

    /// Swap in a modded material table; terrain ids keep their meaning only
    /// as far as the new table defines them.
    pub fn load_material_bundle_json(&mut self, json: &str) -> Result<(), MaterialBundleError> {
        let registry = Arc::new(MaterialRegistry::from_bundle_json(json)?);
        self.materials = Arc::clone(&registry);
        self.scene.set_materials(registry);
        Ok(())
    }

    pub fn materials(&self) -> &MaterialRegistry {
        &self.materials
    }

    // === BODIES ===

    pub fn spawn_body(
        &mut self,
        sprite: SpriteFrame,
        material: MaterialId,
        resolution: u32,
        depth: u32,
        mass: f32,
        pos: Vec2,
    ) -> Result<MoId, GenerateError> {
        let moid = self.next_id;
        let body = PixelBody::new(
            moid,
            sprite,
            material,
            resolution,
            depth,
            mass,
            pos,
            &self.materials,
        )?;
        self.next_id += 1;
        self.bodies.push(Some(body));
        Ok(moid)
    }

    pub fn body(&self, moid: MoId) -> Option<&PixelBody> {
        self.bodies.iter().flatten().find(|b| b.moid() == moid)
    }

    pub fn body_mut(&mut self, moid: MoId) -> Option<&mut PixelBody> {
        self.bodies.iter_mut().flatten().find(|b| b.moid() == moid)
    }

    pub fn body_count(&self) -> usize {
        self.bodies.iter().flatten().count()
    }

    pub fn remove_body(&mut self, moid: MoId) -> bool {
        for slot in self.bodies.iter_mut() {
            if slot.as_ref().is_some_and(|b| b.moid() == moid) {
                *slot = None;
                return true;
            }
        }
        false
    }

    // === FRAME LOOP ===

    pub fn step(&mut self, dt: f32) {
        self.frame += 1;

        // Fresh MOID layer each tick, painted from current poses.
        self.scene.moid_layer_mut().clear();
        let (scene, bodies) = (&mut self.scene, &self.bodies);
        for slot in bodies.iter().flatten() {
            slot.paint_silhouette(scene.moid_layer_mut());
        }

        for i in 0..self.bodies.len() {
            let Some(mut body) = self.bodies[i].take() else {
                continue;
            };
            {
                let mut view = RegistryView(&mut self.bodies);
                body.update(&mut self.scene, &mut view, dt, self.gravity);
            }
            if !body.to_delete() && self.in_scene(&body) {
                self.bodies[i] = Some(body);
            }
        }

        // Drop dead slots so the vec does not grow without bound.
        self.bodies.retain(|slot| slot.is_some());
    }

    /// Per-frame travel counters; reading resets them.
    pub fn take_travel_stats(&self) -> TravelStats {
        perf::take_stats()
    }

    fn in_scene(&self, body: &PixelBody) -> bool {
        let pos = body.position();
        let r = body.radius().max(1.0);
        if pos.y - r > self.scene.height() as f32 {
            return false;
        }
        // Wrap keeps x in range when enabled; this only fires without it.
        pos.x + r >= 0.0 && pos.x - r <= self.scene.width() as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::materials::{MAT_METAL, MAT_STONE};

    fn core_with_floor() -> SimulationCore {
        let mut core = SimulationCore::new(100, 100);
        core.scene_mut()
            .terrain_mut()
            .fill_rect(0, 80, 100, 20, MAT_STONE);
        core
    }

    fn spawn_block(core: &mut SimulationCore, pos: Vec2) -> MoId {
        core.spawn_body(SpriteFrame::filled(8, 8), MAT_METAL, 2, 0, 4.0, pos)
            .unwrap()
    }

    #[test]
    fn ids_start_at_one_and_increment() {
        let mut core = core_with_floor();
        let a = spawn_block(&mut core, Vec2::new(20.0, 20.0));
        let b = spawn_block(&mut core, Vec2::new(60.0, 20.0));
        assert_eq!(a, 1);
        assert_eq!(b, 2);
        assert_eq!(core.body_count(), 2);
        assert!(core.body(a).is_some());
        assert!(core.remove_body(a));
        assert_eq!(core.body_count(), 1);
        assert!(core.body(a).is_none());
    }

    #[test]
    fn dropped_body_comes_to_rest_on_the_floor() {
        let mut core = core_with_floor();
        let id = spawn_block(&mut core, Vec2::new(50.0, 40.0));
        for _ in 0..240 {
            core.step(1.0 / 60.0);
        }
        let body = core.body(id).expect("body survives the drop");
        let pos = body.position();
        assert!(pos.y < 80.0, "resting above the floor, y {}", pos.y);
        assert!(pos.y > 70.0, "but close to it, y {}", pos.y);
        // Sub-pixel motion accumulates velocity between pixel steps, so
        // "at rest" still means a few m/s of jitter headroom.
        assert!(
            body.velocity().length() < 4.0,
            "settled, vel {:?}",
            body.velocity()
        );
    }

    #[test]
    fn body_falling_off_the_scene_is_removed() {
        let mut core = SimulationCore::new(100, 100);
        let _ = spawn_block(&mut core, Vec2::new(50.0, 90.0));
        for _ in 0..240 {
            core.step(1.0 / 60.0);
        }
        assert_eq!(core.body_count(), 0);
    }

    #[test]
    fn material_bundle_swap_reaches_the_scene() {
        let mut core = SimulationCore::new(32, 32);
        let json = r#"{
            "materials": [
                { "id": 0, "key": "base:air", "strength": 0, "restitution": 0, "friction": 0, "density": 0 },
                { "id": 1, "key": "mod:foam", "strength": 1.5, "restitution": 0.2, "friction": 0.4, "density": 80 }
            ]
        }"#;
        core.load_material_bundle_json(json).unwrap();
        assert_eq!(core.materials().id_by_key("mod:foam"), Some(1));
        assert_eq!(core.scene().materials().material_count(), 2);
        assert!(core.load_material_bundle_json("{ not json").is_err());
    }

    #[test]
    fn travel_stats_accumulate_during_a_step() {
        let mut core = core_with_floor();
        let _ = core.take_travel_stats();
        let id = spawn_block(&mut core, Vec2::new(50.0, 40.0));
        core.body_mut(id)
            .expect("just spawned")
            .set_velocity(Vec2::new(0.0, 10.0));
        core.step(1.0 / 60.0);
        let stats = core.take_travel_stats();
        assert!(stats.segments > 0);
        assert!(stats.steps > 0);
    }
}
