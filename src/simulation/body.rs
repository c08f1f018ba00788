//! A sprite-backed rigid body driven by the atom-group travel core.

use std::mem;

use crate::core::math::Vec2;
use crate::domain::materials::{MaterialId, MaterialRegistry, MAT_AIR};
use crate::domain::sprite::SpriteFrame;
use crate::spatial::moid::{MoId, MoidLayer};
use crate::spatial::scene::Scene;
use crate::systems::atom_group::{AtomGroup, GenerateError};
use crate::systems::body::{Body, Kinematics, MoRegistry};
use crate::systems::hit_data::{HitData, HITEE};

/// A body buried past this fraction of its atoms when pushed out of an
/// overlap is crushed instead of displaced.
const SQUISH_FRACTION: f32 = 0.75;

pub struct PixelBody {
    moid: MoId,
    sprite: SpriteFrame,
    atom_group: AtomGroup,
    kin: Kinematics,
    mass: f32,
    restitution: f32,
    pinned: bool,
    squishable: bool,
    to_delete: bool,
    deep_check: bool,
    /// Net impulse the last travel put on this body; compared against the
    /// gib limit after each frame.
    travel_impulse: Vec2,
    /// Impulse magnitude (kg*m/s) beyond which the body breaks apart.
    /// Zero disables gibbing.
    gib_impulse_limit: f32,
}

impl PixelBody {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        moid: MoId,
        sprite: SpriteFrame,
        material: MaterialId,
        resolution: u32,
        depth: u32,
        mass: f32,
        pos: Vec2,
        materials: &MaterialRegistry,
    ) -> Result<Self, GenerateError> {
        let atom_group = AtomGroup::from_sprite(&sprite, material, resolution, depth)?;
        let restitution = materials.props(material).map_or(0.0, |m| m.restitution);
        Ok(Self {
            moid,
            sprite,
            atom_group,
            kin: Kinematics {
                pos,
                ..Default::default()
            },
            mass: mass.max(f32::EPSILON),
            restitution,
            pinned: false,
            squishable: true,
            to_delete: false,
            deep_check: false,
            travel_impulse: Vec2::zero(),
            gib_impulse_limit: 0.0,
        })
    }

    pub fn kinematics(&self) -> Kinematics {
        self.kin
    }

    pub fn set_position(&mut self, pos: Vec2) {
        self.kin.pos = pos;
    }

    pub fn set_velocity(&mut self, vel: Vec2) {
        self.kin.vel = vel;
    }

    pub fn set_angular_velocity(&mut self, ang_vel: f32) {
        self.kin.ang_vel = ang_vel;
    }

    pub fn set_pinned(&mut self, pinned: bool) {
        self.pinned = pinned;
    }

    pub fn set_squishable(&mut self, squishable: bool) {
        self.squishable = squishable;
    }

    pub fn set_gib_impulse_limit(&mut self, limit: f32) {
        self.gib_impulse_limit = limit;
    }

    pub fn atom_group(&self) -> &AtomGroup {
        &self.atom_group
    }

    pub fn atom_group_mut(&mut self) -> &mut AtomGroup {
        &mut self.atom_group
    }

    pub fn sprite(&self) -> &SpriteFrame {
        &self.sprite
    }

    pub fn radius(&self) -> f32 {
        self.atom_group.max_radius()
    }

    pub fn travel_impulse(&self) -> Vec2 {
        self.travel_impulse
    }

    /// Stamp this body's rotated sprite mask into the MOID layer so other
    /// travelers can hit it.
    pub fn paint_silhouette(&self, layer: &mut MoidLayer) {
        let (cx, cy) = self.sprite.center();
        for y in 0..self.sprite.height() as i32 {
            for x in 0..self.sprite.width() as i32 {
                if !self.sprite.is_opaque(x, y) {
                    continue;
                }
                let p = self.kin.pos
                    + Vec2::new((x - cx) as f32, (y - cy) as f32).rotated(self.kin.angle);
                layer.set(p.x.floor() as i32, p.y.floor() as i32, self.moid);
            }
        }
    }

    /// One frame of motion: gravity, travel, overlap cleanup, gib check.
    pub fn update(
        &mut self,
        scene: &mut Scene,
        registry: &mut dyn MoRegistry,
        dt: f32,
        gravity: Vec2,
    ) {
        if self.pinned || self.to_delete {
            return;
        }
        self.kin.vel += gravity * dt;
        self.kin.did_wrap = false;
        self.travel_impulse = Vec2::zero();

        // The group is taken out for the duration of the travel so the body
        // can serve as the owner callback without aliasing it.
        let mut group = mem::take(&mut self.atom_group);
        let mut kin = self.kin;
        group.travel(&mut kin, self, registry, scene, dt, false);
        self.kin = kin;

        let resolved =
            group.resolve_terrain_intersection(&mut self.kin.pos, self.kin.angle, 0.0, scene);
        self.atom_group = group;

        if !resolved && self.deep_check {
            // Too deep for a nudge: dislodge the terrain under the whole
            // silhouette instead.
            self.erase_silhouette_from_terrain(scene);
            self.deep_check = false;
        }

        if self.gib_impulse_limit > 0.0 && self.travel_impulse.length() >= self.gib_impulse_limit {
            self.to_delete = true;
        }
    }

    fn erase_silhouette_from_terrain(&self, scene: &mut Scene) {
        let (cx, cy) = self.sprite.center();
        scene.with_lock(false, |scene| {
            for y in 0..self.sprite.height() as i32 {
                for x in 0..self.sprite.width() as i32 {
                    if !self.sprite.is_opaque(x, y) {
                        continue;
                    }
                    let p = self.kin.pos
                        + Vec2::new((x - cx) as f32, (y - cy) as f32).rotated(self.kin.angle);
                    scene
                        .terrain_mut()
                        .set_material(p.x.floor() as i32, p.y.floor() as i32, MAT_AIR);
                }
            }
        });
    }
}

impl Body for PixelBody {
    fn moid(&self) -> MoId {
        self.moid
    }

    fn mass(&self) -> f32 {
        self.mass
    }

    fn restitution(&self) -> f32 {
        self.restitution
    }

    fn position(&self) -> Vec2 {
        self.kin.pos
    }

    fn velocity(&self) -> Vec2 {
        self.kin.vel
    }

    fn angular_velocity(&self) -> f32 {
        self.kin.ang_vel
    }

    fn moment_of_inertia(&mut self) -> f32 {
        let mass = self.mass;
        self.atom_group.moment_of_inertia(mass)
    }

    fn is_pinned(&self) -> bool {
        self.pinned
    }

    fn to_delete(&self) -> bool {
        self.to_delete
    }

    fn on_bounce(&mut self, _hit: &HitData) -> bool {
        false
    }

    fn on_sink(&mut self, _hit: &HitData) -> bool {
        false
    }

    fn on_mo_hit(&mut self, _other: MoId) -> bool {
        false
    }

    fn collide_at_point(&mut self, hit: &mut HitData) -> bool {
        let imp = hit.res_impulse[HITEE];
        if imp.is_zero() {
            return false;
        }
        let inertia = {
            let mass = self.mass;
            self.atom_group.moment_of_inertia(mass).max(f32::EPSILON)
        };
        self.kin.vel += imp * (1.0 / self.mass);
        self.kin.ang_vel += hit.hit_radius[HITEE].cross(imp) / inertia;
        true
    }

    fn add_travel_impulse(&mut self, impulse: Vec2) {
        self.travel_impulse += impulse;
    }

    fn force_deep_check(&mut self, enabled: bool) {
        self.deep_check = enabled;
    }

    fn push_out(&mut self, displacement: Vec2, scene: &mut Scene) -> bool {
        self.kin.pos += displacement;
        scene.wrap_position(&mut self.kin.pos);
        let buried = self
            .atom_group
            .terrain_embed_fraction(scene, self.kin.pos, self.kin.angle);
        if self.squishable && buried > SQUISH_FRACTION {
            self.to_delete = true;
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::domain::materials::MAT_METAL;
    use crate::systems::body::NoBodies;

    fn scene_with_floor() -> Scene {
        let mut scene = Scene::new(100, 100, Arc::new(MaterialRegistry::from_builtin()));
        scene
            .terrain_mut()
            .fill_rect(0, 80, 100, 20, crate::domain::materials::MAT_STONE);
        scene
    }

    fn body_at(pos: Vec2) -> PixelBody {
        let materials = MaterialRegistry::from_builtin();
        PixelBody::new(
            1,
            SpriteFrame::filled(8, 8),
            MAT_METAL,
            2,
            0,
            4.0,
            pos,
            &materials,
        )
        .unwrap()
    }

    #[test]
    fn silhouette_painting_registers_the_moid() {
        let mut layer = MoidLayer::new(100, 100);
        let body = body_at(Vec2::new(50.0, 50.0));
        body.paint_silhouette(&mut layer);
        assert_eq!(layer.get(50, 50), 1);
        assert_eq!(layer.get(48, 48), 1);
        assert_eq!(layer.get(30, 30), 0);
    }

    #[test]
    fn update_applies_gravity_and_travel() {
        let mut scene = scene_with_floor();
        let mut body = body_at(Vec2::new(50.0, 20.0));
        body.update(&mut scene, &mut NoBodies, 1.0 / 60.0, Vec2::new(0.0, 9.8));
        assert!(body.velocity().y > 0.0);
        assert!(body.position().y >= 20.0);
    }

    #[test]
    fn gib_limit_flags_the_body_for_deletion() {
        let mut scene = scene_with_floor();
        let mut body = body_at(Vec2::new(50.0, 74.0));
        body.set_velocity(Vec2::new(0.0, 50.0));
        body.set_gib_impulse_limit(10.0);
        for _ in 0..10 {
            body.update(&mut scene, &mut NoBodies, 1.0 / 60.0, Vec2::zero());
            if body.to_delete() {
                break;
            }
        }
        assert!(body.to_delete());
    }

    #[test]
    fn push_out_squishes_a_mostly_buried_body() {
        let mut scene = scene_with_floor();
        let mut body = body_at(Vec2::new(50.0, 30.0));
        // Shove it fully into the floor.
        assert!(!body.push_out(Vec2::new(0.0, 60.0), &mut scene));
        assert!(body.to_delete());
    }
}
