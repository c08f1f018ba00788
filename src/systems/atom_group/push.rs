//! Translational travel for limb groups: no rotation, no struck-body
//! responses, just terrain contact reflected back as an impulse the owner's
//! joint can absorb.

use crate::core::math::{Vec2, PIXELS_PER_METER};
use crate::spatial::moid::MoId;
use crate::spatial::scene::Scene;
use crate::systems::atom::{StepContext, StepResult};

use super::{perf, AtomGroup};

/// A push gives up after this many legs; limbs jitter instead of tunneling.
pub const MAX_PUSH_LEGS: u32 = 3;

/// Outcome of a push travel.
#[derive(Clone, Copy, Debug, Default)]
pub struct PushResult {
    /// Impulse the contact imparted on the pusher, kg*m/s.
    pub impulse: Vec2,
    /// Unconsumed travel time, seconds.
    pub time_left: f32,
    pub hit_terrain: bool,
}

impl AtomGroup {
    /// Drive the group along `vel` for up to `travel_time` seconds without
    /// rotating it, reflecting the velocity off any terrain struck. The
    /// position and velocity are advanced in place; the returned impulse is
    /// what the terrain pushed back with, capped by `pushforce` (N) when
    /// positive.
    #[allow(clippy::too_many_arguments)]
    pub fn push_travel(
        &mut self,
        pos: &mut Vec2,
        vel: &mut Vec2,
        pushforce: f32,
        did_wrap: &mut bool,
        owner_moid: MoId,
        mass: f32,
        scene: &mut Scene,
        travel_time: f32,
        scene_pre_locked: bool,
    ) -> PushResult {
        if travel_time <= 0.0 || self.atoms.is_empty() {
            return PushResult {
                time_left: travel_time.max(0.0),
                ..Default::default()
            };
        }
        scene.with_lock(scene_pre_locked, |scene| {
            self.push_locked(
                pos,
                vel,
                pushforce,
                did_wrap,
                owner_moid,
                mass,
                scene,
                travel_time,
            )
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn push_locked(
        &mut self,
        pos: &mut Vec2,
        vel: &mut Vec2,
        pushforce: f32,
        did_wrap: &mut bool,
        owner_moid: MoId,
        mass: f32,
        scene: &mut Scene,
        travel_time: f32,
    ) -> PushResult {
        let mass = mass.max(f32::EPSILON);
        let ignore = self.ignore_moids.clone();
        let mut time_left = travel_time;
        let mut impulse_acc = Vec2::zero();
        let mut hit_terrain = false;

        // Buried atoms pass through until they surface, same as travel.
        for atom in &mut self.atoms {
            let world = *pos + atom.offset;
            if atom.setup_pos(world, scene) {
                atom.set_ignoring_terrain(true);
            }
        }

        for _leg in 0..MAX_PUSH_LEGS {
            if time_left <= travel_time * 0.001 || vel.is_zero() {
                break;
            }
            perf::record_segment();

            let seg_time = time_left;
            let linear = *vel * (seg_time * PIXELS_PER_METER);

            let atoms = &mut self.atoms;
            let mut steps_on_leg = 0;
            for atom in atoms.iter_mut() {
                steps_on_leg = steps_on_leg.max(atom.setup_seg(*pos + atom.offset, linear));
            }
            if steps_on_leg == 0 {
                break;
            }
            for atom in atoms.iter_mut() {
                atom.set_step_ratio(atom.steps_total() as f32 / steps_on_leg as f32);
            }

            let mut hitters: Vec<usize> = Vec::new();
            let mut hit_step = steps_on_leg;
            for step in 0..steps_on_leg {
                perf::record_steps(atoms.len() as u64);
                for (idx, atom) in atoms.iter_mut().enumerate() {
                    let ctx = StepContext {
                        scene,
                        owner_moid,
                        ignore: &ignore,
                    };
                    // A limb pushes off terrain only; body pixels pass.
                    if atom.step_forward(&ctx) == StepResult::Terrain {
                        hitters.push(idx);
                    }
                }
                if !hitters.is_empty() {
                    hit_step = step;
                    break;
                }
            }

            let hit_something = hit_step < steps_on_leg;
            let progress = if hit_something {
                hit_step as f32 / steps_on_leg as f32
            } else {
                1.0
            };
            *pos += linear * progress;
            if scene.wrap_position(pos) {
                *did_wrap = true;
            }
            time_left -= seg_time * progress;

            if !hit_something {
                continue;
            }
            hit_terrain = true;

            // Same split as travel: atoms whose share of the momentum beats
            // the pixel's strength punch through instead of bouncing.
            let mut bouncers = hitters;
            let mut penetrators: Vec<usize> = Vec::new();
            loop {
                let divisor = bouncers.len();
                if divisor == 0 {
                    break;
                }
                let share = vel.length() * mass / divisor as f32;
                let mut moved = false;
                let mut i = 0;
                while i < bouncers.len() {
                    let (x, y) = atoms[bouncers[i]].pixel();
                    if scene.will_penetrate(x, y, share) {
                        penetrators.push(bouncers.remove(i));
                        moved = true;
                    } else {
                        i += 1;
                    }
                }
                if !moved {
                    break;
                }
            }

            for &idx in &penetrators {
                let (x, y) = atoms[idx].pixel();
                match scene.try_penetrate(x, y, vel.length() * mass) {
                    Some(retardation) => {
                        let delta = *vel * (-retardation);
                        impulse_acc += delta * mass;
                        *vel += delta;
                        perf::record_hit();
                    }
                    None => bouncers.push(idx),
                }
            }

            if !bouncers.is_empty() {
                let mut normal_acc = Vec2::zero();
                let mut e_acc = 0.0;
                let mut f_acc = 0.0;
                for &idx in &bouncers {
                    let atom = &mut atoms[idx];
                    atom.step_back();
                    let hit = atom.terrain_hit_response(
                        scene, owner_moid, *pos, *vel, 0.0, mass, 1.0, 1.0,
                    );
                    normal_acc += hit.hit_normal;
                    let own = scene.materials().props(atom.material);
                    let terr = scene.materials().props(atom.hit_material());
                    e_acc += own.map_or(0.0, |m| m.restitution)
                        * terr.map_or(0.0, |m| m.restitution);
                    f_acc += own.map_or(0.0, |m| m.friction) * terr.map_or(0.0, |m| m.friction);
                    perf::record_hit();
                }
                let n = normal_acc.normalize();
                if !n.is_zero() {
                    let count = bouncers.len() as f32;
                    let e = e_acc / count;
                    let f = f_acc / count;
                    let vn = vel.dot(n);
                    if vn < 0.0 {
                        let t = n.perp();
                        let vt = vel.dot(t);
                        let new_vel = n * (-vn * e) + t * (vt * (1.0 - f));
                        impulse_acc += (new_vel - *vel) * mass;
                        *vel = new_vel;
                    }
                }
            }
        }

        // A limb can only transmit so much force through its joint.
        let mut impulse = impulse_acc;
        if pushforce > 0.0 {
            let cap = pushforce * travel_time;
            if impulse.length() > cap {
                impulse = impulse.normalize() * cap;
            }
        }

        PushResult {
            impulse,
            time_left: time_left.max(0.0),
            hit_terrain,
        }
    }

    /// Drive this group as a limb reaching for `target_world`: the group
    /// travels from where it last was toward the target within one frame,
    /// and whatever it pushed against comes back as an impulse for the
    /// owner's joint.
    #[allow(clippy::too_many_arguments)]
    pub fn push_as_limb(
        &mut self,
        joint_world: Vec2,
        target_world: Vec2,
        pushforce: f32,
        owner_moid: MoId,
        mass: f32,
        scene: &mut Scene,
        travel_time: f32,
        scene_pre_locked: bool,
    ) -> PushResult {
        let mut pos = self.limb_pos.unwrap_or(joint_world);
        let mut vel =
            (target_world - pos) * (1.0 / (travel_time.max(f32::EPSILON) * PIXELS_PER_METER));
        let mut did_wrap = false;
        let result = self.push_travel(
            &mut pos,
            &mut vel,
            pushforce,
            &mut did_wrap,
            owner_moid,
            mass,
            scene,
            travel_time,
            scene_pre_locked,
        );
        self.limb_pos = Some(pos);
        result
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::domain::materials::{MaterialRegistry, MAT_STONE};
    use crate::systems::atom::Atom;

    fn scene_with_wall() -> Scene {
        let mut scene = Scene::new(100, 100, Arc::new(MaterialRegistry::from_builtin()));
        scene.terrain_mut().fill_rect(60, 0, 40, 100, MAT_STONE);
        scene
    }

    fn pair_group() -> AtomGroup {
        AtomGroup::from_atoms(vec![
            Atom::new(Vec2::new(0.0, -2.0), MAT_STONE, 0),
            Atom::new(Vec2::new(0.0, 2.0), MAT_STONE, 0),
        ])
    }

    #[test]
    fn push_stops_at_the_wall_and_reports_the_impulse() {
        let mut scene = scene_with_wall();
        let mut group = pair_group();
        let mut pos = Vec2::new(50.0, 30.0);
        let mut vel = Vec2::new(10.0, 0.0);
        let mut did_wrap = false;
        let result = group.push_travel(
            &mut pos, &mut vel, 0.0, &mut did_wrap, 1, 2.0, &mut scene, 0.05, false,
        );
        assert!(result.hit_terrain);
        assert!(pos.x < 60.0, "pos.x {}", pos.x);
        assert!(pos.x > 57.0, "pos.x {}", pos.x);
        assert!(result.impulse.x < 0.0);
        // stone-on-stone restitution: the push comes back at a quarter speed.
        assert!((vel.x + 2.5).abs() < 0.1, "vel.x {}", vel.x);
        assert!(!did_wrap);
    }

    #[test]
    fn pushforce_caps_the_returned_impulse() {
        let mut scene = scene_with_wall();
        let mut group = pair_group();
        let mut pos = Vec2::new(50.0, 30.0);
        let mut vel = Vec2::new(10.0, 0.0);
        let mut did_wrap = false;
        let result = group.push_travel(
            &mut pos, &mut vel, 20.0, &mut did_wrap, 1, 2.0, &mut scene, 0.05, false,
        );
        // Uncapped the impulse would be 25 kg*m/s; the joint allows 1.
        assert!(result.impulse.length() <= 20.0 * 0.05 + 1e-4);
        assert!(result.impulse.x < 0.0);
    }

    #[test]
    fn free_limb_reaches_its_target() {
        let mut scene = Scene::new(100, 100, Arc::new(MaterialRegistry::from_builtin()));
        let mut group = pair_group();
        let joint = Vec2::new(30.0, 30.0);
        let target = Vec2::new(35.0, 30.0);
        let result = group.push_as_limb(joint, target, 0.0, 1, 0.5, &mut scene, 0.05, false);
        let limb = group.limb_pos().expect("limb position recorded");
        assert!((limb.x - 35.0).abs() < 1.0, "limb.x {}", limb.x);
        assert!(result.impulse.is_zero());
        assert!(!result.hit_terrain);
    }

    #[test]
    fn blocked_limb_pushes_back_on_the_joint() {
        let mut scene = scene_with_wall();
        let mut group = pair_group();
        let joint = Vec2::new(55.0, 30.0);
        let target = Vec2::new(70.0, 30.0);
        let result = group.push_as_limb(joint, target, 0.0, 1, 0.5, &mut scene, 0.05, false);
        assert!(result.hit_terrain);
        assert!(result.impulse.x < 0.0);
        let limb = group.limb_pos().expect("limb position recorded");
        assert!(limb.x < 60.0);
    }
}
