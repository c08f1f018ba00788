//! Rotating rigid travel: walk every atom along a rasterized trajectory in
//! lock-step, stop the whole group at the first contact, respond, and spend
//! the remaining time on follow-up segments.

use std::collections::HashMap;

use crate::core::math::{Vec2, METERS_PER_PIXEL, PIXELS_PER_METER};
use crate::spatial::moid::MoId;
use crate::spatial::scene::Scene;
use crate::systems::atom::{StepContext, StepResult};
use crate::systems::body::{Body, Kinematics, MoRegistry};
use crate::systems::hit_data::HITOR;

use super::{perf, AtomGroup};

/// Upper bound on trajectory segments per travel call; a body that is still
/// bouncing after this many gives the rest of its frame time up.
pub const MAX_TRAVEL_SEGMENTS: u32 = 10;

/// A single segment never rotates further than this; larger rotations are
/// split across segments so the rasterized arcs stay near-linear.
pub const SEGMENT_ROTATION_CAP: f32 = std::f32::consts::FRAC_PI_6;

impl AtomGroup {
    /// Advance the owner's kinematic state by up to `travel_time` seconds,
    /// colliding against terrain and other bodies. Returns the unconsumed
    /// time (zero when the full duration was traveled, the full duration
    /// when the group could not move at all).
    pub fn travel(
        &mut self,
        kin: &mut Kinematics,
        owner: &mut dyn Body,
        registry: &mut dyn MoRegistry,
        scene: &mut Scene,
        travel_time: f32,
        scene_pre_locked: bool,
    ) -> f32 {
        if travel_time <= 0.0 || self.atoms.is_empty() {
            return travel_time.max(0.0);
        }
        scene.with_lock(scene_pre_locked, |scene| {
            self.travel_locked(kin, owner, registry, scene, travel_time)
        })
    }

    fn travel_locked(
        &mut self,
        kin: &mut Kinematics,
        owner: &mut dyn Body,
        registry: &mut dyn MoRegistry,
        scene: &mut Scene,
        travel_time: f32,
    ) -> f32 {
        let owner_moid = owner.moid();
        let mass = owner.mass().max(f32::EPSILON);
        let mut ignore: Vec<MoId> = self.ignore_moids.clone();
        let mut time_left = travel_time;
        let mut halted = false;

        // Atoms still buried from an earlier frame pass through terrain
        // until they surface; cancel the velocity component driving them
        // deeper so they come out instead of digging in. An off-center
        // buried atom also torques the body as it is shoved free.
        {
            let inertia = self.moment_of_inertia(mass);
            let atom_count = self.atoms.len() as f32;
            let mut correction = Vec2::zero();
            let mut ang_correction = 0.0;
            for atom in &mut self.atoms {
                let world = kin.pos + atom.offset.rotated(kin.angle);
                if atom.setup_pos(world, scene) {
                    atom.set_ignoring_terrain(true);
                    let n = atom.normal.rotated(kin.angle);
                    let vn = kin.vel.dot(n);
                    if !n.is_zero() && vn < 0.0 {
                        let dv = n * (-vn);
                        correction += dv;
                        let r = (world - kin.pos) * METERS_PER_PIXEL;
                        ang_correction += r.cross(dv * mass);
                    }
                }
            }
            kin.vel += correction * (1.0 / atom_count);
            kin.ang_vel += ang_correction / (atom_count * inertia);
        }

        for _segment in 0..MAX_TRAVEL_SEGMENTS {
            if halted || time_left <= travel_time * 0.001 {
                break;
            }
            perf::record_segment();

            let inertia = self.moment_of_inertia(mass);

            let mut seg_time = time_left;
            let mut rot_delta = kin.ang_vel * seg_time;
            if rot_delta.abs() > SEGMENT_ROTATION_CAP {
                let scale = SEGMENT_ROTATION_CAP / rot_delta.abs();
                rot_delta *= scale;
                seg_time *= scale;
            }
            let linear = kin.vel * (seg_time * PIXELS_PER_METER);
            let new_angle = kin.angle + rot_delta;

            let atoms = &mut self.atoms;

            // Rasterize each atom's path; the fastest atom sets the pace.
            let mut steps_on_seg = 0;
            for atom in atoms.iter_mut() {
                let start = kin.pos + atom.offset.rotated(kin.angle);
                let traj =
                    linear + atom.offset.rotated(new_angle) - atom.offset.rotated(kin.angle);
                steps_on_seg = steps_on_seg.max(atom.setup_seg(start, traj));
            }
            if steps_on_seg == 0 {
                // Sub-pixel displacement; nothing to walk, nothing consumed.
                break;
            }
            for atom in atoms.iter_mut() {
                atom.set_step_ratio(atom.steps_total() as f32 / steps_on_seg as f32);
            }

            // Lock-step walk until the first step where anything connects.
            let mut terrain_hits: Vec<usize> = Vec::new();
            let mut mo_hits: HashMap<MoId, Vec<usize>> = HashMap::new();
            let mut hit_step = steps_on_seg;
            for step in 0..steps_on_seg {
                perf::record_steps(atoms.len() as u64);
                for (idx, atom) in atoms.iter_mut().enumerate() {
                    let ctx = StepContext {
                        scene,
                        owner_moid,
                        ignore: &ignore,
                    };
                    match atom.step_forward(&ctx) {
                        StepResult::Clear => {}
                        StepResult::Terrain => terrain_hits.push(idx),
                        StepResult::Body(moid) => mo_hits.entry(moid).or_default().push(idx),
                    }
                }
                if !terrain_hits.is_empty() || !mo_hits.is_empty() {
                    hit_step = step;
                    break;
                }
            }

            let hit_something = hit_step < steps_on_seg;
            let progress = if hit_something {
                hit_step as f32 / steps_on_seg as f32
            } else {
                1.0
            };
            kin.pos += linear * progress;
            kin.angle += rot_delta * progress;
            if scene.wrap_position(&mut kin.pos) {
                kin.did_wrap = true;
            }
            time_left -= seg_time * progress;

            if !hit_something {
                continue;
            }

            let mut lin_imp = Vec2::zero();
            let mut ang_imp = 0.0;

            // Sort terrain hitters into bouncers and penetrators. Each atom
            // carries an equal share of the body; whenever one punches
            // through, the share of those still bouncing grows, which can
            // push further atoms over their pixel's strength.
            let mut bouncers = terrain_hits;
            let mut penetrators: Vec<usize> = Vec::new();
            loop {
                let divisor = bouncers.len();
                if divisor == 0 {
                    break;
                }
                let mass_share = mass / divisor as f32;
                let mut moved = false;
                let mut i = 0;
                while i < bouncers.len() {
                    let atom = &atoms[bouncers[i]];
                    let r = (atom.pixel_vec() - kin.pos) * METERS_PER_PIXEL;
                    let point_vel = kin.vel + r.perp() * kin.ang_vel;
                    let (x, y) = atom.pixel();
                    if scene.will_penetrate(x, y, point_vel.length() * mass_share) {
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

            if !bouncers.is_empty() {
                let factor = 1.0 / bouncers.len() as f32;
                for &idx in &bouncers {
                    let atom = &mut atoms[idx];
                    atom.step_back();
                    let hit = atom.terrain_hit_response(
                        scene,
                        owner_moid,
                        kin.pos,
                        kin.vel,
                        kin.ang_vel,
                        mass * factor,
                        inertia * factor,
                        factor,
                    );
                    lin_imp += hit.res_impulse[HITOR];
                    ang_imp += hit.hit_radius[HITOR].cross(hit.res_impulse[HITOR]);
                    perf::record_hit();
                    if owner.on_bounce(&hit) {
                        halted = true;
                    }
                }
            }

            for &idx in &penetrators {
                let atom = &mut atoms[idx];
                let r = (atom.pixel_vec() - kin.pos) * METERS_PER_PIXEL;
                let point_vel = kin.vel + r.perp() * kin.ang_vel;
                let (x, y) = atom.pixel();
                match scene.try_penetrate(x, y, point_vel.length() * mass) {
                    Some(retardation) => {
                        let hit = atom.terrain_sink_response(
                            owner_moid,
                            kin.pos,
                            kin.vel,
                            kin.ang_vel,
                            mass,
                            inertia,
                            retardation,
                        );
                        lin_imp += hit.res_impulse[HITOR];
                        ang_imp += hit.hit_radius[HITOR].cross(hit.res_impulse[HITOR]);
                        perf::record_hit();
                        if owner.on_sink(&hit) {
                            halted = true;
                        }
                    }
                    None => {
                        // The pixel held after all; bounce off it instead.
                        atom.step_back();
                        let hit = atom.terrain_hit_response(
                            scene,
                            owner_moid,
                            kin.pos,
                            kin.vel,
                            kin.ang_vel,
                            mass,
                            inertia,
                            1.0,
                        );
                        lin_imp += hit.res_impulse[HITOR];
                        ang_imp += hit.hit_radius[HITOR].cross(hit.res_impulse[HITOR]);
                        perf::record_hit();
                        if owner.on_bounce(&hit) {
                            halted = true;
                        }
                    }
                }
            }

            for (moid, indices) in mo_hits {
                let mark_ignored = |ignore: &mut Vec<MoId>| {
                    if !ignore.contains(&moid) {
                        ignore.push(moid);
                    }
                };
                if owner.on_mo_hit(moid) {
                    mark_ignored(&mut ignore);
                    continue;
                }
                let Some(victim) = registry.body_mut(moid) else {
                    mark_ignored(&mut ignore);
                    continue;
                };
                if victim.on_mo_hit(owner_moid) {
                    mark_ignored(&mut ignore);
                    continue;
                }
                let factor = 1.0 / indices.len() as f32;
                for idx in indices {
                    let atom = &mut atoms[idx];
                    atom.step_back();
                    let mut hit = atom.mo_hit_response(
                        owner_moid,
                        kin.pos,
                        kin.vel,
                        kin.ang_vel,
                        mass,
                        inertia,
                        factor,
                        victim,
                        scene,
                    );
                    if victim.collide_at_point(&mut hit) {
                        lin_imp += hit.res_impulse[HITOR];
                        ang_imp += hit.hit_radius[HITOR].cross(hit.res_impulse[HITOR]);
                        perf::record_hit();
                    }
                }
                // Struck once is enough for this travel.
                mark_ignored(&mut ignore);
            }

            kin.vel += lin_imp * (1.0 / mass);
            kin.ang_vel += ang_imp / inertia;
            owner.add_travel_impulse(lin_imp);
            if owner.to_delete() {
                halted = true;
            }
        }

        self.ignore_moids = ignore;
        self.resolve_mos_intersection(kin, owner, registry, scene);
        self.clear_moid_ignore_list();

        // Mostly-buried bodies get the expensive overlap scan next frame.
        let buried = self
            .atoms
            .iter()
            .filter(|a| a.is_ignoring_terrain())
            .count();
        if buried * 2 > self.atoms.len() {
            owner.force_deep_check(true);
        }

        time_left.max(0.0)
    }
}
