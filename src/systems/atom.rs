//! Single point-mass collision probe on a rigid body's silhouette.
//!
//! An atom carries a fixed offset in its owner's un-rotated frame plus the
//! transient state of one rasterized trajectory segment: a Bresenham line
//! walked one pixel at a time, with one level of undo so a hit can be backed
//! out of before computing the response.

use crate::core::math::{Vec2, METERS_PER_PIXEL};
use crate::domain::materials::{MaterialId, MAT_AIR};
use crate::spatial::moid::{MoId, NO_MOID};
use crate::spatial::scene::Scene;
use crate::domain::sprite::SpriteFrame;

use super::hit_data::{HitData, HITEE, HITOR};

/// What one rasterized step landed on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepResult {
    Clear,
    Terrain,
    Body(MoId),
}

/// Per-step collision query context; the ignore set is passed in explicitly
/// rather than shared through the atom (the group owns it).
pub struct StepContext<'a> {
    pub scene: &'a Scene,
    pub owner_moid: MoId,
    pub ignore: &'a [MoId],
}

#[derive(Clone, Debug)]
pub struct Atom {
    /// Offset from the owner's origin, owner-local un-rotated frame, pixels.
    pub offset: Vec2,
    /// Offset as originally authored; sub-group re-basing works from this.
    pub original_offset: Vec2,
    pub material: MaterialId,
    /// Outward surface normal at the silhouette point, un-rotated frame.
    /// Zero for interior (depth-generated) atoms.
    pub normal: Vec2,
    /// Sub-group this atom belongs to; 0 = owner body itself.
    pub sub_id: i32,

    // Rasterized segment state.
    int_pos: (i32, i32),
    prev_pos: (i32, i32),
    delta2: (i32, i32),
    incr: (i32, i32),
    /// Direction of the most recent raster step; survives `step_back` so
    /// collision responses still know which way the hit was made.
    last_dir: (i32, i32),
    error: i32,
    x_dominant: bool,
    steps_total: i32,
    steps_taken: i32,
    step_ratio: f32,
    step_acc: f32,
    seg_ready: bool,

    ignoring_terrain: bool,
    hit_material: MaterialId,
    hit_moid: MoId,
}

impl Atom {
    pub fn new(offset: Vec2, material: MaterialId, sub_id: i32) -> Self {
        Self {
            offset,
            original_offset: offset,
            material,
            normal: Vec2::zero(),
            sub_id,
            int_pos: (0, 0),
            prev_pos: (0, 0),
            delta2: (0, 0),
            incr: (0, 0),
            last_dir: (0, 0),
            error: 0,
            x_dominant: true,
            steps_total: 0,
            steps_taken: 0,
            step_ratio: 1.0,
            step_acc: 0.0,
            seg_ready: false,
            ignoring_terrain: false,
            hit_material: MAT_AIR,
            hit_moid: NO_MOID,
        }
    }

    pub fn with_normal(mut self, normal: Vec2) -> Self {
        self.normal = normal;
        self
    }

    // === POSITION / FLAGS ===

    /// Current rasterized pixel.
    pub fn pixel(&self) -> (i32, i32) {
        self.int_pos
    }

    pub fn pixel_vec(&self) -> Vec2 {
        Vec2::new(self.int_pos.0 as f32, self.int_pos.1 as f32)
    }

    pub fn is_ignoring_terrain(&self) -> bool {
        self.ignoring_terrain
    }

    pub fn set_ignoring_terrain(&mut self, ignoring: bool) {
        self.ignoring_terrain = ignoring;
    }

    pub fn hit_material(&self) -> MaterialId {
        self.hit_material
    }

    pub fn hit_moid(&self) -> MoId {
        self.hit_moid
    }

    // === SEGMENT SETUP / STEPPING ===

    /// Snap the working position to a world position; returns whether that
    /// pixel already overlaps terrain.
    pub fn setup_pos(&mut self, pos: Vec2, scene: &Scene) -> bool {
        self.int_pos = (pos.x.floor() as i32, pos.y.floor() as i32);
        self.prev_pos = self.int_pos;
        scene.terr_is_solid(self.int_pos.0, self.int_pos.1)
    }

    /// Initialize a rasterized path from `start` along `trajectory` (pixels)
    /// and return the number of one-pixel steps it takes.
    pub fn setup_seg(&mut self, start: Vec2, trajectory: Vec2) -> i32 {
        self.int_pos = (start.x.floor() as i32, start.y.floor() as i32);
        self.prev_pos = self.int_pos;

        let end = start + trajectory;
        let end_px = (end.x.floor() as i32, end.y.floor() as i32);
        let delta = (end_px.0 - self.int_pos.0, end_px.1 - self.int_pos.1);

        self.incr = (delta.0.signum(), delta.1.signum());
        self.delta2 = (2 * delta.0.abs(), 2 * delta.1.abs());
        self.x_dominant = delta.0.abs() >= delta.1.abs();

        let dom = delta.0.abs().max(delta.1.abs());
        let sub = delta.0.abs().min(delta.1.abs());
        self.error = 2 * sub - dom;

        self.steps_total = dom;
        self.steps_taken = 0;
        self.step_acc = 0.0;
        self.seg_ready = true;
        self.steps_total
    }

    /// This atom's step count relative to the fastest atom in the group.
    pub fn set_step_ratio(&mut self, ratio: f32) {
        self.step_ratio = ratio;
    }

    pub fn steps_total(&self) -> i32 {
        self.steps_total
    }

    /// Advance by the group's lock-step. The step ratio accumulates so that
    /// slower atoms (closer to the center of rotation) skip global steps.
    /// Returns the first hit taken, if any.
    pub fn step_forward(&mut self, ctx: &StepContext) -> StepResult {
        debug_assert!(self.seg_ready, "step_forward without setup_seg");
        self.step_acc += self.step_ratio;
        while self.step_acc >= 0.999 && self.steps_taken < self.steps_total {
            self.step_acc -= 1.0;
            self.take_raster_step();
            let result = self.classify(ctx);
            if result != StepResult::Clear {
                return result;
            }
        }
        StepResult::Clear
    }

    /// Undo the most recent rasterized step (one level only; used to back a
    /// hitting atom out of the surface before computing the response).
    pub fn step_back(&mut self) {
        self.int_pos = self.prev_pos;
        if self.steps_taken > 0 {
            self.steps_taken -= 1;
        }
    }

    fn take_raster_step(&mut self) {
        self.prev_pos = self.int_pos;
        if self.x_dominant {
            self.int_pos.0 += self.incr.0;
            if self.error >= 0 {
                self.int_pos.1 += self.incr.1;
                self.error -= self.delta2.0;
            }
            self.error += self.delta2.1;
        } else {
            self.int_pos.1 += self.incr.1;
            if self.error >= 0 {
                self.int_pos.0 += self.incr.0;
                self.error -= self.delta2.1;
            }
            self.error += self.delta2.0;
        }
        self.last_dir = (
            self.int_pos.0 - self.prev_pos.0,
            self.int_pos.1 - self.prev_pos.1,
        );
        self.steps_taken += 1;
    }

    fn classify(&mut self, ctx: &StepContext) -> StepResult {
        let (x, y) = self.int_pos;

        let moid = ctx.scene.get_moid_pixel(x, y);
        if moid != NO_MOID && moid != ctx.owner_moid && !ctx.ignore.contains(&moid) {
            self.hit_moid = moid;
            return StepResult::Body(moid);
        }

        if ctx.scene.terr_is_solid(x, y) {
            if self.ignoring_terrain {
                // Still buried from last frame; no new hit to report.
                return StepResult::Clear;
            }
            self.hit_material = ctx.scene.get_terr_material(x, y);
            return StepResult::Terrain;
        }

        // Stepped into clear air: terrain hits re-arm.
        self.ignoring_terrain = false;
        StepResult::Clear
    }

    // === GENERATION-TIME NORMAL ===

    /// Estimate the outward surface normal at a silhouette point by summing
    /// the directions to nearby opaque pixels and flipping the result.
    pub fn calculate_normal(sprite: &SpriteFrame, x: i32, y: i32) -> Vec2 {
        const WINDOW: i32 = 2;
        let mut acc = Vec2::zero();
        for dy in -WINDOW..=WINDOW {
            for dx in -WINDOW..=WINDOW {
                if dx == 0 && dy == 0 {
                    continue;
                }
                if sprite.is_opaque(x + dx, y + dy) {
                    acc += Vec2::new(dx as f32, dy as f32);
                }
            }
        }
        (-acc).normalize()
    }

    // === COLLISION RESPONSES ===

    /// Build the terrain-bounce record for this atom. Mass and inertia come
    /// in already distributed across the bouncing atoms of this step.
    #[allow(clippy::too_many_arguments)]
    pub fn terrain_hit_response(
        &self,
        scene: &Scene,
        owner_moid: MoId,
        body_pos: Vec2,
        vel: Vec2,
        ang_vel: f32,
        mass_dist: f32,
        inertia_dist: f32,
        impulse_factor: f32,
    ) -> HitData {
        let mut hit = HitData::default();
        hit.body_ids[HITOR] = owner_moid;
        hit.hit_material = self.hit_material;
        hit.hit_point = self.pixel_vec();
        hit.total_mass[HITOR] = mass_dist;
        hit.moment_inertia[HITOR] = inertia_dist;
        hit.impulse_factor[HITOR] = impulse_factor;

        let normal = self.surface_normal(scene);
        hit.hit_normal = normal;

        let radius = (self.pixel_vec() - body_pos) * METERS_PER_PIXEL;
        hit.hit_radius[HITOR] = radius;
        let point_vel = vel + radius.perp() * ang_vel;
        hit.hit_vel[HITOR] = point_vel;

        let approach = point_vel.dot(normal);
        if approach >= 0.0 || normal.is_zero() {
            return hit;
        }

        let (e, f) = self.contact_coefficients(scene, self.hit_material);

        let rn = radius.cross(normal);
        let denom = 1.0 / mass_dist + (rn * rn) / inertia_dist;
        let j = -(1.0 + e) * approach / denom;

        // Coulomb friction along the tangent, clamped by the normal impulse.
        let tangent = normal.perp();
        let vt = point_vel.dot(tangent);
        let rt = radius.cross(tangent);
        let denom_t = 1.0 / mass_dist + (rt * rt) / inertia_dist;
        let jt = (-vt / denom_t).clamp(-f * j, f * j);

        hit.res_impulse[HITOR] = normal * j + tangent * jt;
        hit
    }

    /// Build the sink record: this atom absorbs the collision alone with the
    /// undistributed mass, retarded by what the terrain soaked up.
    pub fn terrain_sink_response(
        &self,
        owner_moid: MoId,
        body_pos: Vec2,
        vel: Vec2,
        ang_vel: f32,
        total_mass: f32,
        total_inertia: f32,
        retardation: f32,
    ) -> HitData {
        let mut hit = HitData::default();
        hit.body_ids[HITOR] = owner_moid;
        hit.hit_material = self.hit_material;
        hit.hit_point = self.pixel_vec();
        hit.total_mass[HITOR] = total_mass;
        hit.moment_inertia[HITOR] = total_inertia;

        let radius = (self.pixel_vec() - body_pos) * METERS_PER_PIXEL;
        hit.hit_radius[HITOR] = radius;
        let point_vel = vel + radius.perp() * ang_vel;
        hit.hit_vel[HITOR] = point_vel;

        hit.res_impulse[HITOR] = -point_vel * (retardation * total_mass);
        hit
    }

    /// Two-body impulse against a struck movable. The hitor side carries the
    /// distribution factor; the hitee side is taken whole.
    #[allow(clippy::too_many_arguments)]
    pub fn mo_hit_response(
        &self,
        owner_moid: MoId,
        body_pos: Vec2,
        vel: Vec2,
        ang_vel: f32,
        mass: f32,
        inertia: f32,
        impulse_factor: f32,
        victim: &mut dyn super::body::Body,
        scene: &Scene,
    ) -> HitData {
        let mut hit = HitData::default();
        hit.body_ids[HITOR] = owner_moid;
        hit.body_ids[HITEE] = victim.moid();
        hit.hit_point = self.pixel_vec();
        hit.impulse_factor[HITOR] = impulse_factor;
        hit.impulse_factor[HITEE] = 1.0;

        // Normal opposes the step that embedded us.
        let step = Vec2::new(self.last_dir.0 as f32, self.last_dir.1 as f32);
        let normal = (-step).normalize();
        hit.hit_normal = normal;

        let m1 = (mass * impulse_factor).max(f32::EPSILON);
        let i1 = (inertia * impulse_factor).max(f32::EPSILON);
        let m2 = victim.mass().max(f32::EPSILON);
        let i2 = victim.moment_of_inertia().max(f32::EPSILON);
        hit.total_mass = [m1, m2];
        hit.moment_inertia = [i1, i2];

        let r1 = (self.pixel_vec() - body_pos) * METERS_PER_PIXEL;
        let r2 = (self.pixel_vec() - victim.position()) * METERS_PER_PIXEL;
        hit.hit_radius = [r1, r2];

        let v1 = vel + r1.perp() * ang_vel;
        let v2 = victim.velocity() + r2.perp() * victim.angular_velocity();
        hit.hit_vel = [v1, v2];

        let rel = v1 - v2;
        let approach = rel.dot(normal);
        if approach >= 0.0 || normal.is_zero() {
            return hit;
        }

        let e = self.material_restitution(scene) * victim.restitution();
        let rn1 = r1.cross(normal);
        let rn2 = r2.cross(normal);
        let denom =
            1.0 / m1 + 1.0 / m2 + (rn1 * rn1) / i1 + (rn2 * rn2) / i2;
        let j = -(1.0 + e) * approach / denom;

        hit.res_impulse[HITOR] = normal * j;
        hit.res_impulse[HITEE] = normal * (-j);
        hit
    }

    /// Derive the bounce normal from which neighbor pixels are solid: the
    /// axis the hit was first made in wins, corner hits get both. Expects
    /// the atom to be backed out of the hit pixel already.
    fn surface_normal(&self, scene: &Scene) -> Vec2 {
        let step = self.last_dir;
        let (px, py) = self.int_pos;
        let (cx, cy) = (px + step.0, py + step.1);

        let mut normal = Vec2::zero();
        if step.0 != 0 && scene.terr_is_solid(cx, py) {
            normal.x = -step.0 as f32;
        }
        if step.1 != 0 && scene.terr_is_solid(px, cy) {
            normal.y = -step.1 as f32;
        }
        if normal.is_zero() {
            normal = Vec2::new(-step.0 as f32, -step.1 as f32);
        }
        normal.normalize()
    }

    fn material_restitution(&self, scene: &Scene) -> f32 {
        scene
            .materials()
            .props(self.material)
            .map_or(0.0, |m| m.restitution)
    }

    fn contact_coefficients(&self, scene: &Scene, terrain_mat: MaterialId) -> (f32, f32) {
        let own = scene.materials().props(self.material);
        let terr = scene.materials().props(terrain_mat);
        let e = own.map_or(0.0, |m| m.restitution) * terr.map_or(0.0, |m| m.restitution);
        let f = own.map_or(0.0, |m| m.friction) * terr.map_or(0.0, |m| m.friction);
        (e, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::materials::{MaterialRegistry, MAT_STONE};
    use std::sync::Arc;

    fn empty_scene() -> Scene {
        Scene::new(64, 64, Arc::new(MaterialRegistry::from_builtin()))
    }

    fn ctx(scene: &Scene) -> StepContext {
        StepContext { scene, owner_moid: 1, ignore: &[] }
    }

    #[test]
    fn setup_seg_counts_dominant_axis_steps() {
        let mut atom = Atom::new(Vec2::zero(), MAT_STONE, 0);
        assert_eq!(atom.setup_seg(Vec2::new(10.0, 10.0), Vec2::new(5.0, 0.0)), 5);
        assert_eq!(atom.setup_seg(Vec2::new(10.0, 10.0), Vec2::new(3.0, -7.0)), 7);
        assert_eq!(atom.setup_seg(Vec2::new(10.0, 10.0), Vec2::zero()), 0);
    }

    #[test]
    fn stepping_walks_the_full_trajectory() {
        let scene = empty_scene();
        let mut atom = Atom::new(Vec2::zero(), MAT_STONE, 0);
        let steps = atom.setup_seg(Vec2::new(10.0, 10.0), Vec2::new(6.0, 3.0));
        atom.set_step_ratio(1.0);
        for _ in 0..steps {
            assert_eq!(atom.step_forward(&ctx(&scene)), StepResult::Clear);
        }
        assert_eq!(atom.pixel(), (16, 13));
    }

    #[test]
    fn step_back_undoes_one_step() {
        let scene = empty_scene();
        let mut atom = Atom::new(Vec2::zero(), MAT_STONE, 0);
        atom.setup_seg(Vec2::new(10.0, 10.0), Vec2::new(4.0, 0.0));
        atom.set_step_ratio(1.0);
        atom.step_forward(&ctx(&scene));
        assert_eq!(atom.pixel(), (11, 10));
        atom.step_back();
        assert_eq!(atom.pixel(), (10, 10));
    }

    #[test]
    fn terrain_hit_is_reported_with_material() {
        let mut scene = empty_scene();
        scene.terrain_mut().set_material(12, 10, MAT_STONE);
        let mut atom = Atom::new(Vec2::zero(), MAT_STONE, 0);
        atom.setup_seg(Vec2::new(10.5, 10.5), Vec2::new(4.0, 0.0));
        atom.set_step_ratio(1.0);
        assert_eq!(atom.step_forward(&ctx(&scene)), StepResult::Clear);
        assert_eq!(atom.step_forward(&ctx(&scene)), StepResult::Terrain);
        assert_eq!(atom.hit_material(), MAT_STONE);
    }

    #[test]
    fn ignoring_terrain_suppresses_hits_until_clear() {
        let mut scene = empty_scene();
        scene.terrain_mut().fill_rect(11, 10, 2, 1, MAT_STONE);
        let mut atom = Atom::new(Vec2::zero(), MAT_STONE, 0);
        atom.set_ignoring_terrain(true);
        atom.setup_seg(Vec2::new(10.5, 10.5), Vec2::new(4.0, 0.0));
        atom.set_step_ratio(1.0);
        // Two solid pixels pass silently, then air re-arms the flag.
        assert_eq!(atom.step_forward(&ctx(&scene)), StepResult::Clear);
        assert_eq!(atom.step_forward(&ctx(&scene)), StepResult::Clear);
        assert_eq!(atom.step_forward(&ctx(&scene)), StepResult::Clear);
        assert!(!atom.is_ignoring_terrain());
    }

    #[test]
    fn setup_pos_reports_existing_overlap() {
        let mut scene = empty_scene();
        scene.terrain_mut().set_material(5, 5, MAT_STONE);
        let mut atom = Atom::new(Vec2::zero(), MAT_STONE, 0);
        assert!(atom.setup_pos(Vec2::new(5.2, 5.7), &scene));
        assert!(!atom.setup_pos(Vec2::new(6.2, 5.7), &scene));
    }

    #[test]
    fn calculate_normal_points_away_from_the_body() {
        // 5x5 opaque block: a point on the left edge should get a normal
        // pointing left.
        let sprite = SpriteFrame::filled(5, 5);
        let n = Atom::calculate_normal(&sprite, 0, 2);
        assert!(n.x < -0.9);
        assert!(n.y.abs() < 0.3);
    }
}
