//! Getting an already-overlapping group back out: gentle separation for
//! bodies that ended a frame inside terrain or inside another body's
//! silhouette.

use crate::core::math::Vec2;
use crate::domain::materials::MAT_AIR;
use crate::spatial::moid::NO_MOID;
use crate::spatial::scene::Scene;
use crate::systems::body::{Body, Kinematics, MoRegistry};

use super::AtomGroup;

impl AtomGroup {
    /// Nudge `pos` so no atom sits inside terrain stronger than
    /// `strength_threshold`. Returns `false` when the overlap could not be
    /// resolved: the body is swallowed whole, has no usable escape
    /// direction, or would have to move further than its own radius.
    pub fn resolve_terrain_intersection(
        &self,
        pos: &mut Vec2,
        angle: f32,
        strength_threshold: f32,
        scene: &Scene,
    ) -> bool {
        let mut normal_acc = Vec2::zero();
        let mut buried: Vec<Vec2> = Vec::new();
        for atom in &self.atoms {
            let p = Self::atom_world_pos(atom, *pos, angle);
            let mat = scene.get_terr_material(p.x.floor() as i32, p.y.floor() as i32);
            if mat != MAT_AIR && scene.materials().strength(mat) > strength_threshold {
                buried.push(p);
                normal_acc += atom.normal.rotated(angle);
            }
        }
        if buried.is_empty() {
            return true;
        }
        if buried.len() == self.atoms.len() {
            return false;
        }

        // Escape opposite the buried silhouette normals.
        let dir = (-normal_acc).normalize();
        if dir.is_zero() {
            return false;
        }

        let radius = self.max_radius().max(1.0);
        let mut clearance: f32 = 0.0;
        for p in &buried {
            match scene.cast_weakness_ray(*p, dir * (radius * 2.0), strength_threshold) {
                Some(d) => clearance = clearance.max(d),
                None => return false,
            }
        }
        if clearance > radius {
            return false;
        }
        *pos += dir * clearance;
        true
    }

    /// Separate this group from the first other body its atoms overlap,
    /// splitting the displacement between the two by inverse mass. A pinned
    /// side stays put and the other side absorbs the whole shift. Returns
    /// `false` when an overlap exists but could not be cleared.
    pub fn resolve_mos_intersection(
        &self,
        kin: &mut Kinematics,
        owner: &mut dyn Body,
        registry: &mut dyn MoRegistry,
        scene: &mut Scene,
    ) -> bool {
        let owner_moid = owner.moid();

        let mut victim_id = NO_MOID;
        for atom in &self.atoms {
            let p = Self::atom_world_pos(atom, kin.pos, kin.angle);
            let id = scene.get_moid_pixel(p.x.floor() as i32, p.y.floor() as i32);
            if id != NO_MOID && id != owner_moid {
                victim_id = id;
                break;
            }
        }
        if victim_id == NO_MOID {
            return true;
        }

        let mut normal_acc = Vec2::zero();
        let mut buried: Vec<Vec2> = Vec::new();
        for atom in &self.atoms {
            let p = Self::atom_world_pos(atom, kin.pos, kin.angle);
            if scene.get_moid_pixel(p.x.floor() as i32, p.y.floor() as i32) == victim_id {
                buried.push(p);
                normal_acc += atom.normal.rotated(kin.angle);
            }
        }

        let mut dir = (-normal_acc).normalize();
        if dir.is_zero() {
            // Interior atoms carry no normals; fall back to center-to-center.
            if let Some(victim) = registry.body_mut(victim_id) {
                dir = (kin.pos - victim.position()).normalize();
            }
        }
        if dir.is_zero() {
            return false;
        }

        let reach = (self.max_radius() * 2.0).max(2.0);
        let mut clearance: f32 = 0.0;
        for p in &buried {
            match scene.cast_mo_exit_ray(*p, dir * reach, victim_id) {
                Some(d) => clearance = clearance.max(d),
                None => return false,
            }
        }
        if clearance <= 0.0 {
            return true;
        }

        let Some(victim) = registry.body_mut(victim_id) else {
            // Victim despawned under us; just take the whole shift.
            kin.pos += dir * clearance;
            if scene.wrap_position(&mut kin.pos) {
                kin.did_wrap = true;
            }
            return true;
        };

        let m1 = owner.mass().max(f32::EPSILON);
        let m2 = victim.mass().max(f32::EPSILON);
        let (own_share, victim_share) = if victim.is_pinned() {
            (1.0, 0.0)
        } else if owner.is_pinned() {
            (0.0, 1.0)
        } else {
            (m2 / (m1 + m2), m1 / (m1 + m2))
        };

        if own_share > 0.0 {
            kin.pos += dir * (clearance * own_share);
            if scene.wrap_position(&mut kin.pos) {
                kin.did_wrap = true;
            }
        }
        let mut separated = true;
        if victim_share > 0.0 {
            separated = victim.push_out(dir * (-clearance * victim_share), scene);
        }
        separated
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::domain::materials::{MaterialRegistry, MAT_STONE};
    use crate::spatial::moid::MoId;
    use crate::systems::atom_group::testutil::{cross_atoms, MockBody};

    fn scene_with_floor() -> Scene {
        let mut scene = Scene::new(100, 100, Arc::new(MaterialRegistry::from_builtin()));
        scene.terrain_mut().fill_rect(0, 50, 100, 50, MAT_STONE);
        scene
    }

    #[test]
    fn buried_edge_lifts_the_body_clear() {
        let scene = scene_with_floor();
        let group = AtomGroup::from_atoms(cross_atoms(5.0, MAT_STONE));
        // Bottom atom at y=52, three pixels into the floor.
        let mut pos = Vec2::new(50.0, 47.0);
        assert!(group.resolve_terrain_intersection(&mut pos, 0.0, 0.0, &scene));
        assert!(pos.y < 45.0, "pos.y {}", pos.y);
        assert_eq!(group.terrain_embed_fraction(&scene, pos, 0.0), 0.0);
    }

    #[test]
    fn clear_body_is_left_alone() {
        let scene = scene_with_floor();
        let group = AtomGroup::from_atoms(cross_atoms(5.0, MAT_STONE));
        let mut pos = Vec2::new(50.0, 30.0);
        assert!(group.resolve_terrain_intersection(&mut pos, 0.0, 0.0, &scene));
        assert_eq!(pos, Vec2::new(50.0, 30.0));
    }

    #[test]
    fn escape_further_than_the_radius_is_refused() {
        let scene = scene_with_floor();
        let group = AtomGroup::from_atoms(cross_atoms(5.0, MAT_STONE));
        // Bottom atom eight pixels deep: clearing it takes more than the
        // group's own radius, so the nudge is refused outright.
        let mut pos = Vec2::new(50.0, 53.0);
        assert!(!group.resolve_terrain_intersection(&mut pos, 0.0, 0.0, &scene));
        assert_eq!(pos, Vec2::new(50.0, 53.0));
    }

    #[test]
    fn fully_swallowed_body_cannot_be_resolved() {
        let mut scene = scene_with_floor();
        scene.terrain_mut().fill_rect(0, 0, 100, 100, MAT_STONE);
        let group = AtomGroup::from_atoms(cross_atoms(5.0, MAT_STONE));
        let mut pos = Vec2::new(50.0, 70.0);
        assert!(!group.resolve_terrain_intersection(&mut pos, 0.0, 0.0, &scene));
        assert_eq!(pos, Vec2::new(50.0, 70.0));
    }

    struct SingleBody(MockBody);

    impl MoRegistry for SingleBody {
        fn body_mut(&mut self, id: MoId) -> Option<&mut dyn Body> {
            if self.0.moid == id {
                Some(&mut self.0)
            } else {
                None
            }
        }
    }

    fn overlap_setup(scene: &mut Scene) -> (AtomGroup, Kinematics, MockBody, SingleBody) {
        // Victim silhouette covers x 52..60; the hitor's right atom at
        // (55, 30) sits inside it.
        for y in 25..36 {
            for x in 52..60 {
                scene.moid_layer_mut().set(x, y, 2);
            }
        }
        let group = AtomGroup::from_atoms(cross_atoms(5.0, MAT_STONE));
        let kin = Kinematics {
            pos: Vec2::new(50.0, 30.0),
            ..Default::default()
        };
        let owner = MockBody::new(1, 2.0);
        let mut victim = MockBody::new(2, 2.0);
        victim.kin.pos = Vec2::new(58.0, 30.0);
        (group, kin, owner, SingleBody(victim))
    }

    #[test]
    fn overlapping_bodies_split_the_separation_by_mass() {
        let mut scene = Scene::new(100, 100, Arc::new(MaterialRegistry::from_builtin()));
        let (group, mut kin, mut owner, mut registry) = overlap_setup(&mut scene);
        assert!(group.resolve_mos_intersection(&mut kin, &mut owner, &mut registry, &mut scene));
        // Equal masses, equal shares, opposite directions.
        assert!(kin.pos.x < 50.0, "owner x {}", kin.pos.x);
        assert!(registry.0.kin.pos.x > 58.0, "victim x {}", registry.0.kin.pos.x);
        let moved_owner = 50.0 - kin.pos.x;
        let moved_victim = registry.0.kin.pos.x - 58.0;
        assert!((moved_owner - moved_victim).abs() < 0.1);
    }

    #[test]
    fn pinned_victim_leaves_the_whole_shift_to_the_traveler() {
        let mut scene = Scene::new(100, 100, Arc::new(MaterialRegistry::from_builtin()));
        let (group, mut kin, mut owner, mut registry) = overlap_setup(&mut scene);
        registry.0.pinned = true;
        assert!(group.resolve_mos_intersection(&mut kin, &mut owner, &mut registry, &mut scene));
        assert!(kin.pos.x < 48.0, "owner x {}", kin.pos.x);
        assert_eq!(registry.0.kin.pos, Vec2::new(58.0, 30.0));
    }

    #[test]
    fn no_overlap_is_a_clean_success() {
        let mut scene = Scene::new(100, 100, Arc::new(MaterialRegistry::from_builtin()));
        let group = AtomGroup::from_atoms(cross_atoms(5.0, MAT_STONE));
        let mut kin = Kinematics {
            pos: Vec2::new(20.0, 20.0),
            ..Default::default()
        };
        let mut owner = MockBody::new(1, 2.0);
        let mut registry = SingleBody(MockBody::new(2, 2.0));
        assert!(group.resolve_mos_intersection(&mut kin, &mut owner, &mut registry, &mut scene));
        assert_eq!(kin.pos, Vec2::new(20.0, 20.0));
    }
}
