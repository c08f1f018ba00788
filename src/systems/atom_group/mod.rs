//! A rigid body's collision geometry: an owned set of atoms plus the travel
//! and intersection-resolution algorithms that move them as a unit.
//!
//! Atoms live contiguously in one `Vec`; sub-groups are index lists into it,
//! so removing atoms can never leave a dangling reference.

use std::collections::HashMap;

use crate::core::math::{Vec2, METERS_PER_PIXEL};
use crate::domain::materials::{MaterialId, MAT_AIR};
use crate::spatial::moid::MoId;
use crate::spatial::scene::Scene;

use super::atom::Atom;

pub mod generate;
pub mod perf;
mod push;
mod resolve;
mod travel;

pub use generate::GenerateError;
pub use push::{MAX_PUSH_LEGS, PushResult};
pub use travel::{MAX_TRAVEL_SEGMENTS, SEGMENT_ROTATION_CAP};

/// Inertia is clamped away from zero so impulse math never divides by it.
const MIN_MOMENT_OF_INERTIA: f32 = 0.000001;

#[derive(Clone, Debug, Default)]
pub struct AtomGroup {
    atoms: Vec<Atom>,
    /// Sub-group id -> indices into `atoms`. Entry 0 is implicit (atoms with
    /// sub id 0 belong to the owner body itself and are not filed here).
    sub_groups: HashMap<i32, Vec<usize>>,
    /// Representative material, taken from the first atom.
    material: MaterialId,
    resolution: u32,
    depth: u32,
    /// Cached; 0 forces a recompute on next use.
    moment_of_inertia: f32,
    /// MOIDs skipped by every atom's collision query this frame.
    ignore_moids: Vec<MoId>,
    /// Where this group currently is when driven as a limb.
    limb_pos: Option<Vec2>,
    /// Offset of the limb's joint from the owner's origin, un-rotated.
    joint_offset: Vec2,
}

impl AtomGroup {
    /// Build from an explicit atom list. An empty list gets the single
    /// fallback atom at the origin so the group is never empty.
    pub fn from_atoms(mut atoms: Vec<Atom>) -> Self {
        if atoms.is_empty() {
            atoms.push(Atom::new(Vec2::zero(), MAT_AIR, 0));
        }
        let material = atoms[0].material;
        let mut group = Self {
            atoms,
            material,
            resolution: 1,
            ..Default::default()
        };
        group.rebuild_sub_groups();
        group
    }

    /// Deep copy, optionally keeping only the owner's atoms (sub id 0) and
    /// dropping every limb sub-group.
    pub fn clone_filtered(&self, only_owner_atoms: bool) -> Self {
        let atoms: Vec<Atom> = if only_owner_atoms {
            self.atoms.iter().filter(|a| a.sub_id == 0).cloned().collect()
        } else {
            self.atoms.clone()
        };
        let mut group = Self {
            atoms,
            material: self.material,
            resolution: self.resolution,
            depth: self.depth,
            joint_offset: self.joint_offset,
            ..Default::default()
        };
        if group.atoms.is_empty() {
            group.atoms.push(Atom::new(Vec2::zero(), self.material, 0));
        }
        group.rebuild_sub_groups();
        group
    }

    // === ATOM ACCESS ===

    pub fn atom_count(&self) -> usize {
        self.atoms.len()
    }

    pub fn atoms(&self) -> &[Atom] {
        &self.atoms
    }

    pub(crate) fn atoms_mut(&mut self) -> &mut [Atom] {
        &mut self.atoms
    }

    pub fn material(&self) -> MaterialId {
        self.material
    }

    pub fn resolution(&self) -> u32 {
        self.resolution
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// Append one atom (manual construction from serialized data).
    pub fn add_atom(&mut self, atom: Atom) {
        if self.atoms.is_empty() {
            self.material = atom.material;
        }
        let idx = self.atoms.len();
        let sub_id = atom.sub_id;
        self.atoms.push(atom);
        if sub_id != 0 {
            self.sub_groups.entry(sub_id).or_default().push(idx);
        }
        self.moment_of_inertia = 0.0;
    }

    /// World position of an atom for a given body pose.
    #[inline]
    pub fn atom_world_pos(atom: &Atom, body_pos: Vec2, angle: f32) -> Vec2 {
        body_pos + atom.offset.rotated(angle)
    }

    /// Largest atom offset, pixels; the body's collision radius.
    pub fn max_radius(&self) -> f32 {
        self.atoms
            .iter()
            .map(|a| a.offset.length())
            .fold(0.0, f32::max)
    }

    // === SUB-GROUPS ===

    /// Clone externally supplied atoms into this group under `sub_id`, each
    /// placed at `offset + original_offset.rotated(angle)`.
    pub fn add_atoms(&mut self, source: &[Atom], sub_id: i32, offset: Vec2, angle: f32) {
        debug_assert!(sub_id != 0, "sub id 0 is reserved for owner atoms");
        for src in source {
            let mut atom = src.clone();
            atom.sub_id = sub_id;
            atom.original_offset = src.original_offset;
            atom.offset = offset + src.original_offset.rotated(angle);
            let idx = self.atoms.len();
            self.atoms.push(atom);
            self.sub_groups.entry(sub_id).or_default().push(idx);
        }
        self.moment_of_inertia = 0.0;
    }

    /// Re-position every atom already in a sub-group so the collision shape
    /// follows the limb's current pose. Returns whether the group exists.
    pub fn update_sub_atoms(&mut self, sub_id: i32, offset: Vec2, angle: f32) -> bool {
        let Some(indices) = self.sub_groups.get(&sub_id) else {
            return false;
        };
        for &idx in indices {
            let atom = &mut self.atoms[idx];
            atom.offset = offset + atom.original_offset.rotated(angle);
        }
        true
    }

    /// Delete every atom tagged `sub_id` and drop the sub-group entry.
    /// Returns whether anything was removed.
    pub fn remove_atoms(&mut self, sub_id: i32) -> bool {
        if !self.sub_groups.contains_key(&sub_id) {
            return false;
        }
        self.atoms.retain(|a| a.sub_id != sub_id);
        self.rebuild_sub_groups();
        self.moment_of_inertia = 0.0;
        true
    }

    pub fn contains_sub_group(&self, sub_id: i32) -> bool {
        self.sub_groups.contains_key(&sub_id)
    }

    pub fn sub_group_atom_count(&self, sub_id: i32) -> usize {
        self.sub_groups.get(&sub_id).map_or(0, |v| v.len())
    }

    fn rebuild_sub_groups(&mut self) {
        self.sub_groups.clear();
        for (idx, atom) in self.atoms.iter().enumerate() {
            if atom.sub_id != 0 {
                self.sub_groups.entry(atom.sub_id).or_default().push(idx);
            }
        }
    }

    // === MOMENT OF INERTIA ===

    /// Lazily computed from the owner's mass spread evenly across the atoms.
    /// Callers that change the owner's mass call `reset_moment_of_inertia`.
    pub fn moment_of_inertia(&mut self, owner_mass: f32) -> f32 {
        if self.moment_of_inertia == 0.0 {
            let per_atom_mass = owner_mass / self.atoms.len().max(1) as f32;
            let mut total = 0.0;
            for atom in &self.atoms {
                let r = atom.offset.length() * METERS_PER_PIXEL;
                total += per_atom_mass * r * r;
            }
            // Degenerate single-atom-at-origin case.
            self.moment_of_inertia = total.max(MIN_MOMENT_OF_INERTIA);
        }
        self.moment_of_inertia
    }

    pub fn reset_moment_of_inertia(&mut self) {
        self.moment_of_inertia = 0.0;
    }

    // === MOID IGNORE LIST (frame-scoped) ===

    pub fn add_moid_to_ignore(&mut self, moid: MoId) {
        if !self.ignore_moids.contains(&moid) {
            self.ignore_moids.push(moid);
        }
    }

    pub fn is_ignoring_moid(&self, moid: MoId) -> bool {
        self.ignore_moids.contains(&moid)
    }

    pub fn clear_moid_ignore_list(&mut self) {
        self.ignore_moids.clear();
    }

    pub(crate) fn ignore_moids(&self) -> &[MoId] {
        &self.ignore_moids
    }

    // === LIMB STATE ===

    pub fn limb_pos(&self) -> Option<Vec2> {
        self.limb_pos
    }

    pub fn set_limb_pos(&mut self, pos: Option<Vec2>) {
        self.limb_pos = pos;
    }

    pub fn joint_offset(&self) -> Vec2 {
        self.joint_offset
    }

    pub fn set_joint_offset(&mut self, offset: Vec2) {
        self.joint_offset = offset;
    }

    // === TERRAIN OVERLAP QUERIES ===

    /// Fraction of atoms currently inside solid terrain at the given pose.
    pub fn terrain_embed_fraction(&self, scene: &Scene, body_pos: Vec2, angle: f32) -> f32 {
        if self.atoms.is_empty() {
            return 0.0;
        }
        let embedded = self
            .atoms
            .iter()
            .filter(|a| {
                let p = Self::atom_world_pos(a, body_pos, angle);
                scene.terr_is_solid(p.x.floor() as i32, p.y.floor() as i32)
            })
            .count();
        embedded as f32 / self.atoms.len() as f32
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::materials::MAT_STONE;

    fn atom_at(x: f32, y: f32, sub_id: i32) -> Atom {
        Atom::new(Vec2::new(x, y), MAT_STONE, sub_id)
    }

    #[test]
    fn moment_of_inertia_is_never_zero() {
        // Single atom at the origin is the degenerate case.
        let mut group = AtomGroup::from_atoms(vec![atom_at(0.0, 0.0, 0)]);
        let inertia = group.moment_of_inertia(10.0);
        assert!(inertia > 0.0);

        let mut cross = AtomGroup::from_atoms(testutil::cross_atoms(5.0, MAT_STONE));
        assert!(cross.moment_of_inertia(10.0) > inertia);
    }

    #[test]
    fn from_atoms_never_leaves_the_group_empty() {
        let group = AtomGroup::from_atoms(Vec::new());
        assert_eq!(group.atom_count(), 1);
        assert_eq!(group.atoms()[0].offset, Vec2::zero());
    }

    #[test]
    fn remove_atoms_deletes_exactly_the_tagged_ones() {
        // Tags {0, 0, 7, 7, 3}.
        let mut group = AtomGroup::from_atoms(vec![
            atom_at(0.0, 0.0, 0),
            atom_at(1.0, 0.0, 0),
            atom_at(2.0, 0.0, 7),
            atom_at(3.0, 0.0, 7),
            atom_at(4.0, 0.0, 3),
        ]);
        assert!(group.remove_atoms(7));
        assert_eq!(group.atom_count(), 3);
        assert!(!group.contains_sub_group(7));
        assert!(group.contains_sub_group(3));
        assert_eq!(group.sub_group_atom_count(3), 1);
        assert!(group.atoms().iter().all(|a| a.sub_id != 7));

        // Removing again is a no-op.
        assert!(!group.remove_atoms(7));
    }

    #[test]
    fn sub_group_indices_always_point_at_live_atoms() {
        let mut group = AtomGroup::from_atoms(vec![atom_at(0.0, 0.0, 0)]);
        group.add_atoms(
            &[atom_at(2.0, 0.0, 0), atom_at(0.0, 2.0, 0)],
            5,
            Vec2::new(1.0, 1.0),
            0.0,
        );
        assert_eq!(group.atom_count(), 3);
        assert_eq!(group.sub_group_atom_count(5), 2);
        for idx in group.sub_groups.get(&5).unwrap() {
            assert!(*idx < group.atom_count());
            assert_eq!(group.atoms()[*idx].sub_id, 5);
        }
    }

    #[test]
    fn update_sub_atoms_rebases_from_original_offsets() {
        let mut group = AtomGroup::from_atoms(vec![atom_at(0.0, 0.0, 0)]);
        group.add_atoms(&[atom_at(3.0, 0.0, 0)], 2, Vec2::zero(), 0.0);
        assert!(group.update_sub_atoms(2, Vec2::new(10.0, 0.0), std::f32::consts::FRAC_PI_2));
        let moved = group
            .atoms()
            .iter()
            .find(|a| a.sub_id == 2)
            .expect("sub atom present");
        assert!((moved.offset.x - 10.0).abs() < 1e-5);
        assert!((moved.offset.y - 3.0).abs() < 1e-5);

        assert!(!group.update_sub_atoms(99, Vec2::zero(), 0.0));
    }

    #[test]
    fn clone_filtered_keeps_only_owner_atoms() {
        let mut group = AtomGroup::from_atoms(vec![atom_at(0.0, 0.0, 0), atom_at(1.0, 0.0, 0)]);
        group.add_atoms(
            &[atom_at(2.0, 0.0, 0), atom_at(3.0, 0.0, 0), atom_at(4.0, 0.0, 0)],
            5,
            Vec2::zero(),
            0.0,
        );
        assert_eq!(group.atom_count(), 5);

        let copy = group.clone_filtered(true);
        assert_eq!(copy.atom_count(), 2);
        assert!(copy.atoms().iter().all(|a| a.sub_id == 0));
        assert!(!copy.contains_sub_group(5));

        let full = group.clone_filtered(false);
        assert_eq!(full.atom_count(), 5);
        assert_eq!(full.sub_group_atom_count(5), 3);
    }

    #[test]
    fn ignore_list_clears_to_empty() {
        let mut group = AtomGroup::from_atoms(vec![atom_at(0.0, 0.0, 0)]);
        group.add_moid_to_ignore(9);
        group.add_moid_to_ignore(9);
        assert!(group.is_ignoring_moid(9));
        group.clear_moid_ignore_list();
        assert!(!group.is_ignoring_moid(9));
        assert!(!group.is_ignoring_moid(1));
    }

    #[test]
    fn add_atom_invalidates_cached_inertia() {
        let mut group = AtomGroup::from_atoms(vec![atom_at(1.0, 0.0, 0)]);
        let before = group.moment_of_inertia(10.0);
        group.add_atom(atom_at(8.0, 0.0, 0));
        let after = group.moment_of_inertia(10.0);
        assert!(after > before);
    }
}
