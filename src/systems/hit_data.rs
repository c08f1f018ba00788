//! Transient per-collision record shared between atoms and bodies.

use crate::core::math::Vec2;
use crate::domain::materials::{MaterialId, MAT_AIR};
use crate::spatial::moid::{MoId, NO_MOID};

/// Index of the moving side in the two-sided arrays.
pub const HITOR: usize = 0;
/// Index of the struck side.
pub const HITEE: usize = 1;

/// Kinematic snapshot of one collision, built fresh per evaluation and
/// consumed immediately; never persisted across frames.
#[derive(Clone, Copy, Debug)]
pub struct HitData {
    /// Body ids for each side; the hitee is `NO_MOID` for terrain hits.
    pub body_ids: [MoId; 2],
    /// Contact point in world pixels.
    pub hit_point: Vec2,
    /// Contact surface normal (unit, pointing away from the struck surface).
    pub hit_normal: Vec2,
    /// Terrain material struck, if any.
    pub hit_material: MaterialId,
    /// Contact-point radius from each side's center of mass, in meters.
    pub hit_radius: [Vec2; 2],
    /// Pre-collision velocity of the contact point on each side, m/s.
    pub hit_vel: [Vec2; 2],
    pub total_mass: [f32; 2],
    pub moment_inertia: [f32; 2],
    /// Share of the collision this contact carries when several atoms strike
    /// the same victim in one step.
    pub impulse_factor: [f32; 2],
    /// Resulting impulse to apply to each side, kg*m/s.
    pub res_impulse: [Vec2; 2],
}

impl Default for HitData {
    fn default() -> Self {
        Self {
            body_ids: [NO_MOID; 2],
            hit_point: Vec2::zero(),
            hit_normal: Vec2::zero(),
            hit_material: MAT_AIR,
            hit_radius: [Vec2::zero(); 2],
            hit_vel: [Vec2::zero(); 2],
            total_mass: [0.0; 2],
            moment_inertia: [0.0; 2],
            impulse_factor: [1.0; 2],
            res_impulse: [Vec2::zero(); 2],
        }
    }
}
