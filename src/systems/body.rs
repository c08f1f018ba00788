//! The contract between the travel core and the bodies it moves.
//!
//! The physics core never owns bodies; it advances a `Kinematics` snapshot
//! in place and talks to the owner (and any struck victim) through the
//! `Body` trait. Victims are looked up by MOID through `MoRegistry`.

use crate::core::math::Vec2;
use crate::spatial::moid::MoId;
use crate::spatial::scene::Scene;

use super::hit_data::HitData;

/// Kinematic state a travel call advances in place.
#[derive(Clone, Copy, Debug, Default)]
pub struct Kinematics {
    /// World position of the body origin, pixels.
    pub pos: Vec2,
    /// Linear velocity, m/s.
    pub vel: Vec2,
    /// Rotation angle, radians.
    pub angle: f32,
    /// Angular velocity, radians/s.
    pub ang_vel: f32,
    /// Set when the position wrapped around a scene edge this travel.
    pub did_wrap: bool,
}

/// Callbacks and physical properties the travel core needs from a body.
///
/// The owner of the traveling group implements this, and so does any body
/// that can be struck. Returning `true` from `on_bounce`/`on_sink` halts the
/// rest of the travel call; returning `true` from `on_mo_hit` vetoes that
/// collision. None of these are errors - they are normal control flow.
pub trait Body {
    fn moid(&self) -> MoId;
    fn mass(&self) -> f32;
    /// Representative restitution used when this body is the struck side.
    fn restitution(&self) -> f32;
    fn position(&self) -> Vec2;
    fn velocity(&self) -> Vec2;
    fn angular_velocity(&self) -> f32;
    fn moment_of_inertia(&mut self) -> f32;

    /// Pinned bodies never move; intersection pushes fall entirely on the
    /// other side.
    fn is_pinned(&self) -> bool {
        false
    }

    /// Whether this body has been flagged dead mid-frame (gibbed by a
    /// callback); travel checks this before continuing.
    fn to_delete(&self) -> bool {
        false
    }

    fn on_bounce(&mut self, hit: &HitData) -> bool;
    fn on_sink(&mut self, hit: &HitData) -> bool;
    fn on_mo_hit(&mut self, other: MoId) -> bool;

    /// Apply the hitee-side response; returns whether the collision was
    /// accepted.
    fn collide_at_point(&mut self, hit: &mut HitData) -> bool;

    /// Accumulate the impulse this travel call produced (gib-limit checks
    /// happen on the owner after travel returns).
    fn add_travel_impulse(&mut self, impulse: Vec2);

    /// Request a deep-penetration re-check next frame.
    fn force_deep_check(&mut self, enabled: bool);

    /// Push the body out of an intersection by `displacement` pixels.
    /// Returns `false` when the body got squished (destroyed) instead.
    fn push_out(&mut self, displacement: Vec2, scene: &mut Scene) -> bool;
}

/// Lookup of other bodies by MOID for victim-side responses.
pub trait MoRegistry {
    fn body_mut(&mut self, id: MoId) -> Option<&mut dyn Body>;
}

/// Registry with no other bodies; single-body travel and tests.
pub struct NoBodies;

impl MoRegistry for NoBodies {
    fn body_mut(&mut self, _id: MoId) -> Option<&mut dyn Body> {
        None
    }
}
