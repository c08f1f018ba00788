//! Pixelbody Engine - pixel-accurate rigid body physics for destructible
//! 2D worlds, compiled to WASM.
//!
//! Layout:
//! - core/       - math primitives and unit conventions
//! - domain/     - materials and sprite masks
//! - spatial/    - terrain, MOID layer, rays, the scene context
//! - systems/    - atoms, atom groups, travel and collision response
//! - simulation/ - the frame loop that owns scene and bodies
//! - api/        - JS-facing facade

pub mod api;
pub mod core;
pub mod domain;
pub mod simulation;
pub mod spatial;
pub mod systems;

use wasm_bindgen::prelude::*;

// Better error messages in debug mode
#[cfg(feature = "console_error_panic_hook")]
pub fn set_panic_hook() {
    console_error_panic_hook::set_once();
}

/// Initialize the engine
#[wasm_bindgen]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    set_panic_hook();

    web_sys::console::log_1(&"pixelbody engine initialized".into());
}

/// Get engine version
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

// Re-export main types
pub use api::wasm::World;
pub use crate::core::math::Vec2;
pub use simulation::{PixelBody, SimulationCore};
pub use systems::atom::Atom;
pub use systems::atom_group::AtomGroup;
pub use systems::body::{Body, Kinematics, MoRegistry};
pub use systems::hit_data::HitData;

// Export material constants for JS
#[wasm_bindgen]
pub fn mat_air() -> u8 { domain::materials::MAT_AIR }
#[wasm_bindgen]
pub fn mat_earth() -> u8 { domain::materials::MAT_EARTH }
#[wasm_bindgen]
pub fn mat_stone() -> u8 { domain::materials::MAT_STONE }
#[wasm_bindgen]
pub fn mat_metal() -> u8 { domain::materials::MAT_METAL }
#[wasm_bindgen]
pub fn mat_rubber() -> u8 { domain::materials::MAT_RUBBER }
