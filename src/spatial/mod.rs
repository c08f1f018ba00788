pub mod moid;
pub mod raycast;
pub mod scene;
pub mod terrain;
