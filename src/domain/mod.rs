pub mod materials;
pub mod sprite;
