pub mod atom;
pub mod atom_group;
pub mod body;
pub mod hit_data;
