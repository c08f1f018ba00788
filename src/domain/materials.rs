//! Material definitions and the registry that owns them.
//!
//! Materials are shared by terrain pixels and atoms; lookups are by index
//! into a flat table. A built-in table covers the stock materials and a JSON
//! bundle can replace it at runtime.

use std::collections::HashMap;

use serde::Deserialize;
use thiserror::Error;

pub type MaterialId = u8;

pub const MAT_AIR: MaterialId = 0;
pub const MAT_EARTH: MaterialId = 1;
pub const MAT_STONE: MaterialId = 2;
pub const MAT_METAL: MaterialId = 3;
pub const MAT_RUBBER: MaterialId = 4;

/// Physical properties of one material.
#[derive(Clone, Copy, Debug)]
pub struct Material {
    /// Impulse magnitude (kg*m/s) a single pixel of this material withstands
    /// before a traveling atom punches through it.
    pub strength: f32,
    /// Restitution, 0.0 = dead stop, 1.0 = fully elastic.
    pub restitution: f32,
    /// Coulomb friction coefficient for tangential contact.
    pub friction: f32,
    /// kg per cubic meter; used when converting dug-out terrain to debris.
    pub density: f32,
}

/// Built-in table, indexed by `MaterialId`.
pub const MATERIAL_DATA: [Material; 5] = [
    // air
    Material { strength: 0.0, restitution: 0.0, friction: 0.0, density: 0.0 },
    // earth
    Material { strength: 8.0, restitution: 0.15, friction: 0.7, density: 1600.0 },
    // stone
    Material { strength: 1000.0, restitution: 0.5, friction: 0.6, density: 2500.0 },
    // metal
    Material { strength: 4000.0, restitution: 0.6, friction: 0.4, density: 7800.0 },
    // rubber
    Material { strength: 120.0, restitution: 0.9, friction: 0.9, density: 1100.0 },
];

#[derive(Debug, Error)]
pub enum MaterialBundleError {
    #[error("bundle is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("too many materials for u8 ids: max_id={0}")]
    TooManyMaterials(u16),
    #[error("duplicate material id: {0}")]
    DuplicateId(u16),
    #[error("missing material id {0} (table must be contiguous)")]
    MissingId(usize),
    #[error("missing material id 0 (air)")]
    MissingAir,
}

/// Owns the material table and resolves ids to properties.
#[derive(Clone)]
pub struct MaterialRegistry {
    materials: Vec<Material>,
    key_to_id: HashMap<String, MaterialId>,
}

impl MaterialRegistry {
    /// Registry with the built-in material table.
    pub fn from_builtin() -> Self {
        let mut key_to_id = HashMap::new();
        key_to_id.insert("base:air".to_string(), MAT_AIR);
        key_to_id.insert("base:earth".to_string(), MAT_EARTH);
        key_to_id.insert("base:stone".to_string(), MAT_STONE);
        key_to_id.insert("base:metal".to_string(), MAT_METAL);
        key_to_id.insert("base:rubber".to_string(), MAT_RUBBER);

        Self {
            materials: MATERIAL_DATA.to_vec(),
            key_to_id,
        }
    }

    pub fn from_bundle_json(json: &str) -> Result<Self, MaterialBundleError> {
        let bundle: BundleRoot = serde_json::from_str(json)?;
        Self::from_bundle(bundle)
    }

    pub fn material_count(&self) -> usize {
        self.materials.len()
    }

    pub fn props(&self, id: MaterialId) -> Option<&Material> {
        self.materials.get(id as usize)
    }

    /// Strength lookup that treats unknown ids as indestructible; only the
    /// terrain penetration path uses this.
    pub fn strength(&self, id: MaterialId) -> f32 {
        self.props(id).map_or(f32::INFINITY, |m| m.strength)
    }

    pub fn id_by_key(&self, key: &str) -> Option<MaterialId> {
        self.key_to_id.get(key).copied()
    }

    fn from_bundle(bundle: BundleRoot) -> Result<Self, MaterialBundleError> {
        let mut max_id: u16 = 0;
        for m in bundle.materials.iter() {
            if m.id > max_id {
                max_id = m.id;
            }
        }
        if max_id > (u8::MAX as u16) {
            return Err(MaterialBundleError::TooManyMaterials(max_id));
        }

        let len = (max_id as usize) + 1;
        let mut by_id: Vec<Option<Material>> = vec![None; len];
        let mut key_to_id = HashMap::new();

        for m in bundle.materials.into_iter() {
            let idx = m.id as usize;
            if by_id[idx].is_some() {
                return Err(MaterialBundleError::DuplicateId(m.id));
            }
            by_id[idx] = Some(Material {
                strength: m.strength as f32,
                restitution: m.restitution as f32,
                friction: m.friction as f32,
                density: m.density as f32,
            });
            key_to_id.insert(m.key, m.id as MaterialId);
        }

        if by_id[MAT_AIR as usize].is_none() {
            return Err(MaterialBundleError::MissingAir);
        }

        let mut materials = Vec::with_capacity(len);
        for (idx, slot) in by_id.into_iter().enumerate() {
            materials.push(slot.ok_or(MaterialBundleError::MissingId(idx))?);
        }

        Ok(Self { materials, key_to_id })
    }
}

impl Default for MaterialRegistry {
    fn default() -> Self {
        Self::from_builtin()
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BundleRoot {
    materials: Vec<BundleMaterial>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BundleMaterial {
    id: u16,
    key: String,
    strength: f64,
    restitution: f64,
    friction: f64,
    density: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_table_resolves_keys_and_ids() {
        let reg = MaterialRegistry::from_builtin();
        assert_eq!(reg.material_count(), MATERIAL_DATA.len());
        assert_eq!(reg.id_by_key("base:stone"), Some(MAT_STONE));
        assert!(reg.props(MAT_RUBBER).unwrap().restitution > 0.8);
    }

    #[test]
    fn bundle_round_trip_and_validation() {
        let json = r#"{
            "materials": [
                { "id": 0, "key": "base:air", "strength": 0, "restitution": 0, "friction": 0, "density": 0 },
                { "id": 1, "key": "mod:snow", "strength": 2.5, "restitution": 0.05, "friction": 0.3, "density": 300 }
            ]
        }"#;
        let reg = MaterialRegistry::from_bundle_json(json).unwrap();
        assert_eq!(reg.material_count(), 2);
        assert_eq!(reg.id_by_key("mod:snow"), Some(1));

        let missing_air = r#"{
            "materials": [
                { "id": 1, "key": "mod:snow", "strength": 2.5, "restitution": 0.05, "friction": 0.3, "density": 300 }
            ]
        }"#;
        assert!(matches!(
            MaterialRegistry::from_bundle_json(missing_air),
            Err(MaterialBundleError::MissingAir)
        ));
    }

    #[test]
    fn unknown_id_is_indestructible() {
        let reg = MaterialRegistry::from_builtin();
        assert_eq!(reg.strength(200), f32::INFINITY);
    }
}
