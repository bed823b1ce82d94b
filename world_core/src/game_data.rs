//! Static per-type metadata supplied once per game.
//!
//! The table is keyed by [`UnitTypeId`] and never changes mid-game. A missing
//! entry is degraded data, not an error: lookups return `None` and callers
//! fall back to documented defaults (zero radius, empty footprint).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::unit::UnitTypeId;

/// One weapon slot of a unit type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Weapon {
    pub damage: f32,
    pub range: f32,
    #[serde(default)]
    pub hits_air: bool,
    #[serde(default)]
    pub hits_ground: bool,
}

/// Static metadata for one unit type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeData {
    pub name: String,
    pub radius: f32,
    #[serde(default)]
    pub weapons: Vec<Weapon>,
    #[serde(default)]
    pub town_hall: bool,
    #[serde(default)]
    pub gas_building: bool,
    #[serde(default)]
    pub worker: bool,
    #[serde(default)]
    pub mineral_field: bool,
    #[serde(default)]
    pub vespene_geyser: bool,
}

impl TypeData {
    /// Whether the type has any usable weapon.
    pub fn is_armed(&self) -> bool {
        !self.weapons.is_empty()
    }
}

/// Error that can occur when loading the metadata table.
#[derive(Debug, thiserror::Error)]
pub enum GameDataError {
    #[error("malformed type metadata: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Lookup table of static type metadata, immutable after load.
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    types: HashMap<UnitTypeId, TypeData>,
}

impl TypeRegistry {
    pub fn new(types: HashMap<UnitTypeId, TypeData>) -> Self {
        Self { types }
    }

    /// Parse the table from the JSON blob handed over at game start.
    pub fn from_json_bytes(bytes: &[u8]) -> Result<Self, GameDataError> {
        let raw: HashMap<u32, TypeData> = serde_json::from_slice(bytes)?;
        let types = raw
            .into_iter()
            .map(|(id, data)| (UnitTypeId(id), data))
            .collect();
        Ok(Self { types })
    }

    pub fn insert(&mut self, id: UnitTypeId, data: TypeData) {
        self.types.insert(id, data);
    }

    pub fn get(&self, id: UnitTypeId) -> Option<&TypeData> {
        self.types.get(&id)
    }

    /// Declared radius for a type; `0.0` when the entry is missing.
    pub fn radius(&self, id: UnitTypeId) -> f32 {
        self.types.get(&id).map(|d| d.radius).unwrap_or(0.0)
    }

    pub fn is_town_hall(&self, id: UnitTypeId) -> bool {
        self.types.get(&id).map(|d| d.town_hall).unwrap_or(false)
    }

    pub fn is_gas_building(&self, id: UnitTypeId) -> bool {
        self.types.get(&id).map(|d| d.gas_building).unwrap_or(false)
    }

    pub fn is_worker(&self, id: UnitTypeId) -> bool {
        self.types.get(&id).map(|d| d.worker).unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
