//! Plane-dependent rule overrides.
//!
//! A pure lookup keyed by plane and spell school. Commands consult the
//! mechanic and the numeric spell modifier; they never inspect plane ids
//! themselves, so new planes only ever touch this table.

use crate::config::ConfigError;
use crate::spells::SpellSchool;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Identifier for a plane of existence ("material", "feywild").
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlaneId(pub String);

impl PlaneId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into().to_lowercase())
    }

    pub fn material() -> Self {
        Self::new("material")
    }
}

impl Default for PlaneId {
    fn default() -> Self {
        Self::material()
    }
}

impl fmt::Display for PlaneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A named rule override.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanarMechanic {
    /// Durations of the school's effects are doubled.
    DoubleDuration,
    /// Damage dice are rolled twice and the higher total kept.
    RerollTakeHigher,
    /// The school has the upper hand: targets save at disadvantage.
    Advantage,
    /// A mechanic this engine carries but does not interpret.
    Other(String),
}

impl PlanarMechanic {
    pub fn name(&self) -> &str {
        match self {
            PlanarMechanic::DoubleDuration => "double duration",
            PlanarMechanic::RerollTakeHigher => "reroll and take higher",
            PlanarMechanic::Advantage => "advantage",
            PlanarMechanic::Other(name) => name,
        }
    }
}

/// Overrides for one plane.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plane {
    pub id: PlaneId,
    pub name: String,
    #[serde(default)]
    pub mechanics: HashMap<SpellSchool, PlanarMechanic>,
    /// Added to save DCs and ritual concentration.
    #[serde(default)]
    pub spell_modifiers: HashMap<SpellSchool, i32>,
}

impl Plane {
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: PlaneId::new(id),
            name: name.to_string(),
            mechanics: HashMap::new(),
            spell_modifiers: HashMap::new(),
        }
    }

    pub fn with_mechanic(mut self, school: SpellSchool, mechanic: PlanarMechanic) -> Self {
        self.mechanics.insert(school, mechanic);
        self
    }

    pub fn with_modifier(mut self, school: SpellSchool, modifier: i32) -> Self {
        self.spell_modifiers.insert(school, modifier);
        self
    }
}

/// The plane lookup table. Serialized as a list of planes.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "Vec<Plane>", into = "Vec<Plane>")]
pub struct PlanarTable {
    planes: HashMap<PlaneId, Plane>,
}

impl From<Vec<Plane>> for PlanarTable {
    fn from(planes: Vec<Plane>) -> Self {
        planes.into_iter().fold(Self::new(), Self::with_plane)
    }
}

impl From<PlanarTable> for Vec<Plane> {
    fn from(table: PlanarTable) -> Self {
        let mut planes: Vec<Plane> = table.planes.into_values().collect();
        planes.sort_by(|a, b| a.id.0.cmp(&b.id.0));
        planes
    }
}

impl PlanarTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in table.
    pub fn builtin() -> Self {
        BUILTIN_PLANES.clone()
    }

    /// Load a table from a JSON list of planes.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn with_plane(mut self, plane: Plane) -> Self {
        self.insert(plane);
        self
    }

    /// Add or replace a plane.
    pub fn insert(&mut self, plane: Plane) {
        self.planes.insert(plane.id.clone(), plane);
    }

    pub fn get(&self, plane: &PlaneId) -> Option<&Plane> {
        self.planes.get(plane)
    }

    pub fn mechanic(&self, plane: &PlaneId, school: SpellSchool) -> Option<&PlanarMechanic> {
        self.planes.get(plane)?.mechanics.get(&school)
    }

    /// Numeric modifier for the school on this plane; 0 when none applies.
    pub fn spell_modifier(&self, plane: &PlaneId, school: SpellSchool) -> i32 {
        self.planes
            .get(plane)
            .and_then(|p| p.spell_modifiers.get(&school))
            .copied()
            .unwrap_or(0)
    }
}

lazy_static::lazy_static! {
    static ref BUILTIN_PLANES: PlanarTable = PlanarTable::new()
        .with_plane(Plane::new("material", "Material Plane"))
        .with_plane(
            Plane::new("feywild", "Feywild")
                .with_mechanic(SpellSchool::Enchantment, PlanarMechanic::Advantage)
                .with_mechanic(SpellSchool::Illusion, PlanarMechanic::Advantage)
                .with_modifier(SpellSchool::Enchantment, 1)
                .with_modifier(SpellSchool::Illusion, 1),
        )
        .with_plane(
            Plane::new("shadowfell", "Shadowfell")
                .with_mechanic(SpellSchool::Necromancy, PlanarMechanic::RerollTakeHigher)
                .with_modifier(SpellSchool::Necromancy, 1)
                .with_modifier(SpellSchool::Evocation, -1),
        )
        .with_plane(
            Plane::new("elemental_fire", "Elemental Plane of Fire")
                .with_mechanic(SpellSchool::Evocation, PlanarMechanic::RerollTakeHigher)
                .with_modifier(SpellSchool::Evocation, 1),
        )
        .with_plane(
            Plane::new("astral", "Astral Plane")
                .with_mechanic(SpellSchool::Enchantment, PlanarMechanic::DoubleDuration)
                .with_mechanic(SpellSchool::Divination, PlanarMechanic::DoubleDuration)
                .with_modifier(SpellSchool::Divination, 2),
        )
        .with_plane(
            Plane::new("nine_hells", "Nine Hells")
                .with_mechanic(
                    SpellSchool::Conjuration,
                    PlanarMechanic::Other("infernal bargain".to_string()),
                )
                .with_modifier(SpellSchool::Abjuration, -2),
        );
}

/// Mechanic override for a school on a plane, from the built-in table.
pub fn get_planar_magic_mechanic(plane: &PlaneId, school: SpellSchool) -> Option<PlanarMechanic> {
    BUILTIN_PLANES.mechanic(plane, school).cloned()
}

/// Numeric spell modifier for a school on a plane, from the built-in table.
pub fn get_planar_spell_modifier(plane: &PlaneId, school: SpellSchool) -> i32 {
    BUILTIN_PLANES.spell_modifier(plane, school)
}
