//! Engine configuration.

use crate::dice::DiceRoller;
use crate::planes::PlanarTable;
use crate::ritual::RitualConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Configuration for a [`SpellEngine`](crate::engine::SpellEngine).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Seed for the dice roller; `None` draws from OS entropy.
    pub seed: Option<u64>,
    /// Feet per grid square.
    pub grid_unit_feet: u32,
    /// Ritual rules.
    pub ritual: RitualConfig,
    /// Replaces the built-in planar table.
    pub planes: Option<PlanarTable>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            seed: None,
            grid_unit_feet: 5,
            ritual: RitualConfig::default(),
            planes: None,
        }
    }
}

impl EngineConfig {
    /// A configuration with a fixed seed, for reproducible resolution.
    pub fn seeded(seed: u64) -> Self {
        Self::default().with_seed(seed)
    }

    /// Set the dice seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Set the grid scale.
    pub fn with_grid_unit_feet(mut self, feet: u32) -> Self {
        self.grid_unit_feet = feet;
        self
    }

    /// Set the ritual rules.
    pub fn with_ritual(mut self, ritual: RitualConfig) -> Self {
        self.ritual = ritual;
        self
    }

    /// Use a custom planar table.
    pub fn with_planes(mut self, planes: PlanarTable) -> Self {
        self.planes = Some(planes);
        self
    }

    /// Parse and validate a JSON configuration.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON configuration file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.grid_unit_feet == 0 {
            return Err(ConfigError::Invalid("grid_unit_feet must be positive".to_string()));
        }
        if let Some(threshold) = self.ritual.material_threshold {
            if !(0.0..=1.0).contains(&threshold) {
                return Err(ConfigError::Invalid(format!(
                    "material_threshold {threshold} is outside 0.0..=1.0"
                )));
            }
        }
        if let Some(entry) = self
            .ritual
            .backlash
            .iter()
            .find(|b| !(0.0..=1.0).contains(&b.min_progress))
        {
            return Err(ConfigError::Invalid(format!(
                "backlash '{}' has min_progress {} outside 0.0..=1.0",
                entry.description, entry.min_progress
            )));
        }
        Ok(())
    }

    /// The planar table in effect.
    pub fn planar_table(&self) -> PlanarTable {
        self.planes.clone().unwrap_or_else(PlanarTable::builtin)
    }

    /// A roller honoring the configured seed.
    pub fn roller(&self) -> DiceRoller {
        match self.seed {
            Some(seed) => DiceRoller::seeded(seed),
            None => DiceRoller::from_entropy(),
        }
    }
}
