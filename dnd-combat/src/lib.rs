//! D&D 5e spell effect resolution and reaction engine.
//!
//! This crate provides:
//! - Effect commands for every spell archetype, dispatched by exhaustive match
//! - Target allocation, including rolled resource pools
//! - Opportunity-attack analysis along movement paths
//! - Saving throws, concentration and long-form ritual casting
//! - Plane-dependent rule overrides
//!
//! # Quick Start
//!
//! ```ignore
//! use dnd_combat::{get_spell, CastRequest, CombatState, EngineConfig, SpellEngine};
//!
//! let mut engine = SpellEngine::new(EngineConfig::seeded(42));
//! let mut state = CombatState::new();
//! let wizard = state.add_character(my_wizard);
//! let goblin = state.add_character(my_goblin);
//!
//! let fireball = get_spell("fireball").unwrap();
//! let report = engine.cast(
//!     CastRequest::new(fireball, wizard).with_candidates([goblin]),
//!     &mut state,
//! )?;
//! for entry in state.log.entries() {
//!     println!("{}", entry.message);
//! }
//! ```

pub mod character;
pub mod combat;
pub mod commands;
pub mod concentration;
pub mod config;
pub mod dice;
pub mod effects;
pub mod engine;
pub mod error;
pub mod planes;
pub mod reactions;
pub mod ritual;
pub mod saves;
pub mod spells;
pub mod targeting;
pub mod testing;

// Primary public API
pub use character::{
    Ability, AbilityScores, ActiveCondition, CastId, CharacterId, CombatAbility, CombatCharacter,
    Condition, ConditionDuration, DamageType, MeleeReach, Position, Team,
};
pub use combat::{CombatLog, CombatState, LogEntry, LogKind};
pub use config::{ConfigError, EngineConfig};
pub use dice::{Advantage, DiceError, DiceRoller};
pub use effects::{EffectKind, SpellEffect};
pub use engine::{CastReport, CastRequest, RitualDisturbance, SpellEngine};
pub use error::{EngineError, ResolutionError, ValidationError};
pub use planes::{get_planar_magic_mechanic, get_planar_spell_modifier, PlanarMechanic, PlaneId};
pub use reactions::{GridMap, LineOfSight, OpportunityAttack};
pub use ritual::{DisturbanceEvent, RitualConfig, RitualId, RitualState};
pub use spells::{get_spell, Spell, SpellSchool};
pub use testing::TestHarness;
