//! Testing utilities for the effect engine.
//!
//! This module provides tools for integration testing:
//! - Sample combatants with known stat blocks
//! - `TestHarness` for scripted-dice casting scenarios
//! - Assertion helpers for verifying combat state

use crate::character::{
    Ability, AbilityScores, CharacterId, CombatAbility, CombatCharacter, Condition, DamageType,
    MeleeReach, Position, Team,
};
use crate::combat::{CombatState, LogKind};
use crate::config::EngineConfig;
use crate::dice::DiceRoller;
use crate::engine::{CastReport, CastRequest, SpellEngine};
use crate::error::EngineError;
use crate::spells::get_spell;

// ============================================================================
// Sample Combatants
// ============================================================================

/// A 5th-level wizard: spell save DC 15, spell attack +7, 27 HP.
pub fn sample_wizard() -> CombatCharacter {
    let mut wizard = CombatCharacter::new("Elara", Team::Party)
        .with_level(5)
        .with_ability_scores(AbilityScores::new(8, 14, 14, 18, 12, 10))
        .with_hit_points(27);
    wizard.armor_class = 12;
    wizard.spellcasting_ability = Some(Ability::Intelligence);
    wizard.saving_throw_proficiencies = [Ability::Intelligence, Ability::Wisdom].into_iter().collect();
    wizard
}

/// A 5th-level fighter with a longsword. 44 HP, AC 18.
pub fn sample_fighter() -> CombatCharacter {
    let mut fighter = CombatCharacter::new("Brannoc", Team::Party)
        .with_level(5)
        .with_ability_scores(AbilityScores::new(16, 12, 16, 10, 12, 8))
        .with_hit_points(44)
        .with_ability(
            CombatAbility::melee("Longsword", MeleeReach::Standard, "1d8+3")
                .with_attack_bonus(6)
                .with_damage_type(DamageType::Slashing),
        );
    fighter.armor_class = 18;
    fighter.saving_throw_proficiencies = [Ability::Strength, Ability::Constitution].into_iter().collect();
    fighter
}

/// A goblin with a scimitar. 7 HP, AC 15, WIS save -1.
pub fn sample_goblin() -> CombatCharacter {
    let mut goblin = CombatCharacter::new("Goblin", Team::Hostile)
        .with_ability_scores(AbilityScores::new(8, 14, 10, 10, 8, 8))
        .with_hit_points(7)
        .with_speed(30)
        .with_ability(
            CombatAbility::melee("Scimitar", MeleeReach::Standard, "1d6+2")
                .with_attack_bonus(4)
                .with_damage_type(DamageType::Slashing),
        );
    goblin.armor_class = 15;
    goblin
}

/// A hobgoblin with a pike, threatening two squares out.
pub fn sample_pikeman() -> CombatCharacter {
    let mut pikeman = CombatCharacter::new("Hobgoblin Pikeman", Team::Hostile)
        .with_level(2)
        .with_ability_scores(AbilityScores::new(14, 12, 12, 10, 10, 9))
        .with_hit_points(11)
        .with_ability(
            CombatAbility::melee("Pike", MeleeReach::Extended, "1d10+2")
                .with_attack_bonus(4)
                .with_damage_type(DamageType::Piercing),
        );
    pikeman.armor_class = 16;
    pikeman
}

/// A goblin archer carrying only a shortbow.
pub fn sample_archer() -> CombatCharacter {
    let mut archer = CombatCharacter::new("Goblin Archer", Team::Hostile)
        .with_ability_scores(AbilityScores::new(8, 14, 10, 10, 8, 8))
        .with_hit_points(7)
        .with_ability(
            CombatAbility::ranged("Shortbow", 16, 64, "1d6+2")
                .with_attack_bonus(4)
                .with_damage_type(DamageType::Piercing),
        );
    archer.armor_class = 13;
    archer
}

// ============================================================================
// Harness
// ============================================================================

/// Test harness for running casting scenarios against scripted dice.
pub struct TestHarness {
    /// The engine, rolling the scripted faces first.
    pub engine: SpellEngine,
    /// The combat state.
    pub state: CombatState,
}

impl TestHarness {
    /// Create a harness whose dice yield `faces` in order.
    pub fn new(faces: impl IntoIterator<Item = u32>) -> Self {
        Self::with_config(EngineConfig::default(), faces)
    }

    /// Create a harness with a custom configuration.
    pub fn with_config(config: EngineConfig, faces: impl IntoIterator<Item = u32>) -> Self {
        let engine = SpellEngine::new(config).with_roller(DiceRoller::scripted(faces));
        Self {
            engine,
            state: CombatState::new(),
        }
    }

    /// Add a combatant and return its id.
    pub fn add(&mut self, character: CombatCharacter) -> CharacterId {
        self.state.add_character(character)
    }

    /// Add a combatant at a position.
    pub fn add_at(&mut self, character: CombatCharacter, x: i32, y: i32) -> CharacterId {
        self.add(character.at(Position::new(x, y)))
    }

    /// Queue more die faces.
    pub fn script(&mut self, faces: impl IntoIterator<Item = u32>) -> &mut Self {
        self.engine.roller_mut().push_faces(faces);
        self
    }

    /// Cast a catalog spell at its base level on the material plane.
    ///
    /// Panics if the spell is not in the catalog.
    pub fn cast(
        &mut self,
        spell: &str,
        caster: CharacterId,
        targets: &[CharacterId],
    ) -> Result<CastReport, EngineError> {
        let spell = get_spell(spell).unwrap_or_else(|| panic!("no catalog spell named '{spell}'"));
        let request = CastRequest::new(spell, caster).with_candidates(targets.iter().copied());
        self.engine.cast(request, &mut self.state)
    }

    /// Get a combatant's HP as (current, max).
    pub fn hp(&self, id: CharacterId) -> (i32, i32) {
        let hp = &self.character(id).hit_points;
        (hp.current, hp.maximum)
    }

    /// Get a combatant's position.
    pub fn position(&self, id: CharacterId) -> Position {
        self.character(id).position
    }

    /// Check if a combatant has a condition.
    pub fn has_condition(&self, id: CharacterId, condition: &Condition) -> bool {
        self.character(id).has_condition(condition)
    }

    /// Count log entries of a kind.
    pub fn logged(&self, kind: LogKind) -> usize {
        self.state.log.count(kind)
    }

    /// Scripted faces not yet consumed.
    pub fn dice_left(&self) -> usize {
        self.engine.roller().scripted_remaining()
    }

    fn character(&self, id: CharacterId) -> &CombatCharacter {
        self.state
            .character(id)
            .unwrap_or_else(|| panic!("no combatant with id {id}"))
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new([])
    }
}

// ============================================================================
// Assertion Helpers
// ============================================================================

/// Assert a combatant's current HP.
#[track_caller]
pub fn assert_hp(harness: &TestHarness, id: CharacterId, current: i32) {
    let (actual, max) = harness.hp(id);
    assert_eq!(actual, current, "Expected HP {current}/{max}, got {actual}/{max}");
}

/// Assert a combatant carries a condition.
#[track_caller]
pub fn assert_has_condition(harness: &TestHarness, id: CharacterId, condition: &Condition) {
    assert!(
        harness.has_condition(id, condition),
        "Expected {} to be {condition}",
        harness.character(id).name
    );
}

/// Assert a combatant does NOT carry a condition.
#[track_caller]
pub fn assert_no_condition(harness: &TestHarness, id: CharacterId, condition: &Condition) {
    assert!(
        !harness.has_condition(id, condition),
        "Expected {} to NOT be {condition}",
        harness.character(id).name
    );
}

/// Assert how many log entries of a kind exist.
#[track_caller]
pub fn assert_logged(harness: &TestHarness, kind: LogKind, count: usize) {
    let actual = harness.logged(kind);
    assert_eq!(actual, count, "Expected {count} {kind:?} entries, got {actual}");
}
