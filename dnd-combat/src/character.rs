//! Combatant records and the value types they are built from.
//!
//! A [`CombatCharacter`] is owned by the [`CombatState`](crate::combat::CombatState)
//! container; the engine only ever borrows it for the length of one
//! resolution call.

use crate::saves;
use crate::spells::SpellId;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

// ============================================================================
// ID Types
// ============================================================================

/// Unique identifier for combatants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CharacterId(pub Uuid);

impl CharacterId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CharacterId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CharacterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifies one cast of a spell; concentration links and the conditions
/// that depend on them point at it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CastId(pub Uuid);

impl CastId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CastId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CastId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Side a combatant fights on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Team {
    Party,
    Hostile,
    Neutral,
    Faction(u16),
}

// ============================================================================
// Grid
// ============================================================================

/// Grid coordinates; one unit is one 5-foot square.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// King-move distance, matching diagonal movement costing one square.
    pub fn chebyshev_distance(&self, other: Position) -> u32 {
        let dx = (self.x - other.x).unsigned_abs();
        let dy = (self.y - other.y).unsigned_abs();
        dx.max(dy)
    }

    /// One king-move step toward `target` (no-op when already there).
    pub fn step_toward(&self, target: Position) -> Position {
        Position {
            x: self.x + (target.x - self.x).signum(),
            y: self.y + (target.y - self.y).signum(),
        }
    }

    /// One king-move step directly away from `origin`.
    ///
    /// Standing on the origin has no direction, so the position is returned
    /// unchanged.
    pub fn step_away_from(&self, origin: Position) -> Position {
        Position {
            x: self.x + (self.x - origin.x).signum(),
            y: self.y + (self.y - origin.y).signum(),
        }
    }

    /// The eight surrounding squares, clockwise from north.
    pub fn neighbors(&self) -> [Position; 8] {
        let Position { x, y } = *self;
        [
            Position::new(x, y - 1),
            Position::new(x + 1, y - 1),
            Position::new(x + 1, y),
            Position::new(x + 1, y + 1),
            Position::new(x, y + 1),
            Position::new(x - 1, y + 1),
            Position::new(x - 1, y),
            Position::new(x - 1, y - 1),
        ]
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

// ============================================================================
// Ability Scores
// ============================================================================

/// The six ability scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Ability {
    Strength,
    Dexterity,
    Constitution,
    Intelligence,
    Wisdom,
    Charisma,
}

impl Ability {
    pub fn abbreviation(&self) -> &'static str {
        match self {
            Ability::Strength => "STR",
            Ability::Dexterity => "DEX",
            Ability::Constitution => "CON",
            Ability::Intelligence => "INT",
            Ability::Wisdom => "WIS",
            Ability::Charisma => "CHA",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Ability::Strength => "Strength",
            Ability::Dexterity => "Dexterity",
            Ability::Constitution => "Constitution",
            Ability::Intelligence => "Intelligence",
            Ability::Wisdom => "Wisdom",
            Ability::Charisma => "Charisma",
        }
    }
}

impl fmt::Display for Ability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.abbreviation())
    }
}

/// Ability scores container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbilityScores {
    pub strength: u8,
    pub dexterity: u8,
    pub constitution: u8,
    pub intelligence: u8,
    pub wisdom: u8,
    pub charisma: u8,
}

impl AbilityScores {
    pub fn new(str: u8, dex: u8, con: u8, int: u8, wis: u8, cha: u8) -> Self {
        Self {
            strength: str,
            dexterity: dex,
            constitution: con,
            intelligence: int,
            wisdom: wis,
            charisma: cha,
        }
    }

    pub fn get(&self, ability: Ability) -> u8 {
        match ability {
            Ability::Strength => self.strength,
            Ability::Dexterity => self.dexterity,
            Ability::Constitution => self.constitution,
            Ability::Intelligence => self.intelligence,
            Ability::Wisdom => self.wisdom,
            Ability::Charisma => self.charisma,
        }
    }

    pub fn modifier(&self, ability: Ability) -> i32 {
        saves::ability_modifier(self.get(ability))
    }
}

impl Default for AbilityScores {
    fn default() -> Self {
        Self::new(10, 10, 10, 10, 10, 10)
    }
}

// ============================================================================
// Conditions
// ============================================================================

/// Conditions a combatant can carry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Condition {
    Blinded,
    Charmed,
    Deafened,
    Frightened,
    Grappled,
    Incapacitated,
    Invisible,
    Paralyzed,
    Petrified,
    Poisoned,
    Prone,
    Restrained,
    Stunned,
    Unconscious,
    /// Took the Disengage action; leaving reach does not provoke.
    Disengaged,
    Dodging,
    /// Spell-specific statuses ("Hexed", "Slowed", ...).
    Custom(String),
}

impl Condition {
    pub fn name(&self) -> &str {
        match self {
            Condition::Blinded => "Blinded",
            Condition::Charmed => "Charmed",
            Condition::Deafened => "Deafened",
            Condition::Frightened => "Frightened",
            Condition::Grappled => "Grappled",
            Condition::Incapacitated => "Incapacitated",
            Condition::Invisible => "Invisible",
            Condition::Paralyzed => "Paralyzed",
            Condition::Petrified => "Petrified",
            Condition::Poisoned => "Poisoned",
            Condition::Prone => "Prone",
            Condition::Restrained => "Restrained",
            Condition::Stunned => "Stunned",
            Condition::Unconscious => "Unconscious",
            Condition::Disengaged => "Disengaged",
            Condition::Dodging => "Dodging",
            Condition::Custom(name) => name,
        }
    }

    /// Conditions that take away a combatant's reaction.
    pub fn blocks_reactions(&self) -> bool {
        matches!(
            self,
            Condition::Unconscious | Condition::Stunned | Condition::Paralyzed
        )
    }

    /// Parse a condition name, falling back to [`Condition::Custom`].
    pub fn from_name(name: &str) -> Condition {
        match name.trim().to_lowercase().as_str() {
            "blinded" => Condition::Blinded,
            "charmed" => Condition::Charmed,
            "deafened" => Condition::Deafened,
            "frightened" => Condition::Frightened,
            "grappled" => Condition::Grappled,
            "incapacitated" => Condition::Incapacitated,
            "invisible" => Condition::Invisible,
            "paralyzed" => Condition::Paralyzed,
            "petrified" => Condition::Petrified,
            "poisoned" => Condition::Poisoned,
            "prone" => Condition::Prone,
            "restrained" => Condition::Restrained,
            "stunned" => Condition::Stunned,
            "unconscious" => Condition::Unconscious,
            "disengaged" => Condition::Disengaged,
            "dodging" => Condition::Dodging,
            _ => Condition::Custom(name.trim().to_string()),
        }
    }

    fn same_kind(&self, other: &Condition) -> bool {
        match (self, other) {
            (Condition::Custom(a), Condition::Custom(b)) => a.eq_ignore_ascii_case(b),
            _ => self == other,
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// How long a condition lasts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionDuration {
    Rounds(u32),
    Minutes(u32),
    UntilRemoved,
}

impl ConditionDuration {
    pub fn doubled(self) -> Self {
        match self {
            ConditionDuration::Rounds(r) => ConditionDuration::Rounds(r.saturating_mul(2)),
            ConditionDuration::Minutes(m) => ConditionDuration::Minutes(m.saturating_mul(2)),
            ConditionDuration::UntilRemoved => ConditionDuration::UntilRemoved,
        }
    }

    pub fn description(&self) -> String {
        match self {
            ConditionDuration::Rounds(r) => format!("{} round{}", r, if *r == 1 { "" } else { "s" }),
            ConditionDuration::Minutes(m) => {
                format!("{} minute{}", m, if *m == 1 { "" } else { "s" })
            }
            ConditionDuration::UntilRemoved => "until removed".to_string(),
        }
    }
}

/// A condition applied to a creature with tracking info.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveCondition {
    pub condition: Condition,
    pub source: String,
    pub duration: ConditionDuration,
    pub applied_turn: u32,
    /// Save the creature may repeat to end the condition.
    pub save: Option<Ability>,
    /// Set when the condition only lasts as long as someone's concentration.
    pub linked_cast: Option<CastId>,
}

impl ActiveCondition {
    pub fn new(condition: Condition, source: impl Into<String>, applied_turn: u32) -> Self {
        Self {
            condition,
            source: source.into(),
            duration: ConditionDuration::UntilRemoved,
            applied_turn,
            save: None,
            linked_cast: None,
        }
    }

    pub fn with_duration(mut self, duration: ConditionDuration) -> Self {
        self.duration = duration;
        self
    }

    pub fn with_save(mut self, save: Option<Ability>) -> Self {
        self.save = save;
        self
    }

    pub fn linked_to(mut self, cast: Option<CastId>) -> Self {
        self.linked_cast = cast;
        self
    }
}

/// Status record shape used by older character exports, which kept a second
/// `statusEffects` list next to `conditions`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyStatusEffect {
    pub name: String,
    #[serde(default)]
    pub duration_rounds: Option<u32>,
    #[serde(default)]
    pub applied_turn: u32,
    #[serde(default)]
    pub source: Option<String>,
}

/// What happened when a condition was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionChange {
    Added,
    Refreshed,
}

// ============================================================================
// Damage
// ============================================================================

/// Common D&D damage types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DamageType {
    Slashing,
    Piercing,
    Bludgeoning,
    Fire,
    Cold,
    Lightning,
    Thunder,
    Acid,
    Poison,
    Necrotic,
    Radiant,
    Force,
    Psychic,
}

impl DamageType {
    pub fn name(&self) -> &'static str {
        match self {
            DamageType::Slashing => "slashing",
            DamageType::Piercing => "piercing",
            DamageType::Bludgeoning => "bludgeoning",
            DamageType::Fire => "fire",
            DamageType::Cold => "cold",
            DamageType::Lightning => "lightning",
            DamageType::Thunder => "thunder",
            DamageType::Acid => "acid",
            DamageType::Poison => "poison",
            DamageType::Necrotic => "necrotic",
            DamageType::Radiant => "radiant",
            DamageType::Force => "force",
            DamageType::Psychic => "psychic",
        }
    }
}

/// Hit points tracking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HitPoints {
    pub current: i32,
    pub maximum: i32,
    pub temporary: i32,
}

impl HitPoints {
    pub fn new(maximum: i32) -> Self {
        Self {
            current: maximum,
            maximum,
            temporary: 0,
        }
    }

    /// Apply damage, temporary HP first. Current HP never drops below 0.
    pub fn take_damage(&mut self, amount: i32) -> DamageResult {
        let mut remaining = amount.max(0);
        let before = self.current;

        if self.temporary > 0 {
            let absorbed = self.temporary.min(remaining);
            self.temporary -= absorbed;
            remaining -= absorbed;
        }

        self.current = (self.current - remaining).max(0);
        DamageResult {
            damage_taken: amount.max(0),
            dropped_to_zero: before > 0 && self.current == 0,
        }
    }

    pub fn heal(&mut self, amount: i32) -> i32 {
        let old = self.current;
        self.current = (self.current + amount).min(self.maximum);
        self.current - old
    }

    pub fn is_down(&self) -> bool {
        self.current <= 0
    }
}

/// Result of taking damage.
#[derive(Debug, Clone, Copy)]
pub struct DamageResult {
    pub damage_taken: i32,
    pub dropped_to_zero: bool,
}

// ============================================================================
// Action Economy
// ============================================================================

/// Errors from spending action-economy resources.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EconomyError {
    #[error("{0} already used this round")]
    AlreadyUsed(&'static str),
    #[error("not enough movement: {requested} squares requested, {remaining} remaining")]
    InsufficientMovement { requested: u32, remaining: u32 },
}

/// A once-per-turn resource (action, bonus action, reaction).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ActionSlot {
    pub used: bool,
}

impl ActionSlot {
    pub fn available(&self) -> bool {
        !self.used
    }

    /// Mark the slot used; the only false-to-true transition.
    pub fn use_slot(&mut self, name: &'static str) -> Result<(), EconomyError> {
        if self.used {
            return Err(EconomyError::AlreadyUsed(name));
        }
        self.used = true;
        Ok(())
    }
}

/// Movement left this turn, in grid squares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementBudget {
    pub total: u32,
    pub used: u32,
}

impl MovementBudget {
    pub fn new(total: u32) -> Self {
        Self { total, used: 0 }
    }

    pub fn remaining(&self) -> u32 {
        self.total.saturating_sub(self.used)
    }
}

/// Per-turn action economy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionEconomy {
    pub action: ActionSlot,
    pub bonus_action: ActionSlot,
    pub reaction: ActionSlot,
    pub movement: MovementBudget,
}

impl ActionEconomy {
    pub fn new(speed_squares: u32) -> Self {
        Self {
            action: ActionSlot::default(),
            bonus_action: ActionSlot::default(),
            reaction: ActionSlot::default(),
            movement: MovementBudget::new(speed_squares),
        }
    }

    /// Spend the reaction. Only the turn loop resets it.
    pub fn use_reaction(&mut self) -> Result<(), EconomyError> {
        self.reaction.use_slot("reaction")
    }

    pub fn use_action(&mut self) -> Result<(), EconomyError> {
        self.action.use_slot("action")
    }

    pub fn use_bonus_action(&mut self) -> Result<(), EconomyError> {
        self.bonus_action.use_slot("bonus action")
    }

    pub fn spend_movement(&mut self, squares: u32) -> Result<(), EconomyError> {
        let remaining = self.movement.remaining();
        if squares > remaining {
            return Err(EconomyError::InsufficientMovement {
                requested: squares,
                remaining,
            });
        }
        self.movement.used += squares;
        Ok(())
    }

    /// Turn-boundary reset, called by the turn loop.
    pub fn reset_for_turn(&mut self) {
        self.action.used = false;
        self.bonus_action.used = false;
        self.reaction.used = false;
        self.movement.used = 0;
    }
}

// ============================================================================
// Abilities
// ============================================================================

/// Melee reach of a weapon, in grid squares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub enum MeleeReach {
    /// 5 feet.
    #[default]
    Standard,
    /// 10 feet (glaive, pike, whip).
    Extended,
}

impl MeleeReach {
    pub fn squares(&self) -> u32 {
        match self {
            MeleeReach::Standard => 1,
            MeleeReach::Extended => 2,
        }
    }
}

/// What kind of action a pre-resolved ability is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AbilityKind {
    MeleeWeapon { reach: MeleeReach },
    RangedWeapon { normal: u32, long: u32 },
    Spell { spell: SpellId },
}

/// An attack or spell action a combatant can take.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombatAbility {
    pub name: String,
    pub kind: AbilityKind,
    pub attack_bonus: i32,
    pub damage_dice: Option<String>,
    pub damage_type: Option<DamageType>,
}

impl CombatAbility {
    pub fn melee(name: impl Into<String>, reach: MeleeReach, damage_dice: &str) -> Self {
        Self {
            name: name.into(),
            kind: AbilityKind::MeleeWeapon { reach },
            attack_bonus: 0,
            damage_dice: Some(damage_dice.to_string()),
            damage_type: None,
        }
    }

    pub fn ranged(name: impl Into<String>, normal: u32, long: u32, damage_dice: &str) -> Self {
        Self {
            name: name.into(),
            kind: AbilityKind::RangedWeapon { normal, long },
            attack_bonus: 0,
            damage_dice: Some(damage_dice.to_string()),
            damage_type: None,
        }
    }

    pub fn with_damage_type(mut self, damage_type: DamageType) -> Self {
        self.damage_type = Some(damage_type);
        self
    }

    pub fn with_attack_bonus(mut self, bonus: i32) -> Self {
        self.attack_bonus = bonus;
        self
    }

    /// Reach if this is a melee weapon attack.
    pub fn melee_reach(&self) -> Option<MeleeReach> {
        match self.kind {
            AbilityKind::MeleeWeapon { reach } => Some(reach),
            _ => None,
        }
    }
}

// ============================================================================
// Concentration
// ============================================================================

/// A caster's link to the one effect they are concentrating on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConcentrationLink {
    pub cast: CastId,
    pub spell: SpellId,
    pub spell_name: String,
    pub duration: ConditionDuration,
    pub started_turn: u32,
}

// ============================================================================
// Combatant
// ============================================================================

/// A mutable per-encounter combatant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombatCharacter {
    pub id: CharacterId,
    pub name: String,
    pub team: Team,
    pub position: Position,

    pub ability_scores: AbilityScores,
    pub level: u8,
    pub hit_dice: u32,
    pub hit_points: HitPoints,
    pub armor_class: i32,
    pub initiative: i32,
    /// Walking speed in feet.
    pub speed: u32,

    pub spellcasting_ability: Option<Ability>,
    pub saving_throw_proficiencies: HashSet<Ability>,

    pub abilities: Vec<CombatAbility>,
    pub action_economy: ActionEconomy,
    pub conditions: Vec<ActiveCondition>,
    pub concentrating_on: Option<ConcentrationLink>,

    pub resistances: HashSet<DamageType>,
    pub vulnerabilities: HashSet<DamageType>,
    pub immunities: HashSet<DamageType>,

    /// Caster that summoned this creature, if any.
    pub summoned_by: Option<CharacterId>,
}

impl CombatCharacter {
    pub fn new(name: impl Into<String>, team: Team) -> Self {
        Self {
            id: CharacterId::new(),
            name: name.into(),
            team,
            position: Position::default(),
            ability_scores: AbilityScores::default(),
            level: 1,
            hit_dice: 1,
            hit_points: HitPoints::new(10),
            armor_class: 10,
            initiative: 0,
            speed: 30,
            spellcasting_ability: None,
            saving_throw_proficiencies: HashSet::new(),
            abilities: Vec::new(),
            action_economy: ActionEconomy::new(6),
            conditions: Vec::new(),
            concentrating_on: None,
            resistances: HashSet::new(),
            vulnerabilities: HashSet::new(),
            immunities: HashSet::new(),
            summoned_by: None,
        }
    }

    pub fn at(mut self, position: Position) -> Self {
        self.position = position;
        self
    }

    pub fn with_level(mut self, level: u8) -> Self {
        self.level = level;
        self.hit_dice = level as u32;
        self
    }

    pub fn with_hit_points(mut self, maximum: i32) -> Self {
        self.hit_points = HitPoints::new(maximum);
        self
    }

    pub fn with_ability_scores(mut self, scores: AbilityScores) -> Self {
        self.ability_scores = scores;
        self
    }

    /// Speed in feet; also resets this turn's movement budget.
    pub fn with_speed(mut self, feet: u32) -> Self {
        self.speed = feet;
        self.action_economy.movement = MovementBudget::new(feet / 5);
        self
    }

    pub fn with_ability(mut self, ability: CombatAbility) -> Self {
        self.abilities.push(ability);
        self
    }

    pub fn proficiency_bonus(&self) -> i32 {
        saves::proficiency_bonus(self.level)
    }

    pub fn is_proficient_in_save(&self, ability: Ability) -> bool {
        self.saving_throw_proficiencies.contains(&ability)
    }

    /// Check if the character has a specific condition.
    pub fn has_condition(&self, condition: &Condition) -> bool {
        self.conditions
            .iter()
            .any(|c| c.condition.same_kind(condition))
    }

    /// Whether any condition takes away this combatant's reaction.
    pub fn reactions_blocked(&self) -> bool {
        self.conditions.iter().any(|c| c.condition.blocks_reactions())
    }

    /// Best melee reach across this combatant's weapon attacks.
    ///
    /// Ranged weapons and spells never count, whatever their range.
    pub fn melee_reach(&self) -> u32 {
        self.abilities
            .iter()
            .filter_map(CombatAbility::melee_reach)
            .max()
            .unwrap_or_default()
            .squares()
    }

    /// Apply a condition, refreshing the existing entry in place instead of
    /// stacking a duplicate.
    pub fn apply_condition(&mut self, applied: ActiveCondition) -> ConditionChange {
        match self
            .conditions
            .iter_mut()
            .find(|c| c.condition.same_kind(&applied.condition))
        {
            Some(existing) => {
                existing.duration = applied.duration;
                existing.source = applied.source;
                existing.save = applied.save.or(existing.save);
                existing.linked_cast = applied.linked_cast;
                ConditionChange::Refreshed
            }
            None => {
                self.conditions.push(applied);
                ConditionChange::Added
            }
        }
    }

    /// Remove a condition. Returns true if it was present.
    pub fn remove_condition(&mut self, condition: &Condition) -> bool {
        let before = self.conditions.len();
        self.conditions.retain(|c| !c.condition.same_kind(condition));
        self.conditions.len() != before
    }

    /// Remove every condition that depends on the given cast.
    pub fn remove_linked_conditions(&mut self, cast: CastId) -> Vec<ActiveCondition> {
        let (removed, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.conditions)
            .into_iter()
            .partition(|c| c.linked_cast == Some(cast));
        self.conditions = kept;
        removed
    }

    /// Fold a legacy `statusEffects` list into the canonical condition list.
    ///
    /// Entries are merged by name; a legacy entry for a condition that already
    /// exists refreshes its duration. Returns how many entries were merged.
    pub fn absorb_legacy_status_effects(&mut self, legacy: Vec<LegacyStatusEffect>) -> usize {
        let count = legacy.len();
        for status in legacy {
            let duration = status
                .duration_rounds
                .map(ConditionDuration::Rounds)
                .unwrap_or(ConditionDuration::UntilRemoved);
            let source = status.source.unwrap_or_else(|| "legacy record".to_string());
            let condition = Condition::from_name(&status.name);
            self.apply_condition(
                ActiveCondition::new(condition, source, status.applied_turn).with_duration(duration),
            );
        }
        count
    }
}
