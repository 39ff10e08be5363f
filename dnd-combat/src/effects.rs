//! Effect templates.
//!
//! A [`SpellEffect`] is read-only data attached to a [`Spell`](crate::spells::Spell):
//! what happens (the [`EffectKind`] archetype and its payload), when it fires
//! relative to the cast ([`EffectTrigger`]) and what gates it
//! ([`EffectCondition`]). Payload fields are optional so that malformed
//! templates coming from external data can be reported instead of rejected
//! at parse time.

use crate::character::{
    AbilityScores, Ability, CastId, CharacterId, CombatAbility, CombatCharacter, Condition,
    ConditionDuration, DamageType, HitPoints, MeleeReach, Position,
};
use crate::planes::PlaneId;
use crate::spells::Spell;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Gates
// ============================================================================

/// When an effect fires relative to the cast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum EffectTrigger {
    #[default]
    Immediate,
    /// Fires per target after a spell attack roll hits.
    OnHit,
    /// Queued on the combat state; the turn loop fires it.
    Delayed { rounds: u32 },
}

/// What gates execution against each target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum EffectCondition {
    #[default]
    Always,
    OnSaveFail,
    OnHit,
}

/// What a successful save does to the effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SaveOutcome {
    Half,
    Negates,
}

/// The saving throw a target makes against an effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveRule {
    pub ability: Ability,
    pub on_success: SaveOutcome,
}

impl SaveRule {
    pub fn half(ability: Ability) -> Self {
        Self {
            ability,
            on_success: SaveOutcome::Half,
        }
    }

    pub fn negates(ability: Ability) -> Self {
        Self {
            ability,
            on_success: SaveOutcome::Negates,
        }
    }
}

// ============================================================================
// Payloads
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DamagePayload {
    pub dice: Option<String>,
    pub damage_type: Option<DamageType>,
    pub save: Option<SaveRule>,
    /// Extra dice per slot level above the spell's level.
    #[serde(default)]
    pub upcast_dice: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ConditionPayload {
    pub condition: Option<Condition>,
    /// Defaults to until removed.
    #[serde(default)]
    pub duration: Option<ConditionDuration>,
    pub save: Option<SaveRule>,
    /// The target repeats the save at the end of each of its turns.
    #[serde(default)]
    pub repeat_save: bool,
}

/// Direction of a move, resolved against the target's position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MoveDirection {
    AwayFromCaster,
    TowardCaster,
    To(Position),
    /// The destination chosen at cast time.
    ChosenPoint,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct MovementPayload {
    /// Squares.
    pub distance: Option<u32>,
    pub direction: Option<MoveDirection>,
    /// Pushed or pulled: no movement budget, never provokes.
    #[serde(default)]
    pub forced: bool,
    /// Lands on the destination without walking the squares between.
    #[serde(default)]
    pub teleport: bool,
    pub save: Option<SaveRule>,
}

/// Stat block a summoning effect instantiates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummonTemplate {
    pub name: String,
    pub hit_points: i32,
    pub armor_class: i32,
    pub ability_scores: AbilityScores,
    /// Feet.
    pub speed: u32,
    pub abilities: Vec<CombatAbility>,
}

impl SummonTemplate {
    /// The owl familiar.
    pub fn owl() -> Self {
        Self {
            name: "Owl".to_string(),
            hit_points: 1,
            armor_class: 11,
            ability_scores: AbilityScores::new(3, 13, 8, 2, 12, 7),
            speed: 60,
            abilities: vec![CombatAbility::melee("Talons", MeleeReach::Standard, "1")
                .with_damage_type(DamageType::Slashing)
                .with_attack_bonus(3)],
        }
    }

    /// A fresh combatant on the summoner's side.
    pub fn instantiate(&self, summoner: &CombatCharacter, position: Position) -> CombatCharacter {
        let mut creature = CombatCharacter::new(self.name.clone(), summoner.team)
            .at(position)
            .with_ability_scores(self.ability_scores.clone())
            .with_speed(self.speed);
        creature.hit_points = HitPoints::new(self.hit_points);
        creature.armor_class = self.armor_class;
        creature.abilities = self.abilities.clone();
        creature.summoned_by = Some(summoner.id);
        creature
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummonPayload {
    pub template: Option<SummonTemplate>,
    #[serde(default = "default_summon_count")]
    pub count: u32,
}

fn default_summon_count() -> u32 {
    1
}

impl Default for SummonPayload {
    fn default() -> Self {
        Self {
            template: None,
            count: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ConcentrationPayload {
    pub duration: Option<ConditionDuration>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct UtilityPayload {
    pub description: Option<String>,
}

/// Events a latent trigger can watch for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TriggerEvent {
    DamageTaken,
    Moves,
    Attacked,
    StartOfTurn,
    EndOfTurn,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ReactivePayload {
    pub watch: Option<TriggerEvent>,
    pub response: Option<Box<SpellEffect>>,
    #[serde(default)]
    pub duration: Option<ConditionDuration>,
}

// ============================================================================
// Effects
// ============================================================================

/// The closed set of effect archetypes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EffectKind {
    Damage(DamagePayload),
    StatusCondition(ConditionPayload),
    Movement(MovementPayload),
    Summoning(SummonPayload),
    Concentration(ConcentrationPayload),
    Utility(UtilityPayload),
    ReactiveTrigger(ReactivePayload),
}

impl EffectKind {
    pub fn name(&self) -> &'static str {
        match self {
            EffectKind::Damage(_) => "Damage",
            EffectKind::StatusCondition(_) => "StatusCondition",
            EffectKind::Movement(_) => "Movement",
            EffectKind::Summoning(_) => "Summoning",
            EffectKind::Concentration(_) => "Concentration",
            EffectKind::Utility(_) => "Utility",
            EffectKind::ReactiveTrigger(_) => "ReactiveTrigger",
        }
    }

    /// The save spec, for archetypes that allow one.
    pub fn save(&self) -> Option<&SaveRule> {
        match self {
            EffectKind::Damage(p) => p.save.as_ref(),
            EffectKind::StatusCondition(p) => p.save.as_ref(),
            EffectKind::Movement(p) => p.save.as_ref(),
            EffectKind::Summoning(_)
            | EffectKind::Concentration(_)
            | EffectKind::Utility(_)
            | EffectKind::ReactiveTrigger(_) => None,
        }
    }

    fn set_save(&mut self, save: SaveRule) {
        match self {
            EffectKind::Damage(p) => p.save = Some(save),
            EffectKind::StatusCondition(p) => p.save = Some(save),
            EffectKind::Movement(p) => p.save = Some(save),
            EffectKind::Summoning(_)
            | EffectKind::Concentration(_)
            | EffectKind::Utility(_)
            | EffectKind::ReactiveTrigger(_) => {}
        }
    }
}

/// One declared effect of a spell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpellEffect {
    pub kind: EffectKind,
    #[serde(default)]
    pub trigger: EffectTrigger,
    #[serde(default)]
    pub condition: EffectCondition,
}

impl SpellEffect {
    pub fn new(kind: EffectKind) -> Self {
        Self {
            kind,
            trigger: EffectTrigger::Immediate,
            condition: EffectCondition::Always,
        }
    }

    pub fn damage(dice: &str, damage_type: DamageType) -> Self {
        Self::new(EffectKind::Damage(DamagePayload {
            dice: Some(dice.to_string()),
            damage_type: Some(damage_type),
            save: None,
            upcast_dice: None,
        }))
    }

    pub fn status(condition: Condition, duration: ConditionDuration) -> Self {
        Self::new(EffectKind::StatusCondition(ConditionPayload {
            condition: Some(condition),
            duration: Some(duration),
            save: None,
            repeat_save: false,
        }))
    }

    pub fn push(squares: u32) -> Self {
        Self::new(EffectKind::Movement(MovementPayload {
            distance: Some(squares),
            direction: Some(MoveDirection::AwayFromCaster),
            forced: true,
            teleport: false,
            save: None,
        }))
    }

    pub fn movement(squares: u32, direction: MoveDirection) -> Self {
        Self::new(EffectKind::Movement(MovementPayload {
            distance: Some(squares),
            direction: Some(direction),
            forced: false,
            teleport: false,
            save: None,
        }))
    }

    pub fn summon(template: SummonTemplate) -> Self {
        Self::new(EffectKind::Summoning(SummonPayload {
            template: Some(template),
            count: 1,
        }))
    }

    pub fn concentration(duration: ConditionDuration) -> Self {
        Self::new(EffectKind::Concentration(ConcentrationPayload {
            duration: Some(duration),
        }))
    }

    pub fn utility(description: &str) -> Self {
        Self::new(EffectKind::Utility(UtilityPayload {
            description: Some(description.to_string()),
        }))
    }

    pub fn reactive(watch: TriggerEvent, response: SpellEffect) -> Self {
        Self::new(EffectKind::ReactiveTrigger(ReactivePayload {
            watch: Some(watch),
            response: Some(Box::new(response)),
            duration: None,
        }))
    }

    pub fn with_trigger(mut self, trigger: EffectTrigger) -> Self {
        self.trigger = trigger;
        self
    }

    pub fn with_condition(mut self, condition: EffectCondition) -> Self {
        self.condition = condition;
        self
    }

    /// Attach a save and gate the effect on it.
    pub fn with_save(mut self, save: SaveRule) -> Self {
        self.kind.set_save(save);
        self.condition = EffectCondition::OnSaveFail;
        self
    }

    /// Extra damage dice per slot level above the spell's level.
    pub fn with_upcast(mut self, dice: &str) -> Self {
        if let EffectKind::Damage(p) = &mut self.kind {
            p.upcast_dice = Some(dice.to_string());
        }
        self
    }

    pub fn with_teleport(mut self) -> Self {
        if let EffectKind::Movement(p) = &mut self.kind {
            p.teleport = true;
        }
        self
    }

    /// Whether the effect needs a spell attack roll per target.
    pub fn requires_attack_roll(&self) -> bool {
        self.trigger == EffectTrigger::OnHit || self.condition == EffectCondition::OnHit
    }
}

// ============================================================================
// Registered state
// ============================================================================

/// A trigger registered by a reactive effect, evaluated by the turn loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatentTrigger {
    pub id: Uuid,
    /// The creature being watched.
    pub owner: CharacterId,
    pub registered_by: CharacterId,
    pub source: String,
    pub cast: CastId,
    pub watch: TriggerEvent,
    pub response: SpellEffect,
    pub duration: ConditionDuration,
    pub registered_turn: u32,
}

/// An effect waiting for its round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DelayedEffect {
    pub cast: CastId,
    pub spell: Spell,
    pub caster: CharacterId,
    pub targets: Vec<CharacterId>,
    pub cast_level: u8,
    pub plane: PlaneId,
    pub effect: SpellEffect,
    pub fires_on_round: u32,
}
