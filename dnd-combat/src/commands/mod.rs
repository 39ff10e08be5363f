//! Effect commands.
//!
//! Each [`EffectKind`] archetype has one command. A command validates its
//! payload, then executes it against the combat state, pairing every
//! mutation with a log entry. Dispatch is an exhaustive match, so a new
//! archetype does not compile until it has a command.

mod concentration;
mod condition;
mod damage;
mod movement;
mod reactive;
mod summon;
mod utility;

pub use concentration::ConcentrationCommand;
pub use condition::ConditionCommand;
pub use damage::{apply_damage, apply_defenses, DamageCommand, DefenseAdjustment, DefenseOutcome};
pub use movement::MovementCommand;
pub use reactive::ReactiveCommand;
pub use summon::SummonCommand;
pub use utility::UtilityCommand;

use crate::character::{Ability, CastId, CharacterId, CombatCharacter, Condition, Position};
use crate::combat::{CombatState, LogEntry, LogKind};
use crate::dice::{Advantage, DiceRoller};
use crate::effects::{EffectCondition, EffectKind, SaveOutcome, SaveRule, SpellEffect};
use crate::error::{ResolutionError, ValidationError};
use crate::planes::{PlanarMechanic, PlaneId};
use crate::reactions::{LineOfSight, OpportunityAttack};
use crate::saves::{roll_saving_throw, spell_attack_bonus, spell_dc};
use crate::spells::Spell;

// ============================================================================
// Context
// ============================================================================

/// Everything a command reads about the cast. Commands never mutate it.
#[derive(Clone)]
pub struct CastContext<'a> {
    pub cast: CastId,
    pub spell: &'a Spell,
    pub caster: CharacterId,
    pub targets: Vec<CharacterId>,
    pub cast_level: u8,
    pub plane: PlaneId,
    /// The plane's mechanic for the spell's school.
    pub mechanic: Option<PlanarMechanic>,
    /// The plane's numeric modifier for the spell's school.
    pub planar_modifier: i32,
    /// Point picked by the caster for movement toward a chosen point.
    pub destination: Option<Position>,
    pub map: Option<&'a dyn LineOfSight>,
}

impl<'a> CastContext<'a> {
    /// A context on the material plane with no overrides.
    pub fn new(spell: &'a Spell, caster: CharacterId, targets: Vec<CharacterId>) -> Self {
        Self {
            cast: CastId::new(),
            spell,
            caster,
            targets,
            cast_level: spell.level,
            plane: PlaneId::material(),
            mechanic: None,
            planar_modifier: 0,
            destination: None,
            map: None,
        }
    }

    pub fn levels_above_base(&self) -> u32 {
        self.cast_level.saturating_sub(self.spell.level) as u32
    }

    /// The cast that conditions and triggers should be tied to, when the
    /// spell is held by concentration.
    pub fn linked_cast(&self) -> Option<CastId> {
        self.spell.concentration.then_some(self.cast)
    }

    pub fn has_mechanic(&self, mechanic: &PlanarMechanic) -> bool {
        self.mechanic.as_ref() == Some(mechanic)
    }
}

/// What a command did besides logging.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutcome {
    /// Reactions provoked by voluntary movement, for the caller to resolve.
    pub opportunity_attacks: Vec<OpportunityAttack>,
    /// Creatures changed or created by the command.
    pub affected: Vec<CharacterId>,
}

// ============================================================================
// Command trait and dispatch
// ============================================================================

/// One effect archetype.
pub trait EffectCommand {
    type Payload;

    /// Check the payload before anything is touched.
    fn validate(&self, payload: &Self::Payload, effect: &SpellEffect) -> Result<(), ValidationError>;

    fn execute(
        &self,
        payload: &Self::Payload,
        effect: &SpellEffect,
        ctx: &CastContext<'_>,
        state: &mut CombatState,
        roller: &mut DiceRoller,
    ) -> Result<CommandOutcome, ResolutionError>;
}

/// Validate and execute one effect.
///
/// On `Err` nothing has been changed by this effect; effects that ran
/// before it keep their results.
pub fn execute_effect(
    effect: &SpellEffect,
    ctx: &CastContext<'_>,
    state: &mut CombatState,
    roller: &mut DiceRoller,
) -> Result<CommandOutcome, ResolutionError> {
    match &effect.kind {
        EffectKind::Damage(p) => run(&DamageCommand, p, effect, ctx, state, roller),
        EffectKind::StatusCondition(p) => run(&ConditionCommand, p, effect, ctx, state, roller),
        EffectKind::Movement(p) => run(&MovementCommand, p, effect, ctx, state, roller),
        EffectKind::Summoning(p) => run(&SummonCommand, p, effect, ctx, state, roller),
        EffectKind::Concentration(p) => run(&ConcentrationCommand, p, effect, ctx, state, roller),
        EffectKind::Utility(p) => run(&UtilityCommand, p, effect, ctx, state, roller),
        EffectKind::ReactiveTrigger(p) => run(&ReactiveCommand, p, effect, ctx, state, roller),
    }
}

/// Validate an effect template without executing it.
pub fn validate_effect(effect: &SpellEffect) -> Result<(), ValidationError> {
    match &effect.kind {
        EffectKind::Damage(p) => DamageCommand.validate(p, effect),
        EffectKind::StatusCondition(p) => ConditionCommand.validate(p, effect),
        EffectKind::Movement(p) => MovementCommand.validate(p, effect),
        EffectKind::Summoning(p) => SummonCommand.validate(p, effect),
        EffectKind::Concentration(p) => ConcentrationCommand.validate(p, effect),
        EffectKind::Utility(p) => UtilityCommand.validate(p, effect),
        EffectKind::ReactiveTrigger(p) => ReactiveCommand.validate(p, effect),
    }
}

fn run<C: EffectCommand>(
    command: &C,
    payload: &C::Payload,
    effect: &SpellEffect,
    ctx: &CastContext<'_>,
    state: &mut CombatState,
    roller: &mut DiceRoller,
) -> Result<CommandOutcome, ResolutionError> {
    command.validate(payload, effect)?;
    if !state.contains(ctx.caster) {
        return Err(ResolutionError::UnknownCharacter(ctx.caster));
    }
    if let Some(missing) = ctx.targets.iter().find(|id| !state.contains(**id)) {
        return Err(ResolutionError::UnknownCharacter(*missing));
    }
    command.execute(payload, effect, ctx, state, roller)
}

// ============================================================================
// Shared helpers
// ============================================================================

pub(crate) fn lookup(state: &CombatState, id: CharacterId) -> Result<&CombatCharacter, ResolutionError> {
    state.character(id).ok_or(ResolutionError::UnknownCharacter(id))
}

/// A save-gated effect must say which save.
pub(crate) fn validate_gate(effect: &SpellEffect, save: Option<&SaveRule>) -> Result<(), ValidationError> {
    if effect.condition == EffectCondition::OnSaveFail && save.is_none() {
        return Err(ValidationError::missing(effect.kind.name(), "save"));
    }
    Ok(())
}

/// Spell save DC adjusted by the plane.
pub fn save_dc(ctx: &CastContext<'_>, caster: &CombatCharacter) -> i32 {
    spell_dc(caster) + ctx.planar_modifier
}

/// Advantage state for a target's save against the cast.
///
/// A school that has the upper hand on this plane puts the target at
/// disadvantage; it never grants the caster anything.
pub fn save_advantage(ctx: &CastContext<'_>, target: &CombatCharacter, ability: Ability) -> Advantage {
    let planar = if ctx.has_mechanic(&PlanarMechanic::Advantage) {
        Advantage::Disadvantage
    } else {
        Advantage::Normal
    };
    let restrained = if ability == Ability::Dexterity && target.has_condition(&Condition::Restrained) {
        Advantage::Disadvantage
    } else {
        Advantage::Normal
    };
    planar.combine(restrained)
}

/// A spell attack roll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpellAttack {
    pub roll: u32,
    pub total: i32,
    pub armor_class: i32,
    pub hit: bool,
    pub critical: bool,
}

/// Roll a spell attack against `target`.
pub fn roll_spell_attack(
    caster: &CombatCharacter,
    target: &CombatCharacter,
    roller: &mut DiceRoller,
) -> SpellAttack {
    let (roll, _) = roller.d20(attack_advantage(target));
    let total = roll as i32 + spell_attack_bonus(caster);

    // Natural 1 always misses, natural 20 always hits (and crits)
    let critical = roll == 20;
    let hit = roll != 1 && (critical || total >= target.armor_class);
    SpellAttack {
        roll,
        total,
        armor_class: target.armor_class,
        hit,
        critical,
    }
}

fn attack_advantage(target: &CombatCharacter) -> Advantage {
    let exposed = [
        Condition::Paralyzed,
        Condition::Stunned,
        Condition::Unconscious,
        Condition::Restrained,
    ]
    .iter()
    .any(|c| target.has_condition(c));
    let mut advantage = if exposed {
        Advantage::Advantage
    } else {
        Advantage::Normal
    };
    if target.has_condition(&Condition::Dodging) {
        advantage = advantage.combine(Advantage::Disadvantage);
    }
    advantage
}

/// How an effect lands on one target after its attack roll and save.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Gate {
    Full { critical: bool },
    Half,
    Skip,
}

/// Roll whatever stands between the effect and `target`, logging each roll.
pub(crate) fn gate_target(
    effect: &SpellEffect,
    ctx: &CastContext<'_>,
    state: &mut CombatState,
    target: CharacterId,
    roller: &mut DiceRoller,
) -> Result<Gate, ResolutionError> {
    let mut critical = false;

    if effect.requires_attack_roll() {
        let caster = lookup(state, ctx.caster)?;
        let defender = lookup(state, target)?;
        let attack = roll_spell_attack(caster, defender, roller);
        let message = format!(
            "{}'s {} attack against {}: {} vs AC {} - {}",
            caster.name,
            ctx.spell.name,
            defender.name,
            attack.total,
            attack.armor_class,
            match (attack.hit, attack.critical) {
                (true, true) => "critical hit",
                (true, false) => "hit",
                (false, _) => "miss",
            }
        );
        state.log.push(
            LogEntry::new(LogKind::AttackRoll, message)
                .with_value(attack.total)
                .about(target),
        );
        if !attack.hit {
            return Ok(Gate::Skip);
        }
        critical = attack.critical;
    }

    if effect.condition == EffectCondition::OnSaveFail {
        let Some(spec) = effect.kind.save().copied() else {
            return Err(ValidationError::missing(effect.kind.name(), "save").into());
        };
        let caster = lookup(state, ctx.caster)?;
        let defender = lookup(state, target)?;
        let dc = save_dc(ctx, caster);
        let advantage = save_advantage(ctx, defender, spec.ability);
        let save = roll_saving_throw(defender, spec.ability, dc, &[], advantage, roller)?;
        let message = format!(
            "{} makes a DC {} {} save against {}: {}{} - {}",
            defender.name,
            dc,
            spec.ability.name(),
            ctx.spell.name,
            save.total,
            match advantage {
                Advantage::Disadvantage => " (disadvantage)",
                Advantage::Advantage => " (advantage)",
                Advantage::Normal => "",
            },
            if save.success { "success" } else { "failure" }
        );
        state.log.push(
            LogEntry::new(LogKind::SavingThrow, message)
                .with_value(save.total)
                .about(target),
        );
        if save.success {
            return Ok(match spec.on_success {
                SaveOutcome::Half => Gate::Half,
                SaveOutcome::Negates => Gate::Skip,
            });
        }
    }

    Ok(Gate::Full { critical })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::character::{ActiveCondition, Team};
    use crate::effects::{EffectTrigger, UtilityPayload};
    use crate::error::ValidationKind;
    use crate::spells::get_spell;
    use crate::testing::{sample_goblin, sample_wizard};

    #[test]
    fn test_every_archetype_validates_missing_fields() {
        let blank = [
            EffectKind::Damage(Default::default()),
            EffectKind::StatusCondition(Default::default()),
            EffectKind::Movement(Default::default()),
            EffectKind::Summoning(Default::default()),
            EffectKind::Concentration(Default::default()),
            EffectKind::Utility(Default::default()),
            EffectKind::ReactiveTrigger(Default::default()),
        ];
        for kind in blank {
            let name = kind.name();
            let err = validate_effect(&SpellEffect::new(kind)).unwrap_err();
            assert_eq!(err.effect, name);
            assert_eq!(err.kind, ValidationKind::Missing);
        }
    }

    #[test]
    fn test_save_gate_without_save_is_invalid() {
        let effect = SpellEffect::damage("1d6", crate::character::DamageType::Fire)
            .with_condition(EffectCondition::OnSaveFail);
        assert_eq!(
            validate_effect(&effect),
            Err(ValidationError::missing("Damage", "save"))
        );
    }

    #[test]
    fn test_unknown_target_is_rejected_before_execution() {
        let spell = get_spell("fire bolt").unwrap();
        let mut state = CombatState::new();
        let wizard = state.add_character(sample_wizard());
        let ghost = CharacterId::new();
        let ctx = CastContext::new(spell, wizard, vec![ghost]);
        let mut roller = DiceRoller::scripted([20, 10]);

        let err = execute_effect(&spell.effects[0], &ctx, &mut state, &mut roller).unwrap_err();
        assert_eq!(err, ResolutionError::UnknownCharacter(ghost));
        assert_eq!(roller.scripted_remaining(), 2);
        assert!(state.log.is_empty());
    }

    #[test]
    fn test_planar_advantage_becomes_target_disadvantage() {
        let spell = get_spell("hold person").unwrap();
        let mut ctx = CastContext::new(spell, CharacterId::new(), Vec::new());
        let goblin = sample_goblin();
        assert_eq!(save_advantage(&ctx, &goblin, Ability::Wisdom), Advantage::Normal);

        ctx.mechanic = Some(PlanarMechanic::Advantage);
        assert_eq!(save_advantage(&ctx, &goblin, Ability::Wisdom), Advantage::Disadvantage);
    }

    #[test]
    fn test_restrained_dex_saves_at_disadvantage() {
        let spell = get_spell("fireball").unwrap();
        let ctx = CastContext::new(spell, CharacterId::new(), Vec::new());
        let mut goblin = sample_goblin();
        goblin.apply_condition(ActiveCondition::new(Condition::Restrained, "Net", 0));
        assert_eq!(save_advantage(&ctx, &goblin, Ability::Dexterity), Advantage::Disadvantage);
        assert_eq!(save_advantage(&ctx, &goblin, Ability::Wisdom), Advantage::Normal);
    }

    #[test]
    fn test_natural_one_misses_and_twenty_crits() {
        let wizard = sample_wizard();
        let mut fortress = CombatCharacter::new("Golem", Team::Hostile);
        fortress.armor_class = 30;

        let crit = roll_spell_attack(&wizard, &fortress, &mut DiceRoller::scripted([20]));
        assert!(crit.hit && crit.critical);

        let mut paper = CombatCharacter::new("Paper", Team::Hostile);
        paper.armor_class = 1;
        let fumble = roll_spell_attack(&wizard, &paper, &mut DiceRoller::scripted([1]));
        assert!(!fumble.hit);
    }

    #[test]
    fn test_utility_logs_description() {
        let spell = Spell::new("Prestidigitation", 0, crate::spells::SpellSchool::Transmutation)
            .with_effect(SpellEffect::utility("A shower of harmless sparks"));
        let mut state = CombatState::new();
        let wizard = state.add_character(sample_wizard());
        let ctx = CastContext::new(&spell, wizard, Vec::new());
        let mut roller = DiceRoller::scripted([]);

        execute_effect(&spell.effects[0], &ctx, &mut state, &mut roller).unwrap();
        let entry = state.log.last().unwrap();
        assert_eq!(entry.kind, LogKind::Utility);
        assert!(entry.message.contains("harmless sparks"));

        let broken = SpellEffect::new(EffectKind::Utility(UtilityPayload { description: None }))
            .with_trigger(EffectTrigger::Immediate);
        assert!(execute_effect(&broken, &ctx, &mut state, &mut roller).is_err());
        assert_eq!(state.log.len(), 1);
    }
}
