//! Damage: one shared roll, per-target gates and defenses.

use super::{gate_target, lookup, validate_gate, CastContext, CommandOutcome, EffectCommand, Gate};
use crate::character::{ActiveCondition, CharacterId, CombatCharacter, Condition, DamageType};
use crate::combat::{CombatState, LogEntry, LogKind};
use crate::concentration::{end_concentration, resolve_concentration_check};
use crate::dice::{DiceExpression, DiceRoller};
use crate::effects::{DamagePayload, SpellEffect};
use crate::error::{ResolutionError, ValidationError};
use crate::planes::PlanarMechanic;
use tracing::debug;

/// How a target's defenses changed the damage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefenseAdjustment {
    None,
    Immune,
    Resisted,
    Vulnerable,
    /// Halved, then doubled.
    ResistedAndVulnerable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DefenseOutcome {
    pub amount: i32,
    pub adjustment: DefenseAdjustment,
}

/// Apply immunity, resistance and vulnerability to `raw` damage.
///
/// Resistance and vulnerability to the same type both apply: the damage is
/// halved (rounding down) and then doubled, so odd amounts lose one point.
pub fn apply_defenses(
    raw: i32,
    damage_type: Option<DamageType>,
    target: &CombatCharacter,
) -> DefenseOutcome {
    let raw = raw.max(0);
    let Some(damage_type) = damage_type else {
        return DefenseOutcome {
            amount: raw,
            adjustment: DefenseAdjustment::None,
        };
    };
    if target.immunities.contains(&damage_type) {
        return DefenseOutcome {
            amount: 0,
            adjustment: DefenseAdjustment::Immune,
        };
    }

    let resisted = target.resistances.contains(&damage_type);
    let vulnerable = target.vulnerabilities.contains(&damage_type);
    let (amount, adjustment) = match (resisted, vulnerable) {
        (true, true) => ((raw / 2) * 2, DefenseAdjustment::ResistedAndVulnerable),
        (true, false) => (raw / 2, DefenseAdjustment::Resisted),
        (false, true) => (raw * 2, DefenseAdjustment::Vulnerable),
        (false, false) => (raw, DefenseAdjustment::None),
    };
    DefenseOutcome { amount, adjustment }
}

/// Deal damage to one combatant and handle what follows from it.
///
/// Dropping to 0 hit points knocks the target unconscious and ends its
/// concentration; otherwise a concentrating target checks to keep its link.
/// Returns the damage dealt after defenses.
pub fn apply_damage(
    state: &mut CombatState,
    target: CharacterId,
    raw: i32,
    damage_type: Option<DamageType>,
    source: &str,
    roller: &mut DiceRoller,
) -> Result<i32, ResolutionError> {
    let turn = state.turn;
    let character = state
        .character_mut(target)
        .ok_or(ResolutionError::UnknownCharacter(target))?;

    let defense = apply_defenses(raw, damage_type, character);
    let result = character.hit_points.take_damage(defense.amount);
    let note = match defense.adjustment {
        DefenseAdjustment::None => "",
        DefenseAdjustment::Immune => " (immune)",
        DefenseAdjustment::Resisted => " (resisted)",
        DefenseAdjustment::Vulnerable => " (vulnerable)",
        DefenseAdjustment::ResistedAndVulnerable => " (resisted and vulnerable)",
    };
    let message = format!(
        "{} takes {} {}damage from {}{} ({}/{} HP)",
        character.name,
        defense.amount,
        damage_type.map(|t| format!("{} ", t.name())).unwrap_or_default(),
        source,
        note,
        character.hit_points.current,
        character.hit_points.maximum
    );

    let mut knocked_out = None;
    if result.dropped_to_zero {
        character.apply_condition(ActiveCondition::new(Condition::Unconscious, source, turn));
        knocked_out = Some(format!("{} falls unconscious", character.name));
    }

    state.log.push(
        LogEntry::new(LogKind::Damage, message)
            .with_value(defense.amount)
            .about(target),
    );

    if let Some(message) = knocked_out {
        state
            .log
            .push(LogEntry::new(LogKind::ConditionApplied, message).about(target));
        end_concentration(state, target, "dropped to 0 hit points");
    } else if defense.amount > 0 {
        resolve_concentration_check(state, target, defense.amount, roller)?;
    }

    Ok(defense.amount)
}

/// Rolls the effect's dice once and applies the result to every target
/// that is not gated out.
pub struct DamageCommand;

impl EffectCommand for DamageCommand {
    type Payload = DamagePayload;

    fn validate(&self, payload: &DamagePayload, effect: &SpellEffect) -> Result<(), ValidationError> {
        if payload.dice.is_none() {
            return Err(ValidationError::missing("Damage", "dice"));
        }
        validate_gate(effect, payload.save.as_ref())
    }

    fn execute(
        &self,
        payload: &DamagePayload,
        effect: &SpellEffect,
        ctx: &CastContext<'_>,
        state: &mut CombatState,
        roller: &mut DiceRoller,
    ) -> Result<CommandOutcome, ResolutionError> {
        let dice = payload
            .dice
            .as_deref()
            .ok_or(ValidationError::missing("Damage", "dice"))?;
        let mut expression = DiceExpression::parse(dice)?;
        if let Some(extra) = &payload.upcast_dice {
            let levels = ctx.levels_above_base();
            if levels > 0 {
                expression = expression.scaled(&DiceExpression::parse(extra)?, levels);
            }
        }

        let mut gates = Vec::with_capacity(ctx.targets.len());
        for &target in &ctx.targets {
            gates.push((target, gate_target(effect, ctx, state, target, roller)?));
        }
        if gates.iter().all(|(_, gate)| *gate == Gate::Skip) {
            return Ok(CommandOutcome::default());
        }

        let caster_name = lookup(state, ctx.caster)?.name.clone();
        let base = if ctx.has_mechanic(&PlanarMechanic::RerollTakeHigher) {
            let best = expression.roll_take_higher(roller);
            state.log.push(
                LogEntry::new(
                    LogKind::DamageRoll,
                    format!(
                        "{}'s {} rolls {}: {}",
                        caster_name, ctx.spell.name, expression, best.first
                    ),
                )
                .with_value(best.first.total),
            );
            state.log.push(
                LogEntry::new(
                    LogKind::PlanarReroll,
                    format!(
                        "The plane of {} lets {} roll again: {} (+{} from the plane)",
                        ctx.plane,
                        ctx.spell.name,
                        best.second,
                        best.improvement()
                    ),
                )
                .with_value(best.improvement()),
            );
            best.kept().total
        } else {
            let roll = expression.roll(roller);
            state.log.push(
                LogEntry::new(
                    LogKind::DamageRoll,
                    format!("{}'s {} rolls {}: {}", caster_name, ctx.spell.name, expression, roll),
                )
                .with_value(roll.total),
            );
            roll.total
        };
        let base = base.max(0);
        debug!(spell = %ctx.spell.name, base, "damage rolled");

        let mut outcome = CommandOutcome::default();
        for (target, gate) in gates {
            let raw = match gate {
                Gate::Skip => continue,
                Gate::Half => base / 2,
                Gate::Full { critical: false } => base,
                Gate::Full { critical: true } => {
                    let extra = expression.dice_only().roll(roller);
                    state.log.push(
                        LogEntry::new(
                            LogKind::DamageRoll,
                            format!("Critical hit: {} more rolls {}", extra.expression, extra),
                        )
                        .with_value(extra.total)
                        .about(target),
                    );
                    base + extra.total
                }
            };
            apply_damage(state, target, raw, payload.damage_type, &ctx.spell.name, roller)?;
            outcome.affected.push(target);
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::character::{CastId, ConcentrationLink, ConditionDuration, Team};
    use crate::commands::execute_effect;
    use crate::spells::{get_spell, SpellId};
    use crate::testing::{sample_goblin, sample_wizard};

    fn target() -> CombatCharacter {
        CombatCharacter::new("Target", Team::Hostile).with_hit_points(100)
    }

    #[test]
    fn test_resisted_and_vulnerable_halves_then_doubles() {
        let mut c = target();
        c.resistances.insert(DamageType::Fire);
        c.vulnerabilities.insert(DamageType::Fire);
        for raw in 0..60 {
            let outcome = apply_defenses(raw, Some(DamageType::Fire), &c);
            assert_eq!(outcome.amount, (raw / 2) * 2, "raw {raw}");
        }
        assert_eq!(apply_defenses(25, Some(DamageType::Fire), &c).amount, 24);
        assert_eq!(
            apply_defenses(25, Some(DamageType::Fire), &c).adjustment,
            DefenseAdjustment::ResistedAndVulnerable
        );
    }

    #[test]
    fn test_single_defenses() {
        let mut c = target();
        c.resistances.insert(DamageType::Cold);
        c.vulnerabilities.insert(DamageType::Radiant);
        c.immunities.insert(DamageType::Poison);
        assert_eq!(apply_defenses(9, Some(DamageType::Cold), &c).amount, 4);
        assert_eq!(apply_defenses(9, Some(DamageType::Radiant), &c).amount, 18);
        assert_eq!(apply_defenses(9, Some(DamageType::Poison), &c).amount, 0);
        assert_eq!(apply_defenses(9, Some(DamageType::Fire), &c).amount, 9);
        assert_eq!(apply_defenses(9, None, &c).amount, 9);
    }

    #[test]
    fn test_dropping_to_zero_knocks_out_and_ends_concentration() {
        let mut state = CombatState::new();
        let mut victim = CombatCharacter::new("Acolyte", Team::Hostile).with_hit_points(5);
        victim.concentrating_on = Some(ConcentrationLink {
            cast: CastId::new(),
            spell: SpellId::new("bless"),
            spell_name: "Bless".to_string(),
            duration: ConditionDuration::Minutes(1),
            started_turn: 0,
        });
        let id = state.add_character(victim);

        let dealt = apply_damage(&mut state, id, 9, Some(DamageType::Fire), "Fireball", &mut DiceRoller::scripted([]))
            .unwrap();
        assert_eq!(dealt, 9);
        let victim = state.character(id).unwrap();
        assert_eq!(victim.hit_points.current, 0);
        assert!(victim.has_condition(&Condition::Unconscious));
        assert!(victim.concentrating_on.is_none());
        assert_eq!(state.log.count(LogKind::ConcentrationEnded), 1);
        assert_eq!(state.log.count(LogKind::ConcentrationCheck), 0);
    }

    #[test]
    fn test_fireball_half_on_success() {
        let spell = get_spell("fireball").unwrap();
        let mut state = CombatState::new();
        let wizard = state.add_character(sample_wizard());
        let mut sturdy = sample_goblin().with_hit_points(40);
        sturdy.name = "Sturdy".to_string();
        let sturdy = state.add_character(sturdy);
        let frail = state.add_character(sample_goblin().with_hit_points(40));

        // Saves: 19 + 2 DEX (success), 3 + 2 (failure). Damage: eight 3s.
        let mut roller = DiceRoller::scripted([19, 3, 3, 3, 3, 3, 3, 3, 3, 3]);
        let ctx = CastContext::new(spell, wizard, vec![sturdy, frail]);
        let outcome = execute_effect(&spell.effects[0], &ctx, &mut state, &mut roller).unwrap();

        assert_eq!(outcome.affected, vec![sturdy, frail]);
        assert_eq!(state.character(sturdy).unwrap().hit_points.current, 28);
        assert_eq!(state.character(frail).unwrap().hit_points.current, 16);
        assert_eq!(state.log.count(LogKind::DamageRoll), 1);
        assert_eq!(roller.scripted_remaining(), 0);
    }

    #[test]
    fn test_upcast_adds_dice() {
        let spell = get_spell("fireball").unwrap();
        let mut state = CombatState::new();
        let wizard = state.add_character(sample_wizard());
        let goblin = state.add_character(sample_goblin().with_hit_points(200));

        let mut ctx = CastContext::new(spell, wizard, vec![goblin]);
        ctx.cast_level = 5;
        // Failed save, then ten 1s for 10d6.
        let mut roller = DiceRoller::scripted(std::iter::once(2).chain(std::iter::repeat(1).take(10)));
        execute_effect(&spell.effects[0], &ctx, &mut state, &mut roller).unwrap();
        assert_eq!(state.character(goblin).unwrap().hit_points.current, 190);
        assert_eq!(roller.scripted_remaining(), 0);
    }

    #[test]
    fn test_reroll_take_higher_logs_plane_bonus() {
        let spell = get_spell("fire bolt").unwrap();
        let mut state = CombatState::new();
        let wizard = state.add_character(sample_wizard());
        let goblin = state.add_character(sample_goblin().with_hit_points(30));

        let mut ctx = CastContext::new(spell, wizard, vec![goblin]);
        ctx.mechanic = Some(PlanarMechanic::RerollTakeHigher);
        // Attack 15 hits; damage rolls 2 then 7.
        let mut roller = DiceRoller::scripted([15, 2, 7]);
        execute_effect(&spell.effects[0], &ctx, &mut state, &mut roller).unwrap();

        assert_eq!(state.character(goblin).unwrap().hit_points.current, 23);
        let reroll = state.log.of_kind(LogKind::PlanarReroll).next().unwrap();
        assert_eq!(reroll.value, Some(5));
        let base = state.log.of_kind(LogKind::DamageRoll).next().unwrap();
        assert_eq!(base.value, Some(2));
    }

    #[test]
    fn test_miss_rolls_no_damage() {
        let spell = get_spell("fire bolt").unwrap();
        let mut state = CombatState::new();
        let wizard = state.add_character(sample_wizard());
        let goblin = state.add_character(sample_goblin());

        let ctx = CastContext::new(spell, wizard, vec![goblin]);
        let mut roller = DiceRoller::scripted([1, 10]);
        let outcome = execute_effect(&spell.effects[0], &ctx, &mut state, &mut roller).unwrap();
        assert!(outcome.affected.is_empty());
        assert_eq!(roller.scripted_remaining(), 1);
        assert_eq!(state.log.count(LogKind::DamageRoll), 0);
    }

    #[test]
    fn test_critical_rolls_extra_dice() {
        let spell = get_spell("fire bolt").unwrap();
        let mut state = CombatState::new();
        let wizard = state.add_character(sample_wizard());
        let goblin = state.add_character(sample_goblin().with_hit_points(30));

        let ctx = CastContext::new(spell, wizard, vec![goblin]);
        let mut roller = DiceRoller::scripted([20, 4, 6]);
        execute_effect(&spell.effects[0], &ctx, &mut state, &mut roller).unwrap();
        assert_eq!(state.character(goblin).unwrap().hit_points.current, 20);
    }

    #[test]
    fn test_damage_breaks_concentration_on_failed_check() {
        let spell = get_spell("fire bolt").unwrap();
        let mut state = CombatState::new();
        let wizard = state.add_character(sample_wizard());
        let mut shaman = sample_goblin().with_hit_points(30);
        shaman.concentrating_on = Some(ConcentrationLink {
            cast: CastId::new(),
            spell: SpellId::new("hex"),
            spell_name: "Hex".to_string(),
            duration: ConditionDuration::Minutes(60),
            started_turn: 0,
        });
        let shaman = state.add_character(shaman);

        // Hit, 6 damage, concentration save rolls 2.
        let ctx = CastContext::new(spell, wizard, vec![shaman]);
        let mut roller = DiceRoller::scripted([15, 6, 2]);
        execute_effect(&spell.effects[0], &ctx, &mut state, &mut roller).unwrap();
        assert!(state.character(shaman).unwrap().concentrating_on.is_none());
        assert_eq!(state.log.count(LogKind::ConcentrationCheck), 1);
    }
}
