//! Status conditions.

use super::{gate_target, validate_gate, CastContext, CommandOutcome, EffectCommand, Gate};
use crate::character::{ActiveCondition, ConditionChange, ConditionDuration};
use crate::combat::{CombatState, LogEntry, LogKind};
use crate::dice::DiceRoller;
use crate::effects::{ConditionPayload, SpellEffect};
use crate::error::{ResolutionError, ValidationError};
use crate::planes::PlanarMechanic;

/// Applies a condition to every target that fails its save, refreshing an
/// existing entry rather than stacking a second one.
pub struct ConditionCommand;

impl EffectCommand for ConditionCommand {
    type Payload = ConditionPayload;

    fn validate(&self, payload: &ConditionPayload, effect: &SpellEffect) -> Result<(), ValidationError> {
        if payload.condition.is_none() {
            return Err(ValidationError::missing("StatusCondition", "condition"));
        }
        if payload.repeat_save && payload.save.is_none() {
            return Err(ValidationError::missing("StatusCondition", "save"));
        }
        validate_gate(effect, payload.save.as_ref())
    }

    fn execute(
        &self,
        payload: &ConditionPayload,
        effect: &SpellEffect,
        ctx: &CastContext<'_>,
        state: &mut CombatState,
        roller: &mut DiceRoller,
    ) -> Result<CommandOutcome, ResolutionError> {
        let condition = payload
            .condition
            .clone()
            .ok_or(ValidationError::missing("StatusCondition", "condition"))?;

        let mut duration = payload.duration.unwrap_or(ConditionDuration::UntilRemoved);
        let mut stretch_pending =
            ctx.has_mechanic(&PlanarMechanic::DoubleDuration) && duration != ConditionDuration::UntilRemoved;
        if stretch_pending {
            duration = duration.doubled();
        }
        let repeat_save = payload
            .repeat_save
            .then(|| payload.save.map(|s| s.ability))
            .flatten();

        let mut outcome = CommandOutcome::default();
        for &target in &ctx.targets {
            // A save that would halve a condition resists it outright.
            if !matches!(gate_target(effect, ctx, state, target, roller)?, Gate::Full { .. }) {
                continue;
            }
            if stretch_pending {
                stretch_pending = false;
                state.log.push(LogEntry::new(
                    LogKind::PlanarMechanic,
                    format!(
                        "The plane of {} doubles how long {} lasts ({})",
                        ctx.plane,
                        ctx.spell.name,
                        duration.description()
                    ),
                ));
            }

            let turn = state.turn;
            let character = state
                .character_mut(target)
                .ok_or(ResolutionError::UnknownCharacter(target))?;
            let applied = ActiveCondition::new(condition.clone(), ctx.spell.name.clone(), turn)
                .with_duration(duration)
                .with_save(repeat_save)
                .linked_to(ctx.linked_cast());
            let (kind, message) = match character.apply_condition(applied) {
                ConditionChange::Added => (
                    LogKind::ConditionApplied,
                    format!(
                        "{} is {} by {} ({})",
                        character.name,
                        condition,
                        ctx.spell.name,
                        duration.description()
                    ),
                ),
                ConditionChange::Refreshed => (
                    LogKind::ConditionRefreshed,
                    format!(
                        "{}'s {} condition is refreshed ({})",
                        character.name,
                        condition,
                        duration.description()
                    ),
                ),
            };
            state.log.push(LogEntry::new(kind, message).about(target));
            outcome.affected.push(target);
        }
        Ok(outcome)
    }
}
