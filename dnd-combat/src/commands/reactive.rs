//! Latent triggers.

use super::{lookup, validate_effect, CastContext, CommandOutcome, EffectCommand};
use crate::combat::{CombatState, LogEntry, LogKind};
use crate::dice::DiceRoller;
use crate::effects::{EffectKind, LatentTrigger, ReactivePayload, SpellEffect, TriggerEvent};
use crate::error::{ResolutionError, ValidationError};
use crate::planes::PlanarMechanic;
use uuid::Uuid;

/// Stores a trigger per target for the turn loop to evaluate. Nothing
/// fires here.
pub struct ReactiveCommand;

impl EffectCommand for ReactiveCommand {
    type Payload = ReactivePayload;

    fn validate(&self, payload: &ReactivePayload, _effect: &SpellEffect) -> Result<(), ValidationError> {
        if payload.watch.is_none() {
            return Err(ValidationError::missing("ReactiveTrigger", "watch"));
        }
        let Some(response) = &payload.response else {
            return Err(ValidationError::missing("ReactiveTrigger", "response"));
        };
        if matches!(response.kind, EffectKind::ReactiveTrigger(_)) {
            return Err(ValidationError::nested_trigger("ReactiveTrigger", "response"));
        }
        validate_effect(response)
    }

    fn execute(
        &self,
        payload: &ReactivePayload,
        _effect: &SpellEffect,
        ctx: &CastContext<'_>,
        state: &mut CombatState,
        _roller: &mut DiceRoller,
    ) -> Result<CommandOutcome, ResolutionError> {
        let watch = payload
            .watch
            .ok_or(ValidationError::missing("ReactiveTrigger", "watch"))?;
        let response = payload
            .response
            .as_deref()
            .ok_or(ValidationError::missing("ReactiveTrigger", "response"))?;
        let mut duration = payload
            .duration
            .unwrap_or_else(|| ctx.spell.duration.as_condition_duration());
        if ctx.has_mechanic(&PlanarMechanic::DoubleDuration) {
            duration = duration.doubled();
        }

        let mut outcome = CommandOutcome::default();
        for &owner in &ctx.targets {
            let owner_name = lookup(state, owner)?.name.clone();
            state.latent_triggers.push(LatentTrigger {
                id: Uuid::new_v4(),
                owner,
                registered_by: ctx.caster,
                source: ctx.spell.name.clone(),
                cast: ctx.cast,
                watch,
                response: response.clone(),
                duration,
                registered_turn: state.turn,
            });
            state.log.push(
                LogEntry::new(
                    LogKind::TriggerRegistered,
                    format!(
                        "{} will answer when {} {} ({})",
                        ctx.spell.name,
                        owner_name,
                        describe(watch),
                        duration.description()
                    ),
                )
                .about(owner),
            );
            outcome.affected.push(owner);
        }
        Ok(outcome)
    }
}

fn describe(event: TriggerEvent) -> &'static str {
    match event {
        TriggerEvent::DamageTaken => "takes damage",
        TriggerEvent::Moves => "moves",
        TriggerEvent::Attacked => "is attacked",
        TriggerEvent::StartOfTurn => "starts a turn",
        TriggerEvent::EndOfTurn => "ends a turn",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::character::{ConditionDuration, DamageType};
    use crate::commands::execute_effect;
    use crate::error::ValidationKind;
    use crate::spells::get_spell;
    use crate::testing::{sample_goblin, sample_wizard};

    #[test]
    fn test_hex_registers_trigger_on_target() {
        let spell = get_spell("hex").unwrap();
        let mut state = CombatState::new();
        let wizard = state.add_character(sample_wizard());
        let goblin = state.add_character(sample_goblin());

        let ctx = CastContext::new(spell, wizard, vec![goblin]);
        execute_effect(&spell.effects[2], &ctx, &mut state, &mut DiceRoller::scripted([]))
            .unwrap();

        let trigger = state.triggers_for(goblin).next().unwrap();
        assert_eq!(trigger.watch, TriggerEvent::DamageTaken);
        assert_eq!(trigger.registered_by, wizard);
        assert_eq!(trigger.cast, ctx.cast);
        assert_eq!(trigger.duration, ConditionDuration::Minutes(60));
        assert_eq!(state.log.count(LogKind::TriggerRegistered), 1);
    }

    #[test]
    fn test_double_duration_stretches_trigger() {
        let spell = get_spell("hex").unwrap();
        let mut state = CombatState::new();
        let wizard = state.add_character(sample_wizard());
        let goblin = state.add_character(sample_goblin());

        let mut ctx = CastContext::new(spell, wizard, vec![goblin]);
        ctx.mechanic = Some(PlanarMechanic::DoubleDuration);
        execute_effect(&spell.effects[2], &ctx, &mut state, &mut DiceRoller::scripted([]))
            .unwrap();
        let trigger = state.triggers_for(goblin).next().unwrap();
        assert_eq!(trigger.duration, ConditionDuration::Minutes(120));
    }

    #[test]
    fn test_nested_trigger_is_rejected() {
        let inner = SpellEffect::reactive(
            TriggerEvent::Moves,
            SpellEffect::damage("1d4", DamageType::Force),
        );
        let outer = SpellEffect::reactive(TriggerEvent::Attacked, inner);
        let err = validate_effect(&outer).unwrap_err();
        assert_eq!(err.kind, ValidationKind::NestedTrigger);
    }

    #[test]
    fn test_malformed_response_is_rejected() {
        let broken = SpellEffect::new(EffectKind::Damage(Default::default()));
        let effect = SpellEffect::reactive(TriggerEvent::DamageTaken, broken);
        assert_eq!(
            validate_effect(&effect),
            Err(ValidationError::missing("Damage", "dice"))
        );
    }
}
