//! Narrative effects.

use super::{CastContext, CommandOutcome, EffectCommand};
use crate::combat::{CombatState, LogEntry, LogKind};
use crate::dice::DiceRoller;
use crate::effects::{SpellEffect, UtilityPayload};
use crate::error::{ResolutionError, ValidationError};

/// Narrative-only effects: logged, nothing else changes.
pub struct UtilityCommand;

impl EffectCommand for UtilityCommand {
    type Payload = UtilityPayload;

    fn validate(&self, payload: &UtilityPayload, _effect: &SpellEffect) -> Result<(), ValidationError> {
        match payload.description.as_deref() {
            None => Err(ValidationError::missing("Utility", "description")),
            Some(text) if text.trim().is_empty() => Err(ValidationError::missing("Utility", "description")),
            Some(_) => Ok(()),
        }
    }

    fn execute(
        &self,
        payload: &UtilityPayload,
        _effect: &SpellEffect,
        ctx: &CastContext<'_>,
        state: &mut CombatState,
        _roller: &mut DiceRoller,
    ) -> Result<CommandOutcome, ResolutionError> {
        let description = payload
            .description
            .as_deref()
            .ok_or(ValidationError::missing("Utility", "description"))?;
        state.log.push(
            LogEntry::new(LogKind::Utility, format!("{}: {}", ctx.spell.name, description))
                .about(ctx.caster),
        );
        Ok(CommandOutcome::default())
    }
}
