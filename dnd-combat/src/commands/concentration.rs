//! Starting concentration.

use super::{CastContext, CommandOutcome, EffectCommand};
use crate::character::ConcentrationLink;
use crate::combat::{CombatState, LogEntry, LogKind};
use crate::concentration::start_concentration;
use crate::dice::DiceRoller;
use crate::effects::{ConcentrationPayload, SpellEffect};
use crate::error::{ResolutionError, ValidationError};
use crate::planes::PlanarMechanic;

/// Records the caster's concentration link for this cast, ending the
/// previous one first.
pub struct ConcentrationCommand;

impl EffectCommand for ConcentrationCommand {
    type Payload = ConcentrationPayload;

    fn validate(&self, payload: &ConcentrationPayload, _effect: &SpellEffect) -> Result<(), ValidationError> {
        if payload.duration.is_none() {
            return Err(ValidationError::missing("Concentration", "duration"));
        }
        Ok(())
    }

    fn execute(
        &self,
        payload: &ConcentrationPayload,
        _effect: &SpellEffect,
        ctx: &CastContext<'_>,
        state: &mut CombatState,
        _roller: &mut DiceRoller,
    ) -> Result<CommandOutcome, ResolutionError> {
        let mut duration = payload
            .duration
            .ok_or(ValidationError::missing("Concentration", "duration"))?;
        if ctx.has_mechanic(&PlanarMechanic::DoubleDuration) {
            duration = duration.doubled();
            state.log.push(
                LogEntry::new(
                    LogKind::PlanarMechanic,
                    format!(
                        "The plane of {} stretches {} to {}",
                        ctx.plane,
                        ctx.spell.name,
                        duration.description()
                    ),
                )
                .about(ctx.caster),
            );
        }

        let link = ConcentrationLink {
            cast: ctx.cast,
            spell: ctx.spell.id.clone(),
            spell_name: ctx.spell.name.clone(),
            duration,
            started_turn: state.turn,
        };
        start_concentration(state, ctx.caster, link)?;
        Ok(CommandOutcome {
            affected: vec![ctx.caster],
            ..CommandOutcome::default()
        })
    }
}
