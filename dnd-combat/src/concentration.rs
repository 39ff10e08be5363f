//! Concentration: one sustained link per caster.
//!
//! Ending a link tears down everything tied to its cast: conditions carrying
//! the cast id on any combatant and latent triggers it registered.

use crate::character::{Ability, CharacterId, CombatCharacter, ConcentrationLink};
use crate::combat::{CombatState, LogEntry, LogKind};
use crate::dice::{Advantage, DiceError, DiceRoller};
use crate::error::ResolutionError;
use crate::saves::{roll_saving_throw, SavingThrowResult};
use tracing::info;

/// DC to keep concentrating after taking `damage`: half the damage, at
/// least 10.
pub fn concentration_dc(damage: i32) -> i32 {
    (damage / 2).max(10)
}

/// Result of a concentration save.
#[derive(Debug, Clone)]
pub struct ConcentrationCheck {
    pub dc: i32,
    pub save: SavingThrowResult,
    pub maintained: bool,
}

/// Roll the Constitution save. Does not touch any link; the caller ends
/// concentration on failure.
pub fn check_concentration(
    character: &CombatCharacter,
    damage: i32,
    roller: &mut DiceRoller,
) -> Result<ConcentrationCheck, DiceError> {
    let dc = concentration_dc(damage);
    let save = roll_saving_throw(
        character,
        Ability::Constitution,
        dc,
        &[],
        Advantage::Normal,
        roller,
    )?;
    Ok(ConcentrationCheck {
        dc,
        maintained: save.success,
        save,
    })
}

/// Record a new link for `caster`, ending any previous one first.
///
/// Returns the link that was replaced.
pub fn start_concentration(
    state: &mut CombatState,
    caster: CharacterId,
    link: ConcentrationLink,
) -> Result<Option<ConcentrationLink>, ResolutionError> {
    if !state.contains(caster) {
        return Err(ResolutionError::UnknownCharacter(caster));
    }

    let spell_name = link.spell_name.clone();
    let duration = link.duration;
    let previous = end_concentration(state, caster, &format!("starts concentrating on {spell_name}"));

    let Some(character) = state.character_mut(caster) else {
        return Err(ResolutionError::UnknownCharacter(caster));
    };
    character.concentrating_on = Some(link);
    let message = format!(
        "{} concentrates on {} ({})",
        character.name,
        spell_name,
        duration.description()
    );
    state
        .log
        .push(LogEntry::new(LogKind::ConcentrationStarted, message).about(caster));
    Ok(previous)
}

/// End `caster`'s link, if any, and remove everything tied to it.
pub fn end_concentration(
    state: &mut CombatState,
    caster: CharacterId,
    reason: &str,
) -> Option<ConcentrationLink> {
    let character = state.character_mut(caster)?;
    let link = character.concentrating_on.take()?;
    let caster_name = character.name.clone();

    info!(caster = %caster_name, spell = %link.spell_name, reason, "concentration ended");
    state.log.push(
        LogEntry::new(
            LogKind::ConcentrationEnded,
            format!(
                "{} stops concentrating on {} ({})",
                caster_name, link.spell_name, reason
            ),
        )
        .about(caster),
    );

    let mut removed = Vec::new();
    for character in &mut state.characters {
        for condition in character.remove_linked_conditions(link.cast) {
            removed.push(
                LogEntry::new(
                    LogKind::ConditionRemoved,
                    format!(
                        "{} is no longer {} ({} ended)",
                        character.name, condition.condition, link.spell_name
                    ),
                )
                .about(character.id),
            );
        }
    }
    state.log.extend(removed);
    state.latent_triggers.retain(|t| t.cast != link.cast);

    Some(link)
}

/// Run the damage-triggered check for a concentrating character, ending
/// the link on failure. Returns `None` when there is nothing to check.
pub fn resolve_concentration_check(
    state: &mut CombatState,
    character_id: CharacterId,
    damage: i32,
    roller: &mut DiceRoller,
) -> Result<Option<ConcentrationCheck>, ResolutionError> {
    let character = state
        .character(character_id)
        .ok_or(ResolutionError::UnknownCharacter(character_id))?;
    let Some(link) = &character.concentrating_on else {
        return Ok(None);
    };
    if damage <= 0 {
        return Ok(None);
    }

    let spell_name = link.spell_name.clone();
    let name = character.name.clone();
    let check = check_concentration(character, damage, roller)?;

    state.log.push(
        LogEntry::new(
            LogKind::ConcentrationCheck,
            format!(
                "{} makes a DC {} Constitution save to maintain concentration on {}. Rolls {} - {}",
                name,
                check.dc,
                spell_name,
                check.save.total,
                if check.maintained { "maintained" } else { "broken" }
            ),
        )
        .with_value(check.save.total)
        .about(character_id),
    );

    if !check.maintained {
        end_concentration(state, character_id, "failed a concentration check");
    }
    Ok(Some(check))
}
