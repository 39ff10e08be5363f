//! Summoning.

use super::{lookup, CastContext, CommandOutcome, EffectCommand};
use crate::combat::{CombatState, LogEntry, LogKind};
use crate::dice::DiceRoller;
use crate::effects::{SpellEffect, SummonPayload};
use crate::error::{ResolutionError, ValidationError};

/// Adds creatures from a template on free squares next to the caster.
/// The combat state owns them from then on.
pub struct SummonCommand;

impl EffectCommand for SummonCommand {
    type Payload = SummonPayload;

    fn validate(&self, payload: &SummonPayload, _effect: &SpellEffect) -> Result<(), ValidationError> {
        if payload.template.is_none() {
            return Err(ValidationError::missing("Summoning", "template"));
        }
        if payload.count == 0 {
            return Err(ValidationError::out_of_range("Summoning", "count"));
        }
        Ok(())
    }

    fn execute(
        &self,
        payload: &SummonPayload,
        _effect: &SpellEffect,
        ctx: &CastContext<'_>,
        state: &mut CombatState,
        _roller: &mut DiceRoller,
    ) -> Result<CommandOutcome, ResolutionError> {
        let template = payload
            .template
            .as_ref()
            .ok_or(ValidationError::missing("Summoning", "template"))?;
        let summoner = lookup(state, ctx.caster)?;

        let free: Vec<_> = summoner
            .position
            .neighbors()
            .into_iter()
            .filter(|cell| ctx.map.map_or(true, |m| m.is_passable(*cell)))
            .filter(|cell| !state.is_occupied(*cell, None))
            .take(payload.count as usize)
            .collect();
        if free.len() < payload.count as usize {
            return Err(ResolutionError::NoFreeSpace(summoner.position));
        }

        let creatures: Vec<_> = free
            .into_iter()
            .map(|cell| template.instantiate(summoner, cell))
            .collect();
        let summoner_name = summoner.name.clone();

        let mut outcome = CommandOutcome::default();
        for creature in creatures {
            let message = format!(
                "{} summons {} at {} with {}",
                summoner_name, creature.name, creature.position, ctx.spell.name
            );
            let id = state.add_character(creature);
            state.log.push(LogEntry::new(LogKind::Summon, message).about(id));
            outcome.affected.push(id);
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::character::{Position, Team};
    use crate::commands::execute_effect;
    use crate::effects::{EffectKind, SummonTemplate};
    use crate::spells::get_spell;
    use crate::testing::{sample_goblin, sample_wizard};

    #[test]
    fn test_find_familiar_adds_owl_next_to_caster() {
        let spell = get_spell("find familiar").unwrap();
        let mut state = CombatState::new();
        let wizard = state.add_character(sample_wizard().at(Position::new(5, 5)));
        state.add_character(sample_goblin().at(Position::new(5, 4)));

        let ctx = CastContext::new(spell, wizard, vec![wizard]);
        let outcome = execute_effect(&spell.effects[0], &ctx, &mut state, &mut DiceRoller::scripted([]))
            .unwrap();

        assert_eq!(outcome.affected.len(), 1);
        let owl = state.character(outcome.affected[0]).unwrap();
        assert_eq!(owl.name, "Owl");
        assert_eq!(owl.team, Team::Party);
        assert_eq!(owl.summoned_by, Some(wizard));
        // North is taken, so the owl lands north-east.
        assert_eq!(owl.position, Position::new(6, 4));
        assert_eq!(state.characters.len(), 3);
        assert_eq!(state.log.count(LogKind::Summon), 1);
    }

    #[test]
    fn test_no_room_adds_nothing() {
        let spell = crate::spells::Spell::new("Conjure Swarm", 3, crate::spells::SpellSchool::Conjuration)
            .with_effect(SpellEffect::new(EffectKind::Summoning(SummonPayload {
                template: Some(SummonTemplate::owl()),
                count: 9,
            })));
        let mut state = CombatState::new();
        let wizard = state.add_character(sample_wizard());

        let ctx = CastContext::new(&spell, wizard, Vec::new());
        let err = execute_effect(&spell.effects[0], &ctx, &mut state, &mut DiceRoller::scripted([]))
            .unwrap_err();
        assert_eq!(err, ResolutionError::NoFreeSpace(Position::new(0, 0)));
        assert_eq!(state.characters.len(), 1);
        assert!(state.log.is_empty());
    }
}
