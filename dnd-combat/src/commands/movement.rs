//! Movement: pushes, pulls, commanded moves and teleports.

use super::{gate_target, lookup, validate_gate, CastContext, CommandOutcome, EffectCommand, Gate};
use crate::character::{CharacterId, Position};
use crate::combat::{CombatState, LogEntry, LogKind};
use crate::dice::DiceRoller;
use crate::effects::{MoveDirection, MovementPayload, SpellEffect};
use crate::error::{ResolutionError, ValidationError};
use crate::reactions::{opportunity_attacks, LineOfSight};
use tracing::debug;

/// Moves each target along a path that stops before walls and other
/// creatures.
///
/// Forced movement ignores the target's budget and never provokes.
/// Voluntary movement spends the budget and reports the opportunity attacks
/// it provokes; the caller resolves them.
pub struct MovementCommand;

impl EffectCommand for MovementCommand {
    type Payload = MovementPayload;

    fn validate(&self, payload: &MovementPayload, effect: &SpellEffect) -> Result<(), ValidationError> {
        match payload.distance {
            None => return Err(ValidationError::missing("Movement", "distance")),
            Some(0) => return Err(ValidationError::out_of_range("Movement", "distance")),
            Some(_) => {}
        }
        if payload.direction.is_none() {
            return Err(ValidationError::missing("Movement", "direction"));
        }
        validate_gate(effect, payload.save.as_ref())
    }

    fn execute(
        &self,
        payload: &MovementPayload,
        effect: &SpellEffect,
        ctx: &CastContext<'_>,
        state: &mut CombatState,
        roller: &mut DiceRoller,
    ) -> Result<CommandOutcome, ResolutionError> {
        let distance = payload
            .distance
            .ok_or(ValidationError::missing("Movement", "distance"))?;
        let direction = payload
            .direction
            .ok_or(ValidationError::missing("Movement", "direction"))?;
        let goal = match direction {
            MoveDirection::To(point) => Some(point),
            MoveDirection::ChosenPoint => Some(ctx.destination.ok_or(ResolutionError::MissingDestination)?),
            MoveDirection::AwayFromCaster | MoveDirection::TowardCaster => None,
        };
        let origin = lookup(state, ctx.caster)?.position;
        let heading = Heading {
            direction,
            origin,
            goal,
        };

        let mut outcome = CommandOutcome::default();
        for &target in &ctx.targets {
            let squares = match gate_target(effect, ctx, state, target, roller)? {
                Gate::Skip => continue,
                Gate::Half => distance / 2,
                Gate::Full { .. } => distance,
            };
            if payload.teleport {
                if teleport(state, target, squares, &heading, ctx.map)? {
                    outcome.affected.push(target);
                }
                continue;
            }

            let mover = lookup(state, target)?;
            let squares = if payload.forced {
                squares
            } else {
                squares.min(mover.action_economy.movement.remaining())
            };
            let path = walk(state, target, mover.position, squares, &heading, ctx.map);
            let moved = (path.len() - 1) as u32;
            let attacks = if payload.forced || moved == 0 {
                Vec::new()
            } else {
                opportunity_attacks(mover, &path, &state.characters, ctx.map)
            };
            debug!(mover = %mover.name, moved, provoked = attacks.len(), "movement resolved");

            let character = state
                .character_mut(target)
                .ok_or(ResolutionError::UnknownCharacter(target))?;
            if !payload.forced {
                character.action_economy.spend_movement(moved)?;
            }
            let end = path[path.len() - 1];
            character.position = end;
            let message = match (moved, payload.forced) {
                (0, _) => format!("{} cannot move from {}", character.name, end),
                (_, true) => format!("{} is moved {} squares to {}", character.name, moved, end),
                (_, false) => format!("{} moves {} squares to {}", character.name, moved, end),
            };
            let mover_name = character.name.clone();
            state.log.push(
                LogEntry::new(LogKind::Movement, message)
                    .with_value(moved as i32)
                    .about(target),
            );

            for attack in &attacks {
                let attacker = lookup(state, attack.attacker)?.name.clone();
                state.log.push(
                    LogEntry::new(
                        LogKind::OpportunityAttack,
                        format!(
                            "{} can make an opportunity attack as {} leaves {}",
                            attacker, mover_name, attack.trigger_position
                        ),
                    )
                    .about(attack.attacker),
                );
            }
            outcome.opportunity_attacks.extend(attacks);
            outcome.affected.push(target);
        }
        Ok(outcome)
    }
}

struct Heading {
    direction: MoveDirection,
    /// The caster's square.
    origin: Position,
    goal: Option<Position>,
}

impl Heading {
    fn next(&self, from: Position) -> Position {
        match self.direction {
            MoveDirection::AwayFromCaster => from.step_away_from(self.origin),
            MoveDirection::TowardCaster => from.step_toward(self.origin),
            MoveDirection::To(_) | MoveDirection::ChosenPoint => {
                self.goal.map_or(from, |goal| from.step_toward(goal))
            }
        }
    }
}

fn is_free(state: &CombatState, mover: CharacterId, cell: Position, map: Option<&dyn LineOfSight>) -> bool {
    map.map_or(true, |m| m.is_passable(cell)) && !state.is_occupied(cell, Some(mover))
}

/// Squares occupied in order, starting square first.
fn walk(
    state: &CombatState,
    mover: CharacterId,
    start: Position,
    squares: u32,
    heading: &Heading,
    map: Option<&dyn LineOfSight>,
) -> Vec<Position> {
    let mut path = vec![start];
    let mut current = start;
    for _ in 0..squares {
        let next = heading.next(current);
        if next == current || !is_free(state, mover, next, map) {
            break;
        }
        path.push(next);
        current = next;
    }
    path
}

/// Returns whether the target landed.
fn teleport(
    state: &mut CombatState,
    target: CharacterId,
    squares: u32,
    heading: &Heading,
    map: Option<&dyn LineOfSight>,
) -> Result<bool, ResolutionError> {
    let character = lookup(state, target)?;
    let start = character.position;
    let landing = heading.goal.unwrap_or_else(|| {
        (0..squares).fold(start, |at, _| heading.next(at))
    });

    if start.chebyshev_distance(landing) > squares || !is_free(state, target, landing, map) {
        let message = format!("{} cannot teleport to {}", character.name, landing);
        state
            .log
            .push(LogEntry::new(LogKind::Movement, message).with_value(0).about(target));
        return Ok(false);
    }

    let moved = start.chebyshev_distance(landing);
    let character = state
        .character_mut(target)
        .ok_or(ResolutionError::UnknownCharacter(target))?;
    character.position = landing;
    let message = format!("{} teleports to {}", character.name, landing);
    state.log.push(
        LogEntry::new(LogKind::Movement, message)
            .with_value(moved as i32)
            .about(target),
    );
    Ok(true)
}
