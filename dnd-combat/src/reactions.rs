//! Opportunity attacks.
//!
//! Movement is analysed one discrete step at a time. The engine only
//! reports which attacks are provoked; rolling them and spending the
//! attackers' reactions is the caller's job.

use crate::character::{CharacterId, CombatCharacter, Condition, Position};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

// ============================================================================
// Line of sight
// ============================================================================

/// Map data that can answer line-of-sight queries.
pub trait LineOfSight {
    fn has_line_of_sight(&self, from: Position, to: Position) -> bool;

    /// Whether a creature can stand on or walk through `position`.
    fn is_passable(&self, position: Position) -> bool {
        let _ = position;
        true
    }
}

/// A grid with opaque, impassable cells.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GridMap {
    blocked: HashSet<Position>,
}

impl GridMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_blocked(mut self, cells: impl IntoIterator<Item = Position>) -> Self {
        self.blocked.extend(cells);
        self
    }

    pub fn block(&mut self, cell: Position) {
        self.blocked.insert(cell);
    }

    pub fn is_blocked(&self, cell: Position) -> bool {
        self.blocked.contains(&cell)
    }
}

impl LineOfSight for GridMap {
    /// Clear when no blocked cell lies strictly between the endpoints.
    fn has_line_of_sight(&self, from: Position, to: Position) -> bool {
        let line = bresenham_line(from, to);
        let interior = line.len().saturating_sub(1);
        line.iter()
            .take(interior)
            .skip(1)
            .all(|cell| !self.is_blocked(*cell))
    }

    fn is_passable(&self, position: Position) -> bool {
        !self.is_blocked(position)
    }
}

/// Cells on the line from `from` to `to`, both ends included.
pub fn bresenham_line(from: Position, to: Position) -> Vec<Position> {
    let dx = (to.x - from.x).abs();
    let dy = -(to.y - from.y).abs();
    let sx = if from.x < to.x { 1 } else { -1 };
    let sy = if from.y < to.y { 1 } else { -1 };
    let mut err = dx + dy;
    let (mut x, mut y) = (from.x, from.y);
    let mut cells = Vec::with_capacity((dx.max(-dy) + 1) as usize);

    loop {
        cells.push(Position::new(x, y));
        if x == to.x && y == to.y {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x += sx;
        }
        if e2 <= dx {
            err += dx;
            y += sy;
        }
    }
    cells
}

// ============================================================================
// Opportunity attacks
// ============================================================================

/// An attack provoked by movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpportunityAttack {
    pub attacker: CharacterId,
    pub target: CharacterId,
    /// The square the target was leaving.
    pub trigger_position: Position,
}

/// Attacks provoked by one step from `from` to `to`.
///
/// `already_triggered` carries the attackers that have reacted earlier in
/// the same move; new attackers are added to it.
pub fn step_opportunity_attacks(
    mover: &CombatCharacter,
    from: Position,
    to: Position,
    combatants: &[CombatCharacter],
    map: Option<&dyn LineOfSight>,
    already_triggered: &mut HashSet<CharacterId>,
) -> Vec<OpportunityAttack> {
    if mover.has_condition(&Condition::Disengaged) {
        return Vec::new();
    }

    let mut attacks = Vec::new();
    for attacker in combatants {
        if attacker.id == mover.id || attacker.team == mover.team {
            continue;
        }
        if attacker.reactions_blocked() || attacker.hit_points.is_down() {
            continue;
        }
        if !attacker.action_economy.reaction.available() {
            continue;
        }
        if already_triggered.contains(&attacker.id) {
            continue;
        }
        if let Some(map) = map {
            if !map.has_line_of_sight(attacker.position, from) {
                debug!(attacker = %attacker.name, "no line of sight to the square being left");
                continue;
            }
        }

        let reach = attacker.melee_reach();
        let before = attacker.position.chebyshev_distance(from);
        let after = attacker.position.chebyshev_distance(to);
        debug!(attacker = %attacker.name, reach, before, after, "reach check");
        if before <= reach && after > reach {
            already_triggered.insert(attacker.id);
            attacks.push(OpportunityAttack {
                attacker: attacker.id,
                target: mover.id,
                trigger_position: from,
            });
        }
    }
    attacks
}

/// Attacks provoked along a whole path.
///
/// `path` lists the squares the mover occupies in order, starting with the
/// square it moves from. Each attacker reacts at most once per move.
pub fn opportunity_attacks(
    mover: &CombatCharacter,
    path: &[Position],
    combatants: &[CombatCharacter],
    map: Option<&dyn LineOfSight>,
) -> Vec<OpportunityAttack> {
    let mut already_triggered = HashSet::new();
    path.windows(2)
        .flat_map(|step| {
            step_opportunity_attacks(mover, step[0], step[1], combatants, map, &mut already_triggered)
        })
        .collect()
}
