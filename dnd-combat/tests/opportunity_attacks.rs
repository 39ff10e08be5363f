//! Opportunity-attack analysis through the engine.

use dnd_combat::testing::{sample_archer, sample_fighter, sample_goblin, sample_pikeman, TestHarness};
use dnd_combat::{ActiveCondition, CharacterId, Condition, GridMap, OpportunityAttack, Position};

fn path(cells: &[(i32, i32)]) -> Vec<Position> {
    cells.iter().map(|&(x, y)| Position::new(x, y)).collect()
}

fn attacks(harness: &TestHarness, mover: CharacterId, cells: &[(i32, i32)]) -> Vec<OpportunityAttack> {
    harness
        .engine
        .opportunity_attacks(&harness.state, mover, &path(cells), None)
        .unwrap()
}

/// A goblin at the origin and a fighter standing next to it.
fn standoff() -> (TestHarness, CharacterId, CharacterId) {
    let mut harness = TestHarness::default();
    let goblin = harness.add_at(sample_goblin(), 0, 0);
    let fighter = harness.add_at(sample_fighter(), 0, 1);
    (harness, goblin, fighter)
}

// =============================================================================
// Triggering
// =============================================================================

#[test]
fn test_leaving_reach_triggers_exactly_once() {
    let (harness, goblin, fighter) = standoff();
    let found = attacks(&harness, fighter, &[(0, 1), (0, 2)]);
    assert_eq!(
        found,
        vec![OpportunityAttack {
            attacker: goblin,
            target: fighter,
            trigger_position: Position::new(0, 1),
        }]
    );
}

#[test]
fn test_staying_in_reach_does_not_trigger() {
    let mut harness = TestHarness::default();
    harness.add_at(sample_goblin(), 1, 1);
    let fighter = harness.add_at(sample_fighter(), 1, 0);
    assert!(attacks(&harness, fighter, &[(1, 0), (1, 1)]).is_empty());
    assert!(attacks(&harness, fighter, &[(1, 0), (2, 0), (2, 1)]).is_empty());
}

#[test]
fn test_weaving_out_and_back_triggers_once() {
    let (harness, _, fighter) = standoff();
    let found = attacks(&harness, fighter, &[(0, 1), (0, 2), (1, 1), (1, 2), (1, 3)]);
    assert_eq!(found.len(), 1);
}

// =============================================================================
// Suppression
// =============================================================================

#[test]
fn test_disengaged_mover_never_provokes() {
    let (mut harness, _, fighter) = standoff();
    harness
        .state
        .character_mut(fighter)
        .unwrap()
        .apply_condition(ActiveCondition::new(Condition::Disengaged, "Disengage", 0));
    assert!(attacks(&harness, fighter, &[(0, 1), (0, 2)]).is_empty());
}

#[test]
fn test_spent_reaction_does_not_provoke() {
    let (mut harness, goblin, fighter) = standoff();
    harness.engine.use_reaction(&mut harness.state, goblin).unwrap();
    assert!(attacks(&harness, fighter, &[(0, 1), (0, 2)]).is_empty());
}

#[test]
fn test_allies_do_not_provoke() {
    let mut harness = TestHarness::default();
    harness.add_at(sample_fighter(), 0, 0);
    let ally = harness.add_at(sample_fighter(), 0, 1);
    assert!(attacks(&harness, ally, &[(0, 1), (0, 2)]).is_empty());
}

#[test]
fn test_incapacitated_attackers_do_not_provoke() {
    for condition in [Condition::Unconscious, Condition::Stunned, Condition::Paralyzed] {
        let (mut harness, goblin, fighter) = standoff();
        harness
            .state
            .character_mut(goblin)
            .unwrap()
            .apply_condition(ActiveCondition::new(condition.clone(), "test", 0));
        assert!(
            attacks(&harness, fighter, &[(0, 1), (0, 2)]).is_empty(),
            "{condition} attacker still reacted"
        );
    }
}

#[test]
fn test_no_line_of_sight_no_attack() {
    // Only reach weapons have a square between attacker and mover.
    let mut harness = TestHarness::default();
    harness.add_at(sample_pikeman(), 0, 0);
    let fighter = harness.add_at(sample_fighter(), 0, 2);
    let steps = path(&[(0, 2), (0, 3)]);

    let open = harness
        .engine
        .opportunity_attacks(&harness.state, fighter, &steps, Some(&GridMap::new()))
        .unwrap();
    assert_eq!(open.len(), 1);

    let wall = GridMap::new().with_blocked([Position::new(0, 1)]);
    let blocked = harness
        .engine
        .opportunity_attacks(&harness.state, fighter, &steps, Some(&wall))
        .unwrap();
    assert!(blocked.is_empty());
}

// =============================================================================
// Reach
// =============================================================================

#[test]
fn test_pike_threatens_two_squares() {
    let mut harness = TestHarness::default();
    let pikeman = harness.add_at(sample_pikeman(), 0, 0);
    let fighter = harness.add_at(sample_fighter(), 0, 1);

    assert!(attacks(&harness, fighter, &[(0, 1), (0, 2)]).is_empty());
    let found = attacks(&harness, fighter, &[(0, 1), (0, 2), (0, 3)]);
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].attacker, pikeman);
    assert_eq!(found[0].trigger_position, Position::new(0, 2));
}

#[test]
fn test_bow_is_not_reach() {
    let mut harness = TestHarness::default();
    harness.add_at(sample_archer(), 0, 0);
    let fighter = harness.add_at(sample_fighter(), 0, 2);
    assert!(attacks(&harness, fighter, &[(0, 2), (0, 3)]).is_empty());
}
