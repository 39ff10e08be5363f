//! End-to-end casting scenarios against scripted dice.
//!
//! Run with: `cargo test -p dnd-combat --test spell_resolution`
//! Set `RUST_LOG=dnd_combat=debug` to see the engine's trace output.

use dnd_combat::testing::{
    assert_has_condition, assert_hp, assert_logged, assert_no_condition, sample_fighter,
    sample_goblin, sample_wizard, TestHarness,
};
use dnd_combat::{
    get_spell, CastRequest, Condition, DamageType, GridMap, LogKind, PlaneId, Position,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// =============================================================================
// Damage
// =============================================================================

#[test]
fn test_fireball_shares_one_roll_across_defenses() {
    init_tracing();
    // Two failed DEX saves, then 8d6 totalling 25.
    let mut harness = TestHarness::new([1, 1, 4, 3, 3, 3, 3, 3, 3, 3]);
    let wizard = harness.add(sample_wizard());
    let plain = harness.add_at(sample_goblin().with_hit_points(40), 6, 0);
    let mut warded = sample_goblin().with_hit_points(40);
    warded.resistances.insert(DamageType::Fire);
    warded.vulnerabilities.insert(DamageType::Fire);
    let warded = harness.add_at(warded, 6, 1);

    let report = harness.cast("fireball", wizard, &[plain, warded]).unwrap();

    assert!(report.errors.is_empty());
    assert_eq!(report.targets, vec![plain, warded]);
    assert_hp(&harness, plain, 15);
    // Halved then doubled: 25 becomes 24.
    assert_hp(&harness, warded, 16);
    assert_logged(&harness, LogKind::DamageRoll, 1);
    assert_logged(&harness, LogKind::SavingThrow, 2);
    assert_eq!(harness.dice_left(), 0);
}

#[test]
fn test_planar_reroll_keeps_higher_damage() {
    // Elemental Plane of Fire: evocation rerolls. Hit on 12, then 3 and 9.
    let spell = get_spell("fire bolt").unwrap();
    let mut harness = TestHarness::new([12, 3, 9]);
    let wizard = harness.add(sample_wizard());
    let goblin = harness.add_at(sample_goblin().with_hit_points(30), 4, 0);

    let request = CastRequest::new(spell, wizard)
        .with_candidates([goblin])
        .on_plane(PlaneId::new("elemental_fire"));
    harness.engine.cast(request, &mut harness.state).unwrap();

    assert_hp(&harness, goblin, 21);
    let reroll = harness.state.log.of_kind(LogKind::PlanarReroll).next().unwrap();
    assert_eq!(reroll.value, Some(6));
}

#[test]
fn test_knockout_ends_target_concentration() {
    // Fighter fails WIS on 2, then a fire bolt hits on 15 for 8.
    let mut harness = TestHarness::new([2, 15, 8]);
    let wizard = harness.add(sample_wizard());
    let fighter = harness.add_at(sample_fighter(), 1, 0);
    let shaman = harness.add_at(sample_goblin(), 3, 0);

    harness.cast("hold person", shaman, &[fighter]).unwrap();
    assert_has_condition(&harness, fighter, &Condition::Paralyzed);

    harness.cast("fire bolt", wizard, &[shaman]).unwrap();

    assert_hp(&harness, shaman, 0);
    assert_has_condition(&harness, shaman, &Condition::Unconscious);
    assert_no_condition(&harness, fighter, &Condition::Paralyzed);
    assert_logged(&harness, LogKind::ConcentrationEnded, 1);
}

// =============================================================================
// Targeting
// =============================================================================

#[test]
fn test_sleep_takes_the_cheapest_prefix() {
    // 5d8 pool of 20.
    let mut harness = TestHarness::new([4, 4, 4, 4, 4]);
    let wizard = harness.add(sample_wizard());
    let big = harness.add_at(sample_goblin().with_hit_points(12), 5, 0);
    let small = harness.add_at(sample_goblin().with_hit_points(3), 5, 1);
    let mid = harness.add_at(sample_goblin().with_hit_points(9), 5, 2);
    let tiny = harness.add_at(sample_goblin().with_hit_points(5), 5, 3);

    let report = harness.cast("sleep", wizard, &[big, small, mid, tiny]).unwrap();

    assert_eq!(report.targets, vec![small, tiny, mid]);
    assert_eq!(report.pool, Some(20));
    assert_eq!(report.remaining_pool, Some(3));
    for id in [small, tiny, mid] {
        assert_has_condition(&harness, id, &Condition::Unconscious);
    }
    assert_no_condition(&harness, big, &Condition::Unconscious);
    assert_logged(&harness, LogKind::PoolRoll, 1);
}

#[test]
fn test_upcast_sleep_grows_the_pool() {
    // Level 3: 5d8 + 2x2d8 = 9d8, all ones.
    let spell = get_spell("sleep").unwrap();
    let mut harness = TestHarness::new([1; 9]);
    let wizard = harness.add(sample_wizard());
    let goblin = harness.add_at(sample_goblin().with_hit_points(9), 5, 0);

    let request = CastRequest::new(spell, wizard).with_candidates([goblin]).at_level(3);
    let report = harness.engine.cast(request, &mut harness.state).unwrap();
    assert_eq!(report.pool, Some(9));
    assert_eq!(report.targets, vec![goblin]);
    assert_eq!(harness.dice_left(), 0);
}

// =============================================================================
// Concentration
// =============================================================================

#[test]
fn test_new_concentration_ends_the_old_one_first() {
    // Hold Person: failed WIS save on 2.
    let mut harness = TestHarness::new([2]);
    let wizard = harness.add(sample_wizard());
    let goblin = harness.add_at(sample_goblin(), 3, 0);

    harness.cast("hold person", wizard, &[goblin]).unwrap();
    assert_has_condition(&harness, goblin, &Condition::Paralyzed);

    harness.cast("hex", wizard, &[goblin]).unwrap();

    let kinds: Vec<_> = harness
        .state
        .log
        .entries()
        .iter()
        .map(|e| e.kind)
        .filter(|k| matches!(k, LogKind::ConcentrationStarted | LogKind::ConcentrationEnded))
        .collect();
    assert_eq!(
        kinds,
        vec![
            LogKind::ConcentrationStarted,
            LogKind::ConcentrationEnded,
            LogKind::ConcentrationStarted
        ]
    );
    assert_no_condition(&harness, goblin, &Condition::Paralyzed);
    assert_has_condition(&harness, goblin, &Condition::Custom("Hexed".to_string()));
    assert_eq!(harness.state.triggers_for(goblin).count(), 1);
}

#[test]
fn test_double_duration_on_the_astral_plane() {
    let spell = get_spell("hold person").unwrap();
    let mut harness = TestHarness::new([2]);
    let wizard = harness.add(sample_wizard());
    let goblin = harness.add_at(sample_goblin(), 3, 0);

    let request = CastRequest::new(spell, wizard)
        .with_candidates([goblin])
        .on_plane(PlaneId::new("astral"));
    harness.engine.cast(request, &mut harness.state).unwrap();

    let link = harness
        .state
        .character(wizard)
        .and_then(|w| w.concentrating_on.clone())
        .unwrap();
    assert_eq!(link.duration, dnd_combat::ConditionDuration::Minutes(2));
}

// =============================================================================
// Movement
// =============================================================================

#[test]
fn test_thunderwave_pushes_without_provoking() {
    // CON save 5 fails, 2d8 = 8, second CON save 5 fails.
    let mut harness = TestHarness::new([5, 4, 4, 5]);
    let wizard = harness.add(sample_wizard());
    let goblin = harness.add_at(sample_goblin().with_hit_points(30), 1, 0);
    harness.add_at(sample_fighter(), 2, 1);

    let report = harness.cast("thunderwave", wizard, &[goblin]).unwrap();

    assert_hp(&harness, goblin, 22);
    assert_eq!(harness.position(goblin), Position::new(3, 0));
    assert!(report.opportunity_attacks.is_empty());
    assert_logged(&harness, LogKind::OpportunityAttack, 0);
}

#[test]
fn test_commanded_flight_hands_reactions_to_the_caller() {
    // WIS save 2 fails; the goblin flees and provokes the wizard.
    let mut harness = TestHarness::new([2]);
    let wizard = harness.add(sample_wizard());
    let goblin = harness.add_at(sample_goblin(), 1, 0);

    let report = harness.cast("command", wizard, &[goblin]).unwrap();
    assert_eq!(report.opportunity_attacks.len(), 1);
    let attack = report.opportunity_attacks[0];
    assert_eq!(attack.attacker, wizard);
    assert_eq!(attack.target, goblin);

    // The turn loop resolves it.
    harness.engine.use_reaction(&mut harness.state, attack.attacker).unwrap();
    harness
        .engine
        .deal_damage(&mut harness.state, goblin, 3, Some(DamageType::Bludgeoning), "Quarterstaff")
        .unwrap();
    assert_hp(&harness, goblin, 4);
    assert!(harness.engine.use_reaction(&mut harness.state, wizard).is_err());
}

#[test]
fn test_misty_step_respects_walls() {
    let spell = get_spell("misty step").unwrap();
    let wall = GridMap::new().with_blocked([Position::new(2, 2)]);
    let mut harness = TestHarness::default();
    let wizard = harness.add(sample_wizard());

    let blocked = CastRequest::new(spell, wizard).toward(Position::new(2, 2)).with_map(&wall);
    let report = harness.engine.cast(blocked, &mut harness.state).unwrap();
    assert_eq!(harness.position(wizard), Position::new(0, 0));
    assert!(report.affected.is_empty());

    let open = CastRequest::new(spell, wizard).toward(Position::new(3, 2)).with_map(&wall);
    let report = harness.engine.cast(open, &mut harness.state).unwrap();
    assert_eq!(harness.position(wizard), Position::new(3, 2));
    assert_eq!(report.affected, vec![wizard]);
}

#[test]
fn test_missing_destination_is_logged_not_fatal() {
    let mut harness = TestHarness::default();
    let wizard = harness.add(sample_wizard());

    let report = harness.cast("misty step", wizard, &[]).unwrap();
    assert_eq!(report.errors.len(), 1);
    assert_logged(&harness, LogKind::ResolutionError, 1);
    assert_eq!(harness.position(wizard), Position::new(0, 0));
}

// =============================================================================
// Summoning and utility
// =============================================================================

#[test]
fn test_find_familiar_joins_the_party() {
    let mut harness = TestHarness::default();
    let wizard = harness.add_at(sample_wizard(), 4, 4);

    let report = harness.cast("find familiar", wizard, &[]).unwrap();
    assert_eq!(report.affected.len(), 1);
    let owl = harness.state.character(report.affected[0]).unwrap();
    assert_eq!(owl.summoned_by, Some(wizard));
    assert_eq!(owl.position.chebyshev_distance(Position::new(4, 4)), 1);
    assert_eq!(harness.state.characters.len(), 2);
}

#[test]
fn test_alarm_cast_directly_is_narrative() {
    let mut harness = TestHarness::default();
    let wizard = harness.add(sample_wizard());
    harness.cast("alarm", wizard, &[]).unwrap();
    assert_logged(&harness, LogKind::Utility, 1);
    assert_eq!(harness.state.log.len(), 2);
}
