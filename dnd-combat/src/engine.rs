//! The spell engine: one call resolves one cast.
//!
//! [`SpellEngine`] owns the configuration, the planar table and the single
//! dice roller. Each call borrows the caller's [`CombatState`] exclusively
//! and runs to completion before returning. Problems with the request as a
//! whole (unknown caster, bad cast level, bad pool dice) come back as an
//! [`EngineError`] before anything changes; problems with one effect are
//! logged as [`LogKind::ResolutionError`] and the remaining effects still
//! run.

use crate::character::{
    ActiveCondition, CastId, CharacterId, Condition, DamageType, Position,
};
use crate::combat::{CombatState, LogEntry, LogKind};
use crate::commands::{apply_damage, execute_effect, validate_effect, CastContext, CommandOutcome};
use crate::concentration::{resolve_concentration_check, ConcentrationCheck};
use crate::config::EngineConfig;
use crate::dice::DiceRoller;
use crate::effects::{DelayedEffect, EffectTrigger, SpellEffect};
use crate::error::{EngineError, ResolutionError};
use crate::planes::{PlanarMechanic, PlanarTable, PlaneId};
use crate::reactions::{opportunity_attacks, LineOfSight, OpportunityAttack};
use crate::ritual::{
    self, BacklashEntry, BacklashKind, DisturbanceEvent, InterruptionCheck, RitualAdvance,
    RitualError, RitualId, RitualParticipant, RitualState,
};
use crate::spells::Spell;
use crate::targeting::{allocate, candidates_in_range, narrow};
use tracing::{debug, info, warn};

// ============================================================================
// Requests and Reports
// ============================================================================

/// One cast, as the turn loop asks for it.
#[derive(Clone)]
pub struct CastRequest<'a> {
    pub spell: &'a Spell,
    pub caster: CharacterId,
    /// Creatures the caster could affect, in preference order.
    pub candidates: Vec<CharacterId>,
    /// Slot level; `None` casts at the spell's own level.
    pub cast_level: Option<u8>,
    pub plane: PlaneId,
    pub destination: Option<Position>,
    pub map: Option<&'a dyn LineOfSight>,
}

impl<'a> CastRequest<'a> {
    pub fn new(spell: &'a Spell, caster: CharacterId) -> Self {
        Self {
            spell,
            caster,
            candidates: Vec::new(),
            cast_level: None,
            plane: PlaneId::material(),
            destination: None,
            map: None,
        }
    }

    pub fn with_candidates(mut self, candidates: impl IntoIterator<Item = CharacterId>) -> Self {
        self.candidates = candidates.into_iter().collect();
        self
    }

    pub fn at_level(mut self, level: u8) -> Self {
        self.cast_level = Some(level);
        self
    }

    pub fn on_plane(mut self, plane: PlaneId) -> Self {
        self.plane = plane;
        self
    }

    /// Point chosen for teleports and movement toward a point.
    pub fn toward(mut self, destination: Position) -> Self {
        self.destination = Some(destination);
        self
    }

    pub fn with_map(mut self, map: &'a dyn LineOfSight) -> Self {
        self.map = Some(map);
        self
    }
}

/// What a cast did, beyond the log entries it appended.
#[derive(Debug, Clone, Default)]
pub struct CastReport {
    pub cast: CastId,
    /// Targets after narrowing and allocation.
    pub targets: Vec<CharacterId>,
    pub pool: Option<i32>,
    pub remaining_pool: Option<i32>,
    /// Effects that were skipped, in order.
    pub errors: Vec<ResolutionError>,
    /// Reactions provoked by voluntary movement; the caller resolves them.
    pub opportunity_attacks: Vec<OpportunityAttack>,
    pub affected: Vec<CharacterId>,
    /// Effects queued for a later round.
    pub delayed: usize,
}

impl CastReport {
    fn absorb(&mut self, outcome: CommandOutcome) {
        self.opportunity_attacks.extend(outcome.opportunity_attacks);
        for id in outcome.affected {
            if !self.affected.contains(&id) {
                self.affected.push(id);
            }
        }
    }
}

/// The result of checking a ritual against a disturbance.
#[derive(Debug, Clone)]
pub struct RitualDisturbance {
    pub check: InterruptionCheck,
    /// Backlash applied to the caster when the ritual broke.
    pub backlash: Vec<BacklashEntry>,
}

// ============================================================================
// Engine
// ============================================================================

/// Resolves spells, reactions and rituals against a caller-owned combat
/// state.
#[derive(Debug, Clone)]
pub struct SpellEngine {
    config: EngineConfig,
    planes: PlanarTable,
    roller: DiceRoller,
}

impl SpellEngine {
    pub fn new(config: EngineConfig) -> Self {
        let planes = config.planar_table();
        let roller = config.roller();
        Self {
            config,
            planes,
            roller,
        }
    }

    /// Replace the dice roller, e.g. with a scripted one.
    pub fn with_roller(mut self, roller: DiceRoller) -> Self {
        self.roller = roller;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn planes(&self) -> &PlanarTable {
        &self.planes
    }

    pub fn roller(&self) -> &DiceRoller {
        &self.roller
    }

    pub fn roller_mut(&mut self) -> &mut DiceRoller {
        &mut self.roller
    }

    /// Everyone within the spell's range of the caster, nearest first.
    pub fn candidates_in_range(
        &self,
        spell: &Spell,
        caster: CharacterId,
        state: &CombatState,
    ) -> Result<Vec<CharacterId>, EngineError> {
        let caster = state
            .character(caster)
            .ok_or(EngineError::UnknownCharacter(caster))?;
        let range = spell.range.squares(self.config.grid_unit_feet);
        Ok(candidates_in_range(caster, &state.characters, range))
    }

    // ========================================================================
    // Casting
    // ========================================================================

    /// Resolve a cast: pick targets, apply the plane, then run every effect
    /// in declared order.
    pub fn cast(
        &mut self,
        request: CastRequest<'_>,
        state: &mut CombatState,
    ) -> Result<CastReport, EngineError> {
        let spell = request.spell;
        let caster = state
            .character(request.caster)
            .ok_or(EngineError::UnknownCharacter(request.caster))?;
        let cast_level = request.cast_level.unwrap_or(spell.level);
        if cast_level < spell.level {
            return Err(EngineError::CastLevelTooLow {
                spell: spell.name.clone(),
                requested: cast_level,
                minimum: spell.level,
            });
        }
        if let Some(unknown) = request.candidates.iter().find(|id| !state.contains(**id)) {
            return Err(EngineError::UnknownCharacter(*unknown));
        }

        let narrowed = narrow(spell.targeting.mode, request.caster, &request.candidates);
        let pool: Vec<_> = narrowed
            .iter()
            .filter_map(|id| state.character(*id))
            .collect();
        let levels_above_base = cast_level.saturating_sub(spell.level) as u32;
        let allocation = allocate(
            &pool,
            &spell.targeting.allocation,
            levels_above_base,
            &mut self.roller,
        )
        .map_err(EngineError::Targeting)?;

        let caster_name = caster.name.clone();
        info!(caster = %caster_name, spell = %spell.name, cast_level, "casting");
        state.log.push(
            LogEntry::new(
                LogKind::Cast,
                format!("{} casts {} at level {}", caster_name, spell.name, cast_level),
            )
            .with_value(cast_level as i32)
            .about(request.caster),
        );
        state.log.extend(allocation.log);

        let mechanic = self.planes.mechanic(&request.plane, spell.school).cloned();
        let planar_modifier = self.planes.spell_modifier(&request.plane, spell.school);
        self.log_plane(state, &request.plane, spell, mechanic.as_ref(), planar_modifier, request.caster);

        let ctx = CastContext {
            cast: CastId::new(),
            spell,
            caster: request.caster,
            targets: allocation.selected,
            cast_level,
            plane: request.plane,
            mechanic,
            planar_modifier,
            destination: request.destination,
            map: request.map,
        };

        let mut report = CastReport {
            cast: ctx.cast,
            targets: ctx.targets.clone(),
            pool: allocation.pool,
            remaining_pool: allocation.remaining_pool,
            ..CastReport::default()
        };
        for effect in &spell.effects {
            if let EffectTrigger::Delayed { rounds } = effect.trigger {
                match self.queue_delayed(&ctx, effect, rounds, state) {
                    Ok(()) => report.delayed += 1,
                    Err(err) => record_error(state, &ctx, effect, err, &mut report),
                }
                continue;
            }
            match execute_effect(effect, &ctx, state, &mut self.roller) {
                Ok(outcome) => report.absorb(outcome),
                Err(err) => record_error(state, &ctx, effect, err, &mut report),
            }
        }
        Ok(report)
    }

    fn log_plane(
        &self,
        state: &mut CombatState,
        plane: &PlaneId,
        spell: &Spell,
        mechanic: Option<&PlanarMechanic>,
        modifier: i32,
        caster: CharacterId,
    ) {
        if mechanic.is_none() && modifier == 0 {
            return;
        }
        let plane_name = self
            .planes
            .get(plane)
            .map(|p| p.name.clone())
            .unwrap_or_else(|| plane.to_string());
        let mut effects = Vec::new();
        if let Some(mechanic) = mechanic {
            effects.push(mechanic.name().to_string());
        }
        if modifier != 0 {
            effects.push(format!("{:+} to save DCs", modifier));
        }
        debug!(plane = %plane, school = spell.school.name(), modifier, "planar rules apply");
        state.log.push(
            LogEntry::new(
                LogKind::PlanarMechanic,
                format!(
                    "{} magic is altered on the {}: {}",
                    spell.school.name(),
                    plane_name,
                    effects.join(", ")
                ),
            )
            .with_value(modifier)
            .about(caster),
        );
    }

    fn queue_delayed(
        &self,
        ctx: &CastContext<'_>,
        effect: &SpellEffect,
        rounds: u32,
        state: &mut CombatState,
    ) -> Result<(), ResolutionError> {
        validate_effect(effect)?;
        let fires_on_round = state.round + rounds;
        state.delayed_effects.push(DelayedEffect {
            cast: ctx.cast,
            spell: ctx.spell.clone(),
            caster: ctx.caster,
            targets: ctx.targets.clone(),
            cast_level: ctx.cast_level,
            plane: ctx.plane.clone(),
            effect: effect.clone(),
            fires_on_round,
        });
        state.log.push(
            LogEntry::new(
                LogKind::EffectDelayed,
                format!(
                    "{} ({}) will take effect in {} round{}",
                    ctx.spell.name,
                    effect.kind.name(),
                    rounds,
                    if rounds == 1 { "" } else { "s" }
                ),
            )
            .with_value(rounds as i32)
            .about(ctx.caster),
        );
        Ok(())
    }

    /// Fire every delayed effect due by the current round, one report per
    /// effect. Targets that have left the combat are dropped.
    pub fn fire_due_effects(&mut self, state: &mut CombatState) -> Vec<CastReport> {
        let due = state.take_due_effects(state.round);
        let mut reports = Vec::with_capacity(due.len());
        for delayed in due {
            let targets: Vec<_> = delayed
                .targets
                .iter()
                .copied()
                .filter(|id| state.contains(*id))
                .collect();
            let ctx = CastContext {
                cast: delayed.cast,
                spell: &delayed.spell,
                caster: delayed.caster,
                targets,
                cast_level: delayed.cast_level,
                mechanic: self.planes.mechanic(&delayed.plane, delayed.spell.school).cloned(),
                planar_modifier: self.planes.spell_modifier(&delayed.plane, delayed.spell.school),
                plane: delayed.plane.clone(),
                destination: None,
                map: None,
            };
            debug!(spell = %delayed.spell.name, round = state.round, "delayed effect fires");

            let mut report = CastReport {
                cast: ctx.cast,
                targets: ctx.targets.clone(),
                ..CastReport::default()
            };
            match execute_effect(&delayed.effect, &ctx, state, &mut self.roller) {
                Ok(outcome) => report.absorb(outcome),
                Err(err) => record_error(state, &ctx, &delayed.effect, err, &mut report),
            }
            reports.push(report);
        }
        reports
    }

    // ========================================================================
    // Reactions and Damage
    // ========================================================================

    /// Attacks `mover` would provoke walking `path`. Nothing is consumed;
    /// the caller resolves each attack and spends the attacker's reaction.
    pub fn opportunity_attacks(
        &self,
        state: &CombatState,
        mover: CharacterId,
        path: &[Position],
        map: Option<&dyn LineOfSight>,
    ) -> Result<Vec<OpportunityAttack>, EngineError> {
        let mover = state
            .character(mover)
            .ok_or(EngineError::UnknownCharacter(mover))?;
        Ok(opportunity_attacks(mover, path, &state.characters, map))
    }

    /// Spend a combatant's reaction.
    pub fn use_reaction(&self, state: &mut CombatState, id: CharacterId) -> Result<(), EngineError> {
        let character = state
            .character_mut(id)
            .ok_or(EngineError::UnknownCharacter(id))?;
        character.action_economy.use_reaction()?;
        Ok(())
    }

    /// Deal damage from outside a spell, such as a resolved opportunity
    /// attack. Concentration checks follow as for spell damage.
    pub fn deal_damage(
        &mut self,
        state: &mut CombatState,
        target: CharacterId,
        amount: i32,
        damage_type: Option<DamageType>,
        source: &str,
    ) -> Result<i32, EngineError> {
        Ok(apply_damage(state, target, amount, damage_type, source, &mut self.roller)?)
    }

    /// Run the concentration check for damage the caller has already
    /// applied.
    pub fn check_concentration(
        &mut self,
        state: &mut CombatState,
        character: CharacterId,
        damage: i32,
    ) -> Result<Option<ConcentrationCheck>, EngineError> {
        Ok(resolve_concentration_check(state, character, damage, &mut self.roller)?)
    }

    // ========================================================================
    // Rituals
    // ========================================================================

    /// Begin a ritual and store it on the combat state.
    pub fn start_ritual(
        &mut self,
        state: &mut CombatState,
        spell: &Spell,
        caster: CharacterId,
        participants: Vec<RitualParticipant>,
        cast_level: Option<u8>,
        plane: &PlaneId,
    ) -> Result<RitualId, EngineError> {
        if !state.contains(caster) {
            return Err(EngineError::UnknownCharacter(caster));
        }
        if let Some(unknown) = participants.iter().find(|p| !state.contains(p.id)) {
            return Err(EngineError::UnknownCharacter(unknown.id));
        }
        let level = cast_level.unwrap_or(spell.level);
        let mut started = ritual::start_ritual(
            spell,
            caster,
            participants,
            level,
            &self.config.ritual,
            state.turn,
            &mut state.log,
        )?;
        started.planar_modifier = self.planes.spell_modifier(plane, spell.school);
        Ok(state.rituals.insert(started))
    }

    /// Add progress. A completed ritual leaves the active set.
    pub fn advance_ritual(
        &mut self,
        state: &mut CombatState,
        id: RitualId,
        minutes: u32,
    ) -> Result<RitualAdvance, EngineError> {
        let active = state
            .rituals
            .get_mut(id)
            .ok_or(RitualError::UnknownRitual(id))?;
        let advance = ritual::advance_ritual(active, minutes, &mut state.log);
        if advance == RitualAdvance::Completed {
            state.rituals.remove(id);
        }
        Ok(advance)
    }

    /// Check a disturbance. If the ritual breaks it is interrupted and its
    /// backlash lands on the caster.
    pub fn disturb_ritual(
        &mut self,
        state: &mut CombatState,
        id: RitualId,
        event: DisturbanceEvent,
    ) -> Result<RitualDisturbance, EngineError> {
        let active = state.rituals.get(id).ok_or(RitualError::UnknownRitual(id))?;
        let caster = state
            .characters
            .iter()
            .find(|c| c.id == active.caster)
            .ok_or(EngineError::UnknownCharacter(active.caster))?;
        let check = ritual::check_interruption(active, event, caster, &mut self.roller, &mut state.log)?;

        let backlash = if check.interrupted {
            self.interrupt_ritual(state, id)?
        } else {
            Vec::new()
        };
        Ok(RitualDisturbance { check, backlash })
    }

    /// Interrupt a ritual outright, applying its backlash.
    pub fn interrupt_ritual(
        &mut self,
        state: &mut CombatState,
        id: RitualId,
    ) -> Result<Vec<BacklashEntry>, EngineError> {
        let caster = state
            .rituals
            .get(id)
            .ok_or(RitualError::UnknownRitual(id))?
            .caster;
        if !state.contains(caster) {
            return Err(EngineError::UnknownCharacter(caster));
        }
        let mut active = state.rituals.remove(id).ok_or(RitualError::UnknownRitual(id))?;
        let backlash = ritual::interrupt_ritual(&mut active, &mut state.log);
        self.apply_backlash(state, &active, &backlash)?;
        Ok(backlash)
    }

    /// Abandon a ritual, returning its final state.
    pub fn abort_ritual(
        &mut self,
        state: &mut CombatState,
        id: RitualId,
    ) -> Result<RitualState, EngineError> {
        let mut active = state.rituals.remove(id).ok_or(RitualError::UnknownRitual(id))?;
        ritual::abort_ritual(&mut active, &mut state.log);
        Ok(active)
    }

    fn apply_backlash(
        &mut self,
        state: &mut CombatState,
        ritual: &RitualState,
        entries: &[BacklashEntry],
    ) -> Result<(), EngineError> {
        let source = format!("{} backlash", ritual.spell_name);
        for entry in entries {
            state.log.push(
                LogEntry::new(
                    LogKind::Backlash,
                    format!("The failed ritual of {} lashes back: {}", ritual.spell_name, entry.description),
                )
                .with_value(entry.magnitude)
                .about(ritual.caster),
            );
            let condition = match &entry.kind {
                BacklashKind::Damage => {
                    apply_damage(
                        state,
                        ritual.caster,
                        entry.magnitude,
                        entry.damage_type,
                        &source,
                        &mut self.roller,
                    )?;
                    continue;
                }
                BacklashKind::Condition(condition) => condition.clone(),
                BacklashKind::Exhaustion => Condition::Custom("Exhausted".to_string()),
            };

            let turn = state.turn;
            let character = state
                .character_mut(ritual.caster)
                .ok_or(EngineError::UnknownCharacter(ritual.caster))?;
            character.apply_condition(ActiveCondition::new(condition.clone(), source.as_str(), turn));
            let name = character.name.clone();
            state.log.push(
                LogEntry::new(LogKind::ConditionApplied, format!("{} is {} ({})", name, condition, source))
                    .about(ritual.caster),
            );
        }
        Ok(())
    }
}

impl Default for SpellEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

fn record_error(
    state: &mut CombatState,
    ctx: &CastContext<'_>,
    effect: &SpellEffect,
    err: ResolutionError,
    report: &mut CastReport,
) {
    warn!(spell = %ctx.spell.name, effect = effect.kind.name(), error = %err, "effect skipped");
    state.log.push(
        LogEntry::new(
            LogKind::ResolutionError,
            format!("{} ({}) could not be resolved: {}", ctx.spell.name, effect.kind.name(), err),
        )
        .about(ctx.caster),
    );
    report.errors.push(err);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::character::{CombatCharacter, Team};
    use crate::effects::{EffectKind, UtilityPayload};
    use crate::error::ValidationError;
    use crate::ritual::RitualConfig;
    use crate::spells::{get_spell, SpellSchool};
    use crate::testing::{sample_goblin, sample_wizard, TestHarness};

    #[test]
    fn test_bad_effect_does_not_abort_siblings() {
        let spell = Spell::new("Sparks", 0, SpellSchool::Evocation)
            .with_effect(SpellEffect::new(EffectKind::Utility(UtilityPayload { description: None })))
            .with_effect(SpellEffect::utility("Sparks dance in the air"));
        let mut harness = TestHarness::default();
        let wizard = harness.add(sample_wizard());

        let report = harness
            .engine
            .cast(CastRequest::new(&spell, wizard), &mut harness.state)
            .unwrap();
        assert_eq!(
            report.errors,
            vec![ResolutionError::Validation(ValidationError::missing("Utility", "description"))]
        );
        assert_eq!(harness.logged(LogKind::ResolutionError), 1);
        assert_eq!(harness.logged(LogKind::Utility), 1);
    }

    #[test]
    fn test_request_errors_change_nothing() {
        let spell = get_spell("fireball").unwrap();
        let mut harness = TestHarness::default();
        let wizard = harness.add(sample_wizard());

        let err = harness
            .engine
            .cast(CastRequest::new(spell, wizard).at_level(2), &mut harness.state)
            .unwrap_err();
        assert!(matches!(err, EngineError::CastLevelTooLow { minimum: 3, .. }));

        let ghost = CharacterId::new();
        let err = harness
            .engine
            .cast(CastRequest::new(spell, wizard).with_candidates([ghost]), &mut harness.state)
            .unwrap_err();
        assert_eq!(err, EngineError::UnknownCharacter(ghost));
        assert!(harness.state.log.is_empty());
    }

    #[test]
    fn test_delayed_effect_waits_for_its_round() {
        let spell = Spell::new("Delayed Blast", 3, SpellSchool::Evocation).with_effect(
            SpellEffect::damage("2d6", DamageType::Fire).with_trigger(EffectTrigger::Delayed { rounds: 2 }),
        );
        let mut harness = TestHarness::new([4, 4]);
        let wizard = harness.add(sample_wizard());
        let goblin = harness.add(sample_goblin().with_hit_points(20));
        harness.state.round = 1;

        let report = harness
            .engine
            .cast(CastRequest::new(&spell, wizard).with_candidates([goblin]), &mut harness.state)
            .unwrap();
        assert_eq!(report.delayed, 1);
        assert_eq!(harness.state.delayed_effects[0].fires_on_round, 3);
        assert_eq!(harness.hp(goblin).0, 20);

        harness.state.round = 2;
        assert!(harness.engine.fire_due_effects(&mut harness.state).is_empty());

        harness.state.round = 3;
        let fired = harness.engine.fire_due_effects(&mut harness.state);
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].cast, report.cast);
        assert_eq!(harness.hp(goblin).0, 12);
        assert!(harness.state.delayed_effects.is_empty());
    }

    #[test]
    fn test_plane_is_logged_once_per_cast() {
        let spell = get_spell("hold person").unwrap();
        let mut harness = TestHarness::new([20, 20]);
        let wizard = harness.add(sample_wizard());
        let goblin = harness.add(sample_goblin());

        // Feywild enchantment: DC 16 and the goblin rolls at disadvantage.
        let request = CastRequest::new(spell, wizard)
            .with_candidates([goblin])
            .on_plane(PlaneId::new("feywild"));
        harness.engine.cast(request, &mut harness.state).unwrap();

        let entry = harness.state.log.of_kind(LogKind::PlanarMechanic).next().unwrap();
        assert_eq!(entry.value, Some(1));
        let save = harness.state.log.of_kind(LogKind::SavingThrow).next().unwrap();
        assert!(save.message.contains("DC 16"));
        assert!(save.message.contains("(disadvantage)"));
    }

    #[test]
    fn test_ritual_lifecycle_through_engine() {
        let alarm = get_spell("alarm").unwrap();
        let mut harness = TestHarness::default();
        let wizard = harness.add(sample_wizard());

        let id = harness
            .engine
            .start_ritual(&mut harness.state, alarm, wizard, Vec::new(), None, &PlaneId::material())
            .unwrap();
        assert_eq!(harness.state.rituals.len(), 1);

        let advance = harness.engine.advance_ritual(&mut harness.state, id, 11).unwrap();
        assert_eq!(advance, RitualAdvance::Completed);
        assert!(harness.state.rituals.is_empty());
        assert!(matches!(
            harness.engine.advance_ritual(&mut harness.state, id, 1),
            Err(EngineError::Ritual(RitualError::UnknownRitual(_)))
        ));
    }

    #[test]
    fn test_planar_modifier_reaches_ritual() {
        let alarm = get_spell("alarm").unwrap();
        let mut harness = TestHarness::default();
        let wizard = harness.add(sample_wizard());
        let id = harness
            .engine
            .start_ritual(&mut harness.state, alarm, wizard, Vec::new(), None, &PlaneId::new("nine_hells"))
            .unwrap();
        assert_eq!(harness.state.rituals.get(id).unwrap().planar_modifier, -2);
    }

    #[test]
    fn test_broken_ritual_applies_backlash() {
        let config = EngineConfig::default().with_ritual(
            RitualConfig::default()
                .with_backlash(BacklashEntry::damage(4, DamageType::Psychic, 0.0))
                .with_backlash(BacklashEntry::condition(Condition::Stunned, 0.5)),
        );
        let alarm = get_spell("alarm").unwrap();
        let mut harness = TestHarness::with_config(config, []);
        let wizard = harness.add(sample_wizard());
        let id = harness
            .engine
            .start_ritual(&mut harness.state, alarm, wizard, Vec::new(), None, &PlaneId::material())
            .unwrap();

        let result = harness
            .engine
            .disturb_ritual(&mut harness.state, id, DisturbanceEvent::Moved)
            .unwrap();
        assert!(result.check.interrupted);
        assert_eq!(result.backlash.len(), 1);
        assert_eq!(harness.hp(wizard).0, 23);
        assert!(!harness.has_condition(wizard, &Condition::Stunned));
        assert_eq!(harness.logged(LogKind::Backlash), 1);
        assert!(harness.state.rituals.is_empty());
    }

    #[test]
    fn test_abort_returns_final_state() {
        let alarm = get_spell("alarm").unwrap();
        let mut harness = TestHarness::default();
        let wizard = harness.add(sample_wizard());
        let id = harness
            .engine
            .start_ritual(&mut harness.state, alarm, wizard, Vec::new(), None, &PlaneId::material())
            .unwrap();
        harness.engine.advance_ritual(&mut harness.state, id, 4).unwrap();

        let finished = harness.engine.abort_ritual(&mut harness.state, id).unwrap();
        assert_eq!(finished.phase, ritual::RitualPhase::Aborted);
        assert_eq!(finished.progress_minutes, 4);
        assert_eq!(harness.logged(LogKind::RitualAborted), 1);
    }

    #[test]
    fn test_reaction_is_spent_once() {
        let mut harness = TestHarness::default();
        let goblin = harness.add(sample_goblin());
        harness.engine.use_reaction(&mut harness.state, goblin).unwrap();
        assert!(matches!(
            harness.engine.use_reaction(&mut harness.state, goblin),
            Err(EngineError::Economy(_))
        ));
    }

    #[test]
    fn test_candidates_respect_range() {
        let spell = get_spell("hold person").unwrap();
        let mut harness = TestHarness::default();
        let wizard = harness.add(sample_wizard());
        let near = harness.add_at(sample_goblin(), 3, 0);
        harness.add_at(CombatCharacter::new("Far", Team::Hostile), 13, 0);

        let candidates = harness
            .engine
            .candidates_in_range(spell, wizard, &harness.state)
            .unwrap();
        assert_eq!(candidates, vec![near]);
    }
}
