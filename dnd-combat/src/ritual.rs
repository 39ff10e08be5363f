//! Long-duration ritual casting.
//!
//! A ritual moves `Casting -> {Complete, Interrupted, Aborted}`. Every
//! terminal phase is final: advancing, interrupting or aborting a finished
//! ritual changes nothing. All bookkeeping lives on the [`RitualState`]
//! record the caller passes in.

use crate::character::{Ability, CharacterId, CombatCharacter, Condition, DamageType};
use crate::combat::{CombatLog, LogEntry, LogKind};
use crate::dice::{Advantage, DiceError, DiceRoller};
use crate::saves::{roll_saving_throw, SaveModifier, SavingThrowResult};
use crate::spells::{Spell, SpellId, SpellSchool};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RitualError {
    #[error("{0} cannot be cast as a ritual")]
    NotARitual(String),
    #[error("cast level {requested} is below {spell}'s level {minimum}")]
    CastLevelTooLow {
        spell: String,
        requested: u8,
        minimum: u8,
    },
    #[error("no active ritual with id {0}")]
    UnknownRitual(RitualId),
}

/// Identifier for an active ritual.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RitualId(pub Uuid);

impl RitualId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RitualId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RitualId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RitualPhase {
    Casting,
    Complete,
    Interrupted,
    Aborted,
}

impl RitualPhase {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RitualPhase::Casting)
    }
}

// ============================================================================
// Backlash
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BacklashKind {
    Damage,
    Condition(Condition),
    Exhaustion,
}

/// A penalty applied when a ritual fails, gated by progress made.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacklashEntry {
    pub kind: BacklashKind,
    pub magnitude: i32,
    pub damage_type: Option<DamageType>,
    /// Fraction of the ritual (0.0 to 1.0) that must be done for this entry
    /// to apply.
    pub min_progress: f32,
    pub description: String,
}

impl BacklashEntry {
    pub fn damage(magnitude: i32, damage_type: DamageType, min_progress: f32) -> Self {
        Self {
            kind: BacklashKind::Damage,
            magnitude,
            damage_type: Some(damage_type),
            min_progress,
            description: format!("{} {} damage", magnitude, damage_type.name()),
        }
    }

    pub fn condition(condition: Condition, min_progress: f32) -> Self {
        Self {
            description: format!("becomes {}", condition.name().to_lowercase()),
            kind: BacklashKind::Condition(condition),
            magnitude: 0,
            damage_type: None,
            min_progress,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

// ============================================================================
// Configuration
// ============================================================================

/// Ritual rules and per-ritual extras.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RitualConfig {
    /// Minutes added to the casting time of a ritual-tagged spell.
    pub surcharge_minutes: u32,
    /// Progress fraction at which material components are consumed.
    pub material_threshold: Option<f32>,
    /// Floor for damage-driven interruption DCs.
    pub minimum_interruption_dc: i32,
    pub backlash: Vec<BacklashEntry>,
}

impl Default for RitualConfig {
    fn default() -> Self {
        Self {
            surcharge_minutes: 10,
            material_threshold: None,
            minimum_interruption_dc: 10,
            backlash: Vec::new(),
        }
    }
}

impl RitualConfig {
    pub fn with_material_threshold(mut self, fraction: f32) -> Self {
        self.material_threshold = Some(fraction);
        self
    }

    pub fn with_backlash(mut self, entry: BacklashEntry) -> Self {
        self.backlash.push(entry);
        self
    }
}

// ============================================================================
// State
// ============================================================================

/// A helper lending their focus to a ritual.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RitualParticipant {
    pub id: CharacterId,
    /// Added to the caster's saves against disturbances.
    pub bonus: i32,
}

/// A ritual in progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RitualState {
    pub id: RitualId,
    pub spell: SpellId,
    pub spell_name: String,
    pub school: SpellSchool,
    pub caster: CharacterId,
    pub cast_level: u8,
    /// In-game minute the ritual started.
    pub started_at: u32,
    pub total_minutes: u32,
    pub progress_minutes: u32,
    pub phase: RitualPhase,
    pub is_complete: bool,
    pub interrupted: bool,
    pub materials_consumed: bool,
    pub material_threshold: Option<f32>,
    pub minimum_interruption_dc: i32,
    pub backlash: Vec<BacklashEntry>,
    pub participants: Vec<RitualParticipant>,
    pub planar_modifier: i32,
}

impl RitualState {
    /// Fraction of the ritual done, 0.0 to 1.0.
    pub fn progress_fraction(&self) -> f32 {
        if self.total_minutes == 0 {
            return 1.0;
        }
        (self.progress_minutes as f32 / self.total_minutes as f32).min(1.0)
    }

    pub fn remaining_minutes(&self) -> u32 {
        self.total_minutes.saturating_sub(self.progress_minutes)
    }

    /// Bonus to the caster's saves against disturbances.
    pub fn concentration_bonus(&self) -> i32 {
        self.participants.iter().map(|p| p.bonus).sum::<i32>() + self.planar_modifier
    }
}

/// Create a ritual for `spell`.
///
/// Total duration is the casting time plus the ritual surcharge when the
/// spell carries the ritual tag. A spell with neither the tag nor a casting
/// time measured in minutes cannot be cast this way.
pub fn start_ritual(
    spell: &Spell,
    caster: CharacterId,
    participants: Vec<RitualParticipant>,
    cast_level: u8,
    config: &RitualConfig,
    started_at: u32,
    log: &mut CombatLog,
) -> Result<RitualState, RitualError> {
    let casting_minutes = spell.casting_time.minutes();
    if !spell.ritual && casting_minutes == 0 {
        return Err(RitualError::NotARitual(spell.name.clone()));
    }
    if cast_level < spell.level {
        return Err(RitualError::CastLevelTooLow {
            spell: spell.name.clone(),
            requested: cast_level,
            minimum: spell.level,
        });
    }

    let surcharge = if spell.ritual { config.surcharge_minutes } else { 0 };
    let total_minutes = casting_minutes + surcharge;
    let state = RitualState {
        id: RitualId::new(),
        spell: spell.id.clone(),
        spell_name: spell.name.clone(),
        school: spell.school,
        caster,
        cast_level,
        started_at,
        total_minutes,
        progress_minutes: 0,
        phase: RitualPhase::Casting,
        is_complete: false,
        interrupted: false,
        materials_consumed: false,
        material_threshold: config.material_threshold,
        minimum_interruption_dc: config.minimum_interruption_dc,
        backlash: config.backlash.clone(),
        participants,
        planar_modifier: 0,
    };

    info!(ritual = %state.id, spell = %spell.name, total_minutes, "ritual started");
    log.push(
        LogEntry::new(
            LogKind::RitualStarted,
            format!(
                "Ritual of {} begins ({} minutes, {} participant{})",
                spell.name,
                total_minutes,
                state.participants.len(),
                if state.participants.len() == 1 { "" } else { "s" }
            ),
        )
        .with_value(total_minutes as i32)
        .about(caster),
    );
    Ok(state)
}

/// What an advance did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RitualAdvance {
    Progressed,
    Completed,
    /// The ritual was already in a terminal phase.
    Unchanged,
}

/// Add `minutes` of progress.
///
/// Completion and material consumption each happen once; advancing a
/// terminal ritual is a no-op that only leaves a debug trace.
pub fn advance_ritual(state: &mut RitualState, minutes: u32, log: &mut CombatLog) -> RitualAdvance {
    if state.phase.is_terminal() {
        debug!(ritual = %state.id, phase = ?state.phase, "advance ignored for finished ritual");
        return RitualAdvance::Unchanged;
    }

    state.progress_minutes = state
        .progress_minutes
        .saturating_add(minutes)
        .min(state.total_minutes);
    log.push(
        LogEntry::new(
            LogKind::RitualProgress,
            format!(
                "{} ritual: {}/{} minutes",
                state.spell_name, state.progress_minutes, state.total_minutes
            ),
        )
        .with_value(state.progress_minutes as i32)
        .about(state.caster),
    );

    if let Some(threshold) = state.material_threshold {
        if !state.materials_consumed && state.progress_fraction() >= threshold {
            state.materials_consumed = true;
            log.push(
                LogEntry::new(
                    LogKind::MaterialsConsumed,
                    format!("The material components of {} are consumed", state.spell_name),
                )
                .about(state.caster),
            );
        }
    }

    if state.progress_minutes >= state.total_minutes {
        state.is_complete = true;
        state.phase = RitualPhase::Complete;
        info!(ritual = %state.id, spell = %state.spell_name, "ritual complete");
        log.push(
            LogEntry::new(
                LogKind::RitualComplete,
                format!("The ritual of {} is complete", state.spell_name),
            )
            .about(state.caster),
        );
        return RitualAdvance::Completed;
    }
    RitualAdvance::Progressed
}

// ============================================================================
// Disturbances
// ============================================================================

/// Something that may break a ritual.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DisturbanceEvent {
    /// The caster took this much damage.
    Damage(i32),
    /// A distraction with this DC.
    Noise(i32),
    CasterIncapacitated,
    /// The caster left the ritual site.
    Moved,
}

impl DisturbanceEvent {
    pub fn description(&self) -> String {
        match self {
            DisturbanceEvent::Damage(n) => format!("{n} damage"),
            DisturbanceEvent::Noise(n) => format!("a DC {n} distraction"),
            DisturbanceEvent::CasterIncapacitated => "the caster being incapacitated".to_string(),
            DisturbanceEvent::Moved => "the caster moving".to_string(),
        }
    }
}

/// Outcome of checking a disturbance.
#[derive(Debug, Clone)]
pub struct InterruptionCheck {
    pub interrupted: bool,
    /// The Constitution save, when one was rolled.
    pub save: Option<SavingThrowResult>,
}

/// Decide whether `event` breaks the ritual.
///
/// Incapacitation and movement always do. Damage and noise call for a
/// Constitution save helped by the participants and the plane; damage
/// uses the concentration DC, noise its own value. The caller marks the
/// state interrupted.
pub fn check_interruption(
    state: &RitualState,
    event: DisturbanceEvent,
    caster: &CombatCharacter,
    roller: &mut DiceRoller,
    log: &mut CombatLog,
) -> Result<InterruptionCheck, DiceError> {
    if state.phase.is_terminal() {
        return Ok(InterruptionCheck {
            interrupted: false,
            save: None,
        });
    }

    let dc = match event {
        DisturbanceEvent::CasterIncapacitated | DisturbanceEvent::Moved => {
            log.push(
                LogEntry::new(
                    LogKind::RitualDisturbed,
                    format!("The ritual of {} is broken by {}", state.spell_name, event.description()),
                )
                .about(state.caster),
            );
            return Ok(InterruptionCheck {
                interrupted: true,
                save: None,
            });
        }
        DisturbanceEvent::Damage(amount) => (amount / 2).max(state.minimum_interruption_dc),
        DisturbanceEvent::Noise(dc) => dc,
    };

    let mut modifiers = Vec::new();
    let bonus = state.concentration_bonus();
    if bonus != 0 {
        modifiers.push(SaveModifier::flat("ritual focus", bonus));
    }
    let save = roll_saving_throw(
        caster,
        Ability::Constitution,
        dc,
        &modifiers,
        Advantage::Normal,
        roller,
    )?;
    debug!(ritual = %state.id, dc, total = save.total, "ritual disturbance save");

    log.push(
        LogEntry::new(
            LogKind::RitualDisturbed,
            format!(
                "{} holds the ritual of {} against {}: {} vs DC {} ({})",
                caster.name,
                state.spell_name,
                event.description(),
                save.total,
                dc,
                if save.success { "holds" } else { "falters" }
            ),
        )
        .with_value(save.total)
        .about(state.caster),
    );

    Ok(InterruptionCheck {
        interrupted: !save.success,
        save: Some(save),
    })
}

/// Every backlash entry unlocked by the progress made so far.
pub fn get_backlash_on_failure(state: &RitualState) -> Vec<BacklashEntry> {
    let fraction = state.progress_fraction();
    state
        .backlash
        .iter()
        .filter(|entry| entry.min_progress <= fraction)
        .cloned()
        .collect()
}

/// Mark the ritual interrupted and return the backlash it unleashes.
pub fn interrupt_ritual(state: &mut RitualState, log: &mut CombatLog) -> Vec<BacklashEntry> {
    if state.phase.is_terminal() {
        debug!(ritual = %state.id, phase = ?state.phase, "interrupt ignored for finished ritual");
        return Vec::new();
    }
    state.phase = RitualPhase::Interrupted;
    state.interrupted = true;
    let backlash = get_backlash_on_failure(state);
    info!(ritual = %state.id, backlash = backlash.len(), "ritual interrupted");
    log.push(
        LogEntry::new(
            LogKind::RitualInterrupted,
            format!(
                "The ritual of {} is interrupted at {}/{} minutes",
                state.spell_name, state.progress_minutes, state.total_minutes
            ),
        )
        .with_value(state.progress_minutes as i32)
        .about(state.caster),
    );
    backlash
}

/// Abandon the ritual, recording the progress lost.
pub fn abort_ritual(state: &mut RitualState, log: &mut CombatLog) {
    if state.phase.is_terminal() {
        debug!(ritual = %state.id, phase = ?state.phase, "abort ignored for finished ritual");
        return;
    }
    state.phase = RitualPhase::Aborted;
    info!(ritual = %state.id, lost = state.progress_minutes, "ritual aborted");
    log.push(
        LogEntry::new(
            LogKind::RitualAborted,
            format!(
                "The ritual of {} is abandoned; {} minutes of progress are lost",
                state.spell_name, state.progress_minutes
            ),
        )
        .with_value(state.progress_minutes as i32)
        .about(state.caster),
    );
}

// ============================================================================
// Storage
// ============================================================================

/// Rituals in progress, keyed by id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActiveRituals {
    rituals: HashMap<RitualId, RitualState>,
}

impl ActiveRituals {
    pub fn insert(&mut self, state: RitualState) -> RitualId {
        let id = state.id;
        self.rituals.insert(id, state);
        id
    }

    pub fn get(&self, id: RitualId) -> Option<&RitualState> {
        self.rituals.get(&id)
    }

    pub fn get_mut(&mut self, id: RitualId) -> Option<&mut RitualState> {
        self.rituals.get_mut(&id)
    }

    pub fn remove(&mut self, id: RitualId) -> Option<RitualState> {
        self.rituals.remove(&id)
    }

    /// Rituals led by a caster.
    pub fn by_caster(&self, caster: CharacterId) -> impl Iterator<Item = &RitualState> {
        self.rituals.values().filter(move |r| r.caster == caster)
    }

    pub fn len(&self) -> usize {
        self.rituals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rituals.is_empty()
    }
}
