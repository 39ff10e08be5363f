//! The combat-state container and its structured log.
//!
//! The turn loop owns a [`CombatState`] and lends it to the engine for the
//! length of one resolution call. Every mutation the engine makes is paired
//! with a [`LogEntry`]; the turn loop turns those into presentation text.

use crate::character::{CharacterId, CombatCharacter, Position};
use crate::effects::{DelayedEffect, LatentTrigger};
use crate::ritual::ActiveRituals;
use serde::{Deserialize, Serialize};

// ============================================================================
// Combat Log
// ============================================================================

/// Tag for a combat-log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LogKind {
    Cast,
    Targeting,
    PoolRoll,
    AttackRoll,
    SavingThrow,
    DamageRoll,
    PlanarReroll,
    PlanarMechanic,
    Damage,
    ConditionApplied,
    ConditionRefreshed,
    ConditionRemoved,
    Movement,
    OpportunityAttack,
    Summon,
    ConcentrationStarted,
    ConcentrationEnded,
    ConcentrationCheck,
    TriggerRegistered,
    EffectDelayed,
    Utility,
    RitualStarted,
    RitualProgress,
    RitualComplete,
    MaterialsConsumed,
    RitualDisturbed,
    RitualInterrupted,
    RitualAborted,
    Backlash,
    ResolutionError,
}

/// One structured entry in the combat log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub kind: LogKind,
    pub message: String,
    /// Numeric payload such as final damage or a rolled pool.
    pub value: Option<i32>,
    /// The character the entry is about, when there is one.
    pub subject: Option<CharacterId>,
}

impl LogEntry {
    pub fn new(kind: LogKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            value: None,
            subject: None,
        }
    }

    pub fn with_value(mut self, value: i32) -> Self {
        self.value = Some(value);
        self
    }

    pub fn about(mut self, subject: CharacterId) -> Self {
        self.subject = Some(subject);
        self
    }
}

/// Append-only log of everything a resolution did.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CombatLog {
    entries: Vec<LogEntry>,
}

impl CombatLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: LogEntry) {
        tracing::trace!(kind = ?entry.kind, value = ?entry.value, "{}", entry.message);
        self.entries.push(entry);
    }

    pub fn extend(&mut self, entries: impl IntoIterator<Item = LogEntry>) {
        for entry in entries {
            self.push(entry);
        }
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries of one kind, oldest first.
    pub fn of_kind(&self, kind: LogKind) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter().filter(move |e| e.kind == kind)
    }

    pub fn count(&self, kind: LogKind) -> usize {
        self.of_kind(kind).count()
    }

    pub fn last(&self) -> Option<&LogEntry> {
        self.entries.last()
    }
}

// ============================================================================
// Combat State
// ============================================================================

/// Everything the engine reads and writes during a resolution.
#[derive(Debug, Clone, Default)]
pub struct CombatState {
    pub characters: Vec<CombatCharacter>,
    pub log: CombatLog,
    pub round: u32,
    /// Global turn counter, stamped on applied conditions.
    pub turn: u32,
    pub rituals: ActiveRituals,
    pub latent_triggers: Vec<LatentTrigger>,
    pub delayed_effects: Vec<DelayedEffect>,
}

impl CombatState {
    pub fn new() -> Self {
        Self {
            round: 1,
            ..Self::default()
        }
    }

    pub fn with_character(mut self, character: CombatCharacter) -> Self {
        self.characters.push(character);
        self
    }

    /// Add a combatant and return its id.
    pub fn add_character(&mut self, character: CombatCharacter) -> CharacterId {
        let id = character.id;
        self.characters.push(character);
        id
    }

    pub fn character(&self, id: CharacterId) -> Option<&CombatCharacter> {
        self.characters.iter().find(|c| c.id == id)
    }

    pub fn character_mut(&mut self, id: CharacterId) -> Option<&mut CombatCharacter> {
        self.characters.iter_mut().find(|c| c.id == id)
    }

    pub fn contains(&self, id: CharacterId) -> bool {
        self.characters.iter().any(|c| c.id == id)
    }

    /// Whether a living combatant other than `except` stands on `position`.
    pub fn is_occupied(&self, position: Position, except: Option<CharacterId>) -> bool {
        self.characters
            .iter()
            .any(|c| Some(c.id) != except && c.position == position && !c.hit_points.is_down())
    }

    /// Move the counters forward one turn, starting a new round when
    /// `new_round` is set, and reset the action economy of `whose_turn`.
    pub fn advance_turn(&mut self, whose_turn: CharacterId, new_round: bool) {
        self.turn += 1;
        if new_round {
            self.round += 1;
        }
        if let Some(character) = self.character_mut(whose_turn) {
            character.action_economy.reset_for_turn();
        }
    }

    /// Remove and return every delayed effect due on or before `round`.
    pub fn take_due_effects(&mut self, round: u32) -> Vec<DelayedEffect> {
        let (due, pending): (Vec<_>, Vec<_>) = std::mem::take(&mut self.delayed_effects)
            .into_iter()
            .partition(|d| d.fires_on_round <= round);
        self.delayed_effects = pending;
        due
    }

    /// Latent triggers watching a given creature.
    pub fn triggers_for(&self, owner: CharacterId) -> impl Iterator<Item = &LatentTrigger> {
        self.latent_triggers.iter().filter(move |t| t.owner == owner)
    }
}
