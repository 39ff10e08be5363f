//! Resolution error taxonomy.

use crate::character::{CharacterId, EconomyError, Position};
use crate::dice::DiceError;
use crate::ritual::RitualError;
use std::fmt;
use thiserror::Error;

/// What is wrong with a payload field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationKind {
    Missing,
    NestedTrigger,
    OutOfRange,
}

impl fmt::Display for ValidationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationKind::Missing => write!(f, "missing required field"),
            ValidationKind::NestedTrigger => write!(f, "reactive trigger nested in field"),
            ValidationKind::OutOfRange => write!(f, "out-of-range value in field"),
        }
    }
}

/// A malformed effect template.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{effect} effect has {kind} '{field}'")]
pub struct ValidationError {
    pub effect: &'static str,
    pub field: &'static str,
    pub kind: ValidationKind,
}

impl ValidationError {
    pub fn missing(effect: &'static str, field: &'static str) -> Self {
        Self {
            effect,
            field,
            kind: ValidationKind::Missing,
        }
    }

    pub fn nested_trigger(effect: &'static str, field: &'static str) -> Self {
        Self {
            effect,
            field,
            kind: ValidationKind::NestedTrigger,
        }
    }

    pub fn out_of_range(effect: &'static str, field: &'static str) -> Self {
        Self {
            effect,
            field,
            kind: ValidationKind::OutOfRange,
        }
    }
}

/// Why a single effect could not be resolved.
///
/// These are recovered by the engine: the effect is skipped, the error is
/// logged, and sibling effects still run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Dice error: {0}")]
    Dice(#[from] DiceError),

    #[error("Unknown character: {0}")]
    UnknownCharacter(CharacterId),

    #[error("No free space near {0}")]
    NoFreeSpace(Position),

    #[error("A destination is required for this movement")]
    MissingDestination,

    #[error(transparent)]
    Economy(#[from] EconomyError),
}

/// Errors that stop a whole engine call before anything changes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("Unknown character: {0}")]
    UnknownCharacter(CharacterId),

    #[error("Cannot cast {spell} at level {requested}; it is a level {minimum} spell")]
    CastLevelTooLow {
        spell: String,
        requested: u8,
        minimum: u8,
    },

    #[error("Invalid targeting: {0}")]
    Targeting(DiceError),

    #[error("Dice error: {0}")]
    Dice(#[from] DiceError),

    #[error(transparent)]
    Economy(#[from] EconomyError),

    #[error(transparent)]
    Ritual(#[from] RitualError),

    #[error(transparent)]
    Resolution(#[from] ResolutionError),
}
