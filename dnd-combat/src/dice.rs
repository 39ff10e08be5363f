//! Dice notation and the engine's single source of randomness.
//!
//! Supports standard dice notation: XdY+Z, multiple components, keep
//! highest/lowest, and d20 rolls with advantage/disadvantage. Every roll in
//! the crate goes through a [`DiceRoller`], so seeding one roller makes a
//! whole resolution reproducible.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error type for dice parsing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiceError {
    #[error("Invalid dice notation: {0}")]
    InvalidNotation(String),
    #[error("Invalid die size: {0}")]
    InvalidDieSize(u32),
    #[error("No dice specified")]
    NoDice,
    #[error("Cannot keep {keep} dice when only rolling {count} (in {notation})")]
    InvalidKeepCount {
        keep: u32,
        count: u32,
        notation: String,
    },
}

/// Advantage state for d20 rolls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Advantage {
    #[default]
    Normal,
    Advantage,
    Disadvantage,
}

impl Advantage {
    /// Combine two advantage states (advantage + disadvantage = normal).
    pub fn combine(self, other: Advantage) -> Advantage {
        match (self, other) {
            (Advantage::Normal, x) | (x, Advantage::Normal) => x,
            (Advantage::Advantage, Advantage::Disadvantage) => Advantage::Normal,
            (Advantage::Disadvantage, Advantage::Advantage) => Advantage::Normal,
            (Advantage::Advantage, Advantage::Advantage) => Advantage::Advantage,
            (Advantage::Disadvantage, Advantage::Disadvantage) => Advantage::Disadvantage,
        }
    }
}

/// Standard D&D die types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DieType {
    D4,
    D6,
    D8,
    D10,
    D12,
    D20,
    D100,
}

impl DieType {
    pub fn sides(&self) -> u32 {
        match self {
            DieType::D4 => 4,
            DieType::D6 => 6,
            DieType::D8 => 8,
            DieType::D10 => 10,
            DieType::D12 => 12,
            DieType::D20 => 20,
            DieType::D100 => 100,
        }
    }

    pub fn from_sides(sides: u32) -> Option<DieType> {
        match sides {
            4 => Some(DieType::D4),
            6 => Some(DieType::D6),
            8 => Some(DieType::D8),
            10 => Some(DieType::D10),
            12 => Some(DieType::D12),
            20 => Some(DieType::D20),
            100 => Some(DieType::D100),
            _ => None,
        }
    }
}

impl fmt::Display for DieType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "d{}", self.sides())
    }
}

// ============================================================================
// Randomness
// ============================================================================

/// The seedable randomness source for a resolution.
///
/// A roller can be given a script of die faces; scripted faces are consumed
/// first (clamped into the die's range) and the seeded generator takes over
/// once the script runs dry.
#[derive(Debug, Clone)]
pub struct DiceRoller {
    rng: StdRng,
    script: VecDeque<u32>,
}

impl DiceRoller {
    /// A reproducible roller.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            script: VecDeque::new(),
        }
    }

    /// A roller seeded from OS entropy.
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
            script: VecDeque::new(),
        }
    }

    /// A roller that yields the given faces in order before falling back to
    /// a generator seeded with 0.
    pub fn scripted(faces: impl IntoIterator<Item = u32>) -> Self {
        let mut roller = Self::seeded(0);
        roller.push_faces(faces);
        roller
    }

    /// Queue more scripted faces behind any that are still pending.
    pub fn push_faces(&mut self, faces: impl IntoIterator<Item = u32>) {
        self.script.extend(faces);
    }

    /// Number of scripted faces not yet consumed.
    pub fn scripted_remaining(&self) -> usize {
        self.script.len()
    }

    /// Roll one die with the given number of sides (1..=sides).
    pub fn roll_die(&mut self, sides: u32) -> u32 {
        let sides = sides.max(1);
        match self.script.pop_front() {
            Some(face) => face.clamp(1, sides),
            None => self.rng.gen_range(1..=sides),
        }
    }

    /// Roll a single d20 under the given advantage state.
    ///
    /// Returns the kept face and every face rolled.
    pub fn d20(&mut self, advantage: Advantage) -> (u32, Vec<u32>) {
        let first = self.roll_die(20);
        match advantage {
            Advantage::Normal => (first, vec![first]),
            Advantage::Advantage => {
                let second = self.roll_die(20);
                (first.max(second), vec![first, second])
            }
            Advantage::Disadvantage => {
                let second = self.roll_die(20);
                (first.min(second), vec![first, second])
            }
        }
    }
}

impl Default for DiceRoller {
    fn default() -> Self {
        Self::from_entropy()
    }
}

// ============================================================================
// Expressions
// ============================================================================

/// A single die component of a dice expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiceComponent {
    pub count: u32,
    pub die_type: DieType,
    pub keep_highest: Option<u32>,
    pub keep_lowest: Option<u32>,
}

impl DiceComponent {
    fn notation(&self) -> String {
        let keep = match (self.keep_highest, self.keep_lowest) {
            (Some(k), _) => format!("kh{k}"),
            (None, Some(k)) => format!("kl{k}"),
            (None, None) => String::new(),
        };
        format!("{}d{}{}", self.count, self.die_type.sides(), keep)
    }
}

/// A complete dice expression (e.g., 2d6+3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiceExpression {
    pub components: Vec<DiceComponent>,
    pub modifier: i32,
    pub original: String,
}

impl DiceExpression {
    /// Parse a dice notation string.
    pub fn parse(notation: &str) -> Result<Self, DiceError> {
        let notation = notation.trim().to_lowercase();
        if notation.is_empty() {
            return Err(DiceError::NoDice);
        }

        let mut components = Vec::new();
        let mut modifier: i32 = 0;
        let mut current = String::new();
        let mut sign: i32 = 1;

        for ch in notation.chars() {
            match ch {
                '+' | '-' => {
                    if !current.is_empty() {
                        Self::parse_component(&current, sign, &mut components, &mut modifier)?;
                        current.clear();
                    }
                    sign = if ch == '+' { 1 } else { -1 };
                }
                ' ' => continue,
                _ => current.push(ch),
            }
        }

        if !current.is_empty() {
            Self::parse_component(&current, sign, &mut components, &mut modifier)?;
        }

        if components.is_empty() && modifier == 0 {
            return Err(DiceError::NoDice);
        }

        Ok(DiceExpression {
            components,
            modifier,
            original: notation,
        })
    }

    fn parse_component(
        s: &str,
        sign: i32,
        components: &mut Vec<DiceComponent>,
        modifier: &mut i32,
    ) -> Result<(), DiceError> {
        if let Some(d_pos) = s.find('d') {
            if sign < 0 {
                // Subtracted dice are not part of the notation we accept.
                return Err(DiceError::InvalidNotation(format!("-{s}")));
            }
            let count_str = &s[..d_pos];
            let rest = &s[d_pos + 1..];

            let count: u32 = if count_str.is_empty() {
                1
            } else {
                count_str
                    .parse()
                    .map_err(|_| DiceError::InvalidNotation(s.to_string()))?
            };

            let (sides_str, keep_highest, keep_lowest) = if let Some(kh_pos) = rest.find("kh") {
                let sides = &rest[..kh_pos];
                let keep: u32 = rest[kh_pos + 2..]
                    .parse()
                    .map_err(|_| DiceError::InvalidNotation(s.to_string()))?;
                (sides, Some(keep), None)
            } else if let Some(kl_pos) = rest.find("kl") {
                let sides = &rest[..kl_pos];
                let keep: u32 = rest[kl_pos + 2..]
                    .parse()
                    .map_err(|_| DiceError::InvalidNotation(s.to_string()))?;
                (sides, None, Some(keep))
            } else {
                (rest, None, None)
            };

            let sides: u32 = sides_str
                .parse()
                .map_err(|_| DiceError::InvalidNotation(s.to_string()))?;

            let die_type = DieType::from_sides(sides).ok_or(DiceError::InvalidDieSize(sides))?;

            if let Some(keep) = keep_highest.or(keep_lowest) {
                if keep > count {
                    return Err(DiceError::InvalidKeepCount {
                        keep,
                        count,
                        notation: s.to_string(),
                    });
                }
            }

            components.push(DiceComponent {
                count,
                die_type,
                keep_highest,
                keep_lowest,
            });
        } else {
            let value: i32 = s
                .parse()
                .map_err(|_| DiceError::InvalidNotation(s.to_string()))?;
            *modifier += sign * value;
        }

        Ok(())
    }

    /// A flat expression with no dice.
    pub fn flat(value: i32) -> Self {
        Self {
            components: Vec::new(),
            modifier: value,
            original: value.to_string(),
        }
    }

    /// Add `extra` dice `times` times (upcasting: "+2d8 per slot level").
    ///
    /// Plain components of the same die type are merged.
    pub fn scaled(&self, extra: &DiceExpression, times: u32) -> DiceExpression {
        let mut scaled = self.clone();
        for _ in 0..times {
            for component in &extra.components {
                let mergeable = scaled.components.iter_mut().find(|c| {
                    c.die_type == component.die_type
                        && c.keep_highest.is_none()
                        && c.keep_lowest.is_none()
                        && component.keep_highest.is_none()
                        && component.keep_lowest.is_none()
                });
                match mergeable {
                    Some(existing) => existing.count += component.count,
                    None => scaled.components.push(component.clone()),
                }
            }
            scaled.modifier += extra.modifier;
        }
        scaled.original = scaled.notation();
        scaled
    }

    /// The dice alone, without the flat modifier. A critical hit rolls these
    /// once more on top of the normal roll.
    pub fn dice_only(&self) -> DiceExpression {
        let mut dice = self.clone();
        dice.modifier = 0;
        dice.original = dice.notation();
        dice
    }

    /// Canonical notation rebuilt from the parsed parts.
    pub fn notation(&self) -> String {
        let mut out = self
            .components
            .iter()
            .map(DiceComponent::notation)
            .collect::<Vec<_>>()
            .join("+");
        if self.modifier > 0 {
            if out.is_empty() {
                out = self.modifier.to_string();
            } else {
                out.push_str(&format!("+{}", self.modifier));
            }
        } else if self.modifier < 0 {
            out.push_str(&format!("-{}", self.modifier.abs()));
        }
        out
    }

    /// Roll the dice expression.
    pub fn roll(&self, roller: &mut DiceRoller) -> RollResult {
        let mut component_results = Vec::new();

        for component in &self.components {
            let mut rolls: Vec<u32> = (0..component.count)
                .map(|_| roller.roll_die(component.die_type.sides()))
                .collect();

            let kept = if let Some(keep) = component.keep_highest {
                let mut sorted = rolls.clone();
                sorted.sort_by(|a, b| b.cmp(a));
                sorted.truncate(keep as usize);
                sorted
            } else if let Some(keep) = component.keep_lowest {
                let mut sorted = rolls.clone();
                sorted.sort();
                sorted.truncate(keep as usize);
                sorted
            } else {
                rolls.clone()
            };

            let subtotal: u32 = kept.iter().sum();
            component_results.push(ComponentResult {
                die_type: component.die_type,
                rolls: std::mem::take(&mut rolls),
                kept,
                subtotal,
            });
        }

        let dice_total: i32 = component_results.iter().map(|c| c.subtotal as i32).sum();
        let total = dice_total + self.modifier;

        // Natural 20/1 only makes sense for a lone d20.
        let d20_roll = component_results
            .iter()
            .find(|c| c.die_type == DieType::D20 && c.rolls.len() == 1)
            .and_then(|c| c.rolls.first().copied());

        RollResult {
            expression: self.clone(),
            component_results,
            modifier: self.modifier,
            total,
            natural_20: d20_roll == Some(20),
            natural_1: d20_roll == Some(1),
        }
    }

    /// Roll twice and keep the higher total.
    pub fn roll_take_higher(&self, roller: &mut DiceRoller) -> BestOfTwo {
        let first = self.roll(roller);
        let second = self.roll(roller);
        BestOfTwo { first, second }
    }
}

impl FromStr for DiceExpression {
    type Err = DiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DiceExpression::parse(s)
    }
}

impl fmt::Display for DiceExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.original)
    }
}

/// Result of rolling a single dice component.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentResult {
    pub die_type: DieType,
    pub rolls: Vec<u32>,
    pub kept: Vec<u32>,
    pub subtotal: u32,
}

/// Complete result of a dice roll.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollResult {
    pub expression: DiceExpression,
    pub component_results: Vec<ComponentResult>,
    pub modifier: i32,
    pub total: i32,
    pub natural_20: bool,
    pub natural_1: bool,
}

impl RollResult {
    /// Format the individual dice results for display.
    pub fn dice_display(&self) -> String {
        let dice_str = self
            .component_results
            .iter()
            .map(|c| {
                format!(
                    "[{}]",
                    c.rolls
                        .iter()
                        .map(|r| r.to_string())
                        .collect::<Vec<_>>()
                        .join(", ")
                )
            })
            .collect::<Vec<_>>()
            .join(" + ");

        match self.modifier {
            0 => dice_str,
            m if m > 0 => format!("{dice_str} + {m}"),
            m => format!("{dice_str} - {}", m.abs()),
        }
    }

    /// Check if the roll meets or exceeds a DC.
    pub fn meets_dc(&self, dc: i32) -> bool {
        self.total >= dc
    }
}

impl fmt::Display for RollResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {}", self.dice_display(), self.total)
    }
}

/// Outcome of rolling an expression twice and keeping the better result.
#[derive(Debug, Clone)]
pub struct BestOfTwo {
    pub first: RollResult,
    pub second: RollResult,
}

impl BestOfTwo {
    /// The higher roll; the first wins ties.
    pub fn kept(&self) -> &RollResult {
        if self.second.total > self.first.total {
            &self.second
        } else {
            &self.first
        }
    }

    /// How much the second roll added over the first.
    pub fn improvement(&self) -> i32 {
        (self.second.total - self.first.total).max(0)
    }
}

/// Parse and roll in one step.
pub fn roll(notation: &str, roller: &mut DiceRoller) -> Result<RollResult, DiceError> {
    let expr = DiceExpression::parse(notation)?;
    Ok(expr.roll(roller))
}
