//! Proficiency, ability modifiers, spell DCs and saving throws.

use crate::character::{Ability, CombatCharacter};
use crate::dice::{Advantage, DiceError, DiceExpression, DiceRoller};
use serde::{Deserialize, Serialize};

/// Proficiency bonus by level: +2 at 1-4, rising by one every four levels.
pub fn proficiency_bonus(level: u8) -> i32 {
    let level = level.max(1) as i32;
    2 + (level - 1) / 4
}

/// Ability modifier for a score, rounding down (8-9 = -1, 10-11 = 0).
pub fn ability_modifier(score: u8) -> i32 {
    (score as i32 - 10).div_euclid(2)
}

/// Spell save DC: 8 + proficiency + spellcasting modifier (Intelligence when
/// the caster has no spellcasting ability set).
pub fn spell_dc(caster: &CombatCharacter) -> i32 {
    let ability = caster.spellcasting_ability.unwrap_or(Ability::Intelligence);
    8 + caster.proficiency_bonus() + caster.ability_scores.modifier(ability)
}

/// Spell attack bonus: proficiency + spellcasting modifier.
pub fn spell_attack_bonus(caster: &CombatCharacter) -> i32 {
    let ability = caster.spellcasting_ability.unwrap_or(Ability::Intelligence);
    caster.proficiency_bonus() + caster.ability_scores.modifier(ability)
}

/// The value of an external save modifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModifierValue {
    Flat(i32),
    /// A rolled bonus (Bless: "1d4") or penalty (Bane: "1d4", penalty).
    Dice { expression: String, penalty: bool },
}

/// A labelled modifier applied to a saving throw after the ability modifier
/// and proficiency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveModifier {
    pub source: String,
    pub value: ModifierValue,
}

impl SaveModifier {
    pub fn flat(source: impl Into<String>, value: i32) -> Self {
        Self {
            source: source.into(),
            value: ModifierValue::Flat(value),
        }
    }

    pub fn dice_bonus(source: impl Into<String>, expression: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            value: ModifierValue::Dice {
                expression: expression.into(),
                penalty: false,
            },
        }
    }

    pub fn dice_penalty(source: impl Into<String>, expression: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            value: ModifierValue::Dice {
                expression: expression.into(),
                penalty: true,
            },
        }
    }

    fn resolve(&self, roller: &mut DiceRoller) -> Result<i32, DiceError> {
        match &self.value {
            ModifierValue::Flat(v) => Ok(*v),
            ModifierValue::Dice {
                expression,
                penalty,
            } => {
                let rolled = DiceExpression::parse(expression)?.roll(roller).total;
                Ok(if *penalty { -rolled } else { rolled })
            }
        }
    }
}

/// A modifier after resolution, with its signed value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedModifier {
    pub source: String,
    pub value: i32,
}

/// Full breakdown of a saving throw.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavingThrowResult {
    pub ability: Ability,
    /// The kept d20 face.
    pub roll: u32,
    /// Every d20 face rolled (two under advantage/disadvantage).
    pub rolls: Vec<u32>,
    pub ability_modifier: i32,
    /// Proficiency added (0 when not proficient).
    pub proficiency: i32,
    pub modifiers: Vec<AppliedModifier>,
    pub total: i32,
    pub dc: i32,
    pub success: bool,
    pub natural_20: bool,
    pub natural_1: bool,
}

/// Roll a saving throw.
///
/// A natural 20 is not an automatic success here: the save succeeds only
/// when `total >= dc`.
pub fn roll_saving_throw(
    character: &CombatCharacter,
    ability: Ability,
    dc: i32,
    modifiers: &[SaveModifier],
    advantage: Advantage,
    roller: &mut DiceRoller,
) -> Result<SavingThrowResult, DiceError> {
    let (roll, rolls) = roller.d20(advantage);
    let ability_modifier = character.ability_scores.modifier(ability);
    let proficiency = if character.is_proficient_in_save(ability) {
        character.proficiency_bonus()
    } else {
        0
    };

    let mut applied = Vec::with_capacity(modifiers.len());
    for modifier in modifiers {
        applied.push(AppliedModifier {
            source: modifier.source.clone(),
            value: modifier.resolve(roller)?,
        });
    }

    let total = roll as i32
        + ability_modifier
        + proficiency
        + applied.iter().map(|m| m.value).sum::<i32>();
    let success = total >= dc;

    tracing::debug!(
        character = %character.name,
        ability = ability.abbreviation(),
        roll,
        total,
        dc,
        success,
        "saving throw"
    );

    Ok(SavingThrowResult {
        ability,
        roll,
        rolls,
        ability_modifier,
        proficiency,
        modifiers: applied,
        total,
        dc,
        success,
        natural_20: roll == 20,
        natural_1: roll == 1,
    })
}
