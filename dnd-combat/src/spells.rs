//! Spell definitions and the built-in spell catalog.
//!
//! A [`Spell`] is immutable data. Casting it never changes the definition;
//! the engine builds a transient cast context around a borrowed spell.

use crate::character::{Ability, Condition, ConditionDuration, DamageType};
use crate::effects::{
    EffectTrigger, MoveDirection, SaveRule, SpellEffect, SummonTemplate, TriggerEvent,
};
use crate::targeting::{PoolAllocation, PoolResource, SortOrder, TargetAllocation, TargetMode, Targeting};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Stable identifier for a spell definition ("fire-bolt").
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SpellId(pub String);

impl SpellId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for SpellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Schools of magic in D&D.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpellSchool {
    Abjuration,
    Conjuration,
    Divination,
    Enchantment,
    Evocation,
    Illusion,
    Necromancy,
    Transmutation,
}

impl SpellSchool {
    pub fn name(&self) -> &'static str {
        match self {
            SpellSchool::Abjuration => "Abjuration",
            SpellSchool::Conjuration => "Conjuration",
            SpellSchool::Divination => "Divination",
            SpellSchool::Enchantment => "Enchantment",
            SpellSchool::Evocation => "Evocation",
            SpellSchool::Illusion => "Illusion",
            SpellSchool::Necromancy => "Necromancy",
            SpellSchool::Transmutation => "Transmutation",
        }
    }
}

/// How long it takes to cast a spell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CastingTime {
    Action,
    BonusAction,
    Reaction,
    Minutes(u32),
    Hours(u32),
}

impl CastingTime {
    /// Whole minutes of casting; anything that fits in a turn is 0.
    pub fn minutes(&self) -> u32 {
        match self {
            CastingTime::Action | CastingTime::BonusAction | CastingTime::Reaction => 0,
            CastingTime::Minutes(m) => *m,
            CastingTime::Hours(h) => h.saturating_mul(60),
        }
    }

    pub fn description(&self) -> String {
        match self {
            CastingTime::Action => "1 action".to_string(),
            CastingTime::BonusAction => "1 bonus action".to_string(),
            CastingTime::Reaction => "1 reaction".to_string(),
            CastingTime::Minutes(m) => format!("{} minute{}", m, if *m == 1 { "" } else { "s" }),
            CastingTime::Hours(h) => format!("{} hour{}", h, if *h == 1 { "" } else { "s" }),
        }
    }
}

/// Range of a spell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpellRange {
    Self_,
    Touch,
    Feet(u32),
    Sight,
    Unlimited,
}

impl SpellRange {
    /// Range in grid squares, or `None` when unbounded.
    pub fn squares(&self, grid_unit_feet: u32) -> Option<u32> {
        match self {
            SpellRange::Self_ => Some(0),
            SpellRange::Touch => Some(1),
            SpellRange::Feet(feet) => Some(feet / grid_unit_feet.max(1)),
            SpellRange::Sight | SpellRange::Unlimited => None,
        }
    }

    pub fn description(&self) -> String {
        match self {
            SpellRange::Self_ => "Self".to_string(),
            SpellRange::Touch => "Touch".to_string(),
            SpellRange::Feet(f) => format!("{} feet", f),
            SpellRange::Sight => "Sight".to_string(),
            SpellRange::Unlimited => "Unlimited".to_string(),
        }
    }
}

/// Duration of a spell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpellDuration {
    Instantaneous,
    Rounds(u32),
    Minutes(u32),
    Hours(u32),
    UntilDispelled,
}

impl SpellDuration {
    /// The same span expressed as a condition duration.
    pub fn as_condition_duration(&self) -> ConditionDuration {
        match self {
            SpellDuration::Instantaneous => ConditionDuration::Rounds(0),
            SpellDuration::Rounds(r) => ConditionDuration::Rounds(*r),
            SpellDuration::Minutes(m) => ConditionDuration::Minutes(*m),
            SpellDuration::Hours(h) => ConditionDuration::Minutes(h.saturating_mul(60)),
            SpellDuration::UntilDispelled => ConditionDuration::UntilRemoved,
        }
    }

    pub fn description(&self) -> String {
        match self {
            SpellDuration::Instantaneous => "Instantaneous".to_string(),
            SpellDuration::Rounds(r) => format!("{} round{}", r, if *r == 1 { "" } else { "s" }),
            SpellDuration::Minutes(m) => format!("{} minute{}", m, if *m == 1 { "" } else { "s" }),
            SpellDuration::Hours(h) => format!("{} hour{}", h, if *h == 1 { "" } else { "s" }),
            SpellDuration::UntilDispelled => "Until dispelled".to_string(),
        }
    }
}

/// Area of effect shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AreaOfEffect {
    Sphere(u32),    // Radius in feet
    Cube(u32),      // Side length in feet
    Cone(u32),      // Length in feet
    Line(u32, u32), // Length, width in feet
}

/// Complete spell definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Spell {
    pub id: SpellId,
    pub name: String,
    pub level: u8, // 0 for cantrips
    pub school: SpellSchool,
    pub casting_time: CastingTime,
    pub range: SpellRange,
    pub duration: SpellDuration,
    pub concentration: bool,
    pub ritual: bool,
    pub targeting: Targeting,
    /// Executed in declared order.
    pub effects: Vec<SpellEffect>,
}

impl Spell {
    pub fn new(name: &str, level: u8, school: SpellSchool) -> Self {
        Self {
            id: SpellId::new(name.to_lowercase().replace(' ', "-")),
            name: name.to_string(),
            level,
            school,
            casting_time: CastingTime::Action,
            range: SpellRange::Self_,
            duration: SpellDuration::Instantaneous,
            concentration: false,
            ritual: false,
            targeting: Targeting::single(),
            effects: Vec::new(),
        }
    }

    pub fn with_casting_time(mut self, casting_time: CastingTime) -> Self {
        self.casting_time = casting_time;
        self
    }

    pub fn with_range(mut self, range: SpellRange) -> Self {
        self.range = range;
        self
    }

    pub fn with_duration(mut self, duration: SpellDuration) -> Self {
        self.duration = duration;
        self
    }

    pub fn with_concentration(mut self) -> Self {
        self.concentration = true;
        self
    }

    pub fn with_ritual(mut self) -> Self {
        self.ritual = true;
        self
    }

    pub fn with_targeting(mut self, targeting: Targeting) -> Self {
        self.targeting = targeting;
        self
    }

    pub fn with_effect(mut self, effect: SpellEffect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn is_cantrip(&self) -> bool {
        self.level == 0
    }
}

// ============================================================================
// Spell Catalog
// ============================================================================

lazy_static::lazy_static! {
    static ref SPELL_CATALOG: HashMap<String, Spell> = build_catalog();
}

/// Look up a spell by name (case-insensitive).
pub fn get_spell(name: &str) -> Option<&'static Spell> {
    SPELL_CATALOG.get(&name.trim().to_lowercase())
}

/// Get all spells in the catalog.
pub fn all_spells() -> impl Iterator<Item = &'static Spell> {
    SPELL_CATALOG.values()
}

fn build_catalog() -> HashMap<String, Spell> {
    let spells = vec![
        // Cantrips
        Spell::new("Fire Bolt", 0, SpellSchool::Evocation)
            .with_range(SpellRange::Feet(120))
            .with_effect(
                SpellEffect::damage("1d10", DamageType::Fire).with_trigger(EffectTrigger::OnHit),
            ),
        // 1st level
        Spell::new("Sleep", 1, SpellSchool::Enchantment)
            .with_range(SpellRange::Feet(90))
            .with_duration(SpellDuration::Minutes(1))
            .with_targeting(Targeting {
                mode: TargetMode::Area(AreaOfEffect::Sphere(20)),
                allocation: TargetAllocation::Pool(PoolAllocation {
                    resource: PoolResource::HitPoints,
                    dice: "5d8".to_string(),
                    upcast_dice: Some("2d8".to_string()),
                    order: SortOrder::Ascending,
                    strict_limit: true,
                }),
            })
            .with_effect(SpellEffect::status(
                Condition::Unconscious,
                ConditionDuration::Minutes(1),
            )),
        Spell::new("Thunderwave", 1, SpellSchool::Evocation)
            .with_targeting(Targeting::area(AreaOfEffect::Cube(15)))
            .with_effect(
                SpellEffect::damage("2d8", DamageType::Thunder)
                    .with_upcast("1d8")
                    .with_save(SaveRule::half(Ability::Constitution)),
            )
            .with_effect(SpellEffect::push(2).with_save(SaveRule::negates(Ability::Constitution))),
        Spell::new("Find Familiar", 1, SpellSchool::Conjuration)
            .with_casting_time(CastingTime::Hours(1))
            .with_range(SpellRange::Feet(10))
            .with_ritual()
            .with_targeting(Targeting::self_only())
            .with_effect(SpellEffect::summon(SummonTemplate::owl())),
        Spell::new("Hex", 1, SpellSchool::Enchantment)
            .with_casting_time(CastingTime::BonusAction)
            .with_range(SpellRange::Feet(90))
            .with_duration(SpellDuration::Hours(1))
            .with_concentration()
            .with_effect(SpellEffect::concentration(ConditionDuration::Minutes(60)))
            .with_effect(SpellEffect::status(
                Condition::Custom("Hexed".to_string()),
                ConditionDuration::Minutes(60),
            ))
            .with_effect(SpellEffect::reactive(
                TriggerEvent::DamageTaken,
                SpellEffect::damage("1d6", DamageType::Necrotic),
            )),
        Spell::new("Alarm", 1, SpellSchool::Abjuration)
            .with_casting_time(CastingTime::Minutes(1))
            .with_range(SpellRange::Feet(30))
            .with_duration(SpellDuration::Hours(8))
            .with_ritual()
            .with_targeting(Targeting::self_only())
            .with_effect(SpellEffect::utility(
                "A mental or audible alarm sounds when a creature enters the warded area",
            )),
        Spell::new("Command", 1, SpellSchool::Enchantment)
            .with_range(SpellRange::Feet(60))
            .with_duration(SpellDuration::Rounds(1))
            .with_effect(
                SpellEffect::movement(6, MoveDirection::AwayFromCaster)
                    .with_save(SaveRule::negates(Ability::Wisdom)),
            ),
        // 2nd level
        Spell::new("Hold Person", 2, SpellSchool::Enchantment)
            .with_range(SpellRange::Feet(60))
            .with_duration(SpellDuration::Minutes(1))
            .with_concentration()
            .with_effect(SpellEffect::concentration(ConditionDuration::Minutes(1)))
            .with_effect(
                SpellEffect::status(Condition::Paralyzed, ConditionDuration::Minutes(1))
                    .with_save(SaveRule::negates(Ability::Wisdom)),
            ),
        Spell::new("Misty Step", 2, SpellSchool::Conjuration)
            .with_casting_time(CastingTime::BonusAction)
            .with_targeting(Targeting::self_only())
            .with_effect(SpellEffect::movement(6, MoveDirection::ChosenPoint).with_teleport()),
        // 3rd level
        Spell::new("Fireball", 3, SpellSchool::Evocation)
            .with_range(SpellRange::Feet(150))
            .with_targeting(Targeting::area(AreaOfEffect::Sphere(20)))
            .with_effect(
                SpellEffect::damage("8d6", DamageType::Fire)
                    .with_upcast("1d6")
                    .with_save(SaveRule::half(Ability::Dexterity)),
            ),
    ];

    spells
        .into_iter()
        .map(|spell| (spell.name.to_lowercase(), spell))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::{EffectCondition, EffectKind};

    #[test]
    fn test_get_spell() {
        let fireball = get_spell("fireball").expect("Fireball should exist");
        assert_eq!(fireball.name, "Fireball");
        assert_eq!(fireball.level, 3);
        assert_eq!(fireball.school, SpellSchool::Evocation);
        assert_eq!(fireball.id, SpellId::new("fireball"));
    }

    #[test]
    fn test_case_insensitive_lookup() {
        assert!(get_spell("FIREBALL").is_some());
        assert!(get_spell("Hold Person").is_some());
        assert!(get_spell("  misty step ").is_some());
        assert!(get_spell("wish").is_none());
    }

    #[test]
    fn test_catalog_covers_every_archetype() {
        let mut seen = std::collections::HashSet::new();
        for spell in all_spells() {
            for effect in &spell.effects {
                seen.insert(effect.kind.name());
            }
        }
        for name in [
            "Damage",
            "StatusCondition",
            "Movement",
            "Summoning",
            "Concentration",
            "Utility",
            "ReactiveTrigger",
        ] {
            assert!(seen.contains(name), "no catalog spell has a {name} effect");
        }
    }

    #[test]
    fn test_concentration_spell() {
        let hold_person = get_spell("hold person").expect("Hold Person should exist");
        assert!(hold_person.concentration);
        assert!(matches!(hold_person.effects[0].kind, EffectKind::Concentration(_)));
        assert_eq!(hold_person.effects[1].condition, EffectCondition::OnSaveFail);

        let fireball = get_spell("fireball").expect("Fireball should exist");
        assert!(!fireball.concentration);
    }

    #[test]
    fn test_ritual_casting_minutes() {
        let alarm = get_spell("alarm").unwrap();
        assert!(alarm.ritual);
        assert_eq!(alarm.casting_time.minutes(), 1);
        assert_eq!(get_spell("find familiar").unwrap().casting_time.minutes(), 60);
        assert_eq!(CastingTime::BonusAction.minutes(), 0);
    }

    #[test]
    fn test_range_in_squares() {
        assert_eq!(SpellRange::Feet(120).squares(5), Some(24));
        assert_eq!(SpellRange::Touch.squares(5), Some(1));
        assert_eq!(SpellRange::Sight.squares(5), None);
    }

    #[test]
    fn test_spell_round_trips_through_json() {
        let sleep = get_spell("sleep").unwrap();
        let json = serde_json::to_string(sleep).unwrap();
        let back: Spell = serde_json::from_str(&json).unwrap();
        assert_eq!(&back, sleep);
    }
}
