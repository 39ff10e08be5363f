//! Target selection: narrowing candidates by targeting mode and allocating
//! them under a strategy.
//!
//! The allocator is pure with respect to combat state. Its only side effect
//! is the pool roll, which goes through the caller's [`DiceRoller`].

use crate::character::{CharacterId, CombatCharacter};
use crate::combat::{LogEntry, LogKind};
use crate::dice::{DiceError, DiceExpression, DiceRoller};
use crate::spells::AreaOfEffect;
use serde::{Deserialize, Serialize};
use tracing::debug;

// ============================================================================
// Targeting descriptors
// ============================================================================

/// Which creatures a spell can be pointed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TargetMode {
    SelfOnly,
    Single,
    Multiple(u32),
    /// Every candidate in the area; the caller supplies the candidates.
    Area(AreaOfEffect),
}

/// Resource consumed by a pool allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PoolResource {
    HitPoints,
    HitDice,
}

impl PoolResource {
    /// The candidate's cost against the pool.
    pub fn value_of(&self, character: &CombatCharacter) -> i32 {
        match self {
            PoolResource::HitPoints => character.hit_points.current,
            PoolResource::HitDice => character.hit_dice as i32,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PoolResource::HitPoints => "hit points",
            PoolResource::HitDice => "hit dice",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// A rolled budget spent greedily over sorted candidates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolAllocation {
    pub resource: PoolResource,
    /// Pool size at the spell's base level.
    pub dice: String,
    /// Added once per slot level above the base level.
    #[serde(default)]
    pub upcast_dice: Option<String>,
    pub order: SortOrder,
    /// When false, one candidate that does not fit is still taken and
    /// exhausts the pool.
    pub strict_limit: bool,
}

impl PoolAllocation {
    /// The pool expression for a cast `levels_above_base` slots higher.
    pub fn pool_expression(&self, levels_above_base: u32) -> Result<DiceExpression, DiceError> {
        let base = DiceExpression::parse(&self.dice)?;
        match &self.upcast_dice {
            Some(extra) if levels_above_base > 0 => {
                Ok(base.scaled(&DiceExpression::parse(extra)?, levels_above_base))
            }
            _ => Ok(base),
        }
    }
}

/// Strategy for turning candidates into targets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum TargetAllocation {
    #[default]
    All,
    Pool(PoolAllocation),
}

/// A spell's targeting rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Targeting {
    pub mode: TargetMode,
    #[serde(default)]
    pub allocation: TargetAllocation,
}

impl Targeting {
    pub fn single() -> Self {
        Self {
            mode: TargetMode::Single,
            allocation: TargetAllocation::All,
        }
    }

    pub fn self_only() -> Self {
        Self {
            mode: TargetMode::SelfOnly,
            allocation: TargetAllocation::All,
        }
    }

    pub fn area(area: AreaOfEffect) -> Self {
        Self {
            mode: TargetMode::Area(area),
            allocation: TargetAllocation::All,
        }
    }
}

// ============================================================================
// Narrowing
// ============================================================================

/// Apply the targeting mode to the caller's candidate list.
///
/// Candidates keep their input order; `Single` and `Multiple` take from the
/// front.
pub fn narrow(mode: TargetMode, caster: CharacterId, candidates: &[CharacterId]) -> Vec<CharacterId> {
    match mode {
        TargetMode::SelfOnly => vec![caster],
        TargetMode::Single => candidates.iter().take(1).copied().collect(),
        TargetMode::Multiple(n) => candidates.iter().take(n as usize).copied().collect(),
        TargetMode::Area(_) => candidates.to_vec(),
    }
}

/// Creatures within `range_squares` of the caster, nearest first.
///
/// `None` means unbounded range. The caster is never included.
pub fn candidates_in_range(
    caster: &CombatCharacter,
    combatants: &[CombatCharacter],
    range_squares: Option<u32>,
) -> Vec<CharacterId> {
    let mut in_range: Vec<_> = combatants
        .iter()
        .filter(|c| c.id != caster.id)
        .map(|c| (caster.position.chebyshev_distance(c.position), c.id))
        .filter(|(distance, _)| range_squares.map_or(true, |r| *distance <= r))
        .collect();
    in_range.sort_by_key(|(distance, _)| *distance);
    in_range.into_iter().map(|(_, id)| id).collect()
}

// ============================================================================
// Allocation
// ============================================================================

/// The allocator's output.
#[derive(Debug, Clone, Default)]
pub struct AllocationResult {
    pub selected: Vec<CharacterId>,
    /// The rolled pool, for pool allocations.
    pub pool: Option<i32>,
    pub remaining_pool: Option<i32>,
    /// A candidate taken beyond the pool by a non-strict allocation.
    pub partial: Option<CharacterId>,
    pub log: Vec<LogEntry>,
}

/// Select targets from `candidates` under `allocation`.
///
/// `levels_above_base` scales the pool dice for upcast spells.
pub fn allocate(
    candidates: &[&CombatCharacter],
    allocation: &TargetAllocation,
    levels_above_base: u32,
    roller: &mut DiceRoller,
) -> Result<AllocationResult, DiceError> {
    match allocation {
        TargetAllocation::All => Ok(AllocationResult {
            selected: candidates.iter().map(|c| c.id).collect(),
            ..AllocationResult::default()
        }),
        TargetAllocation::Pool(pool) => allocate_pool(candidates, pool, levels_above_base, roller),
    }
}

fn allocate_pool(
    candidates: &[&CombatCharacter],
    pool: &PoolAllocation,
    levels_above_base: u32,
    roller: &mut DiceRoller,
) -> Result<AllocationResult, DiceError> {
    let expression = pool.pool_expression(levels_above_base)?;
    let roll = expression.roll(roller);
    let total = roll.total.max(0);

    let mut result = AllocationResult {
        pool: Some(total),
        ..AllocationResult::default()
    };
    result.log.push(
        LogEntry::new(
            LogKind::PoolRoll,
            format!(
                "Rolled {} for a pool of {} {}: {}",
                expression,
                total,
                pool.resource.name(),
                roll.dice_display()
            ),
        )
        .with_value(total),
    );

    // Stable sort keeps input order among equal costs.
    let mut sorted: Vec<&CombatCharacter> = candidates.to_vec();
    match pool.order {
        SortOrder::Ascending => sorted.sort_by_key(|c| pool.resource.value_of(c)),
        SortOrder::Descending => sorted.sort_by_key(|c| std::cmp::Reverse(pool.resource.value_of(c))),
    }

    let mut remaining = total;
    for candidate in sorted {
        let cost = pool.resource.value_of(candidate);
        if cost <= remaining {
            remaining -= cost;
            debug!(candidate = %candidate.name, cost, remaining, "pool selects candidate");
            result.selected.push(candidate.id);
            result.log.push(
                LogEntry::new(
                    LogKind::Targeting,
                    format!("{} is affected ({} {})", candidate.name, cost, pool.resource.name()),
                )
                .with_value(cost)
                .about(candidate.id),
            );
            continue;
        }

        if !pool.strict_limit {
            debug!(candidate = %candidate.name, cost, remaining, "pool exhausted by partial selection");
            result.selected.push(candidate.id);
            result.partial = Some(candidate.id);
            result.log.push(
                LogEntry::new(
                    LogKind::Targeting,
                    format!(
                        "{} is affected by the last {} of the pool",
                        candidate.name, remaining
                    ),
                )
                .with_value(remaining)
                .about(candidate.id),
            );
            remaining = 0;
            break;
        }

        debug!(candidate = %candidate.name, cost, remaining, "candidate does not fit the pool");
        if pool.order == SortOrder::Ascending {
            // Everything after this costs at least as much.
            break;
        }
    }

    result.remaining_pool = Some(remaining);
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::character::Team;

    fn creature(name: &str, hp: i32) -> CombatCharacter {
        CombatCharacter::new(name, Team::Hostile).with_hit_points(hp)
    }

    fn sleep_pool(order: SortOrder, strict_limit: bool) -> TargetAllocation {
        TargetAllocation::Pool(PoolAllocation {
            resource: PoolResource::HitPoints,
            dice: "5d8".to_string(),
            upcast_dice: Some("2d8".to_string()),
            order,
            strict_limit,
        })
    }

    fn names(selected: &[CharacterId], pool: &[CombatCharacter]) -> Vec<String> {
        selected
            .iter()
            .filter_map(|id| pool.iter().find(|c| c.id == *id))
            .map(|c| c.name.clone())
            .collect()
    }

    #[test]
    fn test_all_returns_candidates_unchanged() {
        let a = creature("A", 5);
        let b = creature("B", 50);
        let result = allocate(&[&a, &b], &TargetAllocation::All, 0, &mut DiceRoller::seeded(1)).unwrap();
        assert_eq!(result.selected, vec![a.id, b.id]);
        assert!(result.remaining_pool.is_none());
    }

    #[test]
    fn test_ascending_pool_takes_cheapest_prefix() {
        // Pool: 5 x 4 = 20.
        let group = vec![creature("Ogre", 59), creature("Kobold", 5), creature("Goblin", 7), creature("Orc", 15)];
        let refs: Vec<_> = group.iter().collect();
        let mut roller = DiceRoller::scripted([4, 4, 4, 4, 4]);
        let result = allocate(&refs, &sleep_pool(SortOrder::Ascending, true), 0, &mut roller).unwrap();

        assert_eq!(names(&result.selected, &group), vec!["Kobold", "Goblin"]);
        assert_eq!(result.pool, Some(20));
        assert_eq!(result.remaining_pool, Some(8));
        assert!(result.partial.is_none());
    }

    #[test]
    fn test_ascending_selection_is_maximal_prefix() {
        let group = vec![
            creature("A", 3),
            creature("B", 3),
            creature("C", 4),
            creature("D", 9),
            creature("E", 1),
        ];
        let refs: Vec<_> = group.iter().collect();
        for seed in 0..50 {
            let mut roller = DiceRoller::seeded(seed);
            let result = allocate(&refs, &sleep_pool(SortOrder::Ascending, true), 0, &mut roller).unwrap();
            let pool = result.pool.unwrap();

            let mut costs: Vec<i32> = group.iter().map(|c| c.hit_points.current).collect();
            costs.sort();
            let mut spent = 0;
            let expected = costs
                .iter()
                .take_while(|cost| {
                    spent += **cost;
                    spent <= pool
                })
                .count();
            assert_eq!(result.selected.len(), expected, "seed {seed}, pool {pool}");
        }
    }

    #[test]
    fn test_descending_strict_keeps_looking() {
        // Pool: 5 x 2 = 10. 12 does not fit, 8 does, 6 does not, 2 does.
        let group = vec![creature("A", 6), creature("B", 12), creature("C", 2), creature("D", 8)];
        let refs: Vec<_> = group.iter().collect();
        let mut roller = DiceRoller::scripted([2, 2, 2, 2, 2]);
        let result = allocate(&refs, &sleep_pool(SortOrder::Descending, true), 0, &mut roller).unwrap();

        assert_eq!(names(&result.selected, &group), vec!["D", "C"]);
        assert_eq!(result.remaining_pool, Some(0));
    }

    #[test]
    fn test_non_strict_partial_exhausts_pool() {
        // Pool: 5 x 2 = 10.
        let group = vec![creature("A", 4), creature("B", 9), creature("C", 1)];
        let refs: Vec<_> = group.iter().collect();
        let mut roller = DiceRoller::scripted([2, 2, 2, 2, 2]);
        let result = allocate(&refs, &sleep_pool(SortOrder::Ascending, false), 0, &mut roller).unwrap();

        assert_eq!(names(&result.selected, &group), vec!["C", "A", "B"]);
        assert_eq!(result.partial, Some(group[1].id));
        assert_eq!(result.remaining_pool, Some(0));
    }

    #[test]
    fn test_empty_candidates_keep_full_pool() {
        let mut roller = DiceRoller::scripted([3, 3, 3, 3, 3]);
        let result = allocate(&[], &sleep_pool(SortOrder::Ascending, true), 0, &mut roller).unwrap();
        assert!(result.selected.is_empty());
        assert_eq!(result.remaining_pool, Some(15));
        assert_eq!(result.pool, Some(15));
    }

    #[test]
    fn test_upcast_scales_pool() {
        let allocation = match sleep_pool(SortOrder::Ascending, true) {
            TargetAllocation::Pool(pool) => pool,
            TargetAllocation::All => unreachable!(),
        };
        assert_eq!(allocation.pool_expression(0).unwrap().notation(), "5d8");
        assert_eq!(allocation.pool_expression(2).unwrap().notation(), "9d8");
    }

    #[test]
    fn test_hit_dice_resource() {
        let veteran = CombatCharacter::new("Veteran", Team::Hostile).with_level(9);
        let recruit = CombatCharacter::new("Recruit", Team::Hostile).with_level(1);
        let allocation = TargetAllocation::Pool(PoolAllocation {
            resource: PoolResource::HitDice,
            dice: "2d4".to_string(),
            upcast_dice: None,
            order: SortOrder::Ascending,
            strict_limit: true,
        });
        let mut roller = DiceRoller::scripted([2, 2]);
        let result = allocate(&[&veteran, &recruit], &allocation, 0, &mut roller).unwrap();
        assert_eq!(result.selected, vec![recruit.id]);
        assert_eq!(result.remaining_pool, Some(3));
    }

    #[test]
    fn test_bad_pool_dice_is_an_error() {
        let allocation = TargetAllocation::Pool(PoolAllocation {
            resource: PoolResource::HitPoints,
            dice: "5d9".to_string(),
            upcast_dice: None,
            order: SortOrder::Ascending,
            strict_limit: true,
        });
        assert!(allocate(&[], &allocation, 0, &mut DiceRoller::seeded(0)).is_err());
    }

    #[test]
    fn test_narrow_and_range() {
        let caster = CombatCharacter::new("Caster", Team::Party);
        let near = creature("Near", 5).at(crate::character::Position::new(2, 0));
        let far = creature("Far", 5).at(crate::character::Position::new(30, 0));
        let everyone = vec![caster.clone(), far.clone(), near.clone()];

        let in_range = candidates_in_range(&caster, &everyone, Some(24));
        assert_eq!(in_range, vec![near.id]);
        let all = candidates_in_range(&caster, &everyone, None);
        assert_eq!(all, vec![near.id, far.id]);

        assert_eq!(narrow(TargetMode::SelfOnly, caster.id, &all), vec![caster.id]);
        assert_eq!(narrow(TargetMode::Single, caster.id, &all), vec![near.id]);
        assert_eq!(narrow(TargetMode::Multiple(5), caster.id, &all).len(), 2);
    }
}
