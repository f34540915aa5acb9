//! Target resolution for skills.
//!
//! Given a caster and a skill, produce the concrete target list. An empty
//! result is not an error: callers treat it as "no valid action" and proceed
//! to battle-end checks.

use crate::skill::{DefaultTargetRule, Skill, TargetScope, TargetSide};
use crate::state::{BattleState, CombatantId, Side};

/// The side a skill's pool lives on, relative to the caster.
pub(crate) fn pool_side(caster_side: Side, target_side: TargetSide) -> Side {
    match target_side {
        TargetSide::Enemies => caster_side.opponent(),
        TargetSide::Allies => caster_side,
    }
}

/// First living member of `side`, in roster enumeration order.
pub(crate) fn first_alive(state: &BattleState, side: Side) -> Option<CombatantId> {
    state.living_on(side).first().copied()
}

/// Resolve a skill's targets per its side/scope/default rule.
///
/// `manual` is an externally supplied selection; it is honored only when it
/// is alive and on the skill's target side.
pub(crate) fn resolve_targets(
    state: &BattleState,
    caster: CombatantId,
    skill: &Skill,
    manual: Option<CombatantId>,
) -> Vec<CombatantId> {
    let Some(caster_unit) = state.combatant(caster) else {
        return Vec::new();
    };
    let side = pool_side(caster_unit.side, skill.target_side);
    let pool = state.living_on(side);
    if pool.is_empty() {
        return Vec::new();
    }

    match skill.target_scope {
        TargetScope::All => {
            if skill.target_side == TargetSide::Allies && !skill.include_self_when_allies_all {
                pool.into_iter().filter(|&id| id != caster).collect()
            } else {
                pool
            }
        }
        TargetScope::Single => {
            if let Some(choice) = manual
                && pool.contains(&choice)
            {
                return vec![choice];
            }
            default_target(state, caster, skill, &pool)
                .map(|id| vec![id])
                .unwrap_or_default()
        }
    }
}

fn default_target(
    state: &BattleState,
    caster: CombatantId,
    skill: &Skill,
    pool: &[CombatantId],
) -> Option<CombatantId> {
    match skill.default_target_rule {
        DefaultTargetRule::FirstAlive => pool.first().copied(),
        DefaultTargetRule::LowestHpPercent => {
            let mut best: Option<(CombatantId, f32)> = None;
            for &id in pool {
                let pct = state.combatant(id)?.hp_percent();
                // Strict less-than keeps ties on the earlier pool member.
                if best.is_none_or(|(_, b)| pct < b) {
                    best = Some((id, pct));
                }
            }
            best.map(|(id, _)| id)
        }
        DefaultTargetRule::SelfOnly => {
            // A skill aimed at opponents may never default to hitting its
            // own caster.
            if skill.target_side == TargetSide::Enemies {
                pool.first().copied()
            } else {
                Some(caster)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skill::Effect;
    use crate::state::Combatant;
    use crate::stats::StatBlock;

    fn state() -> BattleState {
        let mk = |id: u32, side: Side, hp: i32| {
            let mut c = Combatant::new(
                CombatantId(id),
                format!("u{id}"),
                side,
                StatBlock::new(100, 10, 0, 10),
            );
            c.hp = hp;
            c
        };
        BattleState::from_roster(vec![
            mk(0, Side::Player, 100),
            mk(1, Side::Player, 30),
            mk(2, Side::Enemy, 100),
            mk(3, Side::Enemy, 10),
        ])
    }

    fn dmg_skill() -> Skill {
        Skill::new("strike").with_effect(Effect::Damage {
            flat: 5,
            atk_ratio: 0.0,
            can_crit: false,
            ignore_def: false,
        })
    }

    #[test]
    fn manual_selection_wins_when_valid() {
        let state = state();
        let targets = resolve_targets(&state, CombatantId(0), &dmg_skill(), Some(CombatantId(3)));
        assert_eq!(targets, vec![CombatantId(3)]);
    }

    #[test]
    fn manual_selection_on_wrong_side_falls_back() {
        let state = state();
        // Ally chosen for an enemy-targeting skill.
        let targets = resolve_targets(&state, CombatantId(0), &dmg_skill(), Some(CombatantId(1)));
        assert_eq!(targets, vec![CombatantId(2)]);
    }

    #[test]
    fn lowest_hp_percent_picks_weakest_ally() {
        let state = state();
        let skill = dmg_skill().targeting(
            TargetSide::Allies,
            TargetScope::Single,
            DefaultTargetRule::LowestHpPercent,
        );
        let targets = resolve_targets(&state, CombatantId(0), &skill, None);
        assert_eq!(targets, vec![CombatantId(1)]);
    }

    #[test]
    fn self_rule_never_targets_caster_on_enemy_skill() {
        let state = state();
        let skill = dmg_skill().targeting(
            TargetSide::Enemies,
            TargetScope::Single,
            DefaultTargetRule::SelfOnly,
        );
        let targets = resolve_targets(&state, CombatantId(0), &skill, None);
        assert_eq!(targets, vec![CombatantId(2)]);
    }

    #[test]
    fn allies_all_can_exclude_caster() {
        let state = state();
        let mut skill = dmg_skill().targeting(
            TargetSide::Allies,
            TargetScope::All,
            DefaultTargetRule::FirstAlive,
        );
        skill.include_self_when_allies_all = false;
        let targets = resolve_targets(&state, CombatantId(0), &skill, None);
        assert_eq!(targets, vec![CombatantId(1)]);
    }

    #[test]
    fn empty_pool_resolves_to_no_targets() {
        let mut state = state();
        state.combatant_mut(CombatantId(2)).unwrap().take_damage(999);
        state.combatant_mut(CombatantId(3)).unwrap().take_damage(999);
        let targets = resolve_targets(&state, CombatantId(0), &dmg_skill(), None);
        assert!(targets.is_empty());
    }

    #[test]
    fn dead_manual_selection_is_ignored() {
        let mut state = state();
        state.combatant_mut(CombatantId(3)).unwrap().take_damage(999);
        let targets = resolve_targets(&state, CombatantId(0), &dmg_skill(), Some(CombatantId(3)));
        assert_eq!(targets, vec![CombatantId(2)]);
    }
}
