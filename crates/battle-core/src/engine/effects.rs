//! Damage and heal math, and the effect executor.
//!
//! The math lives in free functions so it can be tested against authored
//! numbers without a battle. The executor walks a skill's effect list in
//! declaration order; targets dead by the time an effect fires are skipped,
//! and already-applied effects are never reversed.

use crate::config::Position;
use crate::events::{AnimationCue, BattleEvent, Directive};
use crate::rng::{compute_seed, roll, RngOracle};
use crate::skill::{Effect, PullMode, SummonSpawnRule, SummonTemplate};
use crate::state::{Combatant, CombatantId, RoleFlags, Side};
use crate::stats::StatKind;

use super::BattleEngine;

/// Basic attack damage before any crit: `max(1, atk - def)`.
pub fn basic_damage(atk: i32, def: i32) -> i32 {
    (atk - def).max(1)
}

/// Scale a damage number by a crit multiplier, rounded. A zero-damage hit
/// stays zero; the legacy paths floor their own results at 1.
pub fn apply_crit(base: i32, crit_damage: f32) -> i32 {
    ((base as f32 * crit_damage).round() as i32).max(0)
}

/// Legacy ultimate damage: post-crit basic damage scaled and topped up,
/// at least 1.
pub fn ultimate_damage(basic: i32, multiplier: f32, flat_bonus: i32) -> i32 {
    ((basic as f32 * multiplier).round() as i32 + flat_bonus).max(1)
}

/// Data-driven damage effect: `flat + atk × ratio - def`, at least 0.
/// A zero result is a valid whiff, not an error.
pub fn effect_damage(flat: i32, atk: i32, atk_ratio: f32, def: i32, ignore_def: bool) -> i32 {
    let scaled = flat + (atk as f32 * atk_ratio).round() as i32;
    let def = if ignore_def { 0 } else { def };
    (scaled - def).max(0)
}

/// Data-driven heal amount: `flat + atk × ratio`, at least 0.
pub fn effect_heal(flat: i32, atk: i32, atk_ratio: f32) -> i32 {
    (flat + (atk as f32 * atk_ratio).round() as i32).max(0)
}

impl BattleEngine<'_> {
    /// Crit check for `actor`'s current action. Seeded per action nonce so a
    /// replayed battle rolls identically.
    pub(crate) fn roll_crit(&self, actor: CombatantId, crit_rate: f32) -> bool {
        let seed = compute_seed(self.config.seed, self.state.nonce, actor.0, roll::CRIT);
        self.rng.unit_f32(seed) < crit_rate
    }

    /// Apply committed damage to one target: hp drop, event, victim energy.
    pub(crate) fn deal_damage(
        &mut self,
        attacker: CombatantId,
        target: CombatantId,
        amount: i32,
        crit: bool,
    ) {
        let hit_energy = self.config.energy_gain_when_hit;
        let Some(victim) = self.state.combatant_mut(target) else {
            return;
        };
        let applied = victim.take_damage(amount);
        if victim.is_alive() && applied > 0 {
            victim.add_energy(hit_energy);
        }
        self.state.events.push(BattleEvent::DamageDealt {
            attacker,
            target,
            amount: applied,
            crit,
        });
        if applied > 0 {
            self.enqueue_cut_in_if_ready(target);
        }
    }

    pub(crate) fn apply_heal(&mut self, source: CombatantId, target: CombatantId, amount: i32) {
        let Some(unit) = self.state.combatant_mut(target) else {
            return;
        };
        let restored = unit.heal(amount);
        self.state.events.push(BattleEvent::Healed {
            source,
            target,
            amount: restored,
        });
    }

    /// Run a skill's effect list against the resolved target set. If the
    /// caster dies partway through (a reflect or similar), the remaining
    /// effects are abandoned; applied ones stand.
    pub(crate) fn apply_skill_effects(
        &mut self,
        caster: CombatantId,
        effects: &[Effect],
        targets: &[CombatantId],
    ) {
        for effect in effects {
            if !self.state.is_alive(caster) {
                break;
            }
            self.apply_effect(caster, effect, targets);
        }
    }

    fn apply_effect(&mut self, caster: CombatantId, effect: &Effect, targets: &[CombatantId]) {
        match effect {
            Effect::Damage {
                flat,
                atk_ratio,
                can_crit,
                ignore_def,
            } => {
                let Some(atk_unit) = self.state.combatant(caster) else {
                    return;
                };
                let atk = atk_unit.stats.atk;
                let crit_rate = atk_unit.stats.crit_rate;
                let crit_mult = atk_unit.stats.crit_damage;
                let crit = *can_crit && self.roll_crit(caster, crit_rate);

                for &target in targets {
                    let Some(victim) = self.state.combatant(target) else {
                        continue;
                    };
                    if !victim.is_alive() {
                        continue;
                    }
                    let mut amount =
                        effect_damage(*flat, atk, *atk_ratio, victim.stats.def, *ignore_def);
                    if crit {
                        amount = apply_crit(amount, crit_mult);
                    }
                    self.deal_damage(caster, target, amount, crit);
                }
            }

            Effect::Heal { flat, atk_ratio } => {
                let Some(source) = self.state.combatant(caster) else {
                    return;
                };
                let amount = effect_heal(*flat, source.stats.atk, *atk_ratio);
                for &target in targets {
                    if self.state.is_alive(target) {
                        self.apply_heal(caster, target, amount);
                    }
                }
            }

            Effect::BuffStat {
                stat,
                flat,
                percent,
                turns,
            } => {
                let mut touched_speed = false;
                for &target in targets {
                    let Some(unit) = self.state.combatant_mut(target) else {
                        continue;
                    };
                    if !unit.is_alive() {
                        continue;
                    }
                    unit.apply_modifier(*stat, *flat, *percent, *turns);
                    touched_speed |= *stat == StatKind::Spd;
                    self.state.events.push(BattleEvent::BuffApplied {
                        source: caster,
                        target,
                        stat: *stat,
                    });
                }
                // A speed change re-sorts the not-yet-acted tail, unless a
                // pull or summon already placed units deliberately.
                if touched_speed && !self.queue_reordered() {
                    self.state.queue.reorder_tail_preserving_head(&self.state.roster);
                    self.state.events.push(BattleEvent::TurnOrderChanged);
                }
            }

            Effect::PullTurn {
                mode,
                include_caster,
            } => self.apply_pull(caster, *mode, *include_caster, targets),

            Effect::Summon {
                template,
                count,
                spawn_rule,
                join_queue,
            } => self.apply_summon(caster, template, *count, *spawn_rule, *join_queue),
        }
    }

    fn apply_pull(
        &mut self,
        caster: CombatantId,
        mode: PullMode,
        include_caster: bool,
        targets: &[CombatantId],
    ) {
        let pulled: Vec<CombatantId> = match mode {
            PullMode::TargetToActNext => targets.first().copied().into_iter().collect(),
            PullMode::AllTargetsToActNext => targets.to_vec(),
            PullMode::AlliesToActNext => {
                let Some(unit) = self.state.combatant(caster) else {
                    return;
                };
                self.state
                    .living_on(unit.side)
                    .into_iter()
                    .filter(|&id| include_caster || id != caster)
                    .collect()
            }
            PullMode::SelfToActNext => vec![caster],
        };
        let pulled: Vec<CombatantId> = pulled
            .into_iter()
            .filter(|&id| self.state.is_alive(id))
            .collect();
        if pulled.is_empty() {
            return;
        }

        self.state.queue.pull_many_to_act_next(&pulled);
        self.mark_queue_reordered();
        self.state.events.push(BattleEvent::TurnOrderChanged);
    }

    fn apply_summon(
        &mut self,
        caster: CombatantId,
        template: &SummonTemplate,
        count: u32,
        spawn_rule: SummonSpawnRule,
        join_queue: bool,
    ) {
        let Some(unit) = self.state.combatant(caster) else {
            return;
        };
        // Once per battle per caster, and clones never chain-summon.
        if unit.has_used_summon || unit.roles.is_summoned_clone {
            return;
        }
        let caster_pos = unit.position;
        if let Some(unit) = self.state.combatant_mut(caster) {
            unit.has_used_summon = true;
        }

        let mut spawned = Vec::with_capacity(count as usize);
        for i in 0..count {
            let id = self.state.allocate_id();
            let position = self.spawn_position(spawn_rule, caster_pos, i, count);
            // Clones always fight for the enemy side, whoever cast the summon.
            let mut clone = Combatant::new(id, template.name.clone(), Side::Enemy, template.stats)
                .with_roles(RoleFlags {
                    is_summoned_clone: true,
                    ..RoleFlags::default()
                })
                .with_position(position);
            clone.destroy_on_death = template.destroy_on_death;
            self.state.roster.push(clone);
            spawned.push(id);
        }

        for &id in &spawned {
            if join_queue {
                self.state.queue.insert_after_cursor(id);
            }
            self.state.events.push(BattleEvent::Summoned { caster, unit: id });
            let token = self.state.next_animation_token();
            // Fire and forget: nothing waits on a spawn animation.
            self.state.directives.push(Directive::PlayAnimation {
                token,
                unit: id,
                cue: AnimationCue::Summon,
            });
        }
        if join_queue && !spawned.is_empty() {
            self.mark_queue_reordered();
            self.state.events.push(BattleEvent::TurnOrderChanged);
        }
    }

    fn spawn_position(
        &mut self,
        rule: SummonSpawnRule,
        caster_pos: Position,
        index: u32,
        count: u32,
    ) -> Position {
        match rule {
            SummonSpawnRule::SpawnSlots => {
                if self.config.spawn_slots.is_empty() {
                    return caster_pos;
                }
                let slot = self.config.spawn_slots[self.state.spawn_cursor % self.config.spawn_slots.len()];
                self.state.spawn_cursor += 1;
                slot
            }
            SummonSpawnRule::AroundCaster => {
                const RADIUS: f32 = 1.5;
                let angle = std::f32::consts::TAU * index as f32 / count.max(1) as f32;
                Position::new(
                    caster_pos.x + RADIUS * angle.cos(),
                    caster_pos.y + RADIUS * angle.sin(),
                )
            }
        }
    }
}
