//! The turn-resolution engine.
//!
//! [`BattleEngine`] borrows the battle state and drives every transition:
//! command validation, the cast/apply/death pipeline, the busy watchdog, the
//! cut-in window, and death resolution. It is synchronous and deterministic;
//! time only enters through [`BattleEngine::tick`] and animation completions
//! through [`BattleEngine::animation_finished`], so the whole scheduler is
//! testable without a clock.

pub(crate) mod action;
pub(crate) mod boss;
pub(crate) mod cutin;
pub mod effects;
mod errors;
mod targeting;

pub use errors::CommandError;

use std::time::{Duration, Instant};

use crate::config::BattleConfig;
use crate::events::{AnimationCue, AnimationToken, BattleEvent, Directive};
use crate::rng::{compute_seed, roll, PcgRng, RngOracle};
use crate::skill::SkillAnimation;
use crate::snapshot::BattleReport;
use crate::state::{BattlePhase, BattleState, Combatant, CombatantId, RoleFlags, Side};

use action::{ActionPlan, ActionStep, ActiveAction};
use effects::{apply_crit, basic_damage, effect_heal, ultimate_damage};

/// What a combatant is told to do on its turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum CommandKind {
    Attack,
    Ultimate,
}

/// What a deferred step resolved to. Computed while the active action is
/// mutably borrowed, acted on after the borrow ends.
enum StepDue {
    Nothing,
    Cast,
    Apply,
    Finish,
}

/// Drives one battle. Construct it fresh around the state for each call
/// batch; it holds no state of its own beyond a scratch flag.
pub struct BattleEngine<'a> {
    state: &'a mut BattleState,
    config: &'a BattleConfig,
    rng: PcgRng,
    /// Queue-reorder latch for effect lists running outside an active action
    /// (cut-ins). Mirrors `ActiveAction::queue_reordered`.
    reorder_latch: bool,
}

impl<'a> BattleEngine<'a> {
    pub fn new(state: &'a mut BattleState, config: &'a BattleConfig) -> Self {
        Self {
            state,
            config,
            rng: PcgRng,
            reorder_latch: false,
        }
    }

    pub fn state(&self) -> &BattleState {
        &*self.state
    }

    // =========================
    // Lifecycle
    // =========================

    /// Build the first round and commit the first actor. Call once.
    pub fn start(&mut self) {
        self.state.queue.build_round(&self.state.roster);
        self.state.events.push(BattleEvent::RoundStarted {
            round: self.state.queue.round(),
        });
        self.advance(None);
    }

    /// Advance engine-managed timers by `elapsed`: the busy watchdog, the
    /// enemy pre-action delay, and animation wait caps. A cap elapsing counts
    /// as completion.
    pub fn tick(&mut self, elapsed: Duration) {
        if !matches!(self.state.phase, BattlePhase::Busy) {
            return;
        }
        self.state.busy_elapsed += elapsed;

        let due = match self.state.active.as_mut() {
            Some(active) if active.epoch == self.state.epoch => match &mut active.step {
                ActionStep::PreDelay { remaining } => {
                    *remaining = remaining.saturating_sub(elapsed);
                    if remaining.is_zero() {
                        StepDue::Cast
                    } else {
                        StepDue::Nothing
                    }
                }
                ActionStep::CastWait { remaining, .. } => {
                    *remaining = remaining.saturating_sub(elapsed);
                    if remaining.is_zero() {
                        StepDue::Apply
                    } else {
                        StepDue::Nothing
                    }
                }
                ActionStep::DeathWait { remaining, .. } => {
                    *remaining = remaining.saturating_sub(elapsed);
                    if remaining.is_zero() {
                        StepDue::Finish
                    } else {
                        StepDue::Nothing
                    }
                }
            },
            _ => StepDue::Nothing,
        };
        match due {
            StepDue::Nothing => {}
            StepDue::Cast => self.cast(None),
            StepDue::Apply => self.apply_and_resolve(),
            StepDue::Finish => self.finish_turn(),
        }

        // Last line of defense: a turn stuck in Busy past the timeout is
        // force-advanced. The epoch guard makes this single-fire per turn.
        if matches!(self.state.phase, BattlePhase::Busy)
            && self.state.watchdog_epoch == self.state.epoch
            && self.state.busy_elapsed >= self.config.busy_timeout
        {
            self.state.events.push(BattleEvent::WatchdogFired {
                epoch: self.state.epoch,
            });
            let finished = self.state.current_actor;
            self.state.active = None;
            self.advance(finished);
        }
    }

    /// Report an animation completion. Unknown or superseded tokens are
    /// ignored; this is the stale-resume guard.
    pub fn animation_finished(&mut self, token: AnimationToken) {
        if matches!(self.state.phase, BattlePhase::Ended { .. }) {
            return;
        }
        let due = match self.state.active.as_mut() {
            Some(active) if active.epoch == self.state.epoch => match &mut active.step {
                ActionStep::CastWait { token: waiting, .. } if *waiting == token => StepDue::Apply,
                ActionStep::DeathWait { tokens, .. } => {
                    tokens.retain(|&t| t != token);
                    if tokens.is_empty() {
                        StepDue::Finish
                    } else {
                        StepDue::Nothing
                    }
                }
                _ => StepDue::Nothing,
            },
            _ => StepDue::Nothing,
        };
        match due {
            StepDue::Apply => self.apply_and_resolve(),
            StepDue::Finish => self.finish_turn(),
            _ => {}
        }
    }

    // =========================
    // Commands
    // =========================

    /// Order the current actor to act. Only valid while the scheduler is
    /// idle on that actor's turn.
    pub fn submit_command(
        &mut self,
        actor: CombatantId,
        kind: CommandKind,
        target: Option<CombatantId>,
    ) -> Result<(), CommandError> {
        if matches!(self.state.phase, BattlePhase::Ended { .. }) {
            return Err(CommandError::BattleEnded);
        }
        let unit = self
            .state
            .combatant(actor)
            .ok_or(CommandError::UnknownCombatant { actor })?;
        if !unit.is_alive() {
            return Err(CommandError::DeadCombatant { actor });
        }
        if matches!(self.state.phase, BattlePhase::Busy) {
            return Err(CommandError::Busy);
        }
        if self.state.current_actor != Some(actor) {
            return Err(CommandError::NotCurrentActor { actor });
        }

        let plan = match kind {
            CommandKind::Attack => unit
                .basic_skill
                .clone()
                .map(ActionPlan::DataSkill)
                .unwrap_or(ActionPlan::LegacyBasic),
            CommandKind::Ultimate => {
                let cost = unit.ultimate_skill.as_ref().map_or(0.0, |s| s.energy_cost);
                if !unit.has_energy_for(cost) {
                    return Err(CommandError::InsufficientEnergy { actor });
                }
                unit.ultimate_skill
                    .clone()
                    .map(ActionPlan::DataSkill)
                    .unwrap_or(ActionPlan::LegacyUltimate)
            }
        };

        self.state.phase = BattlePhase::Busy;
        self.state.busy_elapsed = Duration::ZERO;
        self.state.watchdog_epoch = self.state.epoch;
        self.state.active = Some(ActiveAction {
            epoch: self.state.epoch,
            actor,
            plan,
            targets: Vec::new(),
            step: ActionStep::PreDelay {
                remaining: Duration::ZERO,
            },
            queue_reordered: false,
        });
        self.cast(target);
        Ok(())
    }

    /// Queue an out-of-turn ultimate. Executes in the next between-turns
    /// window, conditions permitting then.
    pub fn request_cut_in(&mut self, caster: CombatantId) -> Result<(), CommandError> {
        if matches!(self.state.phase, BattlePhase::Ended { .. }) {
            return Err(CommandError::BattleEnded);
        }
        let unit = self
            .state
            .combatant(caster)
            .ok_or(CommandError::UnknownCombatant { actor: caster })?;
        if !unit.is_alive() {
            return Err(CommandError::DeadCombatant { actor: caster });
        }
        match &unit.ultimate_skill {
            Some(skill) if !skill.allow_cut_in => {
                return Err(CommandError::CutInNotAllowed { actor: caster });
            }
            Some(skill) if !unit.has_energy_for(skill.energy_cost) => {
                return Err(CommandError::InsufficientEnergy { actor: caster });
            }
            None if !unit.has_full_energy() => {
                return Err(CommandError::InsufficientEnergy { actor: caster });
            }
            _ => {}
        }
        self.state.cutins.push(caster);
        Ok(())
    }

    /// Set the sticky player target used when a command carries none.
    pub fn select_target(&mut self, target: CombatantId) -> Result<(), CommandError> {
        if matches!(self.state.phase, BattlePhase::Ended { .. }) {
            return Err(CommandError::BattleEnded);
        }
        let unit = self
            .state
            .combatant(target)
            .ok_or(CommandError::UnknownCombatant { actor: target })?;
        if !unit.is_alive() {
            return Err(CommandError::DeadCombatant { actor: target });
        }
        self.state.selected_target = Some(target);
        Ok(())
    }

    // =========================
    // Outboxes
    // =========================

    pub fn take_events(&mut self) -> Vec<BattleEvent> {
        std::mem::take(&mut self.state.events)
    }

    pub fn take_directives(&mut self) -> Vec<Directive> {
        std::mem::take(&mut self.state.directives)
    }

    /// End-of-battle export; `None` while the battle is still running.
    pub fn report(&self) -> Option<BattleReport> {
        let outcome = self.state.outcome()?;
        Some(BattleReport {
            outcome,
            combatants: self.state.snapshot().combatants,
        })
    }

    // =========================
    // Action pipeline
    // =========================

    /// Lock targets, spend energy, announce the action, and enter the cast
    /// wait. An empty target resolution skips the turn entirely.
    fn cast(&mut self, manual: Option<CombatantId>) {
        let Some(mut active) = self.state.active.take() else {
            return;
        };
        if active.epoch != self.state.epoch {
            return;
        }
        let actor = active.actor;

        let manual = manual.or_else(|| self.auto_manual(actor));
        let targets = self.resolve_plan_targets(actor, &active.plan, manual);
        if targets.is_empty() {
            self.advance(Some(actor));
            return;
        }

        if active.plan.is_ultimate() {
            let cost = match &active.plan {
                ActionPlan::DataSkill(skill) => skill.energy_cost,
                _ => 0.0,
            };
            if let Some(unit) = self.state.combatant_mut(actor) {
                unit.spend_energy(cost);
            }
        }

        self.state.nonce += 1;
        self.state.events.push(BattleEvent::ActionStarted {
            actor,
            skill: active.plan.name().to_string(),
            is_ultimate: active.plan.is_ultimate(),
        });

        active.targets = targets;
        match self.cast_cue(&active.plan) {
            None => {
                self.state.active = Some(active);
                self.apply_and_resolve();
            }
            Some((cue, cap)) => {
                let token = self.state.next_animation_token();
                self.state.directives.push(Directive::PlayAnimation {
                    token,
                    unit: actor,
                    cue,
                });
                active.step = ActionStep::CastWait {
                    token,
                    remaining: cap,
                };
                self.state.active = Some(active);
            }
        }
    }

    /// Apply the action's effects, then either wait on death animations or
    /// finish the turn.
    fn apply_and_resolve(&mut self) {
        let Some(active) = self.state.active.clone() else {
            return;
        };
        if active.epoch != self.state.epoch {
            return;
        }

        self.execute_plan(active.actor, &active.plan, &active.targets);
        let deaths = self.sweep_deaths();
        if deaths.is_empty() {
            self.finish_turn();
            return;
        }
        if let Some(slot) = self.state.active.as_mut() {
            slot.step = ActionStep::DeathWait {
                tokens: deaths,
                remaining: self.config.max_wait_death,
            };
        }
    }

    /// Close out the actor's turn: per-turn energy, modifier expiry, then
    /// hand off to the scheduler.
    fn finish_turn(&mut self) {
        let Some(active) = self.state.active.take() else {
            return;
        };
        if active.epoch != self.state.epoch {
            return;
        }
        let actor = active.actor;

        if self.state.is_alive(actor) {
            if !active.plan.is_ultimate() {
                let gain = self.config.energy_gain_per_turn;
                if let Some(unit) = self.state.combatant_mut(actor) {
                    unit.add_energy(gain);
                }
                self.enqueue_cut_in_if_ready(actor);
            }
            if let Some(unit) = self.state.combatant_mut(actor) {
                unit.tick_modifiers_turn_end();
            }
        }

        self.advance(Some(actor));
    }

    fn execute_plan(&mut self, actor: CombatantId, plan: &ActionPlan, targets: &[CombatantId]) {
        match plan {
            ActionPlan::LegacyBasic => {
                let Some((atk, crit_rate, crit_mult)) = self.attacker_line(actor) else {
                    return;
                };
                let crit = self.roll_crit(actor, crit_rate);
                for &target in targets {
                    let Some(def) = self.defender_def(target) else {
                        continue;
                    };
                    let mut amount = basic_damage(atk, def);
                    if crit {
                        amount = apply_crit(amount, crit_mult).max(1);
                    }
                    self.deal_damage(actor, target, amount, crit);
                }
            }
            ActionPlan::LegacyUltimate => {
                let Some(unit) = self.state.combatant(actor) else {
                    return;
                };
                if unit.ultimate_heals_party {
                    let amount =
                        effect_heal(unit.ultimate_heal_flat, unit.stats.atk, unit.ultimate_heal_atk_ratio)
                            .max(1);
                    for &target in targets {
                        if self.state.is_alive(target) {
                            self.apply_heal(actor, target, amount);
                        }
                    }
                    return;
                }
                let Some((atk, crit_rate, crit_mult)) = self.attacker_line(actor) else {
                    return;
                };
                let crit = self.roll_crit(actor, crit_rate);
                for &target in targets {
                    let Some(def) = self.defender_def(target) else {
                        continue;
                    };
                    let mut base = basic_damage(atk, def);
                    if crit {
                        base = apply_crit(base, crit_mult).max(1);
                    }
                    let amount = ultimate_damage(
                        base,
                        self.config.ultimate_damage_multiplier,
                        self.config.ultimate_flat_bonus,
                    );
                    self.deal_damage(actor, target, amount, crit);
                }
            }
            ActionPlan::DataSkill(skill) => {
                self.apply_skill_effects(actor, &skill.effects, targets);
            }
        }
    }

    fn attacker_line(&self, actor: CombatantId) -> Option<(i32, f32, f32)> {
        let unit = self.state.combatant(actor)?;
        Some((unit.stats.atk, unit.stats.crit_rate, unit.stats.crit_damage))
    }

    fn defender_def(&self, target: CombatantId) -> Option<i32> {
        let unit = self.state.combatant(target)?;
        if !unit.is_alive() {
            return None;
        }
        Some(unit.stats.def)
    }

    fn cast_cue(&self, plan: &ActionPlan) -> Option<(AnimationCue, Duration)> {
        match plan {
            ActionPlan::LegacyBasic => Some((AnimationCue::Attack, self.config.max_wait_attack)),
            ActionPlan::LegacyUltimate => {
                Some((AnimationCue::Ultimate, self.config.max_wait_ultimate))
            }
            ActionPlan::DataSkill(skill) => match skill.animation {
                SkillAnimation::None => None,
                SkillAnimation::Attack => Some((AnimationCue::Attack, self.config.max_wait_attack)),
                SkillAnimation::Ultimate => {
                    Some((AnimationCue::Ultimate, self.config.max_wait_ultimate))
                }
            },
        }
    }

    // =========================
    // Targeting
    // =========================

    /// Fallback manual target: the player's sticky selection, or a seeded
    /// pick over living players for auto-initiated actors.
    fn auto_manual(&self, actor: CombatantId) -> Option<CombatantId> {
        match self.state.combatant(actor)?.side {
            Side::Player => self.state.selected_target,
            Side::Enemy => {
                let pool = self.state.living_on(Side::Player);
                if pool.is_empty() {
                    return None;
                }
                let seed =
                    compute_seed(self.config.seed, self.state.nonce, actor.0, roll::TARGET_PICK);
                Some(pool[self.rng.index(seed, pool.len())])
            }
        }
    }

    fn resolve_plan_targets(
        &self,
        actor: CombatantId,
        plan: &ActionPlan,
        manual: Option<CombatantId>,
    ) -> Vec<CombatantId> {
        match plan {
            ActionPlan::DataSkill(skill) => {
                targeting::resolve_targets(&*self.state, actor, skill, manual)
            }
            ActionPlan::LegacyBasic => self
                .legacy_enemy_target(actor, manual)
                .into_iter()
                .collect(),
            ActionPlan::LegacyUltimate => {
                let Some(unit) = self.state.combatant(actor) else {
                    return Vec::new();
                };
                if unit.ultimate_heals_party {
                    self.state.living_on(unit.side)
                } else {
                    self.legacy_enemy_target(actor, manual).into_iter().collect()
                }
            }
        }
    }

    fn legacy_enemy_target(
        &self,
        actor: CombatantId,
        manual: Option<CombatantId>,
    ) -> Option<CombatantId> {
        let side = self.state.combatant(actor)?.side.opponent();
        if let Some(choice) = manual
            && self.state.combatant(choice).is_some_and(|c| c.side == side && c.is_alive())
        {
            return Some(choice);
        }
        targeting::first_alive(&*self.state, side)
    }

    // =========================
    // Scheduling
    // =========================

    /// Commit the next actor: battle-end checks, the cut-in window, cursor
    /// advance, epoch bump. The single place the current actor changes.
    fn advance(&mut self, finished: Option<CombatantId>) {
        if matches!(self.state.phase, BattlePhase::Ended { .. }) {
            return;
        }
        self.state.active = None;

        if self.check_battle_end() {
            return;
        }
        self.process_cutins();
        if matches!(self.state.phase, BattlePhase::Ended { .. }) {
            return;
        }

        let prev_round = self.state.queue.round();
        let Some(next) = self.state.queue.advance_cursor(&self.state.roster, finished) else {
            // Living combatants exist (the end check passed) yet the queue
            // could not produce one. End defensively rather than hang.
            self.state.events.push(BattleEvent::InvariantViolation {
                detail: "turn queue produced no living actor".to_string(),
            });
            let player_won = !self.state.all_dead(Side::Player);
            self.end_battle(player_won);
            return;
        };
        if self.state.queue.round() != prev_round {
            self.state.events.push(BattleEvent::RoundStarted {
                round: self.state.queue.round(),
            });
        }

        self.state.epoch += 1;
        self.state.current_actor = Some(next);
        self.state.phase = BattlePhase::Idle;
        self.state.busy_elapsed = Duration::ZERO;
        self.state.watchdog_epoch = self.state.epoch;

        let interactive = self
            .state
            .combatant(next)
            .is_some_and(|c| c.side == Side::Player);
        self.state.events.push(BattleEvent::TurnStarted {
            actor: next,
            epoch: self.state.epoch,
            interactive,
        });

        if !interactive {
            self.begin_auto_turn(next);
        }
    }

    /// Non-interactive actors act on their own after a short delay.
    fn begin_auto_turn(&mut self, actor: CombatantId) {
        let plan = self.choose_auto_plan(actor);
        self.state.phase = BattlePhase::Busy;
        self.state.active = Some(ActiveAction {
            epoch: self.state.epoch,
            actor,
            plan,
            targets: Vec::new(),
            step: ActionStep::PreDelay {
                remaining: self.config.enemy_pre_delay,
            },
            queue_reordered: false,
        });
        if self.config.enemy_pre_delay.is_zero() {
            self.cast(None);
        }
    }

    /// Enemy AI: ultimate when the bar covers it, basic attack otherwise.
    fn choose_auto_plan(&self, actor: CombatantId) -> ActionPlan {
        let Some(unit) = self.state.combatant(actor) else {
            return ActionPlan::LegacyBasic;
        };
        let wants_ultimate = match &unit.ultimate_skill {
            Some(skill) => unit.has_energy_for(skill.energy_cost),
            None => unit.has_full_energy(),
        };
        if wants_ultimate {
            unit.ultimate_skill
                .clone()
                .map(ActionPlan::DataSkill)
                .unwrap_or(ActionPlan::LegacyUltimate)
        } else {
            unit.basic_skill
                .clone()
                .map(ActionPlan::DataSkill)
                .unwrap_or(ActionPlan::LegacyBasic)
        }
    }

    fn check_battle_end(&mut self) -> bool {
        if self.state.all_dead(Side::Player) {
            self.end_battle(false);
            true
        } else if self.state.all_dead(Side::Enemy) {
            self.end_battle(true);
            true
        } else {
            false
        }
    }

    fn end_battle(&mut self, player_won: bool) {
        self.state.phase = BattlePhase::Ended { player_won };
        self.state.active = None;
        self.state.current_actor = None;
        self.state.cutins.clear();
        self.state.events.push(BattleEvent::BattleEnded { player_won });
    }

    // =========================
    // Cut-ins
    // =========================

    pub(crate) fn enqueue_cut_in_if_ready(&mut self, id: CombatantId) {
        let Some(unit) = self.state.combatant(id) else {
            return;
        };
        if !unit.is_alive() || !unit.has_full_energy() {
            return;
        }
        if unit.ultimate_skill.as_ref().is_some_and(|s| !s.allow_cut_in) {
            return;
        }
        self.state.cutins.push(id);
    }

    /// Drain the cut-in queue within its count and wall-clock budget. On
    /// overrun the remainder is dropped wholesale so the next turn starts.
    fn process_cutins(&mut self) {
        if self.state.cutins.is_empty() {
            return;
        }
        let window_start = Instant::now();
        let mut processed = 0usize;
        loop {
            if processed >= self.config.cutin_max_per_window
                || window_start.elapsed() >= self.config.cutin_budget
            {
                let remaining = self.state.cutins.len();
                if remaining > 0 {
                    self.state
                        .events
                        .push(BattleEvent::CutInsDropped { remaining });
                    self.state.cutins.clear();
                }
                return;
            }
            let Some(caster) = self.state.cutins.pop() else {
                return;
            };
            if !self.execute_cut_in(caster) {
                continue;
            }
            processed += 1;
            if matches!(self.state.phase, BattlePhase::Ended { .. }) {
                return;
            }
        }
    }

    /// Run one cut-in ultimate synchronously. Conditions are re-validated
    /// here; a stale request is silently skipped.
    fn execute_cut_in(&mut self, caster: CombatantId) -> bool {
        let Some(unit) = self.state.combatant(caster) else {
            return false;
        };
        if !unit.is_alive() {
            return false;
        }
        let plan = match &unit.ultimate_skill {
            Some(skill) if skill.allow_cut_in && unit.has_energy_for(skill.energy_cost) => {
                ActionPlan::DataSkill(skill.clone())
            }
            Some(_) => return false,
            None if unit.has_full_energy() => ActionPlan::LegacyUltimate,
            None => return false,
        };

        let manual = self.auto_manual(caster);
        let targets = self.resolve_plan_targets(caster, &plan, manual);
        if targets.is_empty() {
            return false;
        }

        let cost = match &plan {
            ActionPlan::DataSkill(skill) => skill.energy_cost,
            _ => 0.0,
        };
        if let Some(unit) = self.state.combatant_mut(caster) {
            unit.spend_energy(cost);
        }

        self.state.nonce += 1;
        self.state.events.push(BattleEvent::CutInStarted { caster });
        self.state.events.push(BattleEvent::ActionStarted {
            actor: caster,
            skill: plan.name().to_string(),
            is_ultimate: true,
        });
        // Cut-in playback is fire-and-forget; nothing waits on it.
        let token = self.state.next_animation_token();
        self.state.directives.push(Directive::PlayAnimation {
            token,
            unit: caster,
            cue: AnimationCue::Ultimate,
        });

        self.reorder_latch = false;
        self.execute_plan(caster, &plan, &targets);
        let _ = self.sweep_deaths();
        self.check_battle_end();
        true
    }

    pub(crate) fn queue_reordered(&self) -> bool {
        self.state
            .active
            .as_ref()
            .map_or(self.reorder_latch, |a| a.queue_reordered)
    }

    pub(crate) fn mark_queue_reordered(&mut self) {
        match self.state.active.as_mut() {
            Some(active) => active.queue_reordered = true,
            None => self.reorder_latch = true,
        }
    }

    // =========================
    // Death resolution
    // =========================

    /// Find every combatant newly at zero hp and resolve its death. Returns
    /// the death animation tokens for pacing.
    fn sweep_deaths(&mut self) -> Vec<AnimationToken> {
        let newly_dead: Vec<CombatantId> = self
            .state
            .roster
            .iter()
            .filter(|c| c.hp <= 0 && !c.death_resolved)
            .map(|c| c.id)
            .collect();
        let mut out = Vec::with_capacity(newly_dead.len());
        for id in newly_dead {
            if let Some(token) = self.handle_death(id) {
                out.push(token);
            }
        }
        out
    }

    /// Resolve one death exactly once: strip the unit from scheduling, emit
    /// the event and animation, and run the boss transform chain.
    fn handle_death(&mut self, id: CombatantId) -> Option<AnimationToken> {
        let unit = self.state.combatant_mut(id)?;
        if unit.death_resolved || unit.is_alive() {
            return None;
        }
        unit.death_resolved = true;
        unit.removed = true;
        let side = unit.side;
        let roles = unit.roles;

        self.state.queue.remove(id);
        if self.state.selected_target == Some(id) {
            self.state.selected_target = None;
        }
        self.state.events.push(BattleEvent::Died { unit: id, side });

        let token = self.state.next_animation_token();
        self.state.directives.push(Directive::PlayAnimation {
            token,
            unit: id,
            cue: AnimationCue::Death,
        });

        if roles.transform_on_death && roles.is_small_boss && !roles.is_summoned_clone {
            self.try_transform(id);
        }

        Some(token)
    }

    /// Small-boss death path: spawn the big boss, once per battle. Without a
    /// configured spec (or with the once-only flag spent) this degrades to a
    /// plain removal.
    fn try_transform(&mut self, from: CombatantId) {
        if !self.state.boss.claim_big_boss() {
            return;
        }
        let Some(spec) = self.config.big_boss.clone() else {
            self.state.boss.abort_claim();
            return;
        };

        let id = self.state.allocate_id();
        let mut boss = Combatant::new(id, spec.name, Side::Enemy, spec.stats)
            .with_roles(RoleFlags {
                is_big_boss: true,
                ..RoleFlags::default()
            })
            .with_position(spec.position)
            .with_energy(0.0, spec.energy_max);
        boss.basic_skill = spec.basic_skill;
        boss.ultimate_skill = spec.ultimate_skill;
        self.state.roster.push(boss);
        self.state.boss.commit_big_boss();

        // Rebuild the round around the new unit, keeping the resolving
        // actor's position.
        match self.state.current_actor.filter(|&c| self.state.is_alive(c)) {
            Some(current) => self
                .state
                .queue
                .build_round_preserving(&self.state.roster, current),
            None => self.state.queue.build_round(&self.state.roster),
        }
        self.state
            .events
            .push(BattleEvent::BigBossSpawned { from, unit: id });
        self.state.events.push(BattleEvent::TurnOrderChanged);

        let token = self.state.next_animation_token();
        self.state.directives.push(Directive::PlayAnimation {
            token,
            unit: id,
            cue: AnimationCue::Transform,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BigBossSpec, Position};
    use crate::skill::{DefaultTargetRule, Effect, Skill, SummonSpawnRule, SummonTemplate, TargetScope, TargetSide};
    use crate::stats::StatBlock;

    fn fighter(id: u32, side: Side, spd: i32, atk: i32, hp: i32) -> Combatant {
        Combatant::new(
            CombatantId(id),
            format!("u{id}"),
            side,
            StatBlock::new(hp, atk, 0, spd).with_crit(0.0, 1.5),
        )
    }

    fn cast_token(directives: &[Directive], cue: AnimationCue) -> AnimationToken {
        directives
            .iter()
            .find_map(|d| match d {
                Directive::PlayAnimation { token, cue: c, .. } if *c == cue => Some(*token),
                _ => None,
            })
            .expect("expected animation directive")
    }

    fn tokens_for(directives: &[Directive], cue: AnimationCue) -> Vec<AnimationToken> {
        directives
            .iter()
            .filter_map(|d| match d {
                Directive::PlayAnimation { token, cue: c, .. } if *c == cue => Some(*token),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn battle_runs_to_player_victory() {
        let mut state = BattleState::from_roster(vec![
            fighter(0, Side::Player, 12, 100, 30),
            fighter(1, Side::Enemy, 8, 1, 30),
        ]);
        let config = BattleConfig::new();
        let mut engine = BattleEngine::new(&mut state, &config);

        engine.start();
        assert_eq!(engine.state().current_actor(), Some(CombatantId(0)));
        assert!(matches!(engine.state().phase(), BattlePhase::Idle));

        engine
            .submit_command(CombatantId(0), CommandKind::Attack, Some(CombatantId(1)))
            .unwrap();
        let directives = engine.take_directives();
        engine.animation_finished(cast_token(&directives, AnimationCue::Attack));

        // The kill leaves the turn pacing on the death animation.
        let directives = engine.take_directives();
        engine.animation_finished(cast_token(&directives, AnimationCue::Death));

        assert_eq!(
            engine.state().phase(),
            BattlePhase::Ended { player_won: true }
        );
        let events = engine.take_events();
        assert!(events
            .iter()
            .any(|e| matches!(e, BattleEvent::DamageDealt { amount, .. } if *amount == 100)));
        assert!(events
            .iter()
            .any(|e| matches!(e, BattleEvent::BattleEnded { player_won: true })));
        let report = engine.report().expect("battle ended");
        assert!(report.outcome.player_won);
    }

    #[test]
    fn crit_on_fully_absorbed_chip_hit_stays_zero() {
        let jab = Skill::new("jab")
            .targeting(TargetSide::Enemies, TargetScope::Single, DefaultTargetRule::FirstAlive)
            .with_effect(Effect::Damage {
                flat: 0,
                atk_ratio: 0.0,
                can_crit: true,
                ignore_def: false,
            });
        let mut state = BattleState::from_roster(vec![
            Combatant::new(
                CombatantId(0),
                "chipper".to_string(),
                Side::Player,
                StatBlock::new(100, 5, 0, 12).with_crit(1.0, 2.0),
            )
            .with_basic_skill(jab),
            Combatant::new(
                CombatantId(1),
                "wall".to_string(),
                Side::Enemy,
                StatBlock::new(100, 1, 10, 8).with_crit(0.0, 1.5),
            ),
        ]);
        let config = BattleConfig::new();
        let mut engine = BattleEngine::new(&mut state, &config);

        engine.start();
        engine
            .submit_command(CombatantId(0), CommandKind::Attack, Some(CombatantId(1)))
            .unwrap();
        let directives = engine.take_directives();
        engine.animation_finished(cast_token(&directives, AnimationCue::Attack));

        // Fully absorbed by def; the guaranteed crit must not conjure damage.
        let events = engine.take_events();
        assert!(events
            .iter()
            .any(|e| matches!(e, BattleEvent::DamageDealt { amount: 0, crit: true, .. })));
        assert!(events
            .iter()
            .all(|e| !matches!(e, BattleEvent::DamageDealt { amount: 1.., .. })));
        assert_eq!(
            engine.state().combatant(CombatantId(1)).unwrap().hp,
            100
        );
    }

    #[test]
    fn same_seed_replays_the_same_event_stream() {
        fn run(seed: u64) -> Vec<BattleEvent> {
            let mut state = BattleState::from_roster(vec![
                Combatant::new(
                    CombatantId(0),
                    "striker".to_string(),
                    Side::Player,
                    StatBlock::new(200, 10, 0, 12).with_crit(0.5, 2.0),
                ),
                Combatant::new(
                    CombatantId(1),
                    "brute".to_string(),
                    Side::Enemy,
                    StatBlock::new(60, 3, 0, 8).with_crit(0.5, 2.0),
                ),
            ]);
            let config = BattleConfig::new().with_seed(seed);
            let mut engine = BattleEngine::new(&mut state, &config);
            let mut events = Vec::new();

            engine.start();
            for _ in 0..32 {
                if matches!(engine.state().phase(), BattlePhase::Ended { .. }) {
                    break;
                }
                if matches!(engine.state().phase(), BattlePhase::Idle)
                    && engine.state().current_actor() == Some(CombatantId(0))
                {
                    engine
                        .submit_command(CombatantId(0), CommandKind::Attack, Some(CombatantId(1)))
                        .unwrap();
                }
                engine.tick(Duration::from_millis(500));
                for directive in engine.take_directives() {
                    let Directive::PlayAnimation { token, .. } = directive;
                    engine.animation_finished(token);
                }
                events.extend(engine.take_events());
            }
            events.extend(engine.take_events());
            events
        }

        let first = run(7);
        let second = run(7);
        assert_eq!(first, second);
        assert!(first
            .iter()
            .any(|e| matches!(e, BattleEvent::DamageDealt { .. })));
        assert!(first
            .iter()
            .any(|e| matches!(e, BattleEvent::BattleEnded { player_won: true })));
    }

    #[test]
    fn watchdog_fires_once_and_discards_stale_completion() {
        let mut state = BattleState::from_roster(vec![
            fighter(0, Side::Player, 12, 10, 100),
            fighter(1, Side::Enemy, 8, 1, 100),
        ]);
        let mut config = BattleConfig::new();
        config.busy_timeout = Duration::from_secs(1);
        config.max_wait_attack = Duration::from_secs(60);
        let mut engine = BattleEngine::new(&mut state, &config);

        engine.start();
        engine
            .submit_command(CombatantId(0), CommandKind::Attack, None)
            .unwrap();
        let stale = cast_token(&engine.take_directives(), AnimationCue::Attack);

        engine.tick(Duration::from_millis(999));
        assert!(engine.take_events().iter().all(|e| !matches!(e, BattleEvent::WatchdogFired { .. })));

        engine.tick(Duration::from_millis(2));
        let events = engine.take_events();
        assert_eq!(
            events
                .iter()
                .filter(|e| matches!(e, BattleEvent::WatchdogFired { .. }))
                .count(),
            1
        );
        // The forced advance moved on to the enemy's turn.
        assert_eq!(engine.state().current_actor(), Some(CombatantId(1)));

        // The abandoned cast's completion must not apply damage now.
        engine.animation_finished(stale);
        engine.tick(Duration::from_millis(50));
        let events = engine.take_events();
        assert!(events.iter().all(|e| !matches!(e, BattleEvent::DamageDealt { .. })));
        assert!(events.iter().all(|e| !matches!(e, BattleEvent::WatchdogFired { .. })));
    }

    #[test]
    fn double_boss_kill_spawns_one_big_boss() {
        let cleave = Skill::new("cleave")
            .targeting(TargetSide::Enemies, TargetScope::All, DefaultTargetRule::FirstAlive)
            .with_effect(Effect::Damage {
                flat: 999,
                atk_ratio: 0.0,
                can_crit: false,
                ignore_def: true,
            });
        let small_boss = |id: u32| {
            fighter(id, Side::Enemy, 8, 1, 30).with_roles(RoleFlags {
                is_small_boss: true,
                transform_on_death: true,
                ..RoleFlags::default()
            })
        };
        let mut state = BattleState::from_roster(vec![
            fighter(0, Side::Player, 12, 10, 100).with_basic_skill(cleave),
            small_boss(1),
            small_boss(2),
        ]);
        let mut config = BattleConfig::new();
        config.big_boss = Some(BigBossSpec {
            name: "overlord".to_string(),
            stats: StatBlock::new(200, 20, 0, 9).with_crit(0.0, 1.5),
            energy_max: 100.0,
            position: Position::ORIGIN,
            basic_skill: None,
            ultimate_skill: None,
        });
        let mut engine = BattleEngine::new(&mut state, &config);

        engine.start();
        engine
            .submit_command(CombatantId(0), CommandKind::Attack, None)
            .unwrap();
        let directives = engine.take_directives();
        engine.animation_finished(cast_token(&directives, AnimationCue::Attack));

        let directives = engine.take_directives();
        let deaths = tokens_for(&directives, AnimationCue::Death);
        assert_eq!(deaths.len(), 2);

        let events = engine.take_events();
        assert_eq!(
            events
                .iter()
                .filter(|e| matches!(e, BattleEvent::BigBossSpawned { .. }))
                .count(),
            1
        );
        assert_eq!(
            events
                .iter()
                .filter(|e| matches!(e, BattleEvent::Died { .. }))
                .count(),
            2
        );

        for token in deaths {
            engine.animation_finished(token);
        }
        // The big boss keeps the battle going and takes the next turn.
        let boss = engine
            .state()
            .combatant(CombatantId(3))
            .expect("big boss in roster");
        assert!(boss.roles.is_big_boss && boss.is_alive());
        assert_eq!(engine.state().current_actor(), Some(CombatantId(3)));
        assert!(matches!(engine.state().phase(), BattlePhase::Busy));
    }

    #[test]
    fn summon_fires_once_per_battle() {
        let summon = Skill::new("split")
            .targeting(TargetSide::Allies, TargetScope::Single, DefaultTargetRule::SelfOnly)
            .with_effect(Effect::Summon {
                template: SummonTemplate {
                    name: "clone".to_string(),
                    stats: StatBlock::new(20, 3, 0, 1).with_crit(0.0, 1.5),
                    destroy_on_death: true,
                },
                count: 2,
                spawn_rule: SummonSpawnRule::AroundCaster,
                join_queue: false,
            });
        let mut state = BattleState::from_roster(vec![
            fighter(0, Side::Player, 10, 1, 100),
            fighter(1, Side::Enemy, 15, 1, 100).with_basic_skill(summon),
        ]);
        let config = BattleConfig::new();
        let mut engine = BattleEngine::new(&mut state, &config);

        engine.start();
        // Round 1: the summoner acts first and splits.
        engine.tick(config.enemy_pre_delay);
        let directives = engine.take_directives();
        engine.animation_finished(cast_token(&directives, AnimationCue::Attack));
        assert_eq!(engine.state().living_on(Side::Enemy).len(), 3);

        // Player turn, then round 2: the summoner acts again.
        engine
            .submit_command(CombatantId(0), CommandKind::Attack, None)
            .unwrap();
        let directives = engine.take_directives();
        engine.animation_finished(cast_token(&directives, AnimationCue::Attack));

        engine.tick(config.enemy_pre_delay);
        let directives = engine.take_directives();
        engine.animation_finished(cast_token(&directives, AnimationCue::Attack));

        let events = engine.take_events();
        assert_eq!(
            events
                .iter()
                .filter(|e| matches!(e, BattleEvent::Summoned { .. }))
                .count(),
            2
        );
        assert_eq!(engine.state().living_on(Side::Enemy).len(), 3);
    }

    #[test]
    fn cut_in_window_caps_and_drops_excess() {
        let full = |id: u32, spd: i32| {
            fighter(id, Side::Player, spd, 5, 100).with_energy(100.0, 100.0)
        };
        let mut state = BattleState::from_roster(vec![
            full(0, 20),
            full(1, 15),
            full(2, 14),
            full(3, 13),
            fighter(4, Side::Enemy, 1, 1, 10_000),
        ]);
        let config = BattleConfig::new();
        let mut engine = BattleEngine::new(&mut state, &config);

        engine.start();
        for id in 1..=3 {
            engine.request_cut_in(CombatantId(id)).unwrap();
        }
        engine
            .submit_command(CombatantId(0), CommandKind::Attack, None)
            .unwrap();
        let directives = engine.take_directives();
        engine.animation_finished(cast_token(&directives, AnimationCue::Attack));

        let events = engine.take_events();
        // Actor 0's bar was still full after a normal turn, so it joined the
        // queue as the 4th request and fell past the per-window cap.
        assert_eq!(
            events
                .iter()
                .filter(|e| matches!(e, BattleEvent::CutInStarted { .. }))
                .count(),
            3
        );
        assert!(events
            .iter()
            .any(|e| matches!(e, BattleEvent::CutInsDropped { remaining: 1 })));
        for id in 1..=3 {
            let unit = engine.state().combatant(CombatantId(id)).unwrap();
            assert_eq!(unit.energy, 0.0, "cut-in drained #{id}");
        }
    }

    #[test]
    fn energy_flows_to_actor_and_victim() {
        let mut state = BattleState::from_roster(vec![
            fighter(0, Side::Player, 12, 10, 100),
            fighter(1, Side::Enemy, 8, 1, 100),
        ]);
        let config = BattleConfig::new();
        let mut engine = BattleEngine::new(&mut state, &config);

        engine.start();
        engine
            .submit_command(CombatantId(0), CommandKind::Attack, None)
            .unwrap();
        let directives = engine.take_directives();
        engine.animation_finished(cast_token(&directives, AnimationCue::Attack));

        let attacker = engine.state().combatant(CombatantId(0)).unwrap();
        let victim = engine.state().combatant(CombatantId(1)).unwrap();
        assert_eq!(attacker.energy, config.energy_gain_per_turn);
        assert_eq!(victim.energy, config.energy_gain_when_hit);
    }

    #[test]
    fn command_validation_rejects_bad_submissions() {
        let mut state = BattleState::from_roster(vec![
            fighter(0, Side::Player, 12, 10, 100),
            fighter(1, Side::Enemy, 8, 1, 100),
        ]);
        let config = BattleConfig::new();
        let mut engine = BattleEngine::new(&mut state, &config);

        engine.start();
        assert_eq!(
            engine.submit_command(CombatantId(1), CommandKind::Attack, None),
            Err(CommandError::NotCurrentActor {
                actor: CombatantId(1)
            })
        );
        assert_eq!(
            engine.submit_command(CombatantId(9), CommandKind::Attack, None),
            Err(CommandError::UnknownCombatant {
                actor: CombatantId(9)
            })
        );
        assert_eq!(
            engine.submit_command(CombatantId(0), CommandKind::Ultimate, None),
            Err(CommandError::InsufficientEnergy {
                actor: CombatantId(0)
            })
        );

        engine
            .submit_command(CombatantId(0), CommandKind::Attack, None)
            .unwrap();
        assert_eq!(
            engine.submit_command(CombatantId(0), CommandKind::Attack, None),
            Err(CommandError::Busy)
        );
    }

    #[test]
    fn pull_effect_moves_ally_and_suppresses_speed_resort() {
        let rally = Skill::new("rally")
            .targeting(TargetSide::Allies, TargetScope::Single, DefaultTargetRule::FirstAlive)
            .with_effect(Effect::PullTurn {
                mode: crate::skill::PullMode::AllTargetsToActNext,
                include_caster: false,
            })
            .with_effect(Effect::BuffStat {
                stat: crate::stats::StatKind::Spd,
                flat: 0.0,
                percent: 50.0,
                turns: 2,
            });
        let mut state = BattleState::from_roster(vec![
            fighter(0, Side::Player, 20, 5, 100).with_basic_skill(rally),
            fighter(1, Side::Player, 2, 5, 100),
            fighter(2, Side::Enemy, 10, 1, 100),
        ]);
        let config = BattleConfig::new();
        let mut engine = BattleEngine::new(&mut state, &config);

        engine.start();
        // Round order: 0 (20), 2 (10), 1 (2). Rally pulls #1 to act next.
        engine
            .submit_command(CombatantId(0), CommandKind::Attack, Some(CombatantId(1)))
            .unwrap();
        let directives = engine.take_directives();
        engine.animation_finished(cast_token(&directives, AnimationCue::Attack));

        // Despite the speed buff, the pulled position holds.
        assert_eq!(engine.state().current_actor(), Some(CombatantId(1)));
        let events = engine.take_events();
        assert!(events
            .iter()
            .any(|e| matches!(e, BattleEvent::TurnOrderChanged)));
    }

    #[test]
    fn legacy_ultimate_heals_party_when_flagged() {
        let mut healer = fighter(0, Side::Player, 12, 10, 100).with_energy(100.0, 100.0);
        healer.ultimate_heals_party = true;
        healer.ultimate_heal_flat = 20;
        let mut wounded = fighter(1, Side::Player, 5, 5, 100);
        wounded.hp = 40;
        let mut state = BattleState::from_roster(vec![
            healer,
            wounded,
            fighter(2, Side::Enemy, 8, 1, 100),
        ]);
        let config = BattleConfig::new();
        let mut engine = BattleEngine::new(&mut state, &config);

        engine.start();
        engine
            .submit_command(CombatantId(0), CommandKind::Ultimate, None)
            .unwrap();
        let directives = engine.take_directives();
        engine.animation_finished(cast_token(&directives, AnimationCue::Ultimate));

        assert_eq!(engine.state().combatant(CombatantId(1)).unwrap().hp, 60);
        // Ultimate use drains the bar and earns no per-turn energy.
        assert_eq!(engine.state().combatant(CombatantId(0)).unwrap().energy, 0.0);
    }
}
