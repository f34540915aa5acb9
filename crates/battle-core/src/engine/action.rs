//! The explicit step model for an in-flight action.
//!
//! An action in flight is a small state machine: each suspension point is a
//! step holding its own timeout, and the action carries the epoch it was
//! started under. Any resume path compares that epoch against the live one
//! and silently stops mutating on mismatch; already-applied effects are
//! never reversed.

use std::time::Duration;

use crate::events::AnimationToken;
use crate::skill::Skill;
use crate::state::CombatantId;

/// What the actor is doing this turn.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum ActionPlan {
    /// Built-in basic attack: `max(1, atk - def)`, crit-eligible.
    LegacyBasic,
    /// Built-in ultimate: basic damage scaled by the configured multiplier
    /// and flat bonus, or a party heal for units flagged that way.
    LegacyUltimate,
    /// Data-driven skill with an ordered effect list.
    DataSkill(Skill),
}

impl ActionPlan {
    pub fn is_ultimate(&self) -> bool {
        match self {
            ActionPlan::LegacyBasic => false,
            ActionPlan::LegacyUltimate => true,
            ActionPlan::DataSkill(skill) => skill.is_ultimate,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            ActionPlan::LegacyBasic => "basic_attack",
            ActionPlan::LegacyUltimate => "ultimate",
            ActionPlan::DataSkill(skill) => &skill.name,
        }
    }
}

/// Current suspension point of an active action.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum ActionStep {
    /// Auto-initiated actors wait a beat before acting.
    PreDelay { remaining: Duration },
    /// Waiting for the cast animation to complete (or the cap to elapse;
    /// the cap counts as completion).
    CastWait {
        token: AnimationToken,
        remaining: Duration,
    },
    /// Waiting for death animations of units killed by this action. The
    /// deaths resolve when every token reports in or the cap elapses.
    DeathWait {
        tokens: Vec<AnimationToken>,
        remaining: Duration,
    },
}

/// One action in flight. Exactly zero or one exists at any time; suspension
/// points are the only places where timers or queued commands interleave.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct ActiveAction {
    /// Epoch captured when the scheduler committed to this actor.
    pub epoch: u64,
    pub actor: CombatantId,
    pub plan: ActionPlan,
    /// Targets locked at action start; re-validated at application time.
    pub targets: Vec<CombatantId>,
    pub step: ActionStep,
    /// Set when a pull or summon already reordered the queue this action;
    /// suppresses the speed-buff tail re-sort to avoid conflicting reorders.
    pub queue_reordered: bool,
}
