//! Events and directives emitted by the engine.
//!
//! Events tell observers what happened; directives tell the shell what to ask
//! of external collaborators (animation playback). Both accumulate in
//! outboxes on the battle state and are drained after every engine call, so
//! collaborators can never mutate combat state directly.

use crate::state::{CombatantId, Side};
use crate::stats::StatKind;

/// Correlates an animation request with its completion signal. Tokens are
/// unique per battle; a completion for an unknown or superseded token is
/// silently ignored.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct AnimationToken(pub u64);

/// Animator state the collaborator should play.
#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::Display, strum::AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum AnimationCue {
    Attack,
    Ultimate,
    Death,
    Summon,
    Transform,
}

/// A command to an external collaborator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Directive {
    /// Play an animator state and report completion via
    /// `BattleEngine::animation_finished`. The engine enforces its own wait
    /// cap, so a collaborator that never answers only delays, never blocks.
    PlayAnimation {
        token: AnimationToken,
        unit: CombatantId,
        cue: AnimationCue,
    },
}

/// Observable battle happenings, in commit order.
#[derive(Clone, Debug, PartialEq)]
pub enum BattleEvent {
    RoundStarted {
        round: u64,
    },
    /// The scheduler committed to a new actor under a fresh epoch.
    TurnStarted {
        actor: CombatantId,
        epoch: u64,
        /// False for auto-initiated (enemy) turns.
        interactive: bool,
    },
    ActionStarted {
        actor: CombatantId,
        skill: String,
        is_ultimate: bool,
    },
    DamageDealt {
        attacker: CombatantId,
        target: CombatantId,
        amount: i32,
        crit: bool,
    },
    Healed {
        source: CombatantId,
        target: CombatantId,
        amount: i32,
    },
    BuffApplied {
        source: CombatantId,
        target: CombatantId,
        stat: StatKind,
    },
    TurnOrderChanged,
    Summoned {
        caster: CombatantId,
        unit: CombatantId,
    },
    Died {
        unit: CombatantId,
        side: Side,
    },
    BigBossSpawned {
        from: CombatantId,
        unit: CombatantId,
    },
    /// The watchdog force-advanced a stalled turn.
    WatchdogFired {
        epoch: u64,
    },
    CutInStarted {
        caster: CombatantId,
    },
    /// Cut-in processing hit its count or time budget and dropped the rest.
    CutInsDropped {
        remaining: usize,
    },
    /// Scheduler invariant broken; the battle is ended defensively.
    InvariantViolation {
        detail: String,
    },
    BattleEnded {
        player_won: bool,
    },
}
