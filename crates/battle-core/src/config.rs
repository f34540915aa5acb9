//! Battle configuration constants and tunable parameters.

use std::time::Duration;

use crate::skill::Skill;
use crate::stats::StatBlock;

/// A 2D world position. Only used to place summoned units; the engine has no
/// other spatial reasoning.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub const ORIGIN: Self = Self { x: 0.0, y: 0.0 };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Unit spawned when a small boss flagged `transform_on_death` dies.
///
/// Without one configured, the transform death path degrades to a plain
/// removal.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BigBossSpec {
    pub name: String,
    pub stats: StatBlock,
    pub energy_max: f32,
    pub position: Position,
    pub basic_skill: Option<Skill>,
    pub ultimate_skill: Option<Skill>,
}

/// Tunable parameters for one battle instance.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BattleConfig {
    /// Watchdog: how long the scheduler may sit in Busy before it force
    /// advances past the stuck action.
    pub busy_timeout: Duration,

    /// Delay before a non-interactive actor's action auto-initiates.
    pub enemy_pre_delay: Duration,

    /// Caps on how long the engine waits for animation completion signals.
    /// A cap elapsing counts as completion, never as failure.
    pub max_wait_attack: Duration,
    pub max_wait_ultimate: Duration,
    pub max_wait_death: Duration,

    /// Legacy ultimate path: basic damage × multiplier + flat bonus.
    pub ultimate_damage_multiplier: f32,
    pub ultimate_flat_bonus: i32,

    /// Energy granted to an actor for completing a normal turn.
    pub energy_gain_per_turn: f32,
    /// Energy granted to a victim per damaging hit taken.
    pub energy_gain_when_hit: f32,

    /// Cut-in processing bounds for one window between turns. Exceeding
    /// either clears the remaining queue instead of looping.
    pub cutin_max_per_window: usize,
    pub cutin_budget: Duration,

    /// Preconfigured summon spawn slots, consumed round-robin.
    pub spawn_slots: Vec<Position>,

    /// Big boss spawned by the small-boss transform death path.
    pub big_boss: Option<BigBossSpec>,

    /// Base seed for all combat rolls.
    pub seed: u64,
}

impl BattleConfig {
    // ===== hard limits =====
    /// Rebuild attempts before `advance` concludes nobody is alive.
    pub const MAX_ROUND_REBUILDS: usize = 3;

    // ===== runtime-tunable defaults =====
    pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);
    pub const DEFAULT_ENEMY_PRE_DELAY: Duration = Duration::from_millis(400);
    pub const DEFAULT_MAX_WAIT_ATTACK: Duration = Duration::from_millis(2000);
    pub const DEFAULT_MAX_WAIT_ULTIMATE: Duration = Duration::from_millis(2500);
    pub const DEFAULT_MAX_WAIT_DEATH: Duration = Duration::from_millis(2000);
    pub const DEFAULT_CUTIN_MAX_PER_WINDOW: usize = 3;
    pub const DEFAULT_CUTIN_BUDGET: Duration = Duration::from_millis(2000);

    pub fn new() -> Self {
        Self {
            busy_timeout: Self::DEFAULT_BUSY_TIMEOUT,
            enemy_pre_delay: Self::DEFAULT_ENEMY_PRE_DELAY,
            max_wait_attack: Self::DEFAULT_MAX_WAIT_ATTACK,
            max_wait_ultimate: Self::DEFAULT_MAX_WAIT_ULTIMATE,
            max_wait_death: Self::DEFAULT_MAX_WAIT_DEATH,
            ultimate_damage_multiplier: 2.0,
            ultimate_flat_bonus: 0,
            energy_gain_per_turn: 20.0,
            energy_gain_when_hit: 10.0,
            cutin_max_per_window: Self::DEFAULT_CUTIN_MAX_PER_WINDOW,
            cutin_budget: Self::DEFAULT_CUTIN_BUDGET,
            spawn_slots: Vec::new(),
            big_boss: None,
            seed: 0,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

impl Default for BattleConfig {
    fn default() -> Self {
        Self::new()
    }
}
