pub mod config;
pub mod engine;
pub mod events;
pub mod rng;
pub mod skill;
pub mod snapshot;
pub mod state;
pub mod stats;

pub use config::{BattleConfig, BigBossSpec, Position};
pub use engine::{BattleEngine, CommandError, CommandKind};
pub use events::{AnimationCue, AnimationToken, BattleEvent, Directive};
pub use rng::{compute_seed, PcgRng, RngOracle};
pub use skill::{
    DefaultTargetRule, Effect, PullMode, Skill, SkillAnimation, SummonSpawnRule, SummonTemplate,
    TargetScope, TargetSide,
};
pub use snapshot::{BattleOutcome, BattleReport, BattleSnapshot, CombatantSnapshot};
pub use state::{BattlePhase, BattleState, Combatant, CombatantId, RoleFlags, Side, TurnQueue};
pub use stats::{StatBlock, StatKind, StatModifier};
