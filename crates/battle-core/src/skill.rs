//! Data-driven skill and effect definitions.
//!
//! A skill is a targeting rule plus an ordered effect list. Effects are plain
//! data; all interpretation happens in the engine's executor so authored
//! content stays declarative.

use crate::stats::{StatBlock, StatKind};

/// Which side of the battle a skill targets, relative to the caster.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TargetSide {
    Enemies,
    Allies,
}

/// Whether a skill hits one resolved target or the whole candidate pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TargetScope {
    Single,
    All,
}

/// Fallback selection rule when no valid manual target was supplied.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DefaultTargetRule {
    /// First pool member in enumeration order.
    FirstAlive,
    /// Pool member minimizing `hp / max_hp`, ties by enumeration order.
    LowestHpPercent,
    /// The caster. A skill targeting opponents never defaults to the caster;
    /// the resolver falls back to `FirstAlive` in that case.
    SelfOnly,
}

/// Which animation the cast phase plays before effects apply.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, strum::Display, strum::EnumString,
)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum SkillAnimation {
    None,
    Attack,
    Ultimate,
}

/// Turn-order manipulation modes for [`Effect::PullTurn`].
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, strum::Display, strum::EnumString,
)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum PullMode {
    /// Move the first resolved target to act next.
    TargetToActNext,
    /// Move every resolved target to act next, preserving relative order.
    AllTargetsToActNext,
    /// Move all living allies of the caster to act next.
    AlliesToActNext,
    /// Move the caster itself to act next.
    SelfToActNext,
}

/// Where summoned units are placed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SummonSpawnRule {
    /// Round-robin across the battle's preconfigured spawn slots.
    SpawnSlots,
    /// Distribute evenly around the caster's position.
    AroundCaster,
}

/// Stat line and name for a summoned unit.
///
/// Summons always spawn as enemy-side clones: they never transform on death
/// and never summon again themselves, regardless of the caster's own flags.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SummonTemplate {
    pub name: String,
    pub stats: StatBlock,
    /// Hard-delete on death instead of soft-disable.
    pub destroy_on_death: bool,
}

/// The actual effect to apply. Executed in declaration order per skill.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Effect {
    // ========================================================================
    // Damage / Heal
    // ========================================================================
    Damage {
        flat: i32,
        atk_ratio: f32,
        can_crit: bool,
        ignore_def: bool,
    },
    Heal {
        flat: i32,
        atk_ratio: f32,
    },

    // ========================================================================
    // Buffs
    // ========================================================================
    BuffStat {
        stat: StatKind,
        flat: f32,
        /// Whole percents above magnitude 2 are divided by 100 on apply.
        percent: f32,
        turns: u32,
    },

    // ========================================================================
    // Turn order
    // ========================================================================
    PullTurn {
        mode: PullMode,
        /// For `AlliesToActNext`: whether the caster is pulled too.
        include_caster: bool,
    },

    // ========================================================================
    // Summoning
    // ========================================================================
    Summon {
        template: SummonTemplate,
        count: u32,
        spawn_rule: SummonSpawnRule,
        /// Insert the new units into the turn queue right after the cursor.
        join_queue: bool,
    },
}

/// A castable skill: targeting rule + ordered effects.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Skill {
    pub name: String,
    pub is_ultimate: bool,
    /// Energy cost; `<= 0` on an ultimate means "drain the full bar".
    pub energy_cost: f32,
    /// Whether full energy auto-enqueues this ultimate as a cut-in.
    pub allow_cut_in: bool,
    /// For allies-all casts: whether the caster is in the target list.
    pub include_self_when_allies_all: bool,
    pub target_side: TargetSide,
    pub target_scope: TargetScope,
    pub default_target_rule: DefaultTargetRule,
    pub animation: SkillAnimation,
    pub effects: Vec<Effect>,
}

impl Skill {
    /// A bare single-target enemy skill; callers push effects onto it.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_ultimate: false,
            energy_cost: 0.0,
            allow_cut_in: true,
            include_self_when_allies_all: true,
            target_side: TargetSide::Enemies,
            target_scope: TargetScope::Single,
            default_target_rule: DefaultTargetRule::FirstAlive,
            animation: SkillAnimation::Attack,
            effects: Vec::new(),
        }
    }

    pub fn ultimate(name: impl Into<String>) -> Self {
        let mut skill = Self::new(name);
        skill.is_ultimate = true;
        skill.animation = SkillAnimation::Ultimate;
        skill
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn targeting(
        mut self,
        side: TargetSide,
        scope: TargetScope,
        rule: DefaultTargetRule,
    ) -> Self {
        self.target_side = side;
        self.target_scope = scope;
        self.default_target_rule = rule;
        self
    }
}
