//! Combatant data and the invariant-preserving mutators on it.

use std::fmt;

use crate::config::Position;
use crate::skill::Skill;
use crate::stats::{self, StatBlock, StatKind, StatModifier};

/// Unique identifier for a combatant, stable for the battle's lifetime.
/// Ids are assigned monotonically, including for units summoned mid-battle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CombatantId(pub u32);

impl fmt::Display for CombatantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Which side of the battle a combatant fights on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, strum::Display)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[strum(serialize_all = "snake_case")]
pub enum Side {
    Player,
    Enemy,
}

impl Side {
    pub fn opponent(self) -> Side {
        match self {
            Side::Player => Side::Enemy,
            Side::Enemy => Side::Player,
        }
    }
}

/// Boss-role flags governing singleton-spawn and transform-on-death rules.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RoleFlags {
    pub is_big_boss: bool,
    pub is_small_boss: bool,
    /// Summoned clones never transform on death and never summon themselves.
    pub is_summoned_clone: bool,
    /// Small boss only: run the transform death path instead of the generic
    /// one.
    pub transform_on_death: bool,
}

/// A participant in battle.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Combatant {
    pub id: CombatantId,
    pub name: String,
    pub side: Side,

    /// Authored stat line; never mutated by buffs.
    pub base: StatBlock,
    /// Effective stat line, `base` combined with active modifiers.
    pub stats: StatBlock,
    pub hp: i32,
    pub modifiers: Vec<StatModifier>,

    pub energy: f32,
    pub energy_max: f32,

    pub roles: RoleFlags,
    /// Set after this unit's summon effect has fired once this battle.
    pub has_used_summon: bool,
    /// Hard-delete on death instead of soft-disable. Either way the unit
    /// leaves all scheduling structures; this only changes whether it is
    /// still visible in snapshots.
    pub destroy_on_death: bool,
    /// Set once death resolution completed; guards double-processing.
    pub(crate) death_resolved: bool,
    /// Soft-disabled units stay in the roster but are not alive.
    pub(crate) removed: bool,

    /// Data-driven skills. `None` falls back to the built-in basic attack /
    /// legacy ultimate paths.
    pub basic_skill: Option<Skill>,
    pub ultimate_skill: Option<Skill>,

    /// Legacy ultimate behavior when no ultimate skill data is set: heal the
    /// party instead of dealing damage.
    pub ultimate_heals_party: bool,
    pub ultimate_heal_flat: i32,
    pub ultimate_heal_atk_ratio: f32,

    /// World position; only meaningful for summon placement.
    pub position: Position,
}

impl Combatant {
    pub fn new(id: CombatantId, name: impl Into<String>, side: Side, base: StatBlock) -> Self {
        let base = crate::stats::derive_stats(&base, &[]);
        Self {
            id,
            name: name.into(),
            side,
            base,
            stats: base,
            hp: base.max_hp,
            modifiers: Vec::new(),
            energy: 0.0,
            energy_max: 100.0,
            roles: RoleFlags::default(),
            has_used_summon: false,
            destroy_on_death: false,
            death_resolved: false,
            removed: false,
            basic_skill: None,
            ultimate_skill: None,
            ultimate_heals_party: false,
            ultimate_heal_flat: 0,
            ultimate_heal_atk_ratio: 0.0,
            position: Position::ORIGIN,
        }
    }

    pub fn with_roles(mut self, roles: RoleFlags) -> Self {
        self.roles = roles;
        self
    }

    pub fn with_basic_skill(mut self, skill: Skill) -> Self {
        self.basic_skill = Some(skill);
        self
    }

    pub fn with_ultimate_skill(mut self, skill: Skill) -> Self {
        self.ultimate_skill = Some(skill);
        self
    }

    pub fn with_position(mut self, position: Position) -> Self {
        self.position = position;
        self
    }

    pub fn with_energy(mut self, energy: f32, energy_max: f32) -> Self {
        self.energy_max = energy_max.max(0.0);
        self.energy = energy.clamp(0.0, self.energy_max);
        self
    }

    pub fn is_alive(&self) -> bool {
        !self.removed && self.hp > 0
    }

    pub fn is_dead(&self) -> bool {
        !self.is_alive()
    }

    /// Hp as a fraction of max, for lowest-hp targeting.
    pub fn hp_percent(&self) -> f32 {
        if self.stats.max_hp <= 0 {
            return 0.0;
        }
        self.hp as f32 / self.stats.max_hp as f32
    }

    // =========================
    // HP
    // =========================

    /// Apply raw damage, clamped at zero hp. Returns the amount applied.
    pub fn take_damage(&mut self, raw: i32) -> i32 {
        let dmg = raw.max(0);
        self.hp = (self.hp - dmg).max(0);
        dmg
    }

    /// Apply a heal, clamped so hp never exceeds max. Returns the actual
    /// amount restored.
    pub fn heal(&mut self, raw: i32) -> i32 {
        let before = self.hp;
        self.hp = (self.hp + raw.max(0)).clamp(0, self.stats.max_hp);
        self.hp - before
    }

    // =========================
    // Energy
    // =========================

    pub fn has_full_energy(&self) -> bool {
        self.energy_max > f32::EPSILON && self.energy >= self.energy_max - 0.001
    }

    /// Whether the bar covers `cost`; a non-positive cost means "full bar".
    pub fn has_energy_for(&self, cost: f32) -> bool {
        let cost = if cost <= 0.0 { self.energy_max } else { cost };
        self.energy_max > f32::EPSILON && self.energy >= cost - 0.001
    }

    pub fn add_energy(&mut self, amount: f32) {
        if self.energy_max <= f32::EPSILON {
            return;
        }
        self.energy = (self.energy + amount.max(0.0)).clamp(0.0, self.energy_max);
    }

    /// Spend `cost` energy; a non-positive cost drains the full bar.
    pub fn spend_energy(&mut self, cost: f32) {
        if self.energy_max <= f32::EPSILON {
            return;
        }
        let cost = if cost <= 0.0 { self.energy_max } else { cost };
        self.energy = (self.energy - cost).clamp(0.0, self.energy_max);
    }

    // =========================
    // Modifiers
    // =========================

    /// Append a modifier and recompute derived stats, preserving the hp
    /// ratio across max-hp changes.
    pub fn apply_modifier(&mut self, stat: StatKind, flat: f32, percent: f32, turns: u32) {
        self.modifiers
            .push(StatModifier::new(stat, flat, percent, turns));
        self.recalculate_stats();
    }

    /// Called once per completed full turn; expires modifiers.
    pub fn tick_modifiers_turn_end(&mut self) {
        if stats::tick_turn_end(&mut self.modifiers) {
            self.recalculate_stats();
        }
    }

    fn recalculate_stats(&mut self) {
        let hp_ratio = if self.stats.max_hp > 0 {
            self.hp as f32 / self.stats.max_hp as f32
        } else {
            1.0
        };

        self.stats = stats::derive_stats(&self.base, &self.modifiers);
        self.hp = ((self.stats.max_hp as f32 * hp_ratio).round() as i32).clamp(0, self.stats.max_hp);
    }
}
