//! Read-only views handed to the presentation and progression layers.
//!
//! Snapshots flow one way: the core publishes them after committed state
//! changes and nothing ever flows back in. The report is the single
//! end-of-battle export for the progression layer.

use crate::state::{Combatant, CombatantId, Side};

/// Final result of a battle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BattleOutcome {
    pub player_won: bool,
}

/// One combatant's externally visible status.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CombatantSnapshot {
    pub id: CombatantId,
    pub name: String,
    pub side: Side,
    pub hp: i32,
    pub max_hp: i32,
    pub energy: f32,
    pub energy_max: f32,
    pub alive: bool,
    pub is_big_boss: bool,
}

impl CombatantSnapshot {
    pub(crate) fn of(c: &Combatant) -> Self {
        Self {
            id: c.id,
            name: c.name.clone(),
            side: c.side,
            hp: c.hp,
            max_hp: c.stats.max_hp,
            energy: c.energy,
            energy_max: c.energy_max,
            alive: c.is_alive(),
            is_big_boss: c.roles.is_big_boss,
        }
    }
}

/// Full read-only view of the battle for HUD-style consumers.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BattleSnapshot {
    pub round: u64,
    pub epoch: u64,
    pub current_actor: Option<CombatantId>,
    /// Living combatants from the cursor onward, in action order.
    pub turn_order: Vec<CombatantId>,
    pub combatants: Vec<CombatantSnapshot>,
    pub outcome: Option<BattleOutcome>,
}

/// One-way export to the progression layer, produced once at battle end.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BattleReport {
    pub outcome: BattleOutcome,
    pub combatants: Vec<CombatantSnapshot>,
}
