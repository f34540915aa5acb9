//! Authoritative battle state.
//!
//! A [`BattleState`] owns the combatant arena, the turn queue, and every piece
//! of scheduler bookkeeping. There is no ambient global: all components
//! receive the context explicitly and all mutation flows through
//! [`crate::engine::BattleEngine`].

mod combatant;
mod turn;

pub use combatant::{Combatant, CombatantId, RoleFlags, Side};
pub use turn::TurnQueue;

use std::time::Duration;

use crate::engine::action::ActiveAction;
use crate::engine::boss::BossLedger;
use crate::engine::cutin::CutInQueue;
use crate::events::{BattleEvent, Directive};
use crate::snapshot::{BattleOutcome, BattleSnapshot, CombatantSnapshot};

/// Scheduler phase of the battle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BattlePhase {
    /// Waiting for a command on the current actor.
    Idle,
    /// An action is executing.
    Busy,
    /// Battle decided; terminal.
    Ended { player_won: bool },
}

/// Everything one battle instance owns.
///
/// Combatants live in an arena by stable id; "destroy" marks a unit dead and
/// strips it from scheduling structures, with the arena slot retained (or
/// tombstoned, per the unit's destroy-on-death policy).
#[derive(Clone, Debug)]
pub struct BattleState {
    pub(crate) roster: Vec<Combatant>,
    pub(crate) queue: TurnQueue,
    next_id: u32,

    pub(crate) phase: BattlePhase,
    /// Monotonic counter bumped every time the scheduler commits to a new
    /// current actor. In-flight work captures it and aborts on mismatch.
    pub(crate) epoch: u64,
    pub(crate) current_actor: Option<CombatantId>,
    /// Player-chosen enemy target, used when a command carries no explicit
    /// target. Cleared when the selection dies.
    pub(crate) selected_target: Option<CombatantId>,

    pub(crate) active: Option<ActiveAction>,
    pub(crate) cutins: CutInQueue,
    pub(crate) boss: BossLedger,

    /// Watchdog accumulator while Busy, and the epoch it guards.
    pub(crate) busy_elapsed: Duration,
    pub(crate) watchdog_epoch: u64,

    /// Action sequence number feeding roll seeds.
    pub(crate) nonce: u64,
    next_token: u64,
    /// Round-robin cursor over the configured summon spawn slots.
    pub(crate) spawn_cursor: usize,

    pub(crate) events: Vec<BattleEvent>,
    pub(crate) directives: Vec<Directive>,
}

impl BattleState {
    /// Build a battle from an authored roster. Ids must be unique; the next
    /// runtime-assigned id starts above the highest authored one.
    ///
    /// If the roster already fields a big boss, the once-only ledger starts
    /// spent so no transform can ever spawn a second one.
    pub fn from_roster(roster: Vec<Combatant>) -> Self {
        debug_assert!(
            {
                let mut ids: Vec<u32> = roster.iter().map(|c| c.id.0).collect();
                ids.sort_unstable();
                ids.windows(2).all(|w| w[0] != w[1])
            },
            "duplicate combatant ids in roster"
        );

        let next_id = roster.iter().map(|c| c.id.0 + 1).max().unwrap_or(0);
        let big_boss_seen = roster.iter().any(|c| c.roles.is_big_boss);

        Self {
            roster,
            queue: TurnQueue::new(),
            next_id,
            phase: BattlePhase::Idle,
            epoch: 0,
            current_actor: None,
            selected_target: None,
            active: None,
            cutins: CutInQueue::new(),
            boss: BossLedger::new(big_boss_seen),
            busy_elapsed: Duration::ZERO,
            watchdog_epoch: 0,
            nonce: 0,
            next_token: 0,
            spawn_cursor: 0,
            events: Vec::new(),
            directives: Vec::new(),
        }
    }

    // =========================
    // Lookups
    // =========================

    pub fn combatant(&self, id: CombatantId) -> Option<&Combatant> {
        self.roster.iter().find(|c| c.id == id)
    }

    pub fn combatant_mut(&mut self, id: CombatantId) -> Option<&mut Combatant> {
        self.roster.iter_mut().find(|c| c.id == id)
    }

    pub fn is_alive(&self, id: CombatantId) -> bool {
        self.combatant(id).is_some_and(|c| c.is_alive())
    }

    /// Living combatant ids on one side, in roster order.
    pub fn living_on(&self, side: Side) -> Vec<CombatantId> {
        self.roster
            .iter()
            .filter(|c| c.side == side && c.is_alive())
            .map(|c| c.id)
            .collect()
    }

    pub fn all_dead(&self, side: Side) -> bool {
        self.roster
            .iter()
            .filter(|c| c.side == side)
            .all(|c| c.is_dead())
    }

    pub(crate) fn allocate_id(&mut self) -> CombatantId {
        let id = CombatantId(self.next_id);
        self.next_id += 1;
        id
    }

    pub(crate) fn next_animation_token(&mut self) -> crate::events::AnimationToken {
        let token = crate::events::AnimationToken(self.next_token);
        self.next_token += 1;
        token
    }

    // =========================
    // Queries
    // =========================

    pub fn phase(&self) -> BattlePhase {
        self.phase
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn current_actor(&self) -> Option<CombatantId> {
        self.current_actor
    }

    pub fn outcome(&self) -> Option<BattleOutcome> {
        match self.phase {
            BattlePhase::Ended { player_won } => Some(BattleOutcome { player_won }),
            _ => None,
        }
    }

    /// Living combatants from the cursor onward, in action order.
    pub fn turn_order_preview(&self) -> Vec<CombatantId> {
        self.queue.preview(&self.roster)
    }

    /// Read-only view for presentation. Hard-deleted units are omitted;
    /// soft-disabled ones appear with `alive: false`.
    pub fn snapshot(&self) -> BattleSnapshot {
        BattleSnapshot {
            round: self.queue.round(),
            epoch: self.epoch,
            current_actor: self.current_actor,
            turn_order: self.turn_order_preview(),
            combatants: self
                .roster
                .iter()
                .filter(|c| !(c.destroy_on_death && c.is_dead()))
                .map(CombatantSnapshot::of)
                .collect(),
            outcome: self.outcome(),
        }
    }
}
