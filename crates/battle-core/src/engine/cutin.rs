//! Out-of-turn ultimate requests.
//!
//! A combatant whose energy fills while it is not the current actor may cut
//! in with its ultimate. Requests queue FIFO, deduplicated per caster, and
//! are processed in the window between an action completing and the scheduler
//! committing to the next actor.

use std::collections::VecDeque;

use crate::state::CombatantId;

/// Pending cut-in requests. Conditions are re-checked at pop time; the queue
/// itself only guarantees order and per-caster uniqueness.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct CutInQueue {
    entries: VecDeque<CombatantId>,
}

impl CutInQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a caster. Returns false if it was already queued.
    pub fn push(&mut self, caster: CombatantId) -> bool {
        if self.entries.contains(&caster) {
            return false;
        }
        self.entries.push_back(caster);
        true
    }

    pub fn pop(&mut self) -> Option<CombatantId> {
        self.entries.pop_front()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop everything. Used when processing exceeds its count or time
    /// budget: availability over fairness.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
