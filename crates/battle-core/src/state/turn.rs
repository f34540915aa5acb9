//! The speed-ordered turn queue.
//!
//! One round holds exactly the combatants alive at the instant it was built,
//! sorted by descending speed with a deterministic id tiebreak. All mutators
//! are no-ops for missing or dead units; they never fail.

use std::cmp::Ordering;

use crate::config::BattleConfig;
use crate::state::combatant::{Combatant, CombatantId};

/// Speed queue plus cursor. The cursor points at the combatant whose turn is
/// being resolved (or is up next while Idle).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TurnQueue {
    entries: Vec<CombatantId>,
    cursor: usize,
    round: u64,
}

fn find(roster: &[Combatant], id: CombatantId) -> Option<&Combatant> {
    roster.iter().find(|c| c.id == id)
}

fn is_alive(roster: &[Combatant], id: CombatantId) -> bool {
    find(roster, id).is_some_and(|c| c.is_alive())
}

/// Round ordering: speed descending, ties by id ascending. Deterministic so
/// battles replay identically.
fn round_order(roster: &[Combatant], a: CombatantId, b: CombatantId) -> Ordering {
    let spd = |id| find(roster, id).map_or(0, |c| c.stats.spd);
    spd(b).cmp(&spd(a)).then(a.cmp(&b))
}

impl TurnQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Completed round count; increments on every rebuild.
    pub fn round(&self) -> u64 {
        self.round
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn entries(&self) -> &[CombatantId] {
        &self.entries
    }

    /// The combatant under the cursor, if any.
    pub fn current(&self) -> Option<CombatantId> {
        self.entries.get(self.cursor).copied()
    }

    /// Collect all living combatants, sort, reset the cursor.
    pub fn build_round(&mut self, roster: &[Combatant]) {
        self.entries = roster
            .iter()
            .filter(|c| c.is_alive())
            .map(|c| c.id)
            .collect();
        self.entries.sort_by(|&a, &b| round_order(roster, a, b));
        self.cursor = 0;
        self.round += 1;
    }

    /// Rebuild the round but keep the cursor on `keep` so the currently
    /// resolving actor's position survives the rebuild.
    pub fn build_round_preserving(&mut self, roster: &[Combatant], keep: CombatantId) {
        self.build_round(roster);
        if let Some(pos) = self.entries.iter().position(|&id| id == keep) {
            self.cursor = pos;
        }
    }

    /// Move the cursor past `finished` to the next living combatant,
    /// rebuilding new rounds as the queue runs out.
    ///
    /// Returns `None` when no living combatant can be found even after
    /// bounded rebuilds; the caller must resolve battle end then.
    pub fn advance_cursor(
        &mut self,
        roster: &[Combatant],
        finished: Option<CombatantId>,
    ) -> Option<CombatantId> {
        // Only step off the finished actor if it still occupies the cursor;
        // if it died and was removed, the remainder already shifted into
        // place.
        if self.current().is_some() && self.current() == finished {
            self.cursor += 1;
        }

        for _ in 0..=BattleConfig::MAX_ROUND_REBUILDS {
            while self.cursor < self.entries.len() {
                let id = self.entries[self.cursor];
                if is_alive(roster, id) {
                    return Some(id);
                }
                self.cursor += 1;
            }
            if roster.iter().all(|c| c.is_dead()) {
                return None;
            }
            self.build_round(roster);
        }

        None
    }

    /// Remove a dead combatant, keeping the position of the untouched
    /// remainder. No-op if the unit is not queued.
    pub fn remove(&mut self, id: CombatantId) {
        let Some(pos) = self.entries.iter().position(|&e| e == id) else {
            return;
        };
        self.entries.remove(pos);
        if pos < self.cursor {
            self.cursor -= 1;
        }
    }

    /// Reinsert `id` immediately after the cursor. Ordering-only; round
    /// composition is unchanged.
    pub fn pull_to_act_next(&mut self, id: CombatantId) {
        self.pull_many_to_act_next(&[id]);
    }

    /// Pull several combatants to act next as a block, preserving their
    /// relative order in the current queue.
    pub fn pull_many_to_act_next(&mut self, ids: &[CombatantId]) {
        // Take pulled entries in queue order so the block stays stable.
        let pulled: Vec<CombatantId> = self
            .entries
            .iter()
            .copied()
            .filter(|id| ids.contains(id))
            .collect();
        if pulled.is_empty() {
            return;
        }

        let current = self.current();
        self.entries.retain(|id| !pulled.contains(id));

        // Re-anchor the cursor on the acting combatant; if the cursor entry
        // itself was pulled, the block lands where it stood.
        self.cursor = current
            .and_then(|c| self.entries.iter().position(|&id| id == c))
            .unwrap_or_else(|| self.cursor.min(self.entries.len()));

        let at = (self.cursor + 1).min(self.entries.len());
        for (offset, id) in pulled.into_iter().enumerate() {
            self.entries.insert(at + offset, id);
        }
    }

    /// Insert a newly created combatant right after the cursor.
    pub fn insert_after_cursor(&mut self, id: CombatantId) {
        let at = (self.cursor + 1).min(self.entries.len());
        self.entries.insert(at, id);
    }

    /// Re-sort only the segment strictly after the cursor: alive first, then
    /// speed descending, ties by id. The resolving actor and already-executed
    /// history are never reordered.
    pub fn reorder_tail_preserving_head(&mut self, roster: &[Combatant]) {
        let start = (self.cursor + 1).min(self.entries.len());
        self.entries[start..].sort_by(|&a, &b| {
            is_alive(roster, b)
                .cmp(&is_alive(roster, a))
                .then_with(|| round_order(roster, a, b))
        });
    }

    /// Living combatants from the cursor onward, in action order.
    pub fn preview(&self, roster: &[Combatant]) -> Vec<CombatantId> {
        self.entries[self.cursor.min(self.entries.len())..]
            .iter()
            .copied()
            .filter(|&id| is_alive(roster, id))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::combatant::Side;
    use crate::stats::StatBlock;

    fn unit(id: u32, side: Side, spd: i32) -> Combatant {
        Combatant::new(
            CombatantId(id),
            format!("u{id}"),
            side,
            StatBlock::new(30, 10, 0, spd),
        )
    }

    fn roster() -> Vec<Combatant> {
        vec![
            unit(0, Side::Player, 12),
            unit(1, Side::Player, 8),
            unit(2, Side::Enemy, 12),
            unit(3, Side::Enemy, 15),
        ]
    }

    #[test]
    fn build_round_sorts_by_speed_then_id() {
        let roster = roster();
        let mut queue = TurnQueue::new();
        queue.build_round(&roster);
        assert_eq!(
            queue.entries(),
            &[CombatantId(3), CombatantId(0), CombatantId(2), CombatantId(1)]
        );
        assert_eq!(queue.cursor(), 0);
    }

    #[test]
    fn dead_units_are_excluded_at_build() {
        let mut roster = roster();
        roster[3].take_damage(999);
        let mut queue = TurnQueue::new();
        queue.build_round(&roster);
        assert_eq!(
            queue.entries(),
            &[CombatantId(0), CombatantId(2), CombatantId(1)]
        );
    }

    #[test]
    fn advance_skips_dead_and_rebuilds() {
        let mut roster = roster();
        let mut queue = TurnQueue::new();
        queue.build_round(&roster);

        // #3 acts first, then #0 dies before its turn.
        roster[0].take_damage(999);
        let next = queue.advance_cursor(&roster, Some(CombatantId(3)));
        assert_eq!(next, Some(CombatantId(2)));

        // Run off the end: a new round is built.
        let next = queue.advance_cursor(&roster, Some(CombatantId(2)));
        assert_eq!(next, Some(CombatantId(1)));
        let next = queue.advance_cursor(&roster, Some(CombatantId(1)));
        assert_eq!(next, Some(CombatantId(3)));
        assert_eq!(queue.round(), 2);
    }

    #[test]
    fn advance_reports_none_when_all_dead() {
        let mut roster = roster();
        for c in &mut roster {
            c.take_damage(999);
        }
        let mut queue = TurnQueue::new();
        queue.build_round(&roster);
        assert_eq!(queue.advance_cursor(&roster, None), None);
    }

    #[test]
    fn pull_self_moves_third_actor_after_cursor() {
        let roster = roster();
        let mut queue = TurnQueue::new();
        queue.build_round(&roster);
        // Order: 3, 0, 2, 1. Cursor on 3; pull the 3rd-in-queue (#2).
        queue.pull_to_act_next(CombatantId(2));
        assert_eq!(
            queue.entries(),
            &[CombatantId(3), CombatantId(2), CombatantId(0), CombatantId(1)]
        );
        assert_eq!(queue.current(), Some(CombatantId(3)));
    }

    #[test]
    fn pull_many_preserves_relative_order() {
        let roster = roster();
        let mut queue = TurnQueue::new();
        queue.build_round(&roster);
        // Pull 1 then 0; in queue order 0 precedes 1, and that must hold.
        queue.pull_many_to_act_next(&[CombatantId(1), CombatantId(0)]);
        assert_eq!(
            queue.entries(),
            &[CombatantId(3), CombatantId(0), CombatantId(1), CombatantId(2)]
        );
    }

    #[test]
    fn pull_of_unknown_unit_is_a_noop() {
        let roster = roster();
        let mut queue = TurnQueue::new();
        queue.build_round(&roster);
        let before = queue.clone();
        queue.pull_to_act_next(CombatantId(99));
        assert_eq!(queue, before);
    }

    #[test]
    fn removal_preserves_remainder_position() {
        let roster = roster();
        let mut queue = TurnQueue::new();
        queue.build_round(&roster);
        // Advance cursor onto #2 (index 2), then remove #0 (index 1).
        let _ = queue.advance_cursor(&roster, Some(CombatantId(3)));
        let _ = queue.advance_cursor(&roster, Some(CombatantId(0)));
        assert_eq!(queue.current(), Some(CombatantId(2)));
        queue.remove(CombatantId(0));
        assert_eq!(queue.current(), Some(CombatantId(2)));
    }

    #[test]
    fn reorder_tail_never_touches_head() {
        let mut roster = roster();
        let mut queue = TurnQueue::new();
        queue.build_round(&roster);
        // Order: 3, 0, 2, 1 with cursor on 3. Speed up #1 past everyone.
        roster[1].apply_modifier(crate::stats::StatKind::Spd, 100.0, 0.0, 2);
        queue.reorder_tail_preserving_head(&roster);
        assert_eq!(
            queue.entries(),
            &[CombatantId(3), CombatantId(1), CombatantId(0), CombatantId(2)]
        );
    }
}
