//! Boss lifecycle bookkeeping.
//!
//! Two invariants, both once-only for the whole battle lifetime:
//! at most one living combatant ever carries the big-boss role, and once a
//! big boss has existed no unit may re-acquire the role. The transform ledger
//! is the single-flight guard for the small-boss death path.

/// Once-only flags for the boss chain. Owned by the battle state; only the
/// engine's death paths touch it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct BossLedger {
    /// Set the moment any big boss exists (including one fielded in the
    /// opening roster). Never cleared: death does not allow a revival.
    pub big_boss_seen: bool,
    /// Single-flight lock for the transform death path, so concurrent death
    /// notifications cannot double-spawn.
    pub transform_in_flight: bool,
}

impl BossLedger {
    pub fn new(big_boss_seen: bool) -> Self {
        Self {
            big_boss_seen,
            transform_in_flight: false,
        }
    }

    /// Try to claim the right to spawn a big boss. At most one caller ever
    /// succeeds per battle.
    pub fn claim_big_boss(&mut self) -> bool {
        if self.big_boss_seen || self.transform_in_flight {
            return false;
        }
        self.transform_in_flight = true;
        true
    }

    /// Commit a claimed spawn.
    pub fn commit_big_boss(&mut self) {
        self.big_boss_seen = true;
        self.transform_in_flight = false;
    }

    /// Release a claim without spawning (no spec configured, race lost).
    pub fn abort_claim(&mut self) {
        self.transform_in_flight = false;
    }
}
