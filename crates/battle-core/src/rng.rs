//! Deterministic random number generation for combat rolls.
//!
//! The engine never reads ambient randomness. Every roll (crit checks, enemy
//! target picks) derives from the battle seed, the action nonce, and a roll
//! context, so a battle replays identically within one process given the same
//! command sequence.

/// RNG oracle for deterministic random number generation.
///
/// Implementations must be deterministic: the same seed always produces the
/// same value.
pub trait RngOracle: Send + Sync {
    /// Generate a random u32 value from a seed.
    fn next_u32(&self, seed: u64) -> u32;

    /// Uniform value in `[0, 1)`, used for percentage rolls like crit rate.
    fn unit_f32(&self, seed: u64) -> f32 {
        // 24 bits of mantissa keeps the distribution uniform in f32.
        (self.next_u32(seed) >> 8) as f32 / (1u32 << 24) as f32
    }

    /// Uniform index in `[0, len)`. Returns 0 for empty ranges.
    fn index(&self, seed: u64, len: usize) -> usize {
        if len == 0 {
            return 0;
        }
        (self.next_u32(seed) as usize) % len
    }
}

/// PCG random number generator (Permuted Congruential Generator).
///
/// PCG-XSH-RR: 32-bit output from 64-bit state. Small, fast, and passes the
/// usual statistical batteries, which is more than combat rolls need.
#[derive(Clone, Copy, Debug, Default)]
pub struct PcgRng;

impl PcgRng {
    const MULTIPLIER: u64 = 6364136223846793005;
    const INCREMENT: u64 = 1442695040888963407;

    #[inline]
    fn step(state: u64) -> u64 {
        state
            .wrapping_mul(Self::MULTIPLIER)
            .wrapping_add(Self::INCREMENT)
    }

    #[inline]
    fn output(state: u64) -> u32 {
        let xorshifted = (((state >> 18) ^ state) >> 27) as u32;
        let rot = (state >> 59) as u32;
        xorshifted.rotate_right(rot)
    }
}

impl RngOracle for PcgRng {
    fn next_u32(&self, seed: u64) -> u32 {
        Self::output(Self::step(seed))
    }
}

/// Roll contexts so one action can make several independent rolls.
pub mod roll {
    /// Crit check for a damage computation.
    pub const CRIT: u32 = 0;
    /// Enemy AI picking a player target.
    pub const TARGET_PICK: u32 = 1;
}

/// Compute a per-roll seed from the battle seed and action identity.
///
/// Mixes with SplitMix64/FxHash-style multipliers; the exact constants only
/// matter for replay stability, not quality.
pub fn compute_seed(battle_seed: u64, nonce: u64, actor_id: u32, context: u32) -> u64 {
    let mut hash = battle_seed;

    hash ^= nonce.wrapping_mul(0x9e3779b97f4a7c15);
    hash ^= (actor_id as u64).wrapping_mul(0x517cc1b727220a95);
    hash ^= (context as u64).wrapping_mul(0x85ebca6b);

    hash ^= hash >> 33;
    hash = hash.wrapping_mul(0xff51afd7ed558ccd);
    hash ^= hash >> 33;

    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_value() {
        let rng = PcgRng;
        assert_eq!(rng.next_u32(42), rng.next_u32(42));
        assert_eq!(rng.unit_f32(7), rng.unit_f32(7));
    }

    #[test]
    fn unit_f32_stays_in_range() {
        let rng = PcgRng;
        for seed in 0..1000u64 {
            let v = rng.unit_f32(seed);
            assert!((0.0..1.0).contains(&v), "seed {seed} gave {v}");
        }
    }

    #[test]
    fn contexts_decorrelate_rolls() {
        let a = compute_seed(1, 5, 3, roll::CRIT);
        let b = compute_seed(1, 5, 3, roll::TARGET_PICK);
        assert_ne!(a, b);
    }

    #[test]
    fn index_handles_empty_range() {
        let rng = PcgRng;
        assert_eq!(rng.index(99, 0), 0);
        assert!(rng.index(99, 4) < 4);
    }
}
