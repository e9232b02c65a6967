//! # Maximal-Length LFSR
//!
//! 32-bit Galois linear feedback shift register used to issue entity ids.
//!
//! With the feedback polynomial x^32 + x^22 + x^2 + x + 1 the register walks
//! through every nonzero 32-bit value exactly once before returning to its
//! seed, so ids never repeat within a period of 2^32 - 1 draws and zero is
//! never produced.

/// Galois feedback taps for x^32 + x^22 + x^2 + x + 1.
pub const MAX_LENGTH_32_TAPS: u32 = 0x8020_0003;

/// Maximal-length 32-bit LFSR.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Lfsr32 {
    state: u32,
    seed: u32,
    /// Number of times the register has cycled back to `seed`.
    period: u32,
}

impl Lfsr32 {
    /// Seed used by [`Lfsr32::default`].
    pub const DEFAULT_SEED: u32 = 1;

    /// Creates a register starting at `seed`.
    ///
    /// # Panics
    ///
    /// Panics if `seed` is zero (the all-zero state is a fixed point).
    #[must_use]
    pub const fn new(seed: u32) -> Self {
        assert!(seed != 0, "LFSR seed must be nonzero");
        Self {
            state: seed,
            seed,
            period: 0,
        }
    }

    /// Creates a register at an arbitrary `state` on the cycle of `seed`.
    #[cfg(test)]
    pub(crate) const fn with_state(state: u32, seed: u32) -> Self {
        assert!(state != 0 && seed != 0, "LFSR state must be nonzero");
        Self {
            state,
            seed,
            period: 0,
        }
    }

    /// Advances the register and returns the new state.
    #[inline]
    pub fn next_value(&mut self) -> u32 {
        let lsb = self.state & 1;
        self.state >>= 1;
        if lsb != 0 {
            self.state ^= MAX_LENGTH_32_TAPS;
        }
        if self.state == self.seed {
            self.period = self.period.wrapping_add(1);
        }
        self.state
    }

    /// Returns the current state without advancing.
    #[inline]
    #[must_use]
    pub const fn current(&self) -> u32 {
        self.state
    }

    /// Returns how many full periods have elapsed.
    #[inline]
    #[must_use]
    pub const fn period(&self) -> u32 {
        self.period
    }
}

impl Default for Lfsr32 {
    fn default() -> Self {
        Self::new(Self::DEFAULT_SEED)
    }
}

impl Iterator for Lfsr32 {
    type Item = u32;

    #[inline]
    fn next(&mut self) -> Option<u32> {
        Some(self.next_value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_never_zero_and_unique_prefix() {
        let mut lfsr = Lfsr32::default();
        let mut seen = HashSet::new();
        for _ in 0..200_000 {
            let v = lfsr.next_value();
            assert_ne!(v, 0);
            assert!(seen.insert(v), "value {v:#x} repeated early");
        }
        assert_eq!(lfsr.period(), 0);
    }

    #[test]
    fn test_period_counts_return_to_seed() {
        // 2 >> 1 == 1, so state 2 is the step just before seed 1.
        let mut lfsr = Lfsr32::with_state(2, Lfsr32::DEFAULT_SEED);
        assert_eq!(lfsr.next_value(), Lfsr32::DEFAULT_SEED);
        assert_eq!(lfsr.period(), 1);

        // The cycle then restarts exactly like a fresh register.
        let restarted: Vec<u32> = lfsr.by_ref().take(8).collect();
        let expected: Vec<u32> = Lfsr32::default().take(8).collect();
        assert_eq!(restarted, expected);
        assert_eq!(lfsr.period(), 1);

        let mut odd_seed = Lfsr32::with_state(0xACE1 << 1, 0xACE1);
        assert_eq!(odd_seed.next_value(), 0xACE1);
        assert_eq!(odd_seed.period(), 1);
    }

    #[test]
    fn test_deterministic() {
        let a: Vec<u32> = Lfsr32::new(0xACE1).take(16).collect();
        let b: Vec<u32> = Lfsr32::new(0xACE1).take(16).collect();
        assert_eq!(a, b);
    }
}
