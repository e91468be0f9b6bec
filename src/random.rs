// Random Source: unbiased integer sampling for every payout decision
//
// Crash points, slot stops, card shuffles and the daily wheel all draw from
// here, so sampling must be free of modulo bias and backed by a CSPRNG.

use rand::{CryptoRng, RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use std::cell::RefCell;

use crate::types::{EconomyError, Result};

/// Unbiased integer sampler over a cryptographically strong generator
///
/// Only `CryptoRng` generators are accepted. The default generator is
/// ChaCha20 keyed from the operating system (`crypto.getRandomValues` in the
/// browser).
pub struct RandomSource {
    rng: Box<dyn RngCore>,
}

impl RandomSource {
    /// ChaCha20 keyed from OS entropy
    ///
    /// Panics only if the platform has no entropy source at all; use
    /// `try_from_os` to handle that case.
    pub fn new() -> RandomSource {
        RandomSource {
            rng: Box::new(ChaCha20Rng::from_entropy()),
        }
    }

    /// ChaCha20 keyed from OS entropy, reporting a missing entropy source
    pub fn try_from_os() -> Result<RandomSource> {
        Self::keyed_by(getrandom::getrandom)
    }

    pub(crate) fn keyed_by<F>(fill: F) -> Result<RandomSource>
    where
        F: FnOnce(&mut [u8]) -> std::result::Result<(), getrandom::Error>,
    {
        let mut seed = [0u8; 32];
        fill(&mut seed).map_err(|e| EconomyError::Entropy(e.to_string()))?;
        Ok(RandomSource {
            rng: Box::new(ChaCha20Rng::from_seed(seed)),
        })
    }

    /// Reproducible stream for replays and tests
    pub fn from_seed(seed: u64) -> RandomSource {
        RandomSource {
            rng: Box::new(ChaCha20Rng::seed_from_u64(seed)),
        }
    }

    /// Wrap any cryptographically secure generator
    pub fn with_rng<R: RngCore + CryptoRng + 'static>(rng: R) -> RandomSource {
        RandomSource { rng: Box::new(rng) }
    }

    /// Uniform integer in `[min, max]` inclusive
    ///
    /// Returns `min` when the range is empty. Draws are rejected when they
    /// fall at or above the largest multiple of the range that fits in the
    /// draw width, so every value is equally likely.
    pub fn random_int(&mut self, min: i64, max: i64) -> i64 {
        let range = max as i128 - min as i128 + 1;
        if range <= 0 {
            return min;
        }
        let range = range as u128;

        // 32-bit draws cover every range a game uses; wider ranges fall back to 64-bit
        let wide = range > 1u128 << 32;
        let space: u128 = if wide { 1 << 64 } else { 1 << 32 };
        let zone = space - space % range;

        loop {
            let draw = if wide {
                self.rng.next_u64() as u128
            } else {
                self.rng.next_u32() as u128
            };
            if draw < zone {
                return (min as i128 + (draw % range) as i128) as i64;
            }
        }
    }

    /// Fisher-Yates shuffle driven by `random_int`
    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        let len = items.len();
        if len <= 1 {
            return;
        }

        for i in (1..len).rev() {
            let j = self.random_int(0, i as i64) as usize;
            items.swap(i, j);
        }
    }

    /// Pick an index with probability proportional to its weight
    ///
    /// Returns `None` when every weight is zero (or the slice is empty).
    pub fn weighted_index(&mut self, weights: &[u32]) -> Option<usize> {
        let total: u64 = weights.iter().map(|&w| w as u64).sum();
        if total == 0 {
            return None;
        }

        let mut roll = self.random_int(0, total as i64 - 1) as u64;
        for (index, &weight) in weights.iter().enumerate() {
            if roll < weight as u64 {
                return Some(index);
            }
            roll -= weight as u64;
        }
        None
    }
}

impl Default for RandomSource {
    fn default() -> Self {
        Self::new()
    }
}

thread_local! {
    static SHARED: RefCell<RandomSource> = RefCell::new(RandomSource::new());
}

/// Uniform integer in `[min, max]` from a thread-local OS-keyed source
pub fn random_int(min: i64, max: i64) -> i64 {
    SHARED.with(|source| source.borrow_mut().random_int(min, max))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// Replays a fixed list of 32-bit draws
    struct ScriptedEntropy {
        draws: VecDeque<u32>,
        consumed: std::rc::Rc<std::cell::Cell<usize>>,
    }

    impl RngCore for ScriptedEntropy {
        fn next_u32(&mut self) -> u32 {
            self.consumed.set(self.consumed.get() + 1);
            self.draws.pop_front().expect("script exhausted")
        }

        fn next_u64(&mut self) -> u64 {
            ((self.next_u32() as u64) << 32) | self.next_u32() as u64
        }

        fn fill_bytes(&mut self, dest: &mut [u8]) {
            for chunk in dest.chunks_mut(4) {
                let bytes = self.next_u32().to_le_bytes();
                chunk.copy_from_slice(&bytes[..chunk.len()]);
            }
        }

        fn try_fill_bytes(&mut self, dest: &mut [u8]) -> std::result::Result<(), rand::Error> {
            self.fill_bytes(dest);
            Ok(())
        }
    }

    impl CryptoRng for ScriptedEntropy {}

    fn scripted(draws: &[u32]) -> (RandomSource, std::rc::Rc<std::cell::Cell<usize>>) {
        let consumed = std::rc::Rc::new(std::cell::Cell::new(0));
        let source = RandomSource::with_rng(ScriptedEntropy {
            draws: draws.iter().copied().collect(),
            consumed: consumed.clone(),
        });
        (source, consumed)
    }

    #[test]
    fn test_missing_entropy_is_an_error() {
        let result = RandomSource::keyed_by(|_| Err(getrandom::Error::UNSUPPORTED));
        assert!(matches!(result, Err(EconomyError::Entropy(_))));

        let mut keyed = RandomSource::keyed_by(|seed| {
            seed.fill(9);
            Ok(())
        })
        .unwrap();
        let mut again = RandomSource::with_rng(ChaCha20Rng::from_seed([9; 32]));
        assert_eq!(keyed.random_int(0, 1_000_000), again.random_int(0, 1_000_000));
    }

    #[test]
    fn test_rejects_draws_in_biased_tail() {
        // 2^32 % 6 == 4, so the top four 32-bit values must be discarded
        let (mut source, consumed) = scripted(&[u32::MAX, u32::MAX - 3, 7]);
        assert_eq!(source.random_int(1, 6), 1 + 7 % 6);
        assert_eq!(consumed.get(), 3);
    }

    #[test]
    fn test_accepts_last_unbiased_draw() {
        let last_ok = u32::MAX - 4;
        let (mut source, consumed) = scripted(&[last_ok]);
        assert_eq!(source.random_int(0, 5), (last_ok % 6) as i64);
        assert_eq!(consumed.get(), 1);
    }

    #[test]
    fn test_empty_range_returns_min() {
        let (mut source, consumed) = scripted(&[]);
        assert_eq!(source.random_int(5, 4), 5);
        assert_eq!(source.random_int(10, -10), 10);
        assert_eq!(consumed.get(), 0);
    }

    #[test]
    fn test_single_value_range() {
        let mut source = RandomSource::from_seed(7);
        for _ in 0..100 {
            assert_eq!(source.random_int(3, 3), 3);
        }
    }

    #[test]
    fn test_values_stay_in_bounds() {
        let mut source = RandomSource::from_seed(11);
        for _ in 0..10_000 {
            let v = source.random_int(-3, 8);
            assert!((-3..=8).contains(&v));
        }
        // Full i64 span goes through the 64-bit path without overflowing
        for _ in 0..1_000 {
            source.random_int(i64::MIN, i64::MAX);
        }
    }

    #[test]
    fn test_die_roll_passes_chi_square() {
        let mut source = RandomSource::from_seed(0x6a09_e667);
        let trials = 600_000;
        let mut counts = [0u64; 6];
        for _ in 0..trials {
            counts[(source.random_int(1, 6) - 1) as usize] += 1;
        }

        let expected = trials as f64 / 6.0;
        let chi_square: f64 = counts
            .iter()
            .map(|&observed| {
                let diff = observed as f64 - expected;
                diff * diff / expected
            })
            .sum();

        // 5 degrees of freedom, p = 0.0001
        assert!(chi_square < 25.74, "chi-square {} with counts {:?}", chi_square, counts);
    }

    #[test]
    fn test_shared_random_int() {
        for _ in 0..1_000 {
            let v = random_int(0, 7);
            assert!((0..=7).contains(&v));
        }
    }

    #[test]
    fn test_shuffle_preserves_elements() {
        let mut source = RandomSource::from_seed(3);
        let original: Vec<u32> = (0..52).collect();
        let mut deck = original.clone();

        source.shuffle(&mut deck);

        assert_ne!(deck, original);
        deck.sort();
        assert_eq!(deck, original);
    }

    #[test]
    fn test_seeded_sources_are_reproducible() {
        let mut a = RandomSource::from_seed(99);
        let mut b = RandomSource::from_seed(99);
        let rolls_a: Vec<i64> = (0..32).map(|_| a.random_int(0, 1000)).collect();
        let rolls_b: Vec<i64> = (0..32).map(|_| b.random_int(0, 1000)).collect();
        assert_eq!(rolls_a, rolls_b);
    }

    #[test]
    fn test_weighted_index() {
        let mut source = RandomSource::from_seed(5);
        assert_eq!(source.weighted_index(&[]), None);
        assert_eq!(source.weighted_index(&[0, 0]), None);

        for _ in 0..200 {
            assert_eq!(source.weighted_index(&[0, 4, 0]), Some(1));
        }

        let mut hits = [0u32; 2];
        for _ in 0..10_000 {
            hits[source.weighted_index(&[1, 3]).unwrap()] += 1;
        }
        assert!(hits[1] > hits[0] * 2);
    }

    #[test]
    fn test_try_from_os() {
        let mut source = RandomSource::try_from_os().unwrap();
        let v = source.random_int(1, 6);
        assert!((1..=6).contains(&v));
    }
}
