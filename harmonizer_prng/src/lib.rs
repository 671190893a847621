// Deterministic, portable pseudo-random number generator.
//
// Implements xoshiro256++ (Blackman & Vigna, 2019) with SplitMix64 seeding.
// Hand-rolled with zero external dependencies so that a given seed produces
// the same harmonization on every platform.
//
// The harmonizer draws every random decision from this generator: Markov
// chord transitions, melody-fit chord selection, and the top-k harmony
// candidate pick. Callers inject an instance into each run, so fixing the
// seed fixes the output byte for byte.
//
// **Critical constraint: determinism.** Every method on `HarmonyRng` must
// produce identical output given the same prior state, regardless of
// platform, compiler version, or optimization level. Weighted sampling only
// uses floating point on caller-supplied weights, never inside the core
// generator.

use serde::{Deserialize, Serialize};

/// Xoshiro256++ PRNG, the harmonizer's sole source of randomness.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HarmonyRng {
    s: [u64; 4],
}

impl HarmonyRng {
    /// Create a new PRNG seeded from a `u64`.
    ///
    /// Uses SplitMix64 to expand the seed into the 256-bit internal state.
    /// Two instances created with the same seed produce identical sequences.
    pub fn new(seed: u64) -> Self {
        let mut sm = seed;
        Self {
            s: [
                splitmix64(&mut sm),
                splitmix64(&mut sm),
                splitmix64(&mut sm),
                splitmix64(&mut sm),
            ],
        }
    }

    /// Generate the next `u64` in the sequence.
    pub fn next_u64(&mut self) -> u64 {
        let result = (self.s[0].wrapping_add(self.s[3]))
            .rotate_left(23)
            .wrapping_add(self.s[0]);

        let t = self.s[1] << 17;

        self.s[2] ^= self.s[0];
        self.s[3] ^= self.s[1];
        self.s[1] ^= self.s[2];
        self.s[0] ^= self.s[3];

        self.s[2] ^= t;
        self.s[3] = self.s[3].rotate_left(45);

        result
    }

    /// Generate a uniform `f64` in [0, 1).
    ///
    /// Uses the upper 53 bits of a `u64` to fill the mantissa.
    pub fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Pick an index with probability proportional to `weights[i]`.
    ///
    /// Weights need not be normalized. Non-positive and non-finite weights
    /// are never chosen. Returns `None` when no weight is positive. Always
    /// consumes exactly one `next_f64` draw when it returns `Some`.
    pub fn weighted_index(&mut self, weights: &[f64]) -> Option<usize> {
        let usable = |w: f64| w.is_finite() && w > 0.0;
        let total: f64 = weights.iter().copied().filter(|&w| usable(w)).sum();
        if total <= 0.0 {
            return None;
        }

        let target = self.next_f64() * total;
        let mut cumulative = 0.0;
        let mut last_usable = None;
        for (i, &w) in weights.iter().enumerate() {
            if !usable(w) {
                continue;
            }
            cumulative += w;
            last_usable = Some(i);
            if cumulative > target {
                return Some(i);
            }
        }
        // Rounding can leave cumulative a hair below target.
        last_usable
    }
}

/// SplitMix64, used only for seeding xoshiro256++ from a single `u64`.
fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9e37_79b9_7f4a_7c15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}
