// PCG-LCG random number generator, one instance per worker.
//
// The generator state is a single u64, so a worker can reseed it for every
// candidate it picks up. Seeds for candidate `i` of a run are derived from the
// run seed with a SplitMix64 finalizer, which makes a candidate's random stream
// independent of which worker happens to process it.

use rand::{RngCore, SeedableRng};

/// LCG multiplier
const PRN_MULT: u64 = 6364136223846793005;
/// LCG increment
const PRN_ADD: u64 = 1442695040888963407;

/// Fast PCG (permuted congruential) generator.
///
/// Reference: Melissa E. O'Neill, "PCG: A Family of Simple Fast Space-Efficient
/// Statistically Good Algorithms for Random Number Generation"
#[derive(Clone, Copy, Debug)]
pub struct FastRng {
    seed: u64,
}

/// SplitMix64 finalizer, used to decorrelate neighbouring seeds.
fn mix(mut z: u64) -> u64 {
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58476d1ce4e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d049bb133111eb);
    z ^ (z >> 31)
}

impl FastRng {
    #[inline]
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    /// Generator for stream `stream` of the run seeded with `seed`.
    pub fn for_stream(seed: u64, stream: u64) -> Self {
        Self::new(mix(seed ^ mix(stream.wrapping_add(0x9e3779b97f4a7c15))))
    }

    /// Reseed in place for `stream` of the run seeded with `seed`.
    #[inline]
    pub fn reseed_stream(&mut self, seed: u64, stream: u64) {
        *self = Self::for_stream(seed, stream);
    }

    #[inline]
    pub fn reseed(&mut self, seed: u64) {
        self.seed = seed;
    }

    #[inline(always)]
    fn next_word(&mut self) -> u64 {
        self.seed = PRN_MULT.wrapping_mul(self.seed).wrapping_add(PRN_ADD);
        let word = ((self.seed >> ((self.seed >> 59) + 5)) ^ self.seed)
            .wrapping_mul(12605985483714917081);
        (word >> 43) ^ word
    }

    /// Uniform f64 in [0, 1).
    #[inline(always)]
    pub fn random(&mut self) -> f64 {
        (self.next_word() >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
    }

    /// Uniform f64 in (0, 1]; safe to pass to `ln`.
    #[inline(always)]
    pub fn random_open_zero(&mut self) -> f64 {
        1.0 - self.random()
    }

    /// Exponentially distributed distance for the given rate (1/m).
    /// Returns infinity for a non-positive rate.
    #[inline]
    pub fn exponential(&mut self, rate: f64) -> f64 {
        if !(rate > 0.0) {
            return f64::INFINITY;
        }
        -self.random_open_zero().ln() / rate
    }
}

impl SeedableRng for FastRng {
    type Seed = [u8; 8];

    fn from_seed(seed: Self::Seed) -> Self {
        Self {
            seed: u64::from_le_bytes(seed),
        }
    }
}

impl RngCore for FastRng {
    #[inline(always)]
    fn next_u32(&mut self) -> u32 {
        (self.next_word() >> 32) as u32
    }

    #[inline(always)]
    fn next_u64(&mut self) -> u64 {
        self.next_word()
    }

    #[inline]
    fn fill_bytes(&mut self, dest: &mut [u8]) {
        for chunk in dest.chunks_mut(8) {
            let bytes = self.next_word().to_le_bytes();
            chunk.copy_from_slice(&bytes[..chunk.len()]);
        }
    }

    #[inline]
    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}
