//! Named random streams derived from one master seed.
//!
//! Each stream is seeded from the master seed and its name only, so adding
//! a system or changing the order streams are first requested never
//! perturbs the draws of another stream.

use std::collections::HashMap;

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

fn stream_seed(master: u64, name: &str) -> u64 {
    let mut hash = FNV_OFFSET;
    for byte in master.to_le_bytes().iter().chain(name.as_bytes()) {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

pub struct RngManager {
    seed: u64,
    streams: HashMap<String, ChaCha8Rng>,
}

impl RngManager {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            streams: HashMap::new(),
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Borrow the stream called `name`, creating it on first use. A stream
    /// keeps its position between calls.
    pub fn stream(&mut self, name: &str) -> SystemRng<'_> {
        let seed = self.seed;
        let inner = self
            .streams
            .entry(name.to_string())
            .or_insert_with(|| ChaCha8Rng::seed_from_u64(stream_seed(seed, name)));
        SystemRng { inner }
    }
}

/// Standalone generator for stream `name`, as the first use of that
/// stream in an [`RngManager`] with the same seed would see it.
pub fn detached(seed: u64, name: &str) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(stream_seed(seed, name))
}

pub struct SystemRng<'a> {
    inner: &'a mut ChaCha8Rng,
}

impl RngCore for SystemRng<'_> {
    fn next_u32(&mut self) -> u32 {
        self.inner.next_u32()
    }

    fn next_u64(&mut self) -> u64 {
        self.inner.next_u64()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.inner.fill_bytes(dest);
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.inner.try_fill_bytes(dest)
    }
}
