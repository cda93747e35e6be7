use crate::RandSource;
use rand::{Rng, rng};

/// A `RandSource` that uses the thread-local RNG (`rand::rng()`).
///
/// This RNG is cryptographically secure (ChaCha-based) and automatically
/// reseeded periodically, so serials are not predictable from earlier ones.
///
/// This type does **not** store the RNG itself; it accesses the thread-local
/// generator on each call, which keeps it `Send + Sync` and free to share.
#[derive(Default, Clone, Copy, Debug)]
pub struct ThreadRandom;

impl RandSource for ThreadRandom {
    fn rand_below(&self, bound: usize) -> usize {
        rng().random_range(0..bound)
    }
}
