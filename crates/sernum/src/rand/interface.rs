/// Where serial symbols come from.
///
/// Production code uses [`ThreadRandom`]; tests script the draws to force
/// collisions.
///
/// Implementations must return a value uniformly distributed in
/// `0..bound`. `bound` is never zero.
///
/// # Example
/// ```
/// use sernum::RandSource;
///
/// struct FixedRand;
/// impl RandSource for FixedRand {
///     fn rand_below(&self, _bound: usize) -> usize {
///         0
///     }
/// }
///
/// let rng = FixedRand;
/// assert_eq!(rng.rand_below(36), 0);
/// ```
///
/// [`ThreadRandom`]: crate::ThreadRandom
pub trait RandSource {
    /// Returns a random index in `0..bound`.
    fn rand_below(&self, bound: usize) -> usize;
}

impl<R: RandSource + ?Sized> RandSource for &R {
    fn rand_below(&self, bound: usize) -> usize {
        (**self).rand_below(bound)
    }
}
