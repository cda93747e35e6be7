/// How many uniqueness rejections one unit of a batch may absorb.
///
/// Collisions are not errors; they only cost another candidate. With the
/// standard format a collision needs two of roughly 10^14 serials to meet, so
/// the policy matters only when the space is nearly full or deliberately
/// shrunk.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RetryPolicy {
    /// Keep drawing candidates until one is accepted. If every serial in the
    /// format's space is taken this never returns.
    #[default]
    Unbounded,
    /// Give up on a unit after this many consecutive collisions.
    Bounded(u32),
}

impl RetryPolicy {
    /// `0` means unbounded.
    pub const fn from_max_collisions(max: u32) -> Self {
        if max == 0 { Self::Unbounded } else { Self::Bounded(max) }
    }

    pub(crate) const fn is_exhausted(&self, collisions: u32) -> bool {
        match self {
            Self::Unbounded => false,
            Self::Bounded(max) => collisions >= *max,
        }
    }
}
