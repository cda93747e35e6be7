use crate::{SerialNumber, StoreError};

/// Why a batch did not complete.
///
/// Batches are not transactional: units accepted before a failure stay
/// committed. Every variant that can occur after an insert carries the
/// serials that were committed, so callers can reconcile them.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum AllocError {
    /// The request was malformed. Nothing was inserted.
    #[error("invalid batch: {reason}")]
    Validation { reason: String },

    /// The store failed for a reason other than a duplicate serial.
    ///
    /// `unit` is the 1-based position in the batch that failed.
    #[error("unit {unit} failed after {} serials were committed: {source}", .committed.len())]
    Persistence {
        committed: Vec<SerialNumber>,
        unit: usize,
        source: StoreError,
    },

    /// A bounded [`RetryPolicy`] ran out of attempts for one unit.
    ///
    /// [`RetryPolicy`]: crate::RetryPolicy
    #[error(
        "no free serial for unit {unit} after {attempts} attempts ({} serials committed)",
        .committed.len()
    )]
    Exhausted {
        committed: Vec<SerialNumber>,
        unit: usize,
        attempts: u32,
    },
}

impl AllocError {
    /// Serials that were persisted before the failure, in acceptance order.
    pub fn committed(&self) -> &[SerialNumber] {
        match self {
            Self::Validation { .. } => &[],
            Self::Persistence { committed, .. } | Self::Exhausted { committed, .. } => committed,
        }
    }

    /// `true` when part of the batch is already in the store.
    pub fn is_partial(&self) -> bool {
        !self.committed().is_empty()
    }

    /// The 1-based unit that failed, if the batch got as far as inserting.
    pub fn failed_unit(&self) -> Option<usize> {
        match self {
            Self::Validation { .. } => None,
            Self::Persistence { unit, .. } | Self::Exhausted { unit, .. } => Some(*unit),
        }
    }
}
