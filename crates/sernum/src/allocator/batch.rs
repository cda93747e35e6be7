#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::{
    AllocError, BatchMetadata, InsertStatus, NewSerialRecord, OwnerId, RandSource, RetryPolicy,
    SerialFormat, SerialNumber, SerialRecord, SerialStore, StoreError, ThreadRandom,
};

/// One generation request: who owns the serials and what they describe.
///
/// Every serial allocated for a batch shares the same owner and metadata.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Batch {
    pub owner: OwnerId,
    pub metadata: BatchMetadata,
}

impl Batch {
    pub const fn new(owner: OwnerId, metadata: BatchMetadata) -> Self {
        Self { owner, metadata }
    }
}

enum UnitFailure {
    Store(StoreError),
    Exhausted { attempts: u32 },
}

impl UnitFailure {
    fn into_error(self, committed: Vec<SerialNumber>, unit: usize) -> AllocError {
        match self {
            Self::Store(source) => AllocError::Persistence {
                committed,
                unit,
                source,
            },
            Self::Exhausted { attempts } => AllocError::Exhausted {
                committed,
                unit,
                attempts,
            },
        }
    }
}

/// Allocates unique serial numbers by generate-and-insert.
///
/// The allocator draws a random candidate, hands it to the store and lets the
/// store's uniqueness constraint decide. A [`InsertStatus::Duplicate`] answer
/// is absorbed by drawing another candidate; the caller never sees a
/// collision. There is no pre-check and no in-memory set of issued serials,
/// so any number of allocators, across threads or processes, may share one
/// store.
///
/// ## Partial batches
///
/// Units are inserted one by one. If unit *k* fails, units `1..k` stay
/// committed and are reported in the [`AllocError`].
///
/// # Example
/// ```
/// use chrono::NaiveDate;
/// use sernum::{Allocator, Batch, BatchMetadata, MemoryStore, Role, SerialStore, UserStore};
///
/// let store = MemoryStore::new();
/// let owner = store.insert_user("ops", "<hash>", Role::User).unwrap().id;
/// let batch = Batch::new(
///     owner,
///     BatchMetadata {
///         model_number: "HX-200".into(),
///         quantity: 3,
///         date_of_manufacturing: NaiveDate::from_ymd_opt(2025, 6, 2).unwrap(),
///         brazer_name: "R. Osei".into(),
///         operator_code: "OP-7".into(),
///         code_a: None,
///         code_b: None,
///         code_c: None,
///         code_d: None,
///     },
/// );
///
/// let allocator = Allocator::new(&store);
/// let serials = allocator.allocate(&batch, 3).unwrap();
/// assert_eq!(serials.len(), 3);
/// assert_eq!(store.query_all().unwrap().len(), 3);
/// ```
#[derive(Debug)]
pub struct Allocator<S, R = ThreadRandom> {
    store: S,
    rng: R,
    format: SerialFormat,
    retry: RetryPolicy,
}

impl<S> Allocator<S, ThreadRandom>
where
    S: SerialStore,
{
    /// Creates an allocator using the thread-local RNG, the standard format
    /// and unbounded retries.
    pub const fn new(store: S) -> Self {
        Self::with_rng(store, ThreadRandom)
    }
}

impl<S, R> Allocator<S, R>
where
    S: SerialStore,
    R: RandSource,
{
    pub const fn with_rng(store: S, rng: R) -> Self {
        Self {
            store,
            rng,
            format: SerialFormat::STANDARD,
            retry: RetryPolicy::Unbounded,
        }
    }

    #[must_use]
    pub fn with_format(mut self, format: SerialFormat) -> Self {
        self.format = format;
        self
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub const fn store(&self) -> &S {
        &self.store
    }

    pub const fn format(&self) -> &SerialFormat {
        &self.format
    }

    pub const fn retry(&self) -> RetryPolicy {
        self.retry
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Allocates `count` serials for `batch`, in acceptance order.
    ///
    /// # Errors
    /// - [`AllocError::Validation`] if `count` is zero or the metadata is
    ///   incomplete. Nothing is inserted.
    /// - [`AllocError::Persistence`] if the store fails with anything other
    ///   than a duplicate.
    /// - [`AllocError::Exhausted`] if a bounded retry policy runs out.
    pub fn allocate(&self, batch: &Batch, count: usize) -> Result<Vec<SerialNumber>, AllocError> {
        self.allocate_records(batch, count)
            .map(|records| records.into_iter().map(|r| r.serial_number).collect())
    }

    /// Like [`Self::allocate`] but returns the stored records, with their ids
    /// and timestamps.
    ///
    /// # Errors
    /// See [`Self::allocate`].
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip(self, batch), fields(owner = %batch.owner))
    )]
    pub fn allocate_records(
        &self,
        batch: &Batch,
        count: usize,
    ) -> Result<Vec<SerialRecord>, AllocError> {
        if count == 0 {
            return Err(AllocError::Validation {
                reason: "count must be at least 1".to_owned(),
            });
        }
        let mut candidate = Self::candidate(batch)?;
        let mut accepted = Vec::with_capacity(count);

        for unit in 1..=count {
            match self.insert_unit(&mut candidate) {
                Ok(record) => accepted.push(record),
                Err(failure) => {
                    let committed: Vec<_> = accepted.into_iter().map(|r| r.serial_number).collect();
                    #[cfg(feature = "tracing")]
                    tracing::warn!(unit, committed = committed.len(), "batch stopped early");
                    return Err(failure.into_error(committed, unit));
                }
            }
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(count, "batch allocated");
        Ok(accepted)
    }

    /// Allocates a single serial and returns its stored record.
    ///
    /// # Errors
    /// See [`Self::allocate`].
    pub fn allocate_one(&self, batch: &Batch) -> Result<SerialRecord, AllocError> {
        let mut candidate = Self::candidate(batch)?;
        self.insert_unit(&mut candidate)
            .map_err(|failure| failure.into_error(Vec::new(), 1))
    }

    fn candidate(batch: &Batch) -> Result<NewSerialRecord, AllocError> {
        let metadata = batch
            .metadata
            .clone()
            .validate()
            .map_err(|reason| AllocError::Validation { reason })?;
        Ok(NewSerialRecord {
            serial_number: SerialNumber::from_trusted(String::new()),
            owner_id: batch.owner,
            metadata,
        })
    }

    fn insert_unit(&self, candidate: &mut NewSerialRecord) -> Result<SerialRecord, UnitFailure> {
        let mut attempts = 0u32;
        loop {
            candidate.serial_number = self.format.generate(&self.rng);
            attempts = attempts.saturating_add(1);
            match self.store.insert(candidate) {
                Ok(InsertStatus::Inserted { record }) => return Ok(record),
                Ok(InsertStatus::Duplicate) => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(serial = %candidate.serial_number, attempts, "serial collision");
                    if self.retry.is_exhausted(attempts) {
                        return Err(UnitFailure::Exhausted { attempts });
                    }
                }
                Err(e) => return Err(UnitFailure::Store(e)),
            }
        }
    }
}
