#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::{
    AllocError, Allocator, Batch, BatchMetadata, RandSource, RecordId, Role, SerialRecord,
    SerialStore, StoreError, Summary, ThreadRandom, User, YearMonth,
};
use chrono::{DateTime, Utc};

/// Largest batch accepted unless configured otherwise.
pub const DEFAULT_MAX_BATCH: usize = 10_000;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ServiceError {
    #[error("user `{username}` is not allowed to {action}")]
    Forbidden {
        username: String,
        action: &'static str,
    },
    #[error("record {id} does not exist")]
    NotFound { id: RecordId },
    #[error("invalid request: {reason}")]
    Validation { reason: String },
    #[error(transparent)]
    Alloc(#[from] AllocError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Record operations on behalf of an authenticated [`User`].
///
/// Administrators see and manage every record. Regular users see and edit
/// only the records they own, and cannot delete.
#[derive(Debug)]
pub struct SerialService<S, R = ThreadRandom> {
    allocator: Allocator<S, R>,
    max_batch: usize,
}

impl<S, R> SerialService<S, R>
where
    S: SerialStore,
    R: RandSource,
{
    pub const fn new(allocator: Allocator<S, R>) -> Self {
        Self {
            allocator,
            max_batch: DEFAULT_MAX_BATCH,
        }
    }

    #[must_use]
    pub fn with_max_batch(mut self, max_batch: usize) -> Self {
        self.max_batch = max_batch;
        self
    }

    pub const fn max_batch(&self) -> usize {
        self.max_batch
    }

    pub const fn allocator(&self) -> &Allocator<S, R> {
        &self.allocator
    }

    pub fn store(&self) -> &S {
        self.allocator.store()
    }

    pub fn into_store(self) -> S {
        self.allocator.into_store()
    }

    /// Allocates `count` serials owned by `actor`.
    ///
    /// # Errors
    /// [`ServiceError::Validation`] above `max_batch`; otherwise whatever the
    /// allocator reports, including partial batches.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip(self, actor, metadata), fields(actor = %actor.username))
    )]
    pub fn generate(
        &self,
        actor: &User,
        metadata: BatchMetadata,
        count: usize,
    ) -> Result<Vec<SerialRecord>, ServiceError> {
        if count > self.max_batch {
            return Err(ServiceError::Validation {
                reason: format!("count {count} exceeds the maximum batch of {}", self.max_batch),
            });
        }
        let batch = Batch::new(actor.id, metadata);
        Ok(self.allocator.allocate_records(&batch, count)?)
    }

    /// Records visible to `actor`, newest first.
    ///
    /// # Errors
    /// Store failures only.
    pub fn list(&self, actor: &User) -> Result<Vec<SerialRecord>, ServiceError> {
        let store = self.store();
        Ok(match actor.role {
            Role::Admin => store.query_all()?,
            Role::User => store.query_by_owner(actor.id)?,
        })
    }

    /// Records visible to `actor` created during `month`.
    ///
    /// # Errors
    /// Store failures only.
    pub fn list_month(
        &self,
        actor: &User,
        month: YearMonth,
    ) -> Result<Vec<SerialRecord>, ServiceError> {
        let owner = (!actor.is_admin()).then_some(actor.id);
        Ok(self.store().query_month(month, owner)?)
    }

    /// Replaces a record's metadata. Allowed for administrators and for the
    /// record's owner; to anyone else the record does not exist.
    ///
    /// # Errors
    /// - [`ServiceError::NotFound`] if the record is missing or not visible.
    /// - [`ServiceError::Validation`] for incomplete metadata.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip(self, actor, metadata), fields(actor = %actor.username))
    )]
    pub fn edit(
        &self,
        actor: &User,
        id: RecordId,
        metadata: BatchMetadata,
    ) -> Result<SerialRecord, ServiceError> {
        let record = self.visible(actor, id)?;
        let metadata = metadata
            .validate()
            .map_err(|reason| ServiceError::Validation { reason })?;
        self.store().update(id, &metadata)?;
        Ok(SerialRecord { metadata, ..record })
    }

    /// Removes a record. Administrators only.
    ///
    /// # Errors
    /// [`ServiceError::Forbidden`] for regular users, [`ServiceError::NotFound`]
    /// for a missing record.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip(self, actor), fields(actor = %actor.username))
    )]
    pub fn delete(&self, actor: &User, id: RecordId) -> Result<(), ServiceError> {
        if !actor.is_admin() {
            return Err(forbidden(actor, "delete records"));
        }
        self.store().delete(id).map_err(|e| match e {
            StoreError::NotFound { id } => ServiceError::NotFound { id },
            other => other.into(),
        })
    }

    /// Counts over the records visible to `actor`.
    ///
    /// # Errors
    /// Store failures only.
    pub fn summary(&self, actor: &User, now: DateTime<Utc>) -> Result<Summary, ServiceError> {
        Ok(Summary::from_records(&self.list(actor)?, now))
    }

    fn visible(&self, actor: &User, id: RecordId) -> Result<SerialRecord, ServiceError> {
        let record = self
            .store()
            .get(id)?
            .ok_or(ServiceError::NotFound { id })?;
        // Users learn nothing about records they cannot see.
        if !actor.is_admin() && record.owner_id != actor.id {
            return Err(ServiceError::NotFound { id });
        }
        Ok(record)
    }
}

fn forbidden(actor: &User, action: &'static str) -> ServiceError {
    ServiceError::Forbidden {
        username: actor.username.clone(),
        action,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MemoryStore, UserStore, record::sample_metadata};
    use std::sync::Arc;

    struct Fixture {
        service: SerialService<Arc<MemoryStore>>,
        admin: User,
        alice: User,
        bob: User,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let admin = store.insert_user("root", "h", Role::Admin).unwrap();
        let alice = store.insert_user("alice", "h", Role::User).unwrap();
        let bob = store.insert_user("bob", "h", Role::User).unwrap();
        Fixture {
            service: SerialService::new(Allocator::new(store)),
            admin,
            alice,
            bob,
        }
    }

    #[test]
    fn users_see_only_their_own_records() {
        let f = fixture();
        f.service.generate(&f.alice, sample_metadata("A"), 2).unwrap();
        f.service.generate(&f.bob, sample_metadata("B"), 3).unwrap();

        assert_eq!(f.service.list(&f.alice).unwrap().len(), 2);
        assert_eq!(f.service.list(&f.bob).unwrap().len(), 3);
        assert_eq!(f.service.list(&f.admin).unwrap().len(), 5);

        let month = YearMonth::of(Utc::now());
        assert_eq!(f.service.list_month(&f.alice, month).unwrap().len(), 2);
        assert_eq!(f.service.list_month(&f.admin, month).unwrap().len(), 5);
    }

    #[test]
    fn edit_is_limited_to_owner_and_admin() {
        let f = fixture();
        let id = f.service.generate(&f.alice, sample_metadata("A"), 1).unwrap()[0].id;

        assert!(matches!(
            f.service.edit(&f.bob, id, sample_metadata("B")),
            Err(ServiceError::NotFound { .. })
        ));
        let edited = f.service.edit(&f.alice, id, sample_metadata("A2")).unwrap();
        assert_eq!(edited.metadata.model_number, "A2");
        f.service.edit(&f.admin, id, sample_metadata("A3")).unwrap();
        assert_eq!(
            f.service.store().get(id).unwrap().unwrap().metadata.model_number,
            "A3"
        );
    }

    #[test]
    fn only_admins_delete() {
        let f = fixture();
        let id = f.service.generate(&f.alice, sample_metadata("A"), 1).unwrap()[0].id;

        assert!(matches!(
            f.service.delete(&f.alice, id),
            Err(ServiceError::Forbidden { .. })
        ));
        f.service.delete(&f.admin, id).unwrap();
        assert!(matches!(
            f.service.delete(&f.admin, id),
            Err(ServiceError::NotFound { .. })
        ));
    }

    #[test]
    fn oversized_batches_are_rejected_before_inserting() {
        let f = fixture();
        let service = f.service.with_max_batch(4);
        assert!(matches!(
            service.generate(&f.alice, sample_metadata("A"), 5),
            Err(ServiceError::Validation { .. })
        ));
        assert!(service.store().query_all().unwrap().is_empty());
    }

    #[test]
    fn summary_covers_visible_records() {
        let f = fixture();
        f.service.generate(&f.alice, sample_metadata("A"), 2).unwrap();
        f.service.generate(&f.bob, sample_metadata("B"), 1).unwrap();

        let now = Utc::now();
        let mine = f.service.summary(&f.alice, now).unwrap();
        assert_eq!(mine.total, 2);
        assert_eq!(mine.by_model, vec![("A".to_owned(), 2)]);
        assert_eq!(f.service.summary(&f.admin, now).unwrap().total, 3);
    }
}
