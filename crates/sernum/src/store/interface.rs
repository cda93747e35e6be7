use crate::{
    BatchMetadata, NewSerialRecord, OwnerId, RecordId, Role, SerialRecord, StoreError, User,
    YearMonth,
};
use std::sync::Arc;

/// Outcome of [`SerialStore::insert`].
///
/// - [`InsertStatus::Inserted`] means the record is durably stored.
/// - [`InsertStatus::Duplicate`] means the store rejected the insert solely
///   because the serial number already exists. Nothing was written; the
///   caller should retry with a new candidate.
///
/// Every other reason an insert can fail is a [`StoreError`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InsertStatus {
    /// The record was accepted.
    Inserted {
        /// The record as stored, with its assigned id and timestamp.
        record: SerialRecord,
    },
    /// The serial number is already taken.
    Duplicate,
}

/// Persistence for serial records.
///
/// Implementations must enforce serial uniqueness atomically at insert time:
/// two inserts of the same serial, from any number of handles or processes,
/// must never both return [`InsertStatus::Inserted`]. The allocator relies on
/// this and keeps no bookkeeping of its own.
///
/// Query results are ordered newest first (descending id).
pub trait SerialStore {
    /// Inserts a new record, assigning its id and `created_at`.
    ///
    /// # Errors
    /// - [`StoreError::UnknownOwner`] if the owner does not exist.
    /// - Any backend failure.
    fn insert(&self, record: &NewSerialRecord) -> Result<InsertStatus, StoreError>;

    /// Looks up one record by id.
    ///
    /// # Errors
    /// Backend failures only.
    fn get(&self, id: RecordId) -> Result<Option<SerialRecord>, StoreError>;

    /// All records owned by `owner`.
    ///
    /// # Errors
    /// Backend failures only.
    fn query_by_owner(&self, owner: OwnerId) -> Result<Vec<SerialRecord>, StoreError>;

    /// Every record in the store.
    ///
    /// # Errors
    /// Backend failures only.
    fn query_all(&self) -> Result<Vec<SerialRecord>, StoreError>;

    /// Records created during `month`, optionally restricted to one owner.
    ///
    /// # Errors
    /// Backend failures only.
    fn query_month(
        &self,
        month: YearMonth,
        owner: Option<OwnerId>,
    ) -> Result<Vec<SerialRecord>, StoreError>;

    /// Replaces the descriptive metadata of a record. The serial number,
    /// owner and timestamp never change.
    ///
    /// # Errors
    /// - [`StoreError::NotFound`] if no such record exists.
    fn update(&self, id: RecordId, metadata: &BatchMetadata) -> Result<(), StoreError>;

    /// Removes a record.
    ///
    /// # Errors
    /// - [`StoreError::NotFound`] if no such record exists.
    fn delete(&self, id: RecordId) -> Result<(), StoreError>;
}

/// Persistence for user accounts. Passwords arrive already hashed.
pub trait UserStore {
    /// # Errors
    /// - [`StoreError::UsernameTaken`] if the name exists.
    fn insert_user(
        &self,
        username: &str,
        password_hash: &str,
        role: Role,
    ) -> Result<User, StoreError>;

    /// Returns the user and their stored password hash.
    ///
    /// # Errors
    /// Backend failures only.
    fn find_user(&self, username: &str) -> Result<Option<(User, String)>, StoreError>;

    /// # Errors
    /// Backend failures only.
    fn get_user(&self, id: OwnerId) -> Result<Option<User>, StoreError>;

    /// Users ordered by id.
    ///
    /// # Errors
    /// Backend failures only.
    fn list_users(&self) -> Result<Vec<User>, StoreError>;

    /// Renames and re-roles a user, replacing the password hash when one is
    /// given.
    ///
    /// # Errors
    /// - [`StoreError::UserNotFound`] if no such user exists.
    /// - [`StoreError::UsernameTaken`] if the new name belongs to someone else.
    fn update_user(
        &self,
        id: OwnerId,
        username: &str,
        password_hash: Option<&str>,
        role: Role,
    ) -> Result<(), StoreError>;

    /// # Errors
    /// - [`StoreError::UserNotFound`] if no such user exists.
    /// - [`StoreError::OwnerInUse`] if the user still owns serial records.
    fn delete_user(&self, id: OwnerId) -> Result<(), StoreError>;
}

macro_rules! forward_stores {
    ($($wrapper:ty),*) => {$(
        impl<S: SerialStore + ?Sized> SerialStore for $wrapper {
            fn insert(&self, record: &NewSerialRecord) -> Result<InsertStatus, StoreError> {
                (**self).insert(record)
            }
            fn get(&self, id: RecordId) -> Result<Option<SerialRecord>, StoreError> {
                (**self).get(id)
            }
            fn query_by_owner(&self, owner: OwnerId) -> Result<Vec<SerialRecord>, StoreError> {
                (**self).query_by_owner(owner)
            }
            fn query_all(&self) -> Result<Vec<SerialRecord>, StoreError> {
                (**self).query_all()
            }
            fn query_month(
                &self,
                month: YearMonth,
                owner: Option<OwnerId>,
            ) -> Result<Vec<SerialRecord>, StoreError> {
                (**self).query_month(month, owner)
            }
            fn update(&self, id: RecordId, metadata: &BatchMetadata) -> Result<(), StoreError> {
                (**self).update(id, metadata)
            }
            fn delete(&self, id: RecordId) -> Result<(), StoreError> {
                (**self).delete(id)
            }
        }

        impl<S: UserStore + ?Sized> UserStore for $wrapper {
            fn insert_user(
                &self,
                username: &str,
                password_hash: &str,
                role: Role,
            ) -> Result<User, StoreError> {
                (**self).insert_user(username, password_hash, role)
            }
            fn find_user(&self, username: &str) -> Result<Option<(User, String)>, StoreError> {
                (**self).find_user(username)
            }
            fn get_user(&self, id: OwnerId) -> Result<Option<User>, StoreError> {
                (**self).get_user(id)
            }
            fn list_users(&self) -> Result<Vec<User>, StoreError> {
                (**self).list_users()
            }
            fn update_user(
                &self,
                id: OwnerId,
                username: &str,
                password_hash: Option<&str>,
                role: Role,
            ) -> Result<(), StoreError> {
                (**self).update_user(id, username, password_hash, role)
            }
            fn delete_user(&self, id: OwnerId) -> Result<(), StoreError> {
                (**self).delete_user(id)
            }
        }
    )*};
}

forward_stores!(&S, Arc<S>);
