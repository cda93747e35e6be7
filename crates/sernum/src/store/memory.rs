use crate::{
    BatchMetadata, InsertStatus, NewSerialRecord, OwnerId, RecordId, Role, SerialNumber,
    SerialRecord, SerialStore, StoreError, SystemClock, TimeSource, User, UserStore, YearMonth,
};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashSet};

/// A volatile store that keeps everything in process memory.
///
/// Enforces the same invariants as the SQLite store: serial numbers are
/// unique, owners must exist, users that own records cannot be deleted. Ids
/// are monotonic and never reused. Useful for tests and dry runs.
#[derive(Debug)]
pub struct MemoryStore<T = SystemClock> {
    inner: Mutex<Inner>,
    clock: T,
}

#[derive(Debug, Default)]
struct Inner {
    last_record: i64,
    last_user: i64,
    records: BTreeMap<RecordId, SerialRecord>,
    serials: HashSet<SerialNumber>,
    users: BTreeMap<OwnerId, (User, String)>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: TimeSource> MemoryStore<T> {
    pub fn with_clock(clock: T) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            clock,
        }
    }

    fn collect<F>(&self, mut keep: F) -> Vec<SerialRecord>
    where
        F: FnMut(&SerialRecord) -> bool,
    {
        self.inner
            .lock()
            .records
            .values()
            .rev()
            .filter(|r| keep(r))
            .cloned()
            .collect()
    }
}

impl<T: TimeSource> SerialStore for MemoryStore<T> {
    fn insert(&self, record: &NewSerialRecord) -> Result<InsertStatus, StoreError> {
        let mut inner = self.inner.lock();
        if !inner.users.contains_key(&record.owner_id) {
            return Err(StoreError::UnknownOwner {
                owner: record.owner_id,
            });
        }
        if inner.serials.contains(&record.serial_number) {
            return Ok(InsertStatus::Duplicate);
        }

        inner.last_record += 1;
        let stored = SerialRecord {
            id: RecordId(inner.last_record),
            serial_number: record.serial_number.clone(),
            metadata: record.metadata.clone(),
            owner_id: record.owner_id,
            created_at: self.clock.now(),
        };
        inner.serials.insert(stored.serial_number.clone());
        inner.records.insert(stored.id, stored.clone());
        Ok(InsertStatus::Inserted { record: stored })
    }

    fn get(&self, id: RecordId) -> Result<Option<SerialRecord>, StoreError> {
        Ok(self.inner.lock().records.get(&id).cloned())
    }

    fn query_by_owner(&self, owner: OwnerId) -> Result<Vec<SerialRecord>, StoreError> {
        Ok(self.collect(|r| r.owner_id == owner))
    }

    fn query_all(&self) -> Result<Vec<SerialRecord>, StoreError> {
        Ok(self.collect(|_| true))
    }

    fn query_month(
        &self,
        month: YearMonth,
        owner: Option<OwnerId>,
    ) -> Result<Vec<SerialRecord>, StoreError> {
        Ok(self.collect(|r| {
            month.contains(r.created_at) && owner.is_none_or(|o| o == r.owner_id)
        }))
    }

    fn update(&self, id: RecordId, metadata: &BatchMetadata) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        let record = inner
            .records
            .get_mut(&id)
            .ok_or(StoreError::NotFound { id })?;
        record.metadata = metadata.clone();
        Ok(())
    }

    fn delete(&self, id: RecordId) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        let record = inner
            .records
            .remove(&id)
            .ok_or(StoreError::NotFound { id })?;
        inner.serials.remove(&record.serial_number);
        Ok(())
    }
}

impl<T: TimeSource> UserStore for MemoryStore<T> {
    fn insert_user(
        &self,
        username: &str,
        password_hash: &str,
        role: Role,
    ) -> Result<User, StoreError> {
        let mut inner = self.inner.lock();
        if inner.users.values().any(|(u, _)| u.username == username) {
            return Err(StoreError::UsernameTaken {
                username: username.to_owned(),
            });
        }
        inner.last_user += 1;
        let user = User {
            id: OwnerId(inner.last_user),
            username: username.to_owned(),
            role,
            created_at: self.clock.now(),
        };
        inner
            .users
            .insert(user.id, (user.clone(), password_hash.to_owned()));
        Ok(user)
    }

    fn find_user(&self, username: &str) -> Result<Option<(User, String)>, StoreError> {
        Ok(self
            .inner
            .lock()
            .users
            .values()
            .find(|(u, _)| u.username == username)
            .cloned())
    }

    fn get_user(&self, id: OwnerId) -> Result<Option<User>, StoreError> {
        Ok(self.inner.lock().users.get(&id).map(|(u, _)| u.clone()))
    }

    fn list_users(&self) -> Result<Vec<User>, StoreError> {
        Ok(self
            .inner
            .lock()
            .users
            .values()
            .map(|(u, _)| u.clone())
            .collect())
    }

    fn update_user(
        &self,
        id: OwnerId,
        username: &str,
        password_hash: Option<&str>,
        role: Role,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        if inner
            .users
            .values()
            .any(|(u, _)| u.username == username && u.id != id)
        {
            return Err(StoreError::UsernameTaken {
                username: username.to_owned(),
            });
        }
        let (user, hash) = inner
            .users
            .get_mut(&id)
            .ok_or(StoreError::UserNotFound { id })?;
        username.clone_into(&mut user.username);
        user.role = role;
        if let Some(new_hash) = password_hash {
            new_hash.clone_into(hash);
        }
        Ok(())
    }

    fn delete_user(&self, id: OwnerId) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        if !inner.users.contains_key(&id) {
            return Err(StoreError::UserNotFound { id });
        }
        if inner.records.values().any(|r| r.owner_id == id) {
            return Err(StoreError::OwnerInUse { owner: id });
        }
        inner.users.remove(&id);
        Ok(())
    }
}
