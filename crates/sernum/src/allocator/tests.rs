use crate::{
    AllocError, Allocator, Batch, InsertStatus, MemoryStore, NewSerialRecord, OwnerId, RandSource,
    RetryPolicy, Role, SerialFormat, SerialNumber, SerialStore, StoreError, ThreadRandom,
    UserStore, record::sample_metadata,
};
use std::cell::Cell;
use std::collections::HashSet;

/// Replays a fixed script of draws, wrapping at the end.
struct ScriptedRand {
    script: Vec<usize>,
    pos: Cell<usize>,
}

impl ScriptedRand {
    fn new(script: &[usize]) -> Self {
        Self {
            script: script.to_vec(),
            pos: Cell::new(0),
        }
    }
}

impl RandSource for ScriptedRand {
    fn rand_below(&self, _bound: usize) -> usize {
        let i = self.pos.get();
        self.pos.set(i + 1);
        self.script[i % self.script.len()]
    }
}

/// Fails the `fail_on`-th insert (1-based) with a backend error.
struct FailingStore<S> {
    inner: S,
    fail_on: usize,
    calls: Cell<usize>,
}

impl<S: SerialStore> SerialStore for FailingStore<S> {
    fn insert(&self, record: &NewSerialRecord) -> Result<InsertStatus, StoreError> {
        let call = self.calls.get() + 1;
        self.calls.set(call);
        if call == self.fail_on {
            return Err(StoreError::Backend("disk I/O error".to_owned()));
        }
        self.inner.insert(record)
    }
    fn get(&self, id: crate::RecordId) -> Result<Option<crate::SerialRecord>, StoreError> {
        self.inner.get(id)
    }
    fn query_by_owner(&self, owner: OwnerId) -> Result<Vec<crate::SerialRecord>, StoreError> {
        self.inner.query_by_owner(owner)
    }
    fn query_all(&self) -> Result<Vec<crate::SerialRecord>, StoreError> {
        self.inner.query_all()
    }
    fn query_month(
        &self,
        month: crate::YearMonth,
        owner: Option<OwnerId>,
    ) -> Result<Vec<crate::SerialRecord>, StoreError> {
        self.inner.query_month(month, owner)
    }
    fn update(&self, id: crate::RecordId, metadata: &crate::BatchMetadata) -> Result<(), StoreError> {
        self.inner.update(id, metadata)
    }
    fn delete(&self, id: crate::RecordId) -> Result<(), StoreError> {
        self.inner.delete(id)
    }
}

const TINY: SerialFormat = SerialFormat::new(b"AB", &[2], b'-');

fn setup() -> (MemoryStore, Batch) {
    let store = MemoryStore::new();
    let owner = store.insert_user("ops", "hash", Role::User).unwrap().id;
    (store, Batch::new(owner, sample_metadata("HX-200")))
}

fn seed(store: &impl SerialStore, batch: &Batch, serial: &str, format: &SerialFormat) {
    let status = store
        .insert(&NewSerialRecord {
            serial_number: format.parse(serial).unwrap(),
            owner_id: batch.owner,
            metadata: batch.metadata.clone(),
        })
        .unwrap();
    assert!(matches!(status, InsertStatus::Inserted { .. }));
}

#[test]
fn allocates_requested_count_and_persists_each() {
    let (store, batch) = setup();
    let allocator = Allocator::new(&store);

    let serials = allocator.allocate(&batch, 3).unwrap();
    assert_eq!(serials.len(), 3);
    assert_eq!(serials.iter().collect::<HashSet<_>>().len(), 3);

    let stored = store.query_all().unwrap();
    assert_eq!(stored.len(), 3);
    for record in &stored {
        assert!(serials.contains(&record.serial_number));
        assert_eq!(record.owner_id, batch.owner);
        assert_eq!(record.metadata, batch.metadata);
    }
}

#[test]
fn serials_match_standard_shape_and_avoid_existing_ones() {
    let (store, batch) = setup();
    let existing = ["AAAAA-0000", "ZZZZZ-9999", "7K3QZ-9F2A"];
    for s in existing {
        seed(&store, &batch, s, &SerialFormat::STANDARD);
    }

    let serials = Allocator::new(&store).allocate(&batch, 200).unwrap();
    let unique: HashSet<_> = serials.iter().collect();
    assert_eq!(unique.len(), 200);
    for serial in &serials {
        let s = serial.as_str();
        assert_eq!(s.len(), 10);
        assert_eq!(s.as_bytes()[5], b'-');
        assert!(
            s.bytes()
                .enumerate()
                .all(|(i, b)| i == 5 || b.is_ascii_uppercase() || b.is_ascii_digit())
        );
        assert!(!existing.contains(&s));
    }
    assert_eq!(store.query_all().unwrap().len(), 203);
}

#[test]
fn collision_is_absorbed_and_next_candidate_used() {
    let (store, batch) = setup();
    seed(&store, &batch, "AA", &TINY);

    // First candidate "AA" collides, second is "AB".
    let allocator = Allocator::with_rng(&store, ScriptedRand::new(&[0, 0, 0, 1])).with_format(TINY);
    let serials = allocator.allocate(&batch, 1).unwrap();
    assert_eq!(serials, vec![TINY.parse("AB").unwrap()]);
}

#[test]
fn nearly_full_space_still_terminates_with_the_last_serial() {
    let (store, batch) = setup();
    for s in ["AA", "AB", "BA"] {
        seed(&store, &batch, s, &TINY);
    }

    let allocator = Allocator::with_rng(&store, ThreadRandom).with_format(TINY);
    let serials = allocator.allocate(&batch, 1).unwrap();
    assert_eq!(serials[0].as_str(), "BB");
    assert_eq!(store.query_all().unwrap().len(), 4);
}

#[test]
fn bounded_retry_reports_exhaustion() {
    let (store, batch) = setup();
    for s in ["AA", "AB", "BA", "BB"] {
        seed(&store, &batch, s, &TINY);
    }

    let allocator = Allocator::new(&store)
        .with_format(TINY)
        .with_retry(RetryPolicy::Bounded(10));
    let err = allocator.allocate(&batch, 2).unwrap_err();
    assert!(matches!(
        err,
        AllocError::Exhausted {
            unit: 1,
            attempts: 10,
            ..
        }
    ));
    assert!(!err.is_partial());
    assert_eq!(store.query_all().unwrap().len(), 4);
}

#[test]
fn exhaustion_mid_batch_keeps_earlier_units() {
    let (store, batch) = setup();
    for s in ["AA", "AB"] {
        seed(&store, &batch, s, &TINY);
    }

    let allocator = Allocator::new(&store)
        .with_format(TINY)
        .with_retry(RetryPolicy::Bounded(500));
    let err = allocator.allocate(&batch, 3).unwrap_err();
    assert_eq!(err.failed_unit(), Some(3));
    assert_eq!(err.committed().len(), 2);
    assert_eq!(store.query_all().unwrap().len(), 4);
}

#[test]
fn store_failure_mid_batch_reports_committed_prefix() {
    let (store, batch) = setup();
    let failing = FailingStore {
        inner: &store,
        fail_on: 3,
        calls: Cell::new(0),
    };

    let err = Allocator::new(&failing).allocate(&batch, 5).unwrap_err();
    match &err {
        AllocError::Persistence {
            committed,
            unit,
            source,
        } => {
            assert_eq!(committed.len(), 2);
            assert_eq!(*unit, 3);
            assert!(matches!(source, StoreError::Backend(_)));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(err.is_partial());

    let stored: HashSet<SerialNumber> = store
        .query_all()
        .unwrap()
        .into_iter()
        .map(|r| r.serial_number)
        .collect();
    assert_eq!(stored, err.committed().iter().cloned().collect());
}

#[test]
fn unknown_owner_is_a_persistence_error_not_a_retry() {
    let store = MemoryStore::new();
    let batch = Batch::new(OwnerId(42), sample_metadata("HX-200"));

    let err = Allocator::new(&store).allocate(&batch, 2).unwrap_err();
    assert!(matches!(
        err,
        AllocError::Persistence {
            unit: 1,
            source: StoreError::UnknownOwner { .. },
            ..
        }
    ));
    assert!(err.committed().is_empty());
}

#[test]
fn invalid_requests_insert_nothing() {
    let (store, mut batch) = setup();
    let allocator = Allocator::new(&store);

    assert!(matches!(
        allocator.allocate(&batch, 0),
        Err(AllocError::Validation { .. })
    ));

    batch.metadata.model_number = "   ".to_owned();
    let err = allocator.allocate(&batch, 2).unwrap_err();
    assert_eq!(err.to_string(), "invalid batch: model number must not be blank");
    assert_eq!(err.failed_unit(), None);
    assert!(store.query_all().unwrap().is_empty());
}

#[test]
fn metadata_is_normalized_before_insert() {
    let (store, mut batch) = setup();
    batch.metadata.brazer_name = "  R. Osei ".to_owned();
    batch.metadata.code_b = Some(" ".to_owned());

    let record = Allocator::new(&store).allocate_one(&batch).unwrap();
    assert_eq!(record.metadata.brazer_name, "R. Osei");
    assert_eq!(record.metadata.code_b, None);
    assert_eq!(store.get(record.id).unwrap(), Some(record));
}

#[test]
fn allocators_sharing_a_store_never_issue_the_same_serial() {
    let (store, batch) = setup();
    // The second script starts with the first one's two candidates, so the
    // second allocator must retry past both.
    let script: Vec<usize> = (0..36).collect();
    let a = Allocator::with_rng(&store, ScriptedRand::new(&script[..18]));
    let b = Allocator::with_rng(&store, ScriptedRand::new(&script));

    let mut all = a.allocate(&batch, 2).unwrap();
    all.extend(b.allocate(&batch, 2).unwrap());
    assert_eq!(all.iter().collect::<HashSet<_>>().len(), 4);
    assert_eq!(store.query_all().unwrap().len(), 4);
}

#[test]
fn concurrent_allocators_on_one_store() {
    let (store, batch) = setup();
    let store = std::sync::Arc::new(store);

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let store = store.clone();
            let batch = batch.clone();
            std::thread::spawn(move || Allocator::new(store).allocate(&batch, 50).unwrap())
        })
        .collect();

    let mut all = HashSet::new();
    for h in handles {
        all.extend(h.join().unwrap());
    }
    assert_eq!(all.len(), 200);
    assert_eq!(store.query_all().unwrap().len(), 200);
}

#[cfg(feature = "sqlite")]
#[test]
fn sqlite_constraint_drives_retry() {
    let store = crate::SqliteStore::open_in_memory().unwrap();
    let owner = store.insert_user("ops", "hash", Role::User).unwrap().id;
    let batch = Batch::new(owner, sample_metadata("HX-200"));
    seed(&store, &batch, "AA", &TINY);

    let allocator = Allocator::with_rng(&store, ScriptedRand::new(&[0, 0, 1, 1])).with_format(TINY);
    let record = allocator.allocate_one(&batch).unwrap();
    assert_eq!(record.serial_number.as_str(), "BB");
    assert_eq!(store.query_all().unwrap().len(), 2);
}
