use crate::{
    BatchMetadata, InsertStatus, NewSerialRecord, OwnerId, RecordId, Role, SerialNumber,
    SerialRecord, SerialStore, StoreError, SystemClock, TimeSource, User, UserStore, YearMonth,
};
use chrono::{DateTime, NaiveDate, SecondsFormat, SubsecRound, Utc};
use parking_lot::Mutex;
use rusqlite::{Connection, ErrorCode, OptionalExtension, Row, ffi, params};
use std::path::Path;

#[cfg(feature = "tracing")]
use tracing::instrument;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS users (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    username      TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    role          TEXT NOT NULL CHECK (role IN ('Admin', 'User')),
    created_at    TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS serials (
    id                    INTEGER PRIMARY KEY AUTOINCREMENT,
    serial_number         TEXT NOT NULL UNIQUE,
    model_number          TEXT NOT NULL,
    quantity              INTEGER NOT NULL,
    date_of_manufacturing TEXT NOT NULL,
    brazer_name           TEXT NOT NULL,
    operator_code         TEXT NOT NULL,
    code_a                TEXT,
    code_b                TEXT,
    code_c                TEXT,
    code_d                TEXT,
    owner_id              INTEGER NOT NULL REFERENCES users (id),
    created_at            TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS serials_owner_id ON serials (owner_id);
CREATE INDEX IF NOT EXISTS serials_created_at ON serials (created_at);
";

const SERIAL_COLUMNS: &str = "id, serial_number, model_number, quantity, date_of_manufacturing, \
     brazer_name, operator_code, code_a, code_b, code_c, code_d, owner_id, created_at";

/// A [`SerialStore`] and [`UserStore`] backed by SQLite (bundled).
///
/// Serial uniqueness is a `UNIQUE` constraint on `serials.serial_number`, so
/// it holds across every connection and process sharing the database file.
/// Foreign keys are enforced: records must reference an existing user.
///
/// The handle owns its connection. Call [`SqliteStore::close`] to release it
/// and observe close errors; dropping the store also releases it.
pub struct SqliteStore<T = SystemClock> {
    conn: Mutex<Connection>,
    clock: T,
}

impl SqliteStore {
    /// Opens or creates a database file and ensures the schema exists.
    ///
    /// # Errors
    /// Any driver error while opening or migrating.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::open_with_clock(path, SystemClock)
    }

    /// Creates a private in-memory database (useful for tests).
    ///
    /// # Errors
    /// Any driver error while migrating.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::open_in_memory_with_clock(SystemClock)
    }
}

impl<T: TimeSource> SqliteStore<T> {
    /// # Errors
    /// Any driver error while opening or migrating.
    pub fn open_with_clock(path: impl AsRef<Path>, clock: T) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        // WAL lets readers proceed while a batch is being written.
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Self::init(conn, clock)
    }

    /// # Errors
    /// Any driver error while migrating.
    pub fn open_in_memory_with_clock(clock: T) -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?, clock)
    }

    fn init(conn: Connection, clock: T) -> Result<Self, StoreError> {
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
            clock,
        })
    }

    /// Closes the underlying connection.
    ///
    /// # Errors
    /// The driver's error if SQLite refuses to close (e.g. unfinalized
    /// statements). The connection is released either way.
    pub fn close(self) -> Result<(), StoreError> {
        self.conn
            .into_inner()
            .close()
            .map_err(|(_conn, err)| StoreError::Sqlite(err))
    }

    fn select_serials(
        &self,
        filter: &str,
        params: &[&dyn rusqlite::ToSql],
    ) -> Result<Vec<SerialRecord>, StoreError> {
        let sql = format!("SELECT {SERIAL_COLUMNS} FROM serials {filter} ORDER BY id DESC");
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(&sql)?;
        let rows = stmt.query_map(params, RawSerial::from_row)?;
        let mut out = Vec::new();
        for raw in rows {
            out.push(raw?.decode()?);
        }
        Ok(out)
    }
}

/// Extended result code of a constraint violation, if `err` is one.
fn constraint_violation(err: &rusqlite::Error) -> Option<i32> {
    match err {
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation => {
            Some(e.extended_code)
        }
        _ => None,
    }
}

/// Timestamps are stored with millisecond precision, so they are truncated
/// before being written and handed back.
fn stamp<T: TimeSource>(clock: &T) -> DateTime<Utc> {
    clock.now().trunc_subsecs(3)
}

fn encode_time(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn decode_time(s: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt {
            reason: format!("timestamp `{s}`: {e}"),
        })
}

/// Column values as read, before anything is parsed.
struct RawSerial {
    id: i64,
    serial_number: String,
    model_number: String,
    quantity: i64,
    date_of_manufacturing: String,
    brazer_name: String,
    operator_code: String,
    codes: [Option<String>; 4],
    owner_id: i64,
    created_at: String,
}

impl RawSerial {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            serial_number: row.get(1)?,
            model_number: row.get(2)?,
            quantity: row.get(3)?,
            date_of_manufacturing: row.get(4)?,
            brazer_name: row.get(5)?,
            operator_code: row.get(6)?,
            codes: [row.get(7)?, row.get(8)?, row.get(9)?, row.get(10)?],
            owner_id: row.get(11)?,
            created_at: row.get(12)?,
        })
    }

    fn decode(self) -> Result<SerialRecord, StoreError> {
        let date_of_manufacturing = self
            .date_of_manufacturing
            .parse::<NaiveDate>()
            .map_err(|e| StoreError::Corrupt {
                reason: format!("date `{}`: {e}", self.date_of_manufacturing),
            })?;
        let quantity = u32::try_from(self.quantity).map_err(|_| StoreError::Corrupt {
            reason: format!("quantity {}", self.quantity),
        })?;
        let [code_a, code_b, code_c, code_d] = self.codes;
        Ok(SerialRecord {
            id: RecordId(self.id),
            serial_number: SerialNumber::from_trusted(self.serial_number),
            metadata: BatchMetadata {
                model_number: self.model_number,
                quantity,
                date_of_manufacturing,
                brazer_name: self.brazer_name,
                operator_code: self.operator_code,
                code_a,
                code_b,
                code_c,
                code_d,
            },
            owner_id: OwnerId(self.owner_id),
            created_at: decode_time(&self.created_at)?,
        })
    }
}

impl<T: TimeSource> SerialStore for SqliteStore<T> {
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "trace", skip(self, record), fields(serial = %record.serial_number))
    )]
    fn insert(&self, record: &NewSerialRecord) -> Result<InsertStatus, StoreError> {
        let created_at = stamp(&self.clock);
        let m = &record.metadata;
        let conn = self.conn.lock();
        let result = conn
            .prepare_cached(
                "INSERT INTO serials (serial_number, model_number, quantity, \
                 date_of_manufacturing, brazer_name, operator_code, code_a, code_b, code_c, \
                 code_d, owner_id, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            )?
            .execute(params![
                record.serial_number.as_str(),
                m.model_number,
                i64::from(m.quantity),
                m.date_of_manufacturing.to_string(),
                m.brazer_name,
                m.operator_code,
                m.code_a,
                m.code_b,
                m.code_c,
                m.code_d,
                record.owner_id.0,
                encode_time(created_at),
            ]);

        match result {
            Ok(_) => Ok(InsertStatus::Inserted {
                record: SerialRecord {
                    id: RecordId(conn.last_insert_rowid()),
                    serial_number: record.serial_number.clone(),
                    metadata: record.metadata.clone(),
                    owner_id: record.owner_id,
                    created_at,
                },
            }),
            // `serial_number` is the only UNIQUE column on `serials`.
            Err(err) if constraint_violation(&err) == Some(ffi::SQLITE_CONSTRAINT_UNIQUE) => {
                Ok(InsertStatus::Duplicate)
            }
            Err(err) if constraint_violation(&err) == Some(ffi::SQLITE_CONSTRAINT_FOREIGNKEY) => {
                Err(StoreError::UnknownOwner {
                    owner: record.owner_id,
                })
            }
            Err(err) => Err(err.into()),
        }
    }

    fn get(&self, id: RecordId) -> Result<Option<SerialRecord>, StoreError> {
        Ok(self
            .select_serials("WHERE id = ?1", &[&id.0])?
            .into_iter()
            .next())
    }

    fn query_by_owner(&self, owner: OwnerId) -> Result<Vec<SerialRecord>, StoreError> {
        self.select_serials("WHERE owner_id = ?1", &[&owner.0])
    }

    fn query_all(&self) -> Result<Vec<SerialRecord>, StoreError> {
        self.select_serials("", &[])
    }

    fn query_month(
        &self,
        month: YearMonth,
        owner: Option<OwnerId>,
    ) -> Result<Vec<SerialRecord>, StoreError> {
        let (start, end) = month.bounds();
        let (start, end) = (encode_time(start), encode_time(end));
        match owner {
            Some(owner) => self.select_serials(
                "WHERE created_at >= ?1 AND created_at < ?2 AND owner_id = ?3",
                &[&start, &end, &owner.0],
            ),
            None => self.select_serials(
                "WHERE created_at >= ?1 AND created_at < ?2",
                &[&start, &end],
            ),
        }
    }

    fn update(&self, id: RecordId, metadata: &BatchMetadata) -> Result<(), StoreError> {
        let changed = self.conn.lock().execute(
            "UPDATE serials SET model_number = ?1, quantity = ?2, date_of_manufacturing = ?3, \
             brazer_name = ?4, operator_code = ?5, code_a = ?6, code_b = ?7, code_c = ?8, \
             code_d = ?9
             WHERE id = ?10",
            params![
                metadata.model_number,
                i64::from(metadata.quantity),
                metadata.date_of_manufacturing.to_string(),
                metadata.brazer_name,
                metadata.operator_code,
                metadata.code_a,
                metadata.code_b,
                metadata.code_c,
                metadata.code_d,
                id.0,
            ],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound { id });
        }
        Ok(())
    }

    fn delete(&self, id: RecordId) -> Result<(), StoreError> {
        let changed = self
            .conn
            .lock()
            .execute("DELETE FROM serials WHERE id = ?1", params![id.0])?;
        if changed == 0 {
            return Err(StoreError::NotFound { id });
        }
        Ok(())
    }
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<(i64, String, String, String)> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

fn decode_user(
    (id, username, role, created_at): (i64, String, String, String),
) -> Result<User, StoreError> {
    Ok(User {
        id: OwnerId(id),
        role: role.parse().map_err(|_| StoreError::Corrupt {
            reason: format!("role `{role}`"),
        })?,
        username,
        created_at: decode_time(&created_at)?,
    })
}

impl<T: TimeSource> UserStore for SqliteStore<T> {
    fn insert_user(
        &self,
        username: &str,
        password_hash: &str,
        role: Role,
    ) -> Result<User, StoreError> {
        let created_at = stamp(&self.clock);
        let conn = self.conn.lock();
        let result = conn.execute(
            "INSERT INTO users (username, password_hash, role, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![username, password_hash, role.as_str(), encode_time(created_at)],
        );
        match result {
            Ok(_) => Ok(User {
                id: OwnerId(conn.last_insert_rowid()),
                username: username.to_owned(),
                role,
                created_at,
            }),
            Err(err) if constraint_violation(&err) == Some(ffi::SQLITE_CONSTRAINT_UNIQUE) => {
                Err(StoreError::UsernameTaken {
                    username: username.to_owned(),
                })
            }
            Err(err) => Err(err.into()),
        }
    }

    fn find_user(&self, username: &str) -> Result<Option<(User, String)>, StoreError> {
        let conn = self.conn.lock();
        let found = conn
            .query_row(
                "SELECT id, username, role, created_at, password_hash FROM users WHERE username = ?1",
                params![username],
                |row| Ok((user_from_row(row)?, row.get::<_, String>(4)?)),
            )
            .optional()?;
        found
            .map(|(raw, hash)| Ok::<_, StoreError>((decode_user(raw)?, hash)))
            .transpose()
    }

    fn get_user(&self, id: OwnerId) -> Result<Option<User>, StoreError> {
        let conn = self.conn.lock();
        let found = conn
            .query_row(
                "SELECT id, username, role, created_at FROM users WHERE id = ?1",
                params![id.0],
                user_from_row,
            )
            .optional()?;
        found.map(decode_user).transpose()
    }

    fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt =
            conn.prepare_cached("SELECT id, username, role, created_at FROM users ORDER BY id")?;
        let rows = stmt.query_map([], user_from_row)?;
        let mut out = Vec::new();
        for raw in rows {
            out.push(decode_user(raw?)?);
        }
        Ok(out)
    }

    fn update_user(
        &self,
        id: OwnerId,
        username: &str,
        password_hash: Option<&str>,
        role: Role,
    ) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        let result = match password_hash {
            Some(hash) => conn.execute(
                "UPDATE users SET username = ?1, role = ?2, password_hash = ?3 WHERE id = ?4",
                params![username, role.as_str(), hash, id.0],
            ),
            None => conn.execute(
                "UPDATE users SET username = ?1, role = ?2 WHERE id = ?3",
                params![username, role.as_str(), id.0],
            ),
        };
        match result {
            Ok(0) => Err(StoreError::UserNotFound { id }),
            Ok(_) => Ok(()),
            Err(err) if constraint_violation(&err) == Some(ffi::SQLITE_CONSTRAINT_UNIQUE) => {
                Err(StoreError::UsernameTaken {
                    username: username.to_owned(),
                })
            }
            Err(err) => Err(err.into()),
        }
    }

    fn delete_user(&self, id: OwnerId) -> Result<(), StoreError> {
        let result = self
            .conn
            .lock()
            .execute("DELETE FROM users WHERE id = ?1", params![id.0]);
        match result {
            Ok(0) => Err(StoreError::UserNotFound { id }),
            Ok(_) => Ok(()),
            Err(err) if constraint_violation(&err) == Some(ffi::SQLITE_CONSTRAINT_FOREIGNKEY) => {
                Err(StoreError::OwnerInUse { owner: id })
            }
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::sample_metadata;
    use chrono::TimeZone;

    struct FixedTime(DateTime<Utc>);

    impl TimeSource for FixedTime {
        fn now(&self) -> DateTime<Utc> {
            self.0
        }
    }

    fn new_record(serial: &str, owner: OwnerId) -> NewSerialRecord {
        NewSerialRecord {
            serial_number: serial.parse().unwrap(),
            owner_id: owner,
            metadata: sample_metadata("M1"),
        }
    }

    fn inserted(status: InsertStatus) -> SerialRecord {
        match status {
            InsertStatus::Inserted { record } => record,
            InsertStatus::Duplicate => panic!("unexpected duplicate"),
        }
    }

    #[test]
    fn explicit_duplicate_serial_is_rejected_as_duplicate() {
        let store = SqliteStore::open_in_memory().unwrap();
        let owner = store.insert_user("ops", "hash", Role::User).unwrap().id;
        let rec = new_record("7K3QZ-9F2A", owner);

        inserted(store.insert(&rec).unwrap());
        assert_eq!(store.insert(&rec).unwrap(), InsertStatus::Duplicate);
        assert_eq!(store.query_all().unwrap().len(), 1);
    }

    #[test]
    fn missing_owner_is_a_referential_failure() {
        let store = SqliteStore::open_in_memory().unwrap();
        let err = store
            .insert(&new_record("7K3QZ-9F2A", OwnerId(42)))
            .unwrap_err();
        assert!(matches!(err, StoreError::UnknownOwner { owner: OwnerId(42) }));
    }

    #[test]
    fn inserted_record_reads_back_identically() {
        let at = Utc.with_ymd_and_hms(2025, 6, 3, 8, 30, 0).unwrap();
        let store = SqliteStore::open_in_memory_with_clock(FixedTime(at)).unwrap();
        let owner = store.insert_user("ops", "hash", Role::User).unwrap().id;

        let written = inserted(store.insert(&new_record("7K3QZ-9F2A", owner)).unwrap());
        let read = store.get(written.id).unwrap().unwrap();
        assert_eq!(read, written);
        assert_eq!(read.created_at, at);
        assert_eq!(store.query_by_owner(owner).unwrap(), vec![written]);
        assert!(store.query_by_owner(OwnerId(owner.0 + 1)).unwrap().is_empty());
    }

    #[test]
    fn month_query_uses_half_open_bounds() {
        let at = Utc.with_ymd_and_hms(2025, 6, 30, 23, 59, 59).unwrap();
        let store = SqliteStore::open_in_memory_with_clock(FixedTime(at)).unwrap();
        let owner = store.insert_user("ops", "hash", Role::User).unwrap().id;
        inserted(store.insert(&new_record("7K3QZ-9F2A", owner)).unwrap());

        let june = YearMonth::new(2025, 6).unwrap();
        assert_eq!(store.query_month(june, None).unwrap().len(), 1);
        assert_eq!(store.query_month(june, Some(owner)).unwrap().len(), 1);
        assert!(store.query_month(june.next(), None).unwrap().is_empty());
        assert!(store.query_month(june, Some(OwnerId(99))).unwrap().is_empty());
    }

    #[test]
    fn month_query_finds_records_in_the_last_representable_month() {
        let at = Utc.with_ymd_and_hms(9998, 12, 31, 23, 59, 59).unwrap();
        let store = SqliteStore::open_in_memory_with_clock(FixedTime(at)).unwrap();
        let owner = store.insert_user("ops", "hash", Role::User).unwrap().id;
        inserted(store.insert(&new_record("7K3QZ-9F2A", owner)).unwrap());

        let last = YearMonth::of(at);
        assert_eq!(store.query_month(last, None).unwrap().len(), 1);
        assert_eq!(store.query_month(last.previous(), None).unwrap().len(), 0);
    }

    #[test]
    fn update_touches_only_metadata() {
        let store = SqliteStore::open_in_memory().unwrap();
        let owner = store.insert_user("ops", "hash", Role::User).unwrap().id;
        let written = inserted(store.insert(&new_record("7K3QZ-9F2A", owner)).unwrap());

        let mut meta = sample_metadata("M2");
        meta.code_d = Some("D4".to_owned());
        store.update(written.id, &meta).unwrap();

        let read = store.get(written.id).unwrap().unwrap();
        assert_eq!(read.metadata, meta);
        assert_eq!(read.serial_number, written.serial_number);
        assert_eq!(read.created_at, written.created_at);
        assert!(matches!(
            store.update(RecordId(999), &meta),
            Err(StoreError::NotFound { .. })
        ));
    }

    #[test]
    fn delete_removes_record_and_frees_serial() {
        let store = SqliteStore::open_in_memory().unwrap();
        let owner = store.insert_user("ops", "hash", Role::User).unwrap().id;
        let written = inserted(store.insert(&new_record("7K3QZ-9F2A", owner)).unwrap());

        assert!(matches!(
            store.delete_user(owner),
            Err(StoreError::OwnerInUse { .. })
        ));
        store.delete(written.id).unwrap();
        assert!(store.get(written.id).unwrap().is_none());
        assert!(matches!(
            store.delete(written.id),
            Err(StoreError::NotFound { .. })
        ));
        store.delete_user(owner).unwrap();
    }

    #[test]
    fn usernames_are_unique() {
        let store = SqliteStore::open_in_memory().unwrap();
        let a = store.insert_user("ops", "h1", Role::User).unwrap();
        let b = store.insert_user("qa", "h2", Role::Admin).unwrap();
        assert!(matches!(
            store.insert_user("ops", "h3", Role::Admin),
            Err(StoreError::UsernameTaken { .. })
        ));
        assert!(matches!(
            store.update_user(b.id, "ops", None, Role::Admin),
            Err(StoreError::UsernameTaken { .. })
        ));

        store.update_user(a.id, "ops2", Some("h9"), Role::Admin).unwrap();
        let (user, hash) = store.find_user("ops2").unwrap().unwrap();
        assert_eq!((user.id, user.role, hash.as_str()), (a.id, Role::Admin, "h9"));
        assert_eq!(store.list_users().unwrap().len(), 2);
    }

    #[test]
    fn records_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("serials.db");

        let store = SqliteStore::open(&path).unwrap();
        let owner = store.insert_user("ops", "hash", Role::User).unwrap().id;
        let written = inserted(store.insert(&new_record("7K3QZ-9F2A", owner)).unwrap());
        store.close().unwrap();

        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.query_all().unwrap(), vec![written.clone()]);
        assert_eq!(
            store.insert(&new_record("7K3QZ-9F2A", owner)).unwrap(),
            InsertStatus::Duplicate
        );
        store.close().unwrap();
    }

    #[test]
    fn two_handles_share_the_constraint() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("serials.db");

        let first = SqliteStore::open(&path).unwrap();
        let second = SqliteStore::open(&path).unwrap();
        let owner = first.insert_user("ops", "hash", Role::User).unwrap().id;

        inserted(first.insert(&new_record("7K3QZ-9F2A", owner)).unwrap());
        assert_eq!(
            second.insert(&new_record("7K3QZ-9F2A", owner)).unwrap(),
            InsertStatus::Duplicate
        );
    }
}
