use crate::{OwnerId, RecordId};

/// Failures a store can report.
///
/// A duplicate serial is deliberately absent: that outcome is
/// [`InsertStatus::Duplicate`], not an error.
///
/// [`InsertStatus::Duplicate`]: crate::InsertStatus::Duplicate
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum StoreError {
    /// No serial record with this id.
    #[error("record {id} not found")]
    NotFound { id: RecordId },

    /// No user with this id.
    #[error("user {id} not found")]
    UserNotFound { id: OwnerId },

    /// A serial record referenced a user that does not exist.
    #[error("owner {owner} does not exist")]
    UnknownOwner { owner: OwnerId },

    /// Another user already has this name.
    #[error("username `{username}` is already taken")]
    UsernameTaken { username: String },

    /// The user still owns serial records and cannot be removed.
    #[error("user {owner} still owns serial records")]
    OwnerInUse { owner: OwnerId },

    /// A stored row could not be decoded.
    #[error("corrupt row: {reason}")]
    Corrupt { reason: String },

    /// An error from the SQLite driver.
    #[cfg_attr(docsrs, doc(cfg(feature = "sqlite")))]
    #[cfg(feature = "sqlite")]
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Any other backend failure, for stores outside this crate.
    #[error("backend: {0}")]
    Backend(String),
}
