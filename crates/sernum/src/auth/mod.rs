//! Accounts, roles and the rules for who may see or change which records.
//!
//! Storage is delegated to any [`UserStore`]; this module only hashes,
//! verifies and enforces the account invariants (there is always at least
//! one administrator once one has been created).
//!
//! [`UserStore`]: crate::UserStore

mod account;
mod error;
mod password;
mod role;

pub use account::*;
pub use error::*;
pub use password::*;
pub use role::*;
