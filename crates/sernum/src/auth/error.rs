use crate::StoreError;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum AuthError {
    /// Unknown user or wrong password. The two are not distinguished.
    #[error("invalid username or password")]
    InvalidCredentials,

    #[error("invalid username: {reason}")]
    InvalidUsername { reason: String },

    #[error("password must not be empty")]
    EmptyPassword,

    /// The change would leave no administrator.
    #[error("the last administrator cannot be removed or demoted")]
    LastAdmin,

    #[error("password hashing failed: {0}")]
    Hash(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}
