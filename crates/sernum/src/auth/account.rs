use crate::{AuthError, OwnerId, Role, User, UserStore, hash_password, verify_password};

#[cfg(feature = "tracing")]
use tracing::instrument;

fn check_username(username: &str) -> Result<(), AuthError> {
    if username.trim().is_empty() {
        return Err(AuthError::InvalidUsername {
            reason: "must not be blank".to_owned(),
        });
    }
    if username.trim() != username {
        return Err(AuthError::InvalidUsername {
            reason: "must not start or end with whitespace".to_owned(),
        });
    }
    Ok(())
}

fn admin_count<S: UserStore + ?Sized>(store: &S) -> Result<usize, AuthError> {
    Ok(store.list_users()?.iter().filter(|u| u.is_admin()).count())
}

/// Creates an account with a freshly hashed password.
///
/// # Errors
/// - [`AuthError::InvalidUsername`] / [`AuthError::EmptyPassword`].
/// - [`AuthError::Store`] with [`StoreError::UsernameTaken`] if the name is in
///   use.
///
/// [`StoreError::UsernameTaken`]: crate::StoreError::UsernameTaken
pub fn create_user<S>(store: &S, username: &str, password: &str, role: Role) -> Result<User, AuthError>
where
    S: UserStore + ?Sized,
{
    check_username(username)?;
    let hash = hash_password(password)?;
    Ok(store.insert_user(username, &hash, role)?)
}

/// Resolves a username and password to the account they belong to.
///
/// # Errors
/// [`AuthError::InvalidCredentials`] for an unknown user or a wrong
/// password; the caller cannot tell which.
#[cfg_attr(feature = "tracing", instrument(level = "debug", skip(store, password)))]
pub fn authenticate<S>(store: &S, username: &str, password: &str) -> Result<User, AuthError>
where
    S: UserStore + ?Sized,
{
    match store.find_user(username)? {
        Some((user, hash)) if verify_password(password, &hash) => Ok(user),
        _ => Err(AuthError::InvalidCredentials),
    }
}

/// Creates the first administrator if, and only if, there are no accounts
/// yet. Returns `None` when accounts already exist.
///
/// # Errors
/// See [`create_user`].
pub fn ensure_admin<S>(store: &S, username: &str, password: &str) -> Result<Option<User>, AuthError>
where
    S: UserStore + ?Sized,
{
    if !store.list_users()?.is_empty() {
        return Ok(None);
    }
    create_user(store, username, password, Role::Admin).map(Some)
}

/// Every account, ordered by id.
///
/// # Errors
/// Store failures only.
pub fn list_users<S>(store: &S) -> Result<Vec<User>, AuthError>
where
    S: UserStore + ?Sized,
{
    Ok(store.list_users()?)
}

/// Renames, re-roles and optionally re-keys an account.
///
/// # Errors
/// - [`AuthError::LastAdmin`] if this would demote the only administrator.
/// - Validation and store errors as for [`create_user`].
pub fn update_user<S>(
    store: &S,
    id: OwnerId,
    username: &str,
    password: Option<&str>,
    role: Role,
) -> Result<(), AuthError>
where
    S: UserStore + ?Sized,
{
    check_username(username)?;
    let current = store
        .get_user(id)?
        .ok_or(crate::StoreError::UserNotFound { id })?;
    if current.is_admin() && role != Role::Admin && admin_count(store)? == 1 {
        return Err(AuthError::LastAdmin);
    }
    let hash = password.map(hash_password).transpose()?;
    Ok(store.update_user(id, username, hash.as_deref(), role)?)
}

/// Removes an account.
///
/// # Errors
/// - [`AuthError::LastAdmin`] if this is the only administrator.
/// - [`AuthError::Store`] with [`StoreError::OwnerInUse`] if the user still
///   owns records.
///
/// [`StoreError::OwnerInUse`]: crate::StoreError::OwnerInUse
pub fn delete_user<S>(store: &S, id: OwnerId) -> Result<(), AuthError>
where
    S: UserStore + ?Sized,
{
    let target = store
        .get_user(id)?
        .ok_or(crate::StoreError::UserNotFound { id })?;
    if target.is_admin() && admin_count(store)? == 1 {
        return Err(AuthError::LastAdmin);
    }
    Ok(store.delete_user(id)?)
}
