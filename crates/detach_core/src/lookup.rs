//! Safe lookup by primary key.

use crate::entity::EntityRef;
use crate::error::{CoreError, CoreResult};
use crate::session::Session;
use crate::types::EntityKey;

/// Looks up the entity of `kind` with `key`, failing if it does not exist.
///
/// # Errors
///
/// `NotFound` with the message `"Entity with id <key> was not found"` when
/// the session has no such entity. Session errors are returned unchanged.
///
/// # Example
///
/// ```rust
/// use detach_core::{find_or_fail, MemorySession};
///
/// let mut session = MemorySession::in_memory();
/// let err = find_or_fail(&mut session, "Customer", 42).unwrap_err();
/// assert_eq!(err.to_string(), "Entity with id 42 was not found");
/// ```
pub fn find_or_fail<S: Session + ?Sized>(
    session: &mut S,
    kind: &str,
    key: impl Into<EntityKey>,
) -> CoreResult<EntityRef> {
    find_or_fail_labeled(session, kind, key, "Entity")
}

/// Like [`find_or_fail`], with a custom label in the not-found message.
pub fn find_or_fail_labeled<S: Session + ?Sized>(
    session: &mut S,
    kind: &str,
    key: impl Into<EntityKey>,
    label: &str,
) -> CoreResult<EntityRef> {
    let key = key.into();
    session
        .find_by_key(kind, &key)?
        .ok_or_else(|| CoreError::not_found(label, key))
}
