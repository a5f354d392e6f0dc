//! Transaction executor.

use crate::config::Config;
use crate::entity::EntityRef;
use crate::error::{CoreError, CoreResult, WorkResult};
use crate::lookup::find_or_fail_labeled;
use crate::session::{Session, TransactionContext};
use crate::types::EntityKey;

/// Runs `work` in a transaction and releases the session afterwards.
///
/// Equivalent to [`run_in_transaction_with`] with `release_after = true`.
///
/// # Example
///
/// ```rust
/// use detach_core::{run_in_transaction, MemorySession, TxEvent, WorkResult};
///
/// let mut session = MemorySession::in_memory();
/// let answer = run_in_transaction(&mut session, |_| -> WorkResult<i64> { Ok(42) }).unwrap();
///
/// assert_eq!(answer, 42);
/// assert_eq!(
///     session.events(),
///     &[TxEvent::Begin, TxEvent::Commit, TxEvent::Release]
/// );
/// ```
pub fn run_in_transaction<S, T, F>(session: &mut S, work: F) -> CoreResult<T>
where
    S: Session,
    F: FnOnce(&mut S) -> WorkResult<T>,
{
    run_in_transaction_with(session, work, true)
}

/// Runs `work` with commit-or-rollback semantics.
///
/// If the session already has an active transaction, `work` runs inside it
/// and nothing else happens: no begin, commit, rollback or release.
///
/// Otherwise a transaction is begun and, after `work` returns:
/// - on success it is committed, or rolled back if it was marked
///   rollback-only; if `work` already ended it, nothing is done
/// - on failure it is rolled back if still active
/// - a failing commit counts as a failure
///
/// When `release_after` is set the session is released in every case,
/// including a failed `begin` and a panicking `work`.
///
/// # Errors
///
/// - A `CoreError` raised by `work` is returned unchanged; any other error
///   is wrapped in `CoreError::TransactionFailure`.
/// - Begin and commit failures are returned as reported by the session.
/// - A rollback failure while handling another failure is logged and the
///   original failure is returned.
/// - A release failure is returned only if everything before it succeeded.
pub fn run_in_transaction_with<S, T, F>(session: &mut S, work: F, release_after: bool) -> CoreResult<T>
where
    S: Session,
    F: FnOnce(&mut S) -> WorkResult<T>,
{
    if session.transaction().is_active() {
        tracing::trace!("joining active transaction");
        return work(session).map_err(CoreError::from_work);
    }

    let mut scope = Scope {
        session,
        owned: false,
        release: release_after,
    };
    let outcome = scope.run(work);
    let released = scope.finish();

    match (outcome, released) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(error)) | (Err(error), Ok(())) => Err(error),
        (Err(error), Err(release_error)) => {
            tracing::warn!(error = %release_error, "session release failed after transaction failure");
            Err(error)
        }
    }
}

/// A transaction this call owns.
///
/// Dropping the scope without finishing it (a panicking unit of work) rolls
/// back the open transaction and performs the owed release.
struct Scope<'s, S: Session> {
    session: &'s mut S,
    /// Set while a transaction begun by this scope is open.
    owned: bool,
    /// Set while a release is still owed.
    release: bool,
}

impl<S: Session> Scope<'_, S> {
    fn run<T, F>(&mut self, work: F) -> CoreResult<T>
    where
        F: FnOnce(&mut S) -> WorkResult<T>,
    {
        self.session.transaction().begin()?;
        self.owned = true;
        tracing::debug!("transaction begun");

        match work(&mut *self.session) {
            Ok(value) => {
                self.complete()?;
                Ok(value)
            }
            Err(error) => {
                self.abort();
                Err(CoreError::from_work(error))
            }
        }
    }

    /// Ends the transaction after a successful unit of work.
    fn complete(&mut self) -> CoreResult<()> {
        let txn = self.session.transaction();
        if !txn.is_active() {
            self.owned = false;
            tracing::debug!("transaction already ended by unit of work");
            return Ok(());
        }

        if txn.is_rollback_only() {
            self.owned = false;
            txn.rollback()?;
            tracing::debug!("rollback-only transaction rolled back");
            return Ok(());
        }

        match txn.commit() {
            Ok(()) => {
                self.owned = false;
                tracing::debug!("transaction committed");
                Ok(())
            }
            Err(error) => {
                self.abort();
                Err(error)
            }
        }
    }

    /// Rolls back the transaction if it is still open. Failures are logged.
    fn abort(&mut self) {
        self.owned = false;
        let txn = self.session.transaction();
        if !txn.is_active() {
            return;
        }
        match txn.rollback() {
            Ok(()) => tracing::debug!("transaction rolled back"),
            Err(error) => tracing::warn!(%error, "rollback failed while handling failure"),
        }
    }

    /// Performs the owed release, if any.
    fn finish(mut self) -> CoreResult<()> {
        if !std::mem::take(&mut self.release) {
            return Ok(());
        }
        self.session.release()?;
        tracing::debug!("session released");
        Ok(())
    }
}

impl<S: Session> Drop for Scope<'_, S> {
    fn drop(&mut self) {
        if self.owned {
            self.abort();
        }
        if std::mem::take(&mut self.release) {
            if let Err(error) = self.session.release() {
                tracing::warn!(%error, "session release failed during unwind");
            }
        }
    }
}

/// Reusable transaction executor.
///
/// Carries a [`Config`] so the release policy and not-found label are chosen
/// once, not at every call site.
#[derive(Debug, Clone, Default)]
pub struct TransactionExecutor {
    config: Config,
}

impl TransactionExecutor {
    /// Creates an executor with the given configuration.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Runs `work` as [`run_in_transaction_with`] does, releasing according
    /// to the configuration.
    pub fn run<S, T, F>(&self, session: &mut S, work: F) -> CoreResult<T>
    where
        S: Session,
        F: FnOnce(&mut S) -> WorkResult<T>,
    {
        run_in_transaction_with(session, work, self.config.release_after)
    }

    /// Looks up an entity, failing with the configured label when absent.
    pub fn find_or_fail<S: Session>(
        &self,
        session: &mut S,
        kind: &str,
        key: impl Into<EntityKey>,
    ) -> CoreResult<EntityRef> {
        find_or_fail_labeled(session, kind, key, &self.config.not_found_label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{EntityClass, Value};
    use crate::error::WorkError;
    use crate::session::{MemorySession, TxEvent};
    use std::fmt;
    use std::panic::{catch_unwind, AssertUnwindSafe};

    #[derive(Debug)]
    struct OutOfStock;

    impl fmt::Display for OutOfStock {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("out of stock")
        }
    }

    impl std::error::Error for OutOfStock {}

    fn session_with_item() -> MemorySession {
        let session = MemorySession::in_memory();
        let class = EntityClass::builder("Item").field("sku").build();
        let item = EntityRef::with_fields(&class, [("sku", Value::from("A-1"))]).unwrap();
        session.store().insert(1, &item).unwrap();
        session
    }

    #[test]
    fn success_commits_and_releases() {
        let mut session = session_with_item();

        let sku = run_in_transaction(&mut session, |s| {
            let item = s.find_by_key("Item", &EntityKey::from(1))?;
            Ok(item.map(|i| i.get("sku")).transpose()?)
        })
        .unwrap();

        assert_eq!(sku, Some(Value::from("A-1")));
        assert_eq!(
            session.events(),
            &[TxEvent::Begin, TxEvent::Commit, TxEvent::Release]
        );
        assert!(session.is_released());
    }

    #[test]
    fn success_without_release() {
        let mut session = MemorySession::in_memory();

        run_in_transaction_with(&mut session, |_| Ok(()), false).unwrap();

        assert_eq!(session.events(), &[TxEvent::Begin, TxEvent::Commit]);
        assert!(!session.is_released());
    }

    #[test]
    fn rollback_only_is_honored() {
        let mut session = MemorySession::in_memory();

        let value = run_in_transaction(&mut session, |s| {
            s.transaction().set_rollback_only()?;
            Ok(7)
        })
        .unwrap();

        assert_eq!(value, 7);
        assert_eq!(
            session.events(),
            &[TxEvent::Begin, TxEvent::Rollback, TxEvent::Release]
        );
    }

    #[test]
    fn active_transaction_is_joined() {
        let mut session = MemorySession::in_memory();
        session.transaction().begin().unwrap();

        let value = run_in_transaction(&mut session, |_| Ok("inner")).unwrap();

        assert_eq!(value, "inner");
        assert_eq!(session.events(), &[TxEvent::Begin]);
        assert!(session.transaction().is_active());
        assert!(!session.is_released());
    }

    #[test]
    fn joined_failure_is_not_rolled_back() {
        let mut session = MemorySession::in_memory();
        session.transaction().begin().unwrap();

        let err = run_in_transaction(&mut session, |_| -> WorkResult<()> {
            Err(Box::new(OutOfStock))
        })
        .unwrap_err();

        assert!(matches!(err, CoreError::TransactionFailure { .. }));
        assert_eq!(session.events(), &[TxEvent::Begin]);
        assert!(session.transaction().is_active());
    }

    #[test]
    fn joined_core_failure_passes_through() {
        let mut session = session_with_item();
        session.transaction().begin().unwrap();

        let err = run_in_transaction(&mut session, |s| {
            find_or_fail_labeled(s, "Item", 404, "Item")?;
            Ok(())
        })
        .unwrap_err();

        assert!(matches!(
            &err,
            CoreError::NotFound { label, key } if label == "Item" && *key == EntityKey::from(404)
        ));
        assert_eq!(session.events(), &[TxEvent::Begin]);
        assert!(session.transaction().is_active());
        assert!(!session.is_released());
    }

    #[test]
    fn foreign_failure_is_wrapped_after_rollback() {
        let mut session = MemorySession::in_memory();

        let err = run_in_transaction(&mut session, |_| -> WorkResult<()> {
            Err(Box::new(OutOfStock))
        })
        .unwrap_err();

        match &err {
            CoreError::TransactionFailure { source } => {
                assert!(source.downcast_ref::<OutOfStock>().is_some());
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(err.to_string(), "transaction failed: out of stock");
        assert_eq!(
            session.events(),
            &[TxEvent::Begin, TxEvent::Rollback, TxEvent::Release]
        );
    }

    #[test]
    fn core_failure_passes_through() {
        let mut session = MemorySession::in_memory();

        let err = run_in_transaction(&mut session, |s| {
            crate::lookup::find_or_fail_labeled(s, "Order", 404, "Order")?;
            Ok(())
        })
        .unwrap_err();

        assert_eq!(err.to_string(), "Order with id 404 was not found");
        assert_eq!(
            session.events(),
            &[TxEvent::Begin, TxEvent::Rollback, TxEvent::Release]
        );
    }

    #[test]
    fn work_that_ends_transaction_is_respected() {
        let mut session = MemorySession::in_memory();

        run_in_transaction(&mut session, |s| {
            s.transaction().commit()?;
            Ok(())
        })
        .unwrap();

        assert_eq!(
            session.events(),
            &[TxEvent::Begin, TxEvent::Commit, TxEvent::Release]
        );
    }

    #[test]
    fn begin_failure_still_releases() {
        let mut session = MemorySession::in_memory().fail_on_begin();
        let mut ran = false;

        let err = run_in_transaction(&mut session, |_| {
            ran = true;
            Ok(())
        })
        .unwrap_err();

        assert!(!ran);
        assert!(matches!(err, CoreError::Session { .. }));
        assert_eq!(session.events(), &[TxEvent::Release]);
    }

    #[test]
    fn commit_failure_rolls_back() {
        let mut session = MemorySession::in_memory().fail_on_commit();

        let err = run_in_transaction(&mut session, |_| Ok(())).unwrap_err();

        assert_eq!(err.to_string(), "session error: commit failed");
        assert!(!session.transaction().is_active());
        assert_eq!(
            session.events(),
            &[TxEvent::Begin, TxEvent::Rollback, TxEvent::Release]
        );
    }

    #[test]
    fn rollback_failure_keeps_original_error() {
        let mut session = MemorySession::in_memory().fail_on_rollback();

        let err = run_in_transaction(&mut session, |_| -> WorkResult<()> {
            Err(Box::new(OutOfStock))
        })
        .unwrap_err();

        assert_eq!(err.to_string(), "transaction failed: out of stock");
        assert_eq!(session.events(), &[TxEvent::Begin, TxEvent::Release]);
    }

    #[test]
    fn release_failure_surfaces_only_on_success() {
        let mut session = MemorySession::in_memory().fail_on_release();
        let err = run_in_transaction(&mut session, |_| Ok(())).unwrap_err();
        assert_eq!(err.to_string(), "session error: release failed");

        let mut session = MemorySession::in_memory().fail_on_release();
        let err = run_in_transaction(&mut session, |_| -> WorkResult<()> {
            Err(WorkError::from("bad input"))
        })
        .unwrap_err();
        assert_eq!(err.to_string(), "transaction failed: bad input");
    }

    #[test]
    fn panic_rolls_back_and_releases() {
        let mut session = MemorySession::in_memory();

        let outcome = catch_unwind(AssertUnwindSafe(|| {
            run_in_transaction(&mut session, |_| -> WorkResult<()> { panic!("boom") })
        }));

        assert!(outcome.is_err());
        assert!(!session.transaction().is_active());
        assert_eq!(
            session.events(),
            &[TxEvent::Begin, TxEvent::Rollback, TxEvent::Release]
        );
    }

    #[test]
    fn executor_uses_config() {
        let executor = TransactionExecutor::new(
            Config::new().release_after(false).not_found_label("Item"),
        );
        let mut session = MemorySession::in_memory();

        let err = executor
            .run(&mut session, |s| {
                executor.find_or_fail(s, "Item", 9)?;
                Ok(())
            })
            .unwrap_err();

        assert_eq!(err.to_string(), "Item with id 9 was not found");
        assert_eq!(session.events(), &[TxEvent::Begin, TxEvent::Rollback]);
        assert!(!session.is_released());
    }
}
