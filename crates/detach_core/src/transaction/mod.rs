//! Transactional execution of units of work.
//!
//! A unit of work runs against a session with commit-or-rollback semantics:
//! - **Joining**: if the session already has an active transaction, the
//!   work runs inside it and the outer owner keeps control of begin, commit,
//!   rollback and release
//! - **Owning**: otherwise a transaction is begun, committed on success (or
//!   rolled back if marked rollback-only), rolled back on failure, and the
//!   session is optionally released afterwards
//!
//! Cleanup also runs when the unit of work panics.

mod executor;

pub use executor::{run_in_transaction, run_in_transaction_with, TransactionExecutor};
