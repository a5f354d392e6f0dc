//! Error types for Detach core.

use crate::types::EntityKey;
use std::error::Error as StdError;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Boxed error raised by a unit of work.
///
/// Units of work may fail with any error type. A [`CoreError`] is surfaced
/// unchanged by the transaction wrapper; anything else is wrapped in
/// [`CoreError::TransactionFailure`].
pub type WorkError = Box<dyn StdError + Send + Sync + 'static>;

/// Result type for units of work run inside a transaction.
pub type WorkResult<T> = Result<T, WorkError>;

/// Errors that can occur in Detach core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// An entity reference was required but absent, or a collaborator
    /// broke its contract.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Description of the problem.
        message: String,
    },

    /// A class reachable from a deep copy could not be instantiated, or one of
    /// its fields could not be read or written.
    #[error("cannot copy instance of {class}: {reason}")]
    CopyConstruction {
        /// Name of the class being copied.
        class: String,
        /// Underlying cause.
        reason: String,
    },

    /// Safe lookup found no entity for the key.
    #[error("{label} with id {key} was not found")]
    NotFound {
        /// Label used in the message (e.g. `"Entity"`, `"Order"`).
        label: String,
        /// The key that was looked up.
        key: EntityKey,
    },

    /// A unit of work failed with an error that is not a `CoreError`.
    #[error("transaction failed: {source}")]
    TransactionFailure {
        /// The original failure.
        #[source]
        source: WorkError,
    },

    /// The session collaborator reported a failure.
    #[error("session error: {message}")]
    Session {
        /// Description of the failure.
        message: String,
    },

    /// Operation not permitted in the current transaction state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why the operation is invalid.
        message: String,
    },
}

impl CoreError {
    /// Creates an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates a copy construction error.
    pub fn copy_construction(class: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::CopyConstruction {
            class: class.into(),
            reason: reason.into(),
        }
    }

    /// Creates a not found error.
    pub fn not_found(label: impl Into<String>, key: EntityKey) -> Self {
        Self::NotFound {
            label: label.into(),
            key,
        }
    }

    /// Creates a session error.
    pub fn session(message: impl Into<String>) -> Self {
        Self::Session {
            message: message.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Converts a unit-of-work failure into a `CoreError`.
    ///
    /// A failure that already is a `CoreError` is returned as-is; anything
    /// else becomes [`CoreError::TransactionFailure`].
    pub fn from_work(error: WorkError) -> Self {
        match error.downcast::<CoreError>() {
            Ok(core) => *core,
            Err(other) => Self::TransactionFailure { source: other },
        }
    }
}
