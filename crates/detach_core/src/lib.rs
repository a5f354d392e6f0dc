//! # Detach Core
//!
//! Utilities for working with lazily loaded persistent entity graphs.
//!
//! This crate provides:
//! - Proxy resolution ([`unproxy`]) that forces a lazy reference to load
//! - Deep graph copy ([`deep_copy`]) that produces a fully materialized,
//!   detached, cycle-safe copy of an entity graph
//! - Transactional execution ([`run_in_transaction`]) with commit-or-rollback
//!   semantics and optional session release
//! - Safe lookup ([`find_or_fail`]) that turns an absent entity into an error
//!
//! Entities are described by runtime class metadata ([`EntityClass`]) and
//! held through identity-compared handles ([`EntityRef`]). The persistence
//! layer is abstracted behind the [`Session`] and [`EntityLoader`] traits;
//! [`MemorySession`] is an in-memory implementation for tests and ephemeral
//! graphs.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod copy;
mod entity;
mod error;
mod lookup;
mod resolve;
mod session;
mod transaction;
mod types;

pub use config::Config;
pub use copy::{deep_copy, deep_copy_value};
pub use entity::{
    ClassBuilder, Construction, ConstructorHook, EntityClass, EntityRef, FieldDescriptor,
    FieldModifiers, FieldPath, FieldValues, TypedArray, Value, ValueKind,
};
pub use error::{CoreError, CoreResult, WorkError, WorkResult};
pub use lookup::{find_or_fail, find_or_fail_labeled};
pub use resolve::{is_initialized, unproxy, unproxy_value};
pub use session::{
    EntityLoader, MemorySession, MemoryStore, MemoryTransaction, Session, TransactionContext,
    TxEvent,
};
pub use transaction::{run_in_transaction, run_in_transaction_with, TransactionExecutor};
pub use types::{EntityKey, NodeId};
