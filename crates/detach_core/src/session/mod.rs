//! Persistence session contracts.
//!
//! Detach does not talk to a database itself. The session provider supplies
//! entity references, materializes proxies and owns the transaction context;
//! these traits are the boundary Detach consumes.

mod memory;

pub use memory::{MemorySession, MemoryStore, MemoryTransaction, TxEvent};

use crate::entity::{EntityClass, EntityRef};
use crate::error::CoreResult;
use crate::types::EntityKey;
use std::sync::Arc;

/// Materializes proxy placeholders.
///
/// A loader must return a materialized instance (not another uninitialized
/// proxy) whose class is, or descends from, the requested class. Only the
/// entity's own fields need to be populated; nested references may be
/// proxies again.
pub trait EntityLoader: Send + Sync {
    /// Loads the entity of `class` identified by `key`.
    fn load(&self, class: &Arc<EntityClass>, key: &EntityKey) -> CoreResult<EntityRef>;
}

/// Transaction context owned by a session.
pub trait TransactionContext {
    /// Returns true while a transaction is open.
    fn is_active(&self) -> bool;

    /// Returns true if the open transaction must not commit.
    fn is_rollback_only(&self) -> bool;

    /// Marks the open transaction so it can only roll back.
    fn set_rollback_only(&mut self) -> CoreResult<()>;

    /// Opens a transaction.
    fn begin(&mut self) -> CoreResult<()>;

    /// Commits the open transaction.
    fn commit(&mut self) -> CoreResult<()>;

    /// Rolls back the open transaction.
    fn rollback(&mut self) -> CoreResult<()>;
}

/// A persistence session.
///
/// Sessions are not safe for concurrent use: one logical unit of work drives
/// a session at a time, which `&mut self` enforces.
pub trait Session {
    /// The session's transaction context.
    type Transaction: TransactionContext;

    /// Returns the transaction context.
    fn transaction(&mut self) -> &mut Self::Transaction;

    /// Looks up an entity of `kind` by primary key.
    fn find_by_key(&mut self, kind: &str, key: &EntityKey) -> CoreResult<Option<EntityRef>>;

    /// Releases the session's underlying resources.
    fn release(&mut self) -> CoreResult<()>;
}
