//! In-memory session for testing.

use crate::entity::{EntityClass, EntityRef};
use crate::error::{CoreError, CoreResult};
use crate::session::{EntityLoader, Session, TransactionContext};
use crate::types::EntityKey;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

/// An in-memory entity store.
///
/// The store keeps materialized instances keyed by class name and primary
/// key, and hands out proxies bound to itself. It is suitable for:
/// - Unit tests
/// - Integration tests
/// - Ephemeral object graphs that never touch a database
///
/// # Thread Safety
///
/// The store is thread-safe and can be shared across sessions.
///
/// # Example
///
/// ```rust
/// use detach_core::{unproxy, EntityClass, EntityRef, MemoryStore, Value};
///
/// let class = EntityClass::builder("User").field("name").build();
/// let store = MemoryStore::new();
/// let user = EntityRef::with_fields(&class, [("name", Value::from("Ada"))]).unwrap();
/// store.insert(1, &user).unwrap();
///
/// let proxy = store.proxy("User", 1).unwrap();
/// assert!(!proxy.is_initialized());
/// assert!(unproxy(&proxy).unwrap().ptr_eq(&user));
/// ```
pub struct MemoryStore {
    me: Weak<MemoryStore>,
    classes: RwLock<HashMap<String, Arc<EntityClass>>>,
    entities: RwLock<HashMap<(String, EntityKey), EntityRef>>,
    loads: AtomicUsize,
}

impl MemoryStore {
    /// Creates a new empty store.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            classes: RwLock::new(HashMap::new()),
            entities: RwLock::new(HashMap::new()),
            loads: AtomicUsize::new(0),
        })
    }

    /// Registers a class so proxies can be created by class name.
    pub fn register_class(&self, class: &Arc<EntityClass>) {
        for ancestor in std::iter::successors(Some(class), |&c| c.parent()) {
            self.classes
                .write()
                .entry(ancestor.name().to_string())
                .or_insert_with(|| Arc::clone(ancestor));
        }
    }

    /// Stores a materialized instance under `key`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if `entity` is a proxy.
    pub fn insert(&self, key: impl Into<EntityKey>, entity: &EntityRef) -> CoreResult<()> {
        if entity.is_proxy() {
            return Err(CoreError::invalid_argument(
                "only materialized instances can be stored",
            ));
        }
        self.register_class(entity.class());
        self.entities.write().insert(
            (entity.class().name().to_string(), key.into()),
            entity.clone(),
        );
        Ok(())
    }

    /// Returns the stored instance of exactly `kind` with `key`.
    #[must_use]
    pub fn get(&self, kind: &str, key: &EntityKey) -> Option<EntityRef> {
        self.entities
            .read()
            .get(&(kind.to_string(), key.clone()))
            .cloned()
    }

    /// Finds a stored instance of `kind` or any of its subclasses.
    #[must_use]
    pub fn find(&self, kind: &str, key: &EntityKey) -> Option<EntityRef> {
        if let Some(exact) = self.get(kind, key) {
            return Some(exact);
        }
        self.entities
            .read()
            .iter()
            .find(|((_, k), entity)| k == key && entity.class().is_a(kind))
            .map(|(_, entity)| entity.clone())
    }

    /// Creates a proxy for the entity of class `kind` with `key`.
    ///
    /// The entity does not need to exist yet; a missing entity surfaces as
    /// `NotFound` when the proxy is resolved.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if no class called `kind` is registered.
    pub fn proxy(&self, kind: &str, key: impl Into<EntityKey>) -> CoreResult<EntityRef> {
        let class = self
            .classes
            .read()
            .get(kind)
            .cloned()
            .ok_or_else(|| CoreError::invalid_argument(format!("unknown entity class {kind}")))?;
        Ok(self.proxy_of(&class, key))
    }

    /// Creates a proxy for the entity of `class` with `key`.
    pub fn proxy_of(&self, class: &Arc<EntityClass>, key: impl Into<EntityKey>) -> EntityRef {
        self.register_class(class);
        let loader: Weak<dyn EntityLoader> = self.me.clone();
        EntityRef::proxy(class, key.into(), loader)
    }

    /// Returns how many proxies this store has materialized.
    #[must_use]
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    /// Returns the number of stored instances.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.read().len()
    }

    /// Returns true if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.read().is_empty()
    }
}

impl EntityLoader for MemoryStore {
    fn load(&self, class: &Arc<EntityClass>, key: &EntityKey) -> CoreResult<EntityRef> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        self.find(class.name(), key)
            .ok_or_else(|| CoreError::not_found(class.name(), key.clone()))
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("entities", &self.len())
            .field("loads", &self.load_count())
            .finish_non_exhaustive()
    }
}

/// A transaction lifecycle event recorded by [`MemorySession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TxEvent {
    /// A transaction was opened.
    Begin,
    /// The open transaction was committed.
    Commit,
    /// The open transaction was rolled back.
    Rollback,
    /// The session was released.
    Release,
}

/// Transaction context of a [`MemorySession`].
#[derive(Debug, Default)]
pub struct MemoryTransaction {
    active: bool,
    rollback_only: bool,
    events: Vec<TxEvent>,
    fail_begin: bool,
    fail_commit: bool,
    fail_rollback: bool,
}

impl MemoryTransaction {
    /// Returns every recorded event in order.
    #[must_use]
    pub fn events(&self) -> &[TxEvent] {
        &self.events
    }

    fn ensure_active(&self, operation: &str) -> CoreResult<()> {
        if self.active {
            Ok(())
        } else {
            Err(CoreError::invalid_operation(format!(
                "cannot {operation}: no active transaction"
            )))
        }
    }
}

impl TransactionContext for MemoryTransaction {
    fn is_active(&self) -> bool {
        self.active
    }

    fn is_rollback_only(&self) -> bool {
        self.rollback_only
    }

    fn set_rollback_only(&mut self) -> CoreResult<()> {
        self.ensure_active("mark rollback-only")?;
        self.rollback_only = true;
        Ok(())
    }

    fn begin(&mut self) -> CoreResult<()> {
        if self.active {
            return Err(CoreError::invalid_operation("transaction already active"));
        }
        if self.fail_begin {
            return Err(CoreError::session("begin failed"));
        }
        self.active = true;
        self.rollback_only = false;
        self.events.push(TxEvent::Begin);
        Ok(())
    }

    fn commit(&mut self) -> CoreResult<()> {
        self.ensure_active("commit")?;
        if self.rollback_only {
            self.active = false;
            self.events.push(TxEvent::Rollback);
            return Err(CoreError::session(
                "transaction marked rollback-only was rolled back",
            ));
        }
        if self.fail_commit {
            // Leaves the transaction open, like a failed flush.
            return Err(CoreError::session("commit failed"));
        }
        self.active = false;
        self.events.push(TxEvent::Commit);
        Ok(())
    }

    fn rollback(&mut self) -> CoreResult<()> {
        self.ensure_active("roll back")?;
        self.active = false;
        if self.fail_rollback {
            return Err(CoreError::session("rollback failed"));
        }
        self.events.push(TxEvent::Rollback);
        Ok(())
    }
}

/// An in-memory session over a shared [`MemoryStore`].
///
/// Records every transaction event and supports fault injection, which makes
/// it the reference collaborator for exercising the transaction wrapper.
#[derive(Debug)]
pub struct MemorySession {
    store: Arc<MemoryStore>,
    transaction: MemoryTransaction,
    released: bool,
    fail_release: bool,
}

impl MemorySession {
    /// Opens a session over `store`.
    #[must_use]
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self {
            store,
            transaction: MemoryTransaction::default(),
            released: false,
            fail_release: false,
        }
    }

    /// Opens a session over a fresh, empty store.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(MemoryStore::new())
    }

    /// Returns the underlying store.
    #[must_use]
    pub fn store(&self) -> &Arc<MemoryStore> {
        &self.store
    }

    /// Returns a proxy for the entity of `kind` with `key`, without loading it.
    pub fn reference(&self, kind: &str, key: impl Into<EntityKey>) -> CoreResult<EntityRef> {
        self.ensure_open()?;
        self.store.proxy(kind, key)
    }

    /// Returns every recorded transaction event in order.
    #[must_use]
    pub fn events(&self) -> &[TxEvent] {
        self.transaction.events()
    }

    /// Returns true once the session has been released.
    #[must_use]
    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Makes `begin` fail.
    #[must_use]
    pub fn fail_on_begin(mut self) -> Self {
        self.transaction.fail_begin = true;
        self
    }

    /// Makes `commit` fail and leave the transaction open.
    #[must_use]
    pub fn fail_on_commit(mut self) -> Self {
        self.transaction.fail_commit = true;
        self
    }

    /// Makes `rollback` fail (the transaction still ends).
    #[must_use]
    pub fn fail_on_rollback(mut self) -> Self {
        self.transaction.fail_rollback = true;
        self
    }

    /// Makes `release` fail.
    #[must_use]
    pub fn fail_on_release(mut self) -> Self {
        self.fail_release = true;
        self
    }

    fn ensure_open(&self) -> CoreResult<()> {
        if self.released {
            Err(CoreError::session("session already released"))
        } else {
            Ok(())
        }
    }
}

impl Session for MemorySession {
    type Transaction = MemoryTransaction;

    fn transaction(&mut self) -> &mut MemoryTransaction {
        &mut self.transaction
    }

    fn find_by_key(&mut self, kind: &str, key: &EntityKey) -> CoreResult<Option<EntityRef>> {
        self.ensure_open()?;
        Ok(self.store.find(kind, key))
    }

    fn release(&mut self) -> CoreResult<()> {
        self.ensure_open()?;
        if self.fail_release {
            return Err(CoreError::session("release failed"));
        }
        self.released = true;
        self.transaction.events.push(TxEvent::Release);
        Ok(())
    }
}
