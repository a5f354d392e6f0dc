//! Entity references.

use crate::entity::{Construction, EntityClass, FieldPath, FieldValues, Value};
use crate::error::{CoreError, CoreResult};
use crate::resolve::unproxy;
use crate::session::EntityLoader;
use crate::types::{EntityKey, NodeId};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};

/// Handle to an entity node.
///
/// A node is either a materialized instance or a proxy placeholder that
/// defers loading until it is resolved. Handles are cheap to clone and
/// compare by identity: [`EntityRef::ptr_eq`] and [`EntityRef::node_id`]
/// identify the node, never its contents.
///
/// Field storage uses interior mutability so a node can be shared by many
/// handles while it is populated. Handles forming a cycle keep each other
/// alive until one of the links is overwritten.
#[derive(Clone)]
pub struct EntityRef(Arc<Node>);

pub(crate) enum Node {
    Instance(Instance),
    Proxy(Proxy),
}

pub(crate) struct Instance {
    pub(crate) class: Arc<EntityClass>,
    pub(crate) fields: RwLock<HashMap<FieldPath, Value>>,
}

pub(crate) struct Proxy {
    pub(crate) class: Arc<EntityClass>,
    pub(crate) key: EntityKey,
    pub(crate) loader: Weak<dyn EntityLoader>,
    /// Materialized instance, set on first resolution.
    pub(crate) target: RwLock<Option<EntityRef>>,
}

impl EntityRef {
    /// Instantiates `class` through its no-argument construction path.
    ///
    /// # Errors
    ///
    /// Returns `CopyConstruction` if the class has no accessible no-argument
    /// construction path or its constructor hook fails.
    pub fn instantiate(class: &Arc<EntityClass>) -> CoreResult<Self> {
        let mut values = class.default_values();
        match class.construction() {
            Construction::NoArgs => {}
            Construction::Unavailable => {
                return Err(CoreError::copy_construction(
                    class.name(),
                    "no accessible no-argument constructor",
                ));
            }
            Construction::Hook(hook) => {
                hook(&mut FieldValues::new(class, &mut values))
                    .map_err(|reason| CoreError::copy_construction(class.name(), reason))?;
            }
        }

        Ok(Self(Arc::new(Node::Instance(Instance {
            class: Arc::clone(class),
            fields: RwLock::new(values),
        }))))
    }

    /// Instantiates `class` and assigns the given fields by name.
    pub fn with_fields<'a>(
        class: &Arc<EntityClass>,
        fields: impl IntoIterator<Item = (&'a str, Value)>,
    ) -> CoreResult<Self> {
        let entity = Self::instantiate(class)?;
        for (name, value) in fields {
            entity.set(name, value)?;
        }
        Ok(entity)
    }

    /// Builds an instance from stored field values without running the
    /// class's construction path.
    ///
    /// Session providers use this to materialize loaded rows; it succeeds
    /// even for classes that cannot be instantiated. Fields not listed keep
    /// their declared default.
    pub fn hydrate<'a>(
        class: &Arc<EntityClass>,
        fields: impl IntoIterator<Item = (&'a str, Value)>,
    ) -> CoreResult<Self> {
        let entity = Self(Arc::new(Node::Instance(Instance {
            class: Arc::clone(class),
            fields: RwLock::new(class.default_values()),
        })));
        for (name, value) in fields {
            entity.set(name, value)?;
        }
        Ok(entity)
    }

    /// Creates a proxy placeholder for the entity `class` with `key`.
    ///
    /// The proxy is materialized through `loader` on first resolution. The
    /// loader is held weakly; resolving after it is dropped fails.
    pub fn proxy(class: &Arc<EntityClass>, key: EntityKey, loader: Weak<dyn EntityLoader>) -> Self {
        Self(Arc::new(Node::Proxy(Proxy {
            class: Arc::clone(class),
            key,
            loader,
            target: RwLock::new(None),
        })))
    }

    pub(crate) fn node(&self) -> &Node {
        &self.0
    }

    /// Returns the class of this entity.
    ///
    /// For a proxy this is the class the proxy was declared with; the
    /// materialized instance may be a subclass.
    #[must_use]
    pub fn class(&self) -> &Arc<EntityClass> {
        match self.node() {
            Node::Instance(instance) => &instance.class,
            Node::Proxy(proxy) => &proxy.class,
        }
    }

    /// Returns true if this handle points at a proxy placeholder.
    #[must_use]
    pub fn is_proxy(&self) -> bool {
        matches!(self.node(), Node::Proxy(_))
    }

    /// Returns true if the entity's own data is available without loading.
    ///
    /// Instances are always initialized; proxies are initialized once
    /// resolved.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        match self.node() {
            Node::Instance(_) => true,
            Node::Proxy(proxy) => proxy.target.read().is_some(),
        }
    }

    /// Returns the key a proxy was created with.
    #[must_use]
    pub fn proxy_key(&self) -> Option<&EntityKey> {
        match self.node() {
            Node::Instance(_) => None,
            Node::Proxy(proxy) => Some(&proxy.key),
        }
    }

    /// Returns the identity of the node.
    #[must_use]
    pub fn node_id(&self) -> NodeId {
        NodeId::new(Arc::as_ptr(&self.0) as *const () as usize)
    }

    /// Returns true if both handles point at the same node.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Reads the most-derived instance field called `name`.
    ///
    /// A proxy is resolved first.
    pub fn get(&self, name: &str) -> CoreResult<Value> {
        let target = unproxy(self)?;
        let path = target.field_path(name)?;
        target
            .read_path(&path)
            .ok_or_else(|| CoreError::invalid_argument(format!("field {path} is not readable")))
    }

    /// Assigns the most-derived instance field called `name`.
    ///
    /// A proxy is resolved first.
    pub fn set(&self, name: &str, value: impl Into<Value>) -> CoreResult<()> {
        let target = unproxy(self)?;
        let path = target.field_path(name)?;
        if target.write_path(&path, value.into()) {
            Ok(())
        } else {
            Err(CoreError::invalid_argument(format!(
                "field {path} is not writable"
            )))
        }
    }

    fn field_path(&self, name: &str) -> CoreResult<FieldPath> {
        self.class().resolve_field(name).ok_or_else(|| {
            CoreError::invalid_argument(format!(
                "{} has no instance field named {name}",
                self.class().name()
            ))
        })
    }

    /// Reads a field slot by storage path, without resolving.
    ///
    /// Returns `None` for proxies and for paths the instance has no slot for.
    #[must_use]
    pub fn read_path(&self, path: &FieldPath) -> Option<Value> {
        match self.node() {
            Node::Instance(instance) => instance.fields.read().get(path).cloned(),
            Node::Proxy(_) => None,
        }
    }

    /// Writes an existing field slot of an instance. Returns false for
    /// proxies or missing slots.
    pub(crate) fn write_path(&self, path: &FieldPath, value: Value) -> bool {
        match self.node() {
            Node::Instance(instance) => match instance.fields.write().get_mut(path) {
                Some(slot) => {
                    *slot = value;
                    true
                }
                None => false,
            },
            Node::Proxy(_) => false,
        }
    }

    /// Removes a field slot, making it unreadable. Used to simulate
    /// inaccessible storage in tests.
    #[cfg(test)]
    pub(crate) fn remove_slot(&self, path: &FieldPath) {
        if let Node::Instance(instance) = self.node() {
            instance.fields.write().remove(path);
        }
    }
}

impl fmt::Debug for EntityRef {
    // Never descends into fields: graphs may be cyclic.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.node() {
            Node::Instance(instance) => {
                write!(f, "{}@{}", instance.class.name(), self.node_id())
            }
            Node::Proxy(proxy) => write!(
                f,
                "Proxy<{}#{}>({})",
                proxy.class.name(),
                proxy.key,
                if self.is_initialized() {
                    "initialized"
                } else {
                    "uninitialized"
                }
            ),
        }
    }
}
