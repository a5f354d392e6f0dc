//! Deep graph copy.
//!
//! A deep copy resolves every reachable entity, allocates a fresh instance of
//! the same class for each one and transfers the persistent fields. The
//! result is a detached graph: no proxies, no loader, no node shared with the
//! original.
//!
//! ## Traversal
//!
//! Each resolved original is registered with its copy *before* any of its
//! fields are populated. Re-encountering the original (a cycle back to it,
//! or a second reference to a shared node) returns the registered copy, so
//! the traversal terminates and the copy has the same sharing topology as
//! the original.
//!
//! Entities are populated from a work queue rather than by recursion, which
//! keeps long reference chains off the call stack. Container values are
//! walked recursively by shape.

use crate::entity::{EntityRef, TypedArray, Value};
use crate::error::{CoreError, CoreResult};
use crate::resolve::unproxy;
use crate::types::NodeId;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

/// Creates a fully materialized, independent copy of `entity` and of every
/// entity reachable from it.
///
/// Every node is resolved (proxies are loaded), every copy is a plain
/// instance of the original's exact class, and shared references and cycles
/// in the original are preserved in the copy. Static, final and transient
/// fields are not transferred: the copy keeps whatever its no-argument
/// construction path assigned.
///
/// # Errors
///
/// - `InvalidArgument` if `entity` is absent.
/// - `CopyConstruction` if a reachable class cannot be instantiated or one
///   of its fields cannot be read or written.
/// - Any resolution error of a reachable proxy.
///
/// The whole call fails on the first error; no partial copy is returned.
///
/// # Example
///
/// ```rust
/// use detach_core::{deep_copy, EntityClass, EntityRef};
///
/// let class = EntityClass::builder("Node").field("next").build();
/// let node = EntityRef::instantiate(&class).unwrap();
/// node.set("next", &node).unwrap();
///
/// let copy = deep_copy(&node).unwrap();
/// let next = copy.get("next").unwrap();
/// assert!(next.as_entity().unwrap().ptr_eq(&copy));
/// assert!(!copy.ptr_eq(&node));
/// ```
pub fn deep_copy<'a>(entity: impl Into<Option<&'a EntityRef>>) -> CoreResult<EntityRef> {
    let entity = entity
        .into()
        .ok_or_else(|| CoreError::invalid_argument("entity passed for deep copy is absent"))?;

    let mut copier = DeepCopier::default();
    let copy = copier.copy_entity(entity)?;
    copier.drain()?;

    tracing::debug!(
        class = copy.class().name(),
        nodes = copier.visited.len(),
        "deep copy complete"
    );
    Ok(copy)
}

/// Deep-copies an arbitrary value.
///
/// Entity references inside the value are copied as by [`deep_copy`], with
/// one traversal shared by the whole value: two roots that reach the same
/// node get the same copy.
pub fn deep_copy_value(value: &Value) -> CoreResult<Value> {
    let mut copier = DeepCopier::default();
    let copy = copier.copy_value(value)?;
    copier.drain()?;

    tracing::debug!(nodes = copier.visited.len(), "deep value copy complete");
    Ok(copy)
}

/// Traversal state of one top-level copy.
#[derive(Default)]
struct DeepCopier {
    /// Resolved original identity -> (original, copy). Holding the original
    /// pins its identity for the duration of the call.
    visited: HashMap<NodeId, (EntityRef, EntityRef)>,
    /// Registered copies whose fields are not populated yet.
    pending: VecDeque<(EntityRef, EntityRef)>,
}

impl DeepCopier {
    /// Returns the copy of `entity`, registering a new, unpopulated copy on
    /// first encounter.
    fn copy_entity(&mut self, entity: &EntityRef) -> CoreResult<EntityRef> {
        let original = unproxy(entity)?;
        let id = original.node_id();

        if let Some((_, copy)) = self.visited.get(&id) {
            tracing::trace!(class = original.class().name(), node = %id, "already copied");
            return Ok(copy.clone());
        }

        let copy = EntityRef::instantiate(original.class())?;
        self.visited.insert(id, (original.clone(), copy.clone()));
        self.pending.push_back((original, copy.clone()));
        Ok(copy)
    }

    fn drain(&mut self) -> CoreResult<()> {
        while let Some((original, copy)) = self.pending.pop_front() {
            self.populate(&original, &copy)?;
        }
        Ok(())
    }

    /// Transfers every copy-eligible field of `original` into `copy`.
    fn populate(&mut self, original: &EntityRef, copy: &EntityRef) -> CoreResult<()> {
        let class = Arc::clone(original.class());
        tracing::trace!(class = class.name(), node = %original.node_id(), "populating copy");

        for (path, field) in class.fields() {
            if !field.is_copyable() {
                continue;
            }

            // Cloned out of the lock: the value may point back at `original`.
            let value = original.read_path(&path).ok_or_else(|| {
                CoreError::copy_construction(class.name(), format!("field {path} is not readable"))
            })?;
            let value = self.copy_value(&value)?;

            if !copy.write_path(&path, value) {
                return Err(CoreError::copy_construction(
                    class.name(),
                    format!("field {path} is not writable"),
                ));
            }
        }
        Ok(())
    }

    fn copy_value(&mut self, value: &Value) -> CoreResult<Value> {
        let copied = match value {
            Value::Entity(entity) => Value::Entity(self.copy_entity(entity)?),
            Value::Array(array) => {
                let items = array
                    .iter()
                    .map(|item| self.copy_value(item))
                    .collect::<CoreResult<Vec<_>>>()?;
                Value::Array(TypedArray::new(array.element_type(), items))
            }
            Value::Set(set) => {
                let mut copied = HashSet::with_capacity(set.len());
                for item in set {
                    copied.insert(self.copy_value(item)?);
                }
                Value::Set(copied)
            }
            Value::Map(map) => {
                let mut copied = HashMap::with_capacity(map.len());
                for (key, item) in map {
                    copied.insert(self.copy_value(key)?, self.copy_value(item)?);
                }
                Value::Map(copied)
            }
            Value::List(list) => {
                let mut copied = Vec::with_capacity(list.len());
                for item in list {
                    copied.push(self.copy_value(item)?);
                }
                Value::List(copied)
            }
            Value::Null
            | Value::Bool(_)
            | Value::Integer(_)
            | Value::Text(_)
            | Value::Bytes(_)
            | Value::Uuid(_) => value.clone(),
        };
        Ok(copied)
    }
}
