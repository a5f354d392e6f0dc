//! Dynamic field values.

use crate::entity::EntityRef;
use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};
use uuid::Uuid;

/// A dynamic field value.
///
/// This is the closed set of shapes a persistent field can hold. Floats are
/// intentionally not supported so that equality and hashing stay total,
/// which sets and map keys rely on.
///
/// Entity references compare and hash by identity, never structurally: two
/// `Value::Entity` are equal only if they point at the same node.
#[derive(Debug, Clone)]
pub enum Value {
    /// Absent value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Signed integer.
    Integer(i64),
    /// Text string.
    Text(String),
    /// Byte string.
    Bytes(Vec<u8>),
    /// UUID value.
    Uuid(Uuid),
    /// Reference to another entity (instance or proxy).
    Entity(EntityRef),
    /// Fixed-length homogeneous sequence.
    Array(TypedArray),
    /// Unordered collection of unique values.
    Set(HashSet<Value>),
    /// Key to value mapping.
    Map(HashMap<Value, Value>),
    /// Ordered, resizable sequence.
    List(Vec<Value>),
}

/// Shape of a [`Value`], used for container dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// `Value::Null`.
    Null,
    /// Any scalar (bool, integer, text, bytes, uuid).
    Scalar,
    /// `Value::Entity`.
    Entity,
    /// `Value::Array`.
    Array,
    /// `Value::Set`.
    Set,
    /// `Value::Map`.
    Map,
    /// `Value::List`.
    List,
}

impl Value {
    /// Creates a list value.
    pub fn list(items: impl IntoIterator<Item = Value>) -> Self {
        Value::List(items.into_iter().collect())
    }

    /// Creates a set value. Duplicates coalesce.
    pub fn set(items: impl IntoIterator<Item = Value>) -> Self {
        Value::Set(items.into_iter().collect())
    }

    /// Creates a map value. Later duplicate keys win.
    pub fn map(entries: impl IntoIterator<Item = (Value, Value)>) -> Self {
        Value::Map(entries.into_iter().collect())
    }

    /// Creates an array value with the given element type name.
    pub fn array(element_type: impl Into<String>, items: impl IntoIterator<Item = Value>) -> Self {
        Value::Array(TypedArray::new(element_type, items))
    }

    /// Returns the shape of this value.
    #[must_use]
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Null => ValueKind::Null,
            Value::Bool(_)
            | Value::Integer(_)
            | Value::Text(_)
            | Value::Bytes(_)
            | Value::Uuid(_) => ValueKind::Scalar,
            Value::Entity(_) => ValueKind::Entity,
            Value::Array(_) => ValueKind::Array,
            Value::Set(_) => ValueKind::Set,
            Value::Map(_) => ValueKind::Map,
            Value::List(_) => ValueKind::List,
        }
    }

    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Get this value as a boolean, if it is one.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get this value as an integer, if it is one.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Get this value as text, if it is text.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Get this value as an entity reference, if it is one.
    pub fn as_entity(&self) -> Option<&EntityRef> {
        match self {
            Value::Entity(e) => Some(e),
            _ => None,
        }
    }

    /// Get this value as an array, if it is one.
    pub fn as_array(&self) -> Option<&TypedArray> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Get this value as a set, if it is one.
    pub fn as_set(&self) -> Option<&HashSet<Value>> {
        match self {
            Value::Set(s) => Some(s),
            _ => None,
        }
    }

    /// Get this value as a map, if it is one.
    pub fn as_map(&self) -> Option<&HashMap<Value, Value>> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Get this value as a list, if it is one.
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::Uuid(a), Value::Uuid(b)) => a == b,
            (Value::Entity(a), Value::Entity(b)) => a.ptr_eq(b),
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Set(a), Value::Set(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Null => {}
            Value::Bool(b) => b.hash(state),
            Value::Integer(n) => n.hash(state),
            Value::Text(s) => s.hash(state),
            Value::Bytes(b) => b.hash(state),
            Value::Uuid(u) => u.hash(state),
            Value::Entity(e) => e.node_id().hash(state),
            Value::Array(a) => a.hash(state),
            // Unordered containers: only the size is order-independent.
            Value::Set(s) => s.len().hash(state),
            Value::Map(m) => m.len().hash(state),
            Value::List(l) => l.hash(state),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<Uuid> for Value {
    fn from(u: Uuid) -> Self {
        Value::Uuid(u)
    }
}

impl From<EntityRef> for Value {
    fn from(e: EntityRef) -> Self {
        Value::Entity(e)
    }
}

impl From<&EntityRef> for Value {
    fn from(e: &EntityRef) -> Self {
        Value::Entity(e.clone())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// A fixed-length sequence whose elements share a declared type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypedArray {
    element_type: String,
    items: Box<[Value]>,
}

impl TypedArray {
    /// Creates an array of `element_type` holding `items`.
    pub fn new(element_type: impl Into<String>, items: impl IntoIterator<Item = Value>) -> Self {
        Self {
            element_type: element_type.into(),
            items: items.into_iter().collect(),
        }
    }

    /// Returns the declared element type name.
    #[must_use]
    pub fn element_type(&self) -> &str {
        &self.element_type
    }

    /// Returns the fixed length.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true if the array has no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns the element at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.items.get(index)
    }

    /// Returns the elements in order.
    #[must_use]
    pub fn items(&self) -> &[Value] {
        &self.items
    }

    /// Iterates over the elements in order.
    pub fn iter(&self) -> impl Iterator<Item = &Value> {
        self.items.iter()
    }
}
