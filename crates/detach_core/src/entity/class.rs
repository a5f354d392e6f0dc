//! Entity class metadata.
//!
//! Classes describe the persistent shape of an entity: its declared fields,
//! their modifiers and the ancestor chain. The copier walks this metadata
//! instead of inspecting concrete Rust types, so one traversal serves every
//! entity kind a session provider declares.

use crate::entity::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Modifier flags of a declared field.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FieldModifiers(u8);

impl FieldModifiers {
    /// No modifiers.
    pub const NONE: Self = Self(0);
    /// Class-level field; never stored per instance.
    pub const STATIC: Self = Self(1);
    /// Fixed at construction; never reassigned.
    pub const FINAL: Self = Self(1 << 1);
    /// Runtime-only; not part of the persistent state.
    pub const TRANSIENT: Self = Self(1 << 2);

    /// Returns true if every flag in `other` is set.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns the union of both flag sets.
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Returns true if no flag is set.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl std::ops::BitOr for FieldModifiers {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl fmt::Debug for FieldModifiers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names = Vec::new();
        if self.contains(Self::STATIC) {
            names.push("STATIC");
        }
        if self.contains(Self::FINAL) {
            names.push("FINAL");
        }
        if self.contains(Self::TRANSIENT) {
            names.push("TRANSIENT");
        }
        write!(f, "FieldModifiers({})", names.join(" | "))
    }
}

/// A field declared on an entity class.
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    name: String,
    modifiers: FieldModifiers,
    default: Value,
}

impl FieldDescriptor {
    /// Creates a plain persistent field defaulting to `Null`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            modifiers: FieldModifiers::NONE,
            default: Value::Null,
        }
    }

    /// Sets the modifiers.
    #[must_use]
    pub fn modifiers(mut self, modifiers: FieldModifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    /// Sets the value assigned by the no-argument construction path.
    #[must_use]
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = value.into();
        self
    }

    /// Returns the field name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the field's modifiers.
    #[must_use]
    pub fn field_modifiers(&self) -> FieldModifiers {
        self.modifiers
    }

    /// Returns the construction-time default.
    #[must_use]
    pub fn initial_value(&self) -> &Value {
        &self.default
    }

    /// Returns true if the field is stored per instance.
    #[must_use]
    pub fn is_instance_field(&self) -> bool {
        !self.modifiers.contains(FieldModifiers::STATIC)
    }

    /// Returns true if a deep copy transfers this field.
    ///
    /// Static, final and transient fields are skipped.
    #[must_use]
    pub fn is_copyable(&self) -> bool {
        !(self.modifiers.contains(FieldModifiers::STATIC)
            || self.modifiers.contains(FieldModifiers::FINAL)
            || self.modifiers.contains(FieldModifiers::TRANSIENT))
    }
}

/// Storage key of an instance field: declaring class plus field name.
///
/// A subclass may redeclare a name its ancestor already uses; both slots
/// exist independently.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldPath {
    owner: Arc<str>,
    name: Arc<str>,
}

impl FieldPath {
    /// Creates a field path.
    pub fn new(owner: &str, name: &str) -> Self {
        Self {
            owner: Arc::from(owner),
            name: Arc::from(name),
        }
    }

    /// Returns the declaring class name.
    #[must_use]
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Returns the field name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.owner, self.name)
    }
}

/// Initializer run by [`Construction::Hook`].
pub type ConstructorHook = Arc<dyn Fn(&mut FieldValues<'_>) -> Result<(), String> + Send + Sync>;

/// How a class is instantiated without arguments.
#[derive(Clone)]
pub enum Construction {
    /// Every instance field starts at its declared default.
    NoArgs,
    /// The class has no accessible no-argument construction path.
    Unavailable,
    /// Defaults are applied, then the hook runs and may adjust fields or fail.
    Hook(ConstructorHook),
}

impl fmt::Debug for Construction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoArgs => f.write_str("NoArgs"),
            Self::Unavailable => f.write_str("Unavailable"),
            Self::Hook(_) => f.write_str("Hook(..)"),
        }
    }
}

/// Field storage handed to a constructor hook.
pub struct FieldValues<'a> {
    class: &'a EntityClass,
    values: &'a mut HashMap<FieldPath, Value>,
}

impl<'a> FieldValues<'a> {
    pub(crate) fn new(class: &'a EntityClass, values: &'a mut HashMap<FieldPath, Value>) -> Self {
        Self { class, values }
    }

    /// Assigns the most-derived instance field called `name`.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<(), String> {
        let path = self
            .class
            .resolve_field(name)
            .ok_or_else(|| format!("no instance field named {name}"))?;
        self.values.insert(path, value.into());
        Ok(())
    }

    /// Returns the current value of the most-derived field called `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.class
            .resolve_field(name)
            .and_then(|path| self.values.get(&path))
    }
}

/// Metadata of an entity class.
///
/// Classes are shared behind `Arc`; every instance of a class, including
/// deep copies, points at the same `EntityClass`.
#[derive(Debug)]
pub struct EntityClass {
    name: String,
    parent: Option<Arc<EntityClass>>,
    fields: Vec<FieldDescriptor>,
    construction: Construction,
}

impl EntityClass {
    /// Starts building a class called `name`.
    pub fn builder(name: impl Into<String>) -> ClassBuilder {
        ClassBuilder {
            name: name.into(),
            parent: None,
            fields: Vec::new(),
            construction: Construction::NoArgs,
        }
    }

    /// Returns the class name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the direct parent class.
    #[must_use]
    pub fn parent(&self) -> Option<&Arc<EntityClass>> {
        self.parent.as_ref()
    }

    /// Returns the fields declared directly on this class.
    #[must_use]
    pub fn declared_fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Returns the no-argument construction path.
    #[must_use]
    pub fn construction(&self) -> &Construction {
        &self.construction
    }

    /// Iterates over this class followed by its ancestors, most-derived first.
    pub fn lineage(&self) -> impl Iterator<Item = &EntityClass> {
        std::iter::successors(Some(self), |&class| class.parent.as_deref())
    }

    /// Iterates over every declared field across the lineage, most-derived
    /// class first, each paired with its storage path.
    pub fn fields(&self) -> impl Iterator<Item = (FieldPath, &FieldDescriptor)> {
        self.lineage().flat_map(|class| {
            class
                .fields
                .iter()
                .map(move |field| (FieldPath::new(&class.name, &field.name), field))
        })
    }

    /// Returns true if this class is `name` or descends from it.
    #[must_use]
    pub fn is_a(&self, name: &str) -> bool {
        self.lineage().any(|class| class.name == name)
    }

    /// Finds the most-derived instance field called `name`.
    #[must_use]
    pub fn resolve_field(&self, name: &str) -> Option<FieldPath> {
        self.fields()
            .find(|(_, field)| field.name == name && field.is_instance_field())
            .map(|(path, _)| path)
    }

    /// Returns the construction-time field storage: one slot per instance
    /// field, holding its declared default.
    pub(crate) fn default_values(&self) -> HashMap<FieldPath, Value> {
        self.fields()
            .filter(|(_, field)| field.is_instance_field())
            .map(|(path, field)| (path, field.default.clone()))
            .collect()
    }
}

/// Builder for [`EntityClass`].
#[derive(Debug)]
pub struct ClassBuilder {
    name: String,
    parent: Option<Arc<EntityClass>>,
    fields: Vec<FieldDescriptor>,
    construction: Construction,
}

impl ClassBuilder {
    /// Sets the parent class.
    #[must_use]
    pub fn extends(mut self, parent: &Arc<EntityClass>) -> Self {
        self.parent = Some(Arc::clone(parent));
        self
    }

    /// Declares a plain persistent field.
    #[must_use]
    pub fn field(self, name: impl Into<String>) -> Self {
        self.declare(FieldDescriptor::new(name))
    }

    /// Declares a field from a full descriptor.
    #[must_use]
    pub fn declare(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }

    /// Sets the no-argument construction path.
    #[must_use]
    pub fn construction(mut self, construction: Construction) -> Self {
        self.construction = construction;
        self
    }

    /// Marks the class as having no accessible no-argument construction path.
    #[must_use]
    pub fn no_default_constructor(self) -> Self {
        self.construction(Construction::Unavailable)
    }

    /// Installs a constructor hook.
    #[must_use]
    pub fn on_construct<F>(self, hook: F) -> Self
    where
        F: Fn(&mut FieldValues<'_>) -> Result<(), String> + Send + Sync + 'static,
    {
        self.construction(Construction::Hook(Arc::new(hook)))
    }

    /// Finishes the class.
    #[must_use]
    pub fn build(self) -> Arc<EntityClass> {
        Arc::new(EntityClass {
            name: self.name,
            parent: self.parent,
            fields: self.fields,
            construction: self.construction,
        })
    }
}
