//! Entity model: classes, references and field values.

mod class;
mod reference;
mod value;

pub use class::{
    ClassBuilder, Construction, ConstructorHook, EntityClass, FieldDescriptor, FieldModifiers,
    FieldPath, FieldValues,
};
pub use reference::EntityRef;
pub(crate) use reference::Node;
pub use value::{TypedArray, Value, ValueKind};
