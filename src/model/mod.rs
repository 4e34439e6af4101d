//! Domain-facing types: field values and the entity contract.

pub mod entity;
pub mod value;

pub use entity::{Accessor, Entity, FieldAccessor, FnAccessor};
pub use value::FieldValue;
