//! Entity contract and field accessors.
//!
//! The mapping layer never looks inside application types. It reads and
//! writes fields through an [`Accessor`], which by default forwards to the
//! entity's own [`Entity::get`]/[`Entity::set`] by field name.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use super::value::FieldValue;

/// An application object that can be stored in a search index.
///
/// Implementors expose their fields by name. `entity_type` must match the
/// entity type declared by the configuration of the mapper handling it.
pub trait Entity: Any + Send + Sync {
    /// Name of the entity type, e.g. `"User"`.
    fn entity_type(&self) -> &str;

    /// Read a field. `None` means the field is unset.
    fn get(&self, field: &str) -> Option<FieldValue>;

    /// Write a field. Unknown fields are ignored.
    fn set(&mut self, field: &str, value: FieldValue);

    fn as_any(&self) -> &dyn Any;
}

impl dyn Entity {
    /// Downcast to the concrete entity type.
    pub fn downcast_ref<T: Entity>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }
}

impl fmt::Debug for dyn Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("type", &self.entity_type())
            .finish_non_exhaustive()
    }
}

/// Reads and writes one field on an entity.
pub trait Accessor: Send + Sync {
    fn read(&self, entity: &dyn Entity) -> Option<FieldValue>;

    fn write(&self, entity: &mut dyn Entity, value: FieldValue);

    /// Whether [`write`](Accessor::write) has any effect.
    ///
    /// A read-only accessor makes its property one-way: it is indexed but
    /// never restored from a document.
    fn writable(&self) -> bool {
        true
    }
}

/// Forwards to [`Entity::get`]/[`Entity::set`] under a fixed field name.
#[derive(Debug, Clone)]
pub struct FieldAccessor {
    field: String,
}

impl FieldAccessor {
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
        }
    }

    pub fn field(&self) -> &str {
        &self.field
    }
}

impl Accessor for FieldAccessor {
    fn read(&self, entity: &dyn Entity) -> Option<FieldValue> {
        entity.get(&self.field)
    }

    fn write(&self, entity: &mut dyn Entity, value: FieldValue) {
        entity.set(&self.field, value);
    }
}

type Getter = dyn Fn(&dyn Entity) -> Option<FieldValue> + Send + Sync;
type Setter = dyn Fn(&mut dyn Entity, FieldValue) + Send + Sync;

/// Accessor built from closures, for computed or renamed fields.
///
/// ```
/// use entity_search::model::{Accessor, FnAccessor, FieldValue};
///
/// // Index the length of `name` without ever writing it back.
/// let len = FnAccessor::read_only(|e| {
///     e.get("name")
///         .and_then(|v| v.as_str().map(|s| FieldValue::Int(s.len() as i64)))
/// });
/// assert!(!len.writable());
/// ```
#[derive(Clone)]
pub struct FnAccessor {
    getter: Arc<Getter>,
    setter: Option<Arc<Setter>>,
}

impl FnAccessor {
    pub fn new(
        getter: impl Fn(&dyn Entity) -> Option<FieldValue> + Send + Sync + 'static,
        setter: impl Fn(&mut dyn Entity, FieldValue) + Send + Sync + 'static,
    ) -> Self {
        Self {
            getter: Arc::new(getter),
            setter: Some(Arc::new(setter)),
        }
    }

    pub fn read_only(
        getter: impl Fn(&dyn Entity) -> Option<FieldValue> + Send + Sync + 'static,
    ) -> Self {
        Self {
            getter: Arc::new(getter),
            setter: None,
        }
    }
}

impl fmt::Debug for FnAccessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnAccessor")
            .field("writable", &self.setter.is_some())
            .finish()
    }
}

impl Accessor for FnAccessor {
    fn read(&self, entity: &dyn Entity) -> Option<FieldValue> {
        (self.getter)(entity)
    }

    fn write(&self, entity: &mut dyn Entity, value: FieldValue) {
        if let Some(setter) = &self.setter {
            setter(entity, value);
        }
    }

    fn writable(&self) -> bool {
        self.setter.is_some()
    }
}
