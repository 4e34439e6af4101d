//! Property model: one indexed field of an entity.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::analyzer::{Analyzer, DEFAULT_ANALYZER};
use super::transformer::{DateTransformer, PropertyTransformer, declared_format};
use crate::model::{Accessor, Entity, FieldAccessor, FieldValue};

/// Semantic type of a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyType {
    String,
    Integer,
    Float,
    Boolean,
    Date,
    Object,
}

impl PropertyType {
    /// Field type name used in the backend mapping.
    pub fn backend_type(self) -> &'static str {
        match self {
            Self::String => "text",
            Self::Integer => "long",
            Self::Float => "double",
            Self::Boolean => "boolean",
            Self::Date => "date",
            Self::Object => "object",
        }
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Boolean => "boolean",
            Self::Date => "date",
            Self::Object => "object",
        };
        f.write_str(name)
    }
}

/// A field as declared by an entity configuration.
///
/// Only the name and type are required. The accessor defaults to reading the
/// entity field of the same name, the analyzer to [`DEFAULT_ANALYZER`] and
/// the transformer to the identity (dates get [`DateTransformer`]).
#[derive(Clone)]
pub struct FieldDeclaration {
    pub(crate) name: String,
    pub(crate) property_type: PropertyType,
    pub(crate) declaration: Map<String, Value>,
    pub(crate) analyzer: Option<String>,
    pub(crate) accessor: Option<Arc<dyn Accessor>>,
    pub(crate) transformer: Option<Arc<dyn PropertyTransformer>>,
}

impl FieldDeclaration {
    pub fn new(name: impl Into<String>, property_type: PropertyType) -> Self {
        let transformer: Option<Arc<dyn PropertyTransformer>> = match property_type {
            PropertyType::Date => Some(Arc::new(DateTransformer)),
            _ => None,
        };
        Self {
            name: name.into(),
            property_type,
            declaration: Map::new(),
            analyzer: None,
            accessor: None,
            transformer,
        }
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, PropertyType::String)
    }

    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, PropertyType::Integer)
    }

    pub fn float(name: impl Into<String>) -> Self {
        Self::new(name, PropertyType::Float)
    }

    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, PropertyType::Boolean)
    }

    pub fn date(name: impl Into<String>) -> Self {
        Self::new(name, PropertyType::Date)
    }

    pub fn object(name: impl Into<String>) -> Self {
        Self::new(name, PropertyType::Object)
    }

    /// Add a raw backend option, e.g. `("index", false)`.
    pub fn option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.declaration.insert(key.into(), value.into());
        self
    }

    /// Shorthand for the `format` option used by date fields.
    pub fn format(self, format: impl Into<String>) -> Self {
        self.option("format", format.into())
    }

    /// Store the value unanalyzed (`keyword` instead of `text`).
    pub fn keyword(self) -> Self {
        self.option("type", "keyword")
    }

    pub fn analyzer(mut self, name: impl Into<String>) -> Self {
        self.analyzer = Some(name.into());
        self
    }

    pub fn accessor(mut self, accessor: impl Accessor + 'static) -> Self {
        self.accessor = Some(Arc::new(accessor));
        self
    }

    pub fn transformer(mut self, transformer: impl PropertyTransformer + 'static) -> Self {
        self.transformer = Some(Arc::new(transformer));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn analyzer_name(&self) -> &str {
        self.analyzer.as_deref().unwrap_or(DEFAULT_ANALYZER)
    }
}

impl fmt::Debug for FieldDeclaration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDeclaration")
            .field("name", &self.name)
            .field("type", &self.property_type)
            .field("declaration", &self.declaration)
            .field("analyzer", &self.analyzer)
            .finish_non_exhaustive()
    }
}

/// An indexed field, resolved against its mapper's analyzers.
///
/// Built once by the mapper and immutable afterwards.
#[derive(Clone)]
pub struct Property {
    name: String,
    property_type: PropertyType,
    declaration: Map<String, Value>,
    analyzer_name: String,
    analyzer: Arc<dyn Analyzer>,
    accessor: Arc<dyn Accessor>,
    transformer: Arc<dyn PropertyTransformer>,
}

impl Property {
    pub(crate) fn build(
        field: FieldDeclaration,
        analyzer: Arc<dyn Analyzer>,
        identity: &Arc<dyn PropertyTransformer>,
    ) -> Self {
        let analyzer_name = field.analyzer_name().to_string();
        let accessor = field
            .accessor
            .unwrap_or_else(|| Arc::new(FieldAccessor::new(field.name.clone())));
        let transformer = field.transformer.unwrap_or_else(|| Arc::clone(identity));
        Self {
            name: field.name,
            property_type: field.property_type,
            declaration: field.declaration,
            analyzer_name,
            analyzer,
            accessor,
            transformer,
        }
    }

    #[cfg(test)]
    pub(crate) fn for_tests(field: FieldDeclaration) -> Self {
        use super::analyzer::StandardAnalyzer;
        use super::transformer::IdentityTransformer;

        let identity: Arc<dyn PropertyTransformer> = Arc::new(IdentityTransformer);
        Self::build(field, Arc::new(StandardAnalyzer), &identity)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn property_type(&self) -> PropertyType {
        self.property_type
    }

    /// Raw backend options as declared.
    pub fn declaration(&self) -> &Map<String, Value> {
        &self.declaration
    }

    pub fn format(&self) -> Option<&str> {
        declared_format(&self.declaration)
    }

    pub fn analyzer_name(&self) -> &str {
        &self.analyzer_name
    }

    pub fn analyzer(&self) -> &Arc<dyn Analyzer> {
        &self.analyzer
    }

    pub fn accessor(&self) -> &Arc<dyn Accessor> {
        &self.accessor
    }

    pub fn transformer(&self) -> &Arc<dyn PropertyTransformer> {
        &self.transformer
    }

    /// Read the field from an entity and convert it to its wire value.
    ///
    /// Returns `None` when the entity has no value for the field.
    pub fn read(&self, entity: &dyn Entity) -> Option<Value> {
        let value = self.accessor.read(entity)?;
        let value = self.transformer.to_index(self, value);
        Some(self.analyzer.to_index(value).to_json())
    }

    /// Convert a wire value back and write it to the entity.
    pub fn write(&self, entity: &mut dyn Entity, wire: &Value) {
        let value = self.analyzer.from_index(FieldValue::from_json(wire));
        let value = self.transformer.from_index(self, value);
        self.accessor.write(entity, value);
    }

    /// Whether values written by [`read`](Property::read) can be restored.
    pub fn round_trips(&self) -> bool {
        self.accessor.writable()
    }
}

impl fmt::Debug for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Property")
            .field("name", &self.name)
            .field("type", &self.property_type)
            .field("declaration", &self.declaration)
            .field("analyzer", &self.analyzer_name)
            .field("transformer", &self.transformer)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn date_fields_get_the_date_transformer() {
        let date = Property::for_tests(FieldDeclaration::date("created"));
        let name = Property::for_tests(FieldDeclaration::string("name"));

        assert_eq!(format!("{:?}", date.transformer()), "DateTransformer");
        assert_eq!(format!("{:?}", name.transformer()), "IdentityTransformer");
    }

    #[test]
    fn declaration_keeps_raw_options() {
        let property = Property::for_tests(
            FieldDeclaration::date("created")
                .format("yyyy-MM-dd")
                .option("index", false),
        );
        assert_eq!(property.format(), Some("yyyy-MM-dd"));
        assert_eq!(property.declaration().get("index"), Some(&Value::Bool(false)));
        assert_eq!(property.property_type(), PropertyType::Date);
        assert_eq!(property.analyzer_name(), DEFAULT_ANALYZER);
    }

    #[test]
    fn backend_types() {
        assert_eq!(PropertyType::String.backend_type(), "text");
        assert_eq!(PropertyType::Integer.backend_type(), "long");
        assert_eq!(PropertyType::Date.to_string(), "date");
    }
}
