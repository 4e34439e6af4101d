//! Entity mapper: converts one entity type to and from index documents.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use once_cell::sync::OnceCell;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

use super::analyzer::{Analyzer, BuiltinAnalyzer, DEFAULT_ANALYZER, StandardAnalyzer};
use super::configuration::{
    Capabilities, EntityConfiguration, EnumerateFn, ScopeFn, ShouldIndexFn,
};
use super::property::Property;
use super::transformer::{IdentityTransformer, PropertyTransformer};
use crate::model::{Accessor, Entity, FieldValue};
use crate::search::predicate::Predicate;

/// Reserved document key holding the entity identifier.
pub const ID_KEY: &str = "_id";

/// Reserved document key wrapping the stored fields of a search hit.
pub const SOURCE_KEY: &str = "_source";

/// An indexed document: field name to wire value.
pub type Document = Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MapperError {
    #[error("expected a `{expected}` entity, got `{actual}`")]
    TypeMismatch { expected: String, actual: String },

    #[error("scope `{scope}` is not declared for `{entity_type}`")]
    ScopeNotFound { entity_type: String, scope: String },

    #[error("`{entity_type}` entity has no id")]
    MissingId { entity_type: String },
}

/// Maps entities of one type to documents and back.
///
/// Capabilities of the configuration are probed once, here. Analyzers and
/// properties are derived on first use and kept for the mapper's lifetime;
/// concurrent first callers wait for a single computation.
pub struct EntityMapper {
    configuration: Arc<dyn EntityConfiguration>,
    entity_type: String,
    index_name: String,
    capabilities: Capabilities,
    id_accessor: Option<Arc<dyn Accessor>>,
    should_index: Option<ShouldIndexFn>,
    enumerate: Option<EnumerateFn>,
    identity: Arc<dyn PropertyTransformer>,
    analyzers: OnceCell<IndexMap<String, Arc<dyn Analyzer>>>,
    properties: OnceCell<IndexMap<String, Property>>,
    scopes: OnceCell<IndexMap<String, ScopeFn>>,
}

impl EntityMapper {
    pub fn new(configuration: Arc<dyn EntityConfiguration>) -> Self {
        let entity_type = configuration.entity_type().to_string();
        let index_name = configuration.index_name();
        let id_accessor = configuration.id_accessor();
        let should_index = configuration.should_index();
        let enumerate = configuration.enumerate();
        let scopes: IndexMap<String, ScopeFn> = configuration.scopes().into_iter().collect();

        let capabilities = Capabilities {
            id: id_accessor.is_some(),
            scopes: !scopes.is_empty(),
            should_index: should_index.is_some(),
            enumerate: enumerate.is_some(),
        };
        debug!(
            entity_type = %entity_type,
            index = %index_name,
            id = capabilities.id,
            scopes = capabilities.scopes,
            should_index = capabilities.should_index,
            enumerate = capabilities.enumerate,
            "entity mapper created"
        );

        Self {
            configuration,
            entity_type,
            index_name,
            capabilities,
            id_accessor,
            should_index,
            enumerate,
            identity: Arc::new(IdentityTransformer),
            analyzers: OnceCell::new(),
            properties: OnceCell::new(),
            scopes: OnceCell::with_value(scopes),
        }
    }

    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    pub fn index_name(&self) -> &str {
        &self.index_name
    }

    pub fn configuration(&self) -> &Arc<dyn EntityConfiguration> {
        &self.configuration
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    /// Declared analyzers by name. Always contains [`DEFAULT_ANALYZER`].
    pub fn analyzers(&self) -> &IndexMap<String, Arc<dyn Analyzer>> {
        self.analyzers.get_or_init(|| {
            let mut analyzers: IndexMap<String, Arc<dyn Analyzer>> = self
                .configuration
                .analyzers()
                .into_iter()
                .map(|(name, declaration)| (name, declaration.build()))
                .collect();
            if !analyzers.contains_key(DEFAULT_ANALYZER) {
                analyzers.insert(DEFAULT_ANALYZER.to_string(), Arc::new(StandardAnalyzer));
            }
            debug!(
                entity_type = %self.entity_type,
                count = analyzers.len(),
                "analyzers built"
            );
            analyzers
        })
    }

    /// Analyzer by name. Names the configuration does not declare refer to
    /// analyzers built into the backend.
    pub fn analyzer(&self, name: &str) -> Arc<dyn Analyzer> {
        match self.analyzers().get(name) {
            Some(analyzer) => Arc::clone(analyzer),
            None => Arc::new(BuiltinAnalyzer::new(name)),
        }
    }

    /// Properties in declaration order. A repeated field name replaces the
    /// earlier declaration in place.
    pub fn properties(&self) -> &IndexMap<String, Property> {
        self.properties.get_or_init(|| {
            let properties: IndexMap<String, Property> = self
                .configuration
                .fields()
                .into_iter()
                .map(|field| {
                    let analyzer = self.analyzer(field.analyzer_name());
                    let property = Property::build(field, analyzer, &self.identity);
                    (property.name().to_string(), property)
                })
                .collect();
            debug!(
                entity_type = %self.entity_type,
                count = properties.len(),
                "properties built"
            );
            properties
        })
    }

    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties().get(name)
    }

    pub fn scopes(&self) -> &IndexMap<String, ScopeFn> {
        self.scopes.get_or_init(|| self.configuration.scopes().into_iter().collect())
    }

    /// Build the predicate of a named scope.
    pub fn scope(&self, name: &str, args: &[Value]) -> Result<Predicate, MapperError> {
        let scope = self
            .scopes()
            .get(name)
            .ok_or_else(|| MapperError::ScopeNotFound {
                entity_type: self.entity_type.clone(),
                scope: name.to_string(),
            })?;
        Ok(scope(args))
    }

    fn check_type(&self, entity: &dyn Entity) -> Result<(), MapperError> {
        if entity.entity_type() == self.entity_type {
            Ok(())
        } else {
            Err(MapperError::TypeMismatch {
                expected: self.entity_type.clone(),
                actual: entity.entity_type().to_string(),
            })
        }
    }

    /// Build the document for an entity.
    ///
    /// Unset fields are left out. The id, when there is one, goes under
    /// [`ID_KEY`].
    pub fn to_index(&self, entity: &dyn Entity) -> Result<Document, MapperError> {
        self.check_type(entity)?;

        let mut document = Document::new();
        for (name, property) in self.properties() {
            if let Some(value) = property.read(entity) {
                document.insert(name.clone(), value);
            }
        }
        if let Some(id) = self.id(entity).filter(|id| !id.is_null()) {
            document.insert(ID_KEY.to_string(), id.to_json());
        }
        Ok(document)
    }

    /// Rebuild an entity from a document or a search hit.
    ///
    /// Fields are read from the [`SOURCE_KEY`] object when the document has
    /// one, otherwise from the document itself. Fields missing from the
    /// document stay unset.
    pub fn from_index(&self, document: &Document) -> Result<Box<dyn Entity>, MapperError> {
        let mut entity = self.configuration.instantiate();
        self.check_type(entity.as_ref())?;

        let source = document
            .get(SOURCE_KEY)
            .and_then(Value::as_object)
            .unwrap_or(document);
        for (name, property) in self.properties() {
            if let Some(wire) = source.get(name) {
                property.write(entity.as_mut(), wire);
            }
        }
        if let Some(id) = document.get(ID_KEY) {
            self.set_id(entity.as_mut(), FieldValue::from_json(id));
        }
        Ok(entity)
    }

    /// The entity's identifier, or `None` without an id accessor.
    pub fn id(&self, entity: &dyn Entity) -> Option<FieldValue> {
        self.id_accessor.as_ref()?.read(entity)
    }

    /// Assign the identifier. Does nothing without an id accessor.
    pub fn set_id(&self, entity: &mut dyn Entity, id: FieldValue) {
        if let Some(accessor) = &self.id_accessor {
            accessor.write(entity, id);
        }
    }

    /// The identifier rendered as a document id.
    pub fn document_id(&self, entity: &dyn Entity) -> Result<String, MapperError> {
        self.id(entity)
            .and_then(|id| id.to_text())
            .filter(|id| !id.is_empty())
            .ok_or_else(|| MapperError::MissingId {
                entity_type: self.entity_type.clone(),
            })
    }

    /// Whether the entity belongs in the index. True without a hook.
    pub fn should_index(&self, entity: &dyn Entity) -> bool {
        self.should_index
            .as_ref()
            .is_none_or(|should_index| should_index(entity))
    }

    /// Every entity to index on a full rebuild, or `None` without a hook.
    pub fn enumerate(&self) -> Option<Vec<Box<dyn Entity>>> {
        self.enumerate.as_ref().map(|enumerate| enumerate())
    }
}

impl fmt::Debug for EntityMapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityMapper")
            .field("entity_type", &self.entity_type)
            .field("index_name", &self.index_name)
            .field("capabilities", &self.capabilities)
            .finish_non_exhaustive()
    }
}
