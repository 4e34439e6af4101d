//! Entity type to configuration lookup.
//!
//! Configurations are registered either as ready instances or as class
//! references that a [`ConfigurationFactory`] turns into instances on first
//! lookup. Registration is expected to finish before queries start; lookups
//! only take the read lock.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use thiserror::Error;
use tracing::debug;

use crate::mapping::{EntityConfiguration, EntityMapper};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolverError {
    #[error("configuration class `{class}` was registered without an entity type")]
    MissingEntityType { class: String },

    #[error("no configuration registered for `{0}`")]
    Unregistered(String),

    #[error("configuration class `{class}` could not be instantiated for `{entity_type}`")]
    Instantiation { class: String, entity_type: String },

    #[error("configuration for `{configured}` cannot be registered as `{registered}`")]
    EntityTypeMismatch { registered: String, configured: String },
}

/// Builds configurations registered by class name.
pub trait ConfigurationFactory: Send + Sync {
    fn create(&self, class: &str) -> Option<Arc<dyn EntityConfiguration>>;
}

impl<F> ConfigurationFactory for F
where
    F: Fn(&str) -> Option<Arc<dyn EntityConfiguration>> + Send + Sync,
{
    fn create(&self, class: &str) -> Option<Arc<dyn EntityConfiguration>> {
        self(class)
    }
}

/// What gets registered for an entity type.
#[derive(Clone)]
pub enum ConfigurationSource {
    Instance(Arc<dyn EntityConfiguration>),
    /// Instantiated through the factory on first lookup.
    Class(String),
}

impl fmt::Debug for ConfigurationSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Instance(cfg) => f.debug_tuple("Instance").field(&cfg.entity_type()).finish(),
            Self::Class(class) => f.debug_tuple("Class").field(class).finish(),
        }
    }
}

struct Entry {
    entity_type: String,
    class: Option<String>,
    configuration: OnceCell<Arc<dyn EntityConfiguration>>,
    mapper: OnceCell<Arc<EntityMapper>>,
}

#[derive(Default)]
pub struct ConfigurationResolver {
    factory: Option<Arc<dyn ConfigurationFactory>>,
    entries: RwLock<HashMap<String, Arc<Entry>>>,
}

impl ConfigurationResolver {
    pub fn new(factory: Arc<dyn ConfigurationFactory>) -> Self {
        Self {
            factory: Some(factory),
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Register a configuration for an entity type.
    ///
    /// Instances default to their own entity type. Class references must
    /// name the entity type, since nothing is instantiated here; the
    /// instance built later has to agree with it. A later registration for
    /// the same entity type replaces the earlier one.
    pub fn register(
        &self,
        source: ConfigurationSource,
        entity_type: Option<&str>,
    ) -> Result<(), ResolverError> {
        let entry = match source {
            ConfigurationSource::Instance(configuration) => {
                let configured = configuration.entity_type().to_string();
                if let Some(registered) = entity_type
                    && registered != configured
                {
                    return Err(ResolverError::EntityTypeMismatch {
                        registered: registered.to_string(),
                        configured,
                    });
                }
                Entry {
                    entity_type: configured,
                    class: None,
                    configuration: OnceCell::with_value(configuration),
                    mapper: OnceCell::new(),
                }
            }
            ConfigurationSource::Class(class) => {
                let Some(entity_type) = entity_type else {
                    return Err(ResolverError::MissingEntityType { class });
                };
                Entry {
                    entity_type: entity_type.to_string(),
                    class: Some(class),
                    configuration: OnceCell::new(),
                    mapper: OnceCell::new(),
                }
            }
        };

        debug!(
            entity_type = %entry.entity_type,
            class = ?entry.class,
            "configuration registered"
        );
        self.entries
            .write()
            .insert(entry.entity_type.clone(), Arc::new(entry));
        Ok(())
    }

    pub fn is_registered(&self, entity_type: &str) -> bool {
        self.entries.read().contains_key(entity_type)
    }

    /// Registered entity types, sorted.
    pub fn entity_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.entries.read().keys().cloned().collect();
        types.sort();
        types
    }

    fn entry(&self, entity_type: &str) -> Option<Arc<Entry>> {
        self.entries.read().get(entity_type).cloned()
    }

    /// The configuration for an entity type, or `None` when nothing is
    /// registered. Class references are instantiated once.
    pub fn resolve(
        &self,
        entity_type: &str,
    ) -> Result<Option<Arc<dyn EntityConfiguration>>, ResolverError> {
        match self.entry(entity_type) {
            Some(entry) => self.configuration(&entry).map(Some),
            None => Ok(None),
        }
    }

    fn configuration(&self, entry: &Entry) -> Result<Arc<dyn EntityConfiguration>, ResolverError> {
        entry
            .configuration
            .get_or_try_init(|| {
                let class = entry.class.clone().unwrap_or_default();
                let instantiation = || ResolverError::Instantiation {
                    class: class.clone(),
                    entity_type: entry.entity_type.clone(),
                };
                let factory = self.factory.as_ref().ok_or_else(instantiation)?;
                let configuration = factory.create(&class).ok_or_else(instantiation)?;
                if configuration.entity_type() != entry.entity_type {
                    return Err(ResolverError::EntityTypeMismatch {
                        registered: entry.entity_type.clone(),
                        configured: configuration.entity_type().to_string(),
                    });
                }
                debug!(entity_type = %entry.entity_type, class = %class, "configuration instantiated");
                Ok(configuration)
            })
            .cloned()
    }

    /// The mapper for an entity type, built once per registration.
    pub fn mapper(&self, entity_type: &str) -> Result<Arc<EntityMapper>, ResolverError> {
        let entry = self
            .entry(entity_type)
            .ok_or_else(|| ResolverError::Unregistered(entity_type.to_string()))?;
        entry
            .mapper
            .get_or_try_init(|| {
                let configuration = self.configuration(&entry)?;
                Ok(Arc::new(EntityMapper::new(configuration)))
            })
            .cloned()
    }
}

impl fmt::Debug for ConfigurationResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigurationResolver")
            .field("entity_types", &self.entity_types())
            .field("factory", &self.factory.is_some())
            .finish()
    }
}
