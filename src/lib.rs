//! Keep application entities in a JSON search backend and query them with a
//! backend-agnostic predicate language.
//!
//! An [`EntityConfiguration`] declares how one entity type is indexed. The
//! [`EntityMapper`] built from it converts entities to documents and back.
//! Filters are written as [`Predicate`] trees, compiled by the [`Grammar`]
//! into the backend's boolean query JSON and executed page by page through a
//! [`Paginator`]. The backend itself is reached only through the
//! [`Transport`] trait.
//!
//! ```
//! use entity_search::search::{Grammar, Predicate};
//! use serde_json::json;
//!
//! let filter = Predicate::and([
//!     Predicate::between("age", 45, 51),
//!     Predicate::eq("name", "John"),
//! ]);
//! assert_eq!(
//!     Grammar::new().compile(&filter).unwrap(),
//!     json!({"bool": {"must": [
//!         {"range": {"age": {"gte": 45, "lte": 51}}},
//!         {"term": {"name": "John"}},
//!     ]}})
//! );
//! ```

pub mod config;
pub mod error;
pub mod mapping;
pub mod model;
pub mod resolver;
pub mod search;

pub use config::SearchConfig;
pub use error::{Error, Result};
pub use mapping::{EntityConfiguration, EntityMapper, FieldDeclaration, IndexDefinition};
pub use model::{Entity, FieldValue};
pub use resolver::{ConfigurationResolver, ConfigurationSource};
pub use search::{Grammar, Paginator, Predicate, SearchIndex, Transport};
