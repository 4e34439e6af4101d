//! Document mapping engine.
//!
//! - **[`property`]**: field declarations and resolved properties.
//! - **[`analyzer`]**: backend analysis declarations plus their value transforms.
//! - **[`transformer`]**: property transformers (identity, dates).
//! - **[`configuration`]**: the per-entity configuration contract.
//! - **[`mapper`]**: entity <-> document conversion, ids and scopes.
//! - **[`definition`]**: index settings and mappings rendered from a mapper.

pub mod analyzer;
pub mod configuration;
pub mod definition;
pub mod mapper;
pub mod property;
pub mod transformer;

pub use analyzer::{
    Analyzer, AnalyzerDeclaration, BuiltinAnalyzer, DEFAULT_ANALYZER, DelimitedAnalyzer,
    RawAnalyzer, StandardAnalyzer,
};
pub use configuration::{
    Capabilities, EntityConfiguration, EnumerateFn, ScopeFn, ShouldIndexFn,
};
pub use definition::IndexDefinition;
pub use mapper::{Document, EntityMapper, ID_KEY, MapperError, SOURCE_KEY};
pub use property::{FieldDeclaration, Property, PropertyType};
pub use transformer::{DateTransformer, IdentityTransformer, PropertyTransformer};
