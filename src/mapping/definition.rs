//! Index creation body rendered from a mapper.

use serde::Serialize;
use serde_json::{Map, Value, json};

use super::analyzer::{Analyzer, DEFAULT_ANALYZER};
use super::mapper::EntityMapper;
use super::property::{Property, PropertyType};

/// Settings and field mappings of an index.
///
/// `settings.analysis` declares every analyzer the configuration defines,
/// skipping the ones built into the backend. Inline tokenizer definitions
/// are registered as `<analyzer>_tokenizer` and inline filter definitions
/// as `<analyzer>_filter_<n>`, `n` being the filter's position.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexDefinition {
    pub settings: Value,
    pub mappings: Value,
}

impl IndexDefinition {
    pub fn from_mapper(mapper: &EntityMapper) -> Self {
        let mut analyzers = Map::new();
        let mut tokenizers = Map::new();
        let mut filters = Map::new();

        for (name, analyzer) in mapper.analyzers() {
            if analyzer.builtin() {
                continue;
            }
            let declaration = render_analyzer(name, analyzer.as_ref(), &mut tokenizers, &mut filters);
            analyzers.insert(name.clone(), Value::Object(declaration));
        }

        let mut analysis = Map::new();
        for (section, entries) in [
            ("analyzer", analyzers),
            ("tokenizer", tokenizers),
            ("filter", filters),
        ] {
            if !entries.is_empty() {
                analysis.insert(section.to_string(), Value::Object(entries));
            }
        }
        let settings = if analysis.is_empty() {
            json!({})
        } else {
            json!({ "analysis": analysis })
        };

        let properties: Map<String, Value> = mapper
            .properties()
            .iter()
            .map(|(name, property)| (name.clone(), Value::Object(field_mapping(property))))
            .collect();

        Self {
            settings,
            mappings: json!({ "properties": properties }),
        }
    }

    /// The request body for index creation.
    pub fn to_json(&self) -> Value {
        json!({ "settings": self.settings, "mappings": self.mappings })
    }
}

fn render_analyzer(
    name: &str,
    analyzer: &dyn Analyzer,
    tokenizers: &mut Map<String, Value>,
    filters: &mut Map<String, Value>,
) -> Map<String, Value> {
    let mut declaration = analyzer.declaration();

    match analyzer.tokenizer() {
        Some(Value::Object(definition)) => {
            let tokenizer = format!("{name}_tokenizer");
            tokenizers.insert(tokenizer.clone(), Value::Object(definition));
            declaration.insert("tokenizer".into(), Value::String(tokenizer));
        }
        Some(named) => {
            declaration.insert("tokenizer".into(), named);
        }
        None => {}
    }

    let references: Vec<Value> = analyzer
        .filters()
        .into_iter()
        .enumerate()
        .map(|(n, filter)| match filter {
            Value::Object(definition) => {
                let filter = format!("{name}_filter_{n}");
                filters.insert(filter.clone(), Value::Object(definition));
                Value::String(filter)
            }
            named => named,
        })
        .collect();
    if !references.is_empty() {
        declaration.insert("filter".into(), Value::Array(references));
    }

    declaration
}

fn field_mapping(property: &Property) -> Map<String, Value> {
    let mut mapping = Map::new();
    mapping.insert(
        "type".into(),
        Value::String(property.property_type().backend_type().to_string()),
    );
    if property.property_type() == PropertyType::String
        && property.analyzer_name() != DEFAULT_ANALYZER
    {
        mapping.insert(
            "analyzer".into(),
            Value::String(property.analyzer_name().to_string()),
        );
    }
    for (key, value) in property.declaration() {
        mapping.insert(key.clone(), value.clone());
    }
    // Only analyzed text takes an analyzer.
    if mapping.get("type").and_then(Value::as_str) != Some("text") {
        mapping.remove("analyzer");
    }
    mapping
}
