//! Analyzers: backend text-processing declarations plus a coarse value
//! transform applied on the way in and out of the index.

use std::fmt;
use std::sync::Arc;

use itertools::Itertools;
use serde_json::{Map, Value, json};

use crate::model::FieldValue;

/// Name of the analyzer used by properties that do not pick one.
pub const DEFAULT_ANALYZER: &str = "default";

/// How a field's text is tokenized and filtered by the backend.
///
/// The value transform runs after the property transformer on the way in
/// and before it on the way out.
pub trait Analyzer: Send + Sync + fmt::Debug {
    /// Analyzer settings, without the `tokenizer` and `filter` entries.
    fn declaration(&self) -> Map<String, Value>;

    /// Either the name of a backend tokenizer or an inline tokenizer
    /// definition object.
    fn tokenizer(&self) -> Option<Value> {
        None
    }

    /// Filter names or inline filter definition objects, in order.
    fn filters(&self) -> Vec<Value> {
        Vec::new()
    }

    fn to_index(&self, value: FieldValue) -> FieldValue {
        value
    }

    fn from_index(&self, value: FieldValue) -> FieldValue {
        value
    }

    /// Built into the backend: referenced by name, never declared in the
    /// index settings.
    fn builtin(&self) -> bool {
        false
    }
}

/// The backend's own standard analyzer. No value transform.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardAnalyzer;

impl Analyzer for StandardAnalyzer {
    fn declaration(&self) -> Map<String, Value> {
        let mut declaration = Map::new();
        declaration.insert("type".into(), json!("standard"));
        declaration
    }

    fn builtin(&self) -> bool {
        true
    }
}

/// Any other analyzer the backend ships, e.g. `english` or `keyword`.
///
/// Fields naming an analyzer their configuration does not declare get one of
/// these.
#[derive(Debug, Clone)]
pub struct BuiltinAnalyzer {
    name: String,
}

impl BuiltinAnalyzer {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Analyzer for BuiltinAnalyzer {
    fn declaration(&self) -> Map<String, Value> {
        let mut declaration = Map::new();
        declaration.insert("type".into(), Value::String(self.name.clone()));
        declaration
    }

    fn builtin(&self) -> bool {
        true
    }
}

/// Analyzer declared as a raw settings map.
///
/// `tokenizer` and `filter` are lifted out of the map at construction; the
/// rest is kept verbatim.
#[derive(Debug, Clone)]
pub struct RawAnalyzer {
    declaration: Map<String, Value>,
    tokenizer: Option<Value>,
    filters: Vec<Value>,
}

impl RawAnalyzer {
    pub fn new(mut declaration: Map<String, Value>) -> Self {
        let tokenizer = declaration.remove("tokenizer");
        let filters = match declaration.remove("filter") {
            Some(Value::Array(items)) => items,
            Some(Value::Null) | None => Vec::new(),
            Some(single) => vec![single],
        };
        Self {
            declaration,
            tokenizer,
            filters,
        }
    }
}

impl Analyzer for RawAnalyzer {
    fn declaration(&self) -> Map<String, Value> {
        self.declaration.clone()
    }

    fn tokenizer(&self) -> Option<Value> {
        self.tokenizer.clone()
    }

    fn filters(&self) -> Vec<Value> {
        self.filters.clone()
    }
}

/// Stores a list as one delimited string and tokenizes it on the separator.
///
/// Lists of scalars are joined with the separator when indexed; strings read
/// back from the index are split into a list of strings. Other values pass
/// through untouched.
#[derive(Debug, Clone)]
pub struct DelimitedAnalyzer {
    separator: String,
    filters: Vec<Value>,
}

impl DelimitedAnalyzer {
    pub fn new(separator: impl Into<String>) -> Self {
        Self {
            separator: separator.into(),
            filters: Vec::new(),
        }
    }

    /// Comma separated values.
    pub fn csv() -> Self {
        Self::new(",")
    }

    pub fn with_filter(mut self, filter: impl Into<Value>) -> Self {
        self.filters.push(filter.into());
        self
    }

    pub fn separator(&self) -> &str {
        &self.separator
    }
}

impl Analyzer for DelimitedAnalyzer {
    fn declaration(&self) -> Map<String, Value> {
        let mut declaration = Map::new();
        declaration.insert("type".into(), json!("custom"));
        declaration
    }

    fn tokenizer(&self) -> Option<Value> {
        Some(json!({
            "type": "pattern",
            "pattern": regex::escape(&self.separator),
        }))
    }

    fn filters(&self) -> Vec<Value> {
        self.filters.clone()
    }

    fn to_index(&self, value: FieldValue) -> FieldValue {
        let FieldValue::List(items) = &value else {
            return value;
        };
        let texts: Option<Vec<String>> = items.iter().map(FieldValue::to_text).collect();
        match texts {
            Some(texts) => FieldValue::Str(texts.iter().join(&self.separator)),
            // Nested lists or maps cannot be flattened into one string.
            None => value,
        }
    }

    fn from_index(&self, value: FieldValue) -> FieldValue {
        match value {
            FieldValue::Str(s) if s.is_empty() => FieldValue::List(Vec::new()),
            FieldValue::Str(s) => FieldValue::List(
                s.split(self.separator.as_str())
                    .map(|part| FieldValue::Str(part.to_string()))
                    .collect(),
            ),
            other => other,
        }
    }
}

/// Analyzer as written in an entity configuration.
#[derive(Debug, Clone)]
pub enum AnalyzerDeclaration {
    Standard,
    /// Raw settings map, e.g. `{"type": "custom", "tokenizer": "whitespace", "filter": ["lowercase"]}`.
    Raw(Map<String, Value>),
    Delimited(String),
    Custom(Arc<dyn Analyzer>),
}

impl AnalyzerDeclaration {
    /// Raw declaration from a JSON object. Anything else declares the
    /// standard analyzer.
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::Object(map) => Self::Raw(map),
            _ => Self::Standard,
        }
    }

    pub fn build(self) -> Arc<dyn Analyzer> {
        match self {
            Self::Standard => Arc::new(StandardAnalyzer),
            Self::Raw(map) => Arc::new(RawAnalyzer::new(map)),
            Self::Delimited(separator) => Arc::new(DelimitedAnalyzer::new(separator)),
            Self::Custom(analyzer) => analyzer,
        }
    }
}
