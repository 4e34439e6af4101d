//! Contract with the backend client.
//!
//! The crate never speaks HTTP itself. Everything it needs from the backend
//! goes through [`Transport`]; responses come back as [`SearchResponse`],
//! parsed from the backend's JSON with [`SearchResponse::from_json`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use thiserror::Error;

use crate::mapping::{Document, ID_KEY, SOURCE_KEY};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("no search node available: {0}")]
    NoNodesAvailable(String),

    #[error("backend rejected the request: {0}")]
    BadRequest(String),

    #[error("backend failure: {0}")]
    ServerError(String),

    #[error("malformed backend response: {0}")]
    MalformedResponse(String),
}

impl TransportError {
    /// Classify an HTTP status returned by the backend.
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        match status {
            503 => Self::NoNodesAvailable(body),
            400..=499 => Self::BadRequest(body),
            _ => Self::ServerError(body),
        }
    }

    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::NoNodesAvailable(_) | Self::ServerError(_))
    }
}

/// Backend client used by paginators and index facades.
pub trait Transport: Send + Sync {
    fn search(&self, request: &SearchRequest) -> Result<SearchResponse, TransportError>;

    /// Store a document. Without an id the backend assigns one.
    fn index(
        &self,
        index: &str,
        id: Option<&str>,
        document: &Document,
    ) -> Result<(), TransportError>;

    fn delete(&self, index: &str, id: &str) -> Result<(), TransportError>;

    fn create_index(&self, index: &str, body: &Value) -> Result<(), TransportError>;

    fn delete_index(&self, index: &str) -> Result<(), TransportError>;
}

/// One page of a search.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchRequest {
    pub index: String,
    pub query: Value,
    pub size: usize,
    pub from: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sort: Vec<Value>,
}

impl SearchRequest {
    pub fn new(index: impl Into<String>, query: Value) -> Self {
        Self {
            index: index.into(),
            query,
            size: crate::config::DEFAULT_PAGE_SIZE,
            from: 0,
            sort: Vec::new(),
        }
    }

    pub fn page(mut self, size: usize, from: usize) -> Self {
        self.size = size;
        self.from = from;
        self
    }

    pub fn sort(mut self, sort: Vec<Value>) -> Self {
        self.sort = sort;
        self
    }

    /// The search request body.
    pub fn body(&self) -> Value {
        let mut body = json!({
            "query": self.query,
            "size": self.size,
            "from": self.from,
        });
        if !self.sort.is_empty()
            && let Some(map) = body.as_object_mut()
        {
            map.insert("sort".into(), Value::Array(self.sort.clone()));
        }
        body
    }
}

/// A matching document.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Hit {
    #[serde(rename = "_id", default)]
    pub id: String,
    #[serde(rename = "_score", default)]
    pub score: Option<f64>,
    #[serde(rename = "_source", default)]
    pub source: Map<String, Value>,
}

impl Hit {
    /// The hit in the shape the mapper reads: `{_id, _source}`.
    pub fn to_document(&self) -> Document {
        let mut document = Document::new();
        document.insert(ID_KEY.into(), Value::String(self.id.clone()));
        document.insert(SOURCE_KEY.into(), Value::Object(self.source.clone()));
        document
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ShardStats {
    #[serde(default)]
    pub total: u32,
    #[serde(default)]
    pub successful: u32,
    #[serde(default)]
    pub skipped: u32,
    #[serde(default)]
    pub failed: u32,
}

/// A page of search results.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SearchResponse {
    pub hits: Vec<Hit>,
    /// Total number of matches, possibly a lower bound.
    pub total: u64,
    /// Whether `total` is exact.
    pub total_is_exact: bool,
    pub took_ms: u64,
    pub timed_out: bool,
    pub shards: ShardStats,
}

#[derive(Deserialize)]
struct RawResponse {
    #[serde(default)]
    took: u64,
    #[serde(default)]
    timed_out: bool,
    #[serde(rename = "_shards", default)]
    shards: ShardStats,
    #[serde(default)]
    hits: RawHits,
}

#[derive(Deserialize, Default)]
struct RawHits {
    total: Option<RawTotal>,
    #[serde(default)]
    hits: Vec<Hit>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawTotal {
    Count(u64),
    Detailed { value: u64, relation: String },
}

impl SearchResponse {
    /// Parse a backend search response.
    ///
    /// `hits.total` may be a bare number (exact) or `{value, relation}`,
    /// where any relation other than `eq` marks a lower bound. Without a
    /// total the number of returned hits is reported as a lower bound.
    pub fn from_json(value: &Value) -> Result<Self, TransportError> {
        let raw: RawResponse = serde_json::from_value(value.clone())
            .map_err(|e| TransportError::MalformedResponse(e.to_string()))?;

        let (total, total_is_exact) = match raw.hits.total {
            Some(RawTotal::Count(n)) => (n, true),
            Some(RawTotal::Detailed { value, relation }) => (value, relation == "eq"),
            None => (raw.hits.hits.len() as u64, false),
        };

        Ok(Self {
            hits: raw.hits.hits,
            total,
            total_is_exact,
            took_ms: raw.took,
            timed_out: raw.timed_out,
            shards: raw.shards,
        })
    }
}
