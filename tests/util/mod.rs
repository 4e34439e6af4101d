use std::any::Any;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{DateTime, TimeZone, Utc};
use entity_search::mapping::{
    AnalyzerDeclaration, Document, EntityConfiguration, EnumerateFn, FieldDeclaration, ScopeFn,
    ShouldIndexFn,
};
use entity_search::model::{Accessor, Entity, FieldAccessor, FieldValue};
use entity_search::search::{Hit, Predicate, SearchRequest, SearchResponse, Transport, TransportError};
use parking_lot::Mutex;
use serde_json::{Value, json};

/// Captures tracing output for tests.
#[allow(dead_code)]
pub struct TestTracing {
    buffer: Arc<std::sync::Mutex<Vec<u8>>>,
}

#[allow(dead_code)]
impl TestTracing {
    pub fn new() -> Self {
        Self {
            buffer: Arc::new(std::sync::Mutex::new(Vec::new())),
        }
    }

    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        let writer = self.buffer.clone();
        let make_writer = move || TestWriter(writer.clone());
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .without_time()
            .with_max_level(tracing::Level::TRACE)
            .with_writer(make_writer)
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    pub fn output(&self) -> String {
        let buf = self.buffer.lock().unwrap();
        String::from_utf8_lossy(&buf).to_string()
    }

    /// Assert that the captured log output contains the provided substring.
    pub fn assert_contains(&self, needle: &str) {
        let out = self.output();
        assert!(
            out.contains(needle),
            "expected logs to contain `{needle}`, got:\n{out}"
        );
    }
}

struct TestWriter(Arc<std::sync::Mutex<Vec<u8>>>);

impl std::io::Write for TestWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut guard = self.0.lock().unwrap();
        guard.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[allow(dead_code)]
pub struct EnvGuard {
    key: String,
    prev: Option<String>,
}

#[allow(dead_code)]
impl EnvGuard {
    pub fn set(key: &str, val: impl AsRef<str>) -> Self {
        let prev = std::env::var(key).ok();
        unsafe { std::env::set_var(key, val.as_ref()) };
        Self {
            key: key.to_string(),
            prev,
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        match &self.prev {
            Some(v) => unsafe { std::env::set_var(&self.key, v) },
            None => unsafe { std::env::remove_var(&self.key) },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct User {
    pub id: Option<String>,
    pub name: String,
    pub age: i64,
    pub email: Option<String>,
    pub tags: Vec<String>,
    pub born: Option<DateTime<Utc>>,
}

#[allow(dead_code)]
impl User {
    pub fn new(id: &str, name: &str, age: i64) -> Self {
        Self {
            id: Some(id.to_string()),
            name: name.to_string(),
            age,
            ..Self::default()
        }
    }

    pub fn with_tags(mut self, tags: &[&str]) -> Self {
        self.tags = tags.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn with_email(mut self, email: &str) -> Self {
        self.email = Some(email.to_string());
        self
    }

    pub fn born_on(mut self, year: i32, month: u32, day: u32) -> Self {
        self.born = Utc.with_ymd_and_hms(year, month, day, 0, 0, 0).single();
        self
    }
}

impl Entity for User {
    fn entity_type(&self) -> &str {
        "User"
    }

    fn get(&self, field: &str) -> Option<FieldValue> {
        match field {
            "id" => self.id.clone().map(FieldValue::Str),
            "name" => Some(self.name.as_str().into()),
            "age" => Some(FieldValue::Int(self.age)),
            "email" => self.email.clone().map(FieldValue::Str),
            "tags" => Some(FieldValue::List(
                self.tags.iter().map(|t| t.as_str().into()).collect(),
            )),
            "born" => self.born.map(FieldValue::Date),
            _ => None,
        }
    }

    fn set(&mut self, field: &str, value: FieldValue) {
        match (field, value) {
            ("id", FieldValue::Str(id)) => self.id = Some(id),
            ("id", FieldValue::Int(id)) => self.id = Some(id.to_string()),
            ("name", FieldValue::Str(name)) => self.name = name,
            ("age", FieldValue::Int(age)) => self.age = age,
            ("email", FieldValue::Str(email)) => self.email = Some(email),
            ("email", FieldValue::Null) => self.email = None,
            ("tags", FieldValue::List(items)) => {
                self.tags = items
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect();
            }
            ("born", FieldValue::Date(born)) => self.born = Some(born),
            _ => {}
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// `User` indexed with a comma separated `tags` field and a date-only
/// `born` field.
#[derive(Default)]
pub struct UserConfiguration {
    pub seed: Vec<User>,
}

impl EntityConfiguration for UserConfiguration {
    fn entity_type(&self) -> &str {
        "User"
    }

    fn fields(&self) -> Vec<FieldDeclaration> {
        vec![
            FieldDeclaration::string("name"),
            FieldDeclaration::integer("age"),
            FieldDeclaration::string("email").keyword(),
            FieldDeclaration::string("tags").analyzer("csv"),
            FieldDeclaration::date("born").format("yyyy-MM-dd"),
        ]
    }

    fn instantiate(&self) -> Box<dyn Entity> {
        Box::new(User::default())
    }

    fn analyzers(&self) -> Vec<(String, AnalyzerDeclaration)> {
        vec![("csv".into(), AnalyzerDeclaration::Delimited(",".into()))]
    }

    fn id_accessor(&self) -> Option<Arc<dyn Accessor>> {
        Some(Arc::new(FieldAccessor::new("id")))
    }

    fn scopes(&self) -> Vec<(String, ScopeFn)> {
        let adults: ScopeFn = Arc::new(|_: &[Value]| Predicate::gte("age", 18));
        let named: ScopeFn = Arc::new(|args: &[Value]| {
            Predicate::eq("name", args.first().cloned().unwrap_or(Value::Null))
        });
        vec![("adults".into(), adults), ("named".into(), named)]
    }

    fn should_index(&self) -> Option<ShouldIndexFn> {
        Some(Arc::new(|entity: &dyn Entity| {
            entity
                .get("name")
                .and_then(|name| name.as_str().map(|s| !s.is_empty()))
                .unwrap_or(false)
        }))
    }

    fn enumerate(&self) -> Option<EnumerateFn> {
        let seed = self.seed.clone();
        Some(Arc::new(move || {
            seed.iter()
                .cloned()
                .map(|user| Box::new(user) as Box<dyn Entity>)
                .collect()
        }))
    }
}

/// In-memory backend. Serves stored documents in insertion order and
/// ignores the query itself; counts every search.
#[allow(dead_code)]
pub struct StubTransport {
    pub documents: Mutex<Vec<(String, Document)>>,
    pub requests: Mutex<Vec<SearchRequest>>,
    pub created: Mutex<Vec<(String, Value)>>,
    pub dropped: Mutex<Vec<String>>,
    searches: AtomicUsize,
    next_id: AtomicUsize,
    totals: Totals,
    failure: Option<TransportError>,
}

/// How `StubTransport` reports `hits.total`.
#[allow(dead_code)]
#[derive(Clone, Copy)]
enum Totals {
    Exact,
    LowerBound,
    Omitted,
}

#[allow(dead_code)]
impl StubTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::build(Totals::Exact, None))
    }

    /// Reports totals as lower bounds capped at one page.
    pub fn approximate() -> Arc<Self> {
        Arc::new(Self::build(Totals::LowerBound, None))
    }

    /// Leaves `hits.total` out of every response.
    pub fn without_total() -> Arc<Self> {
        Arc::new(Self::build(Totals::Omitted, None))
    }

    /// Fails every search with `error`.
    pub fn failing(error: TransportError) -> Arc<Self> {
        Arc::new(Self::build(Totals::Exact, Some(error)))
    }

    fn build(totals: Totals, failure: Option<TransportError>) -> Self {
        Self {
            documents: Mutex::new(Vec::new()),
            requests: Mutex::new(Vec::new()),
            created: Mutex::new(Vec::new()),
            dropped: Mutex::new(Vec::new()),
            searches: AtomicUsize::new(0),
            next_id: AtomicUsize::new(1),
            totals,
            failure,
        }
    }

    /// Store `count` bare documents with ids `0..count`.
    pub fn with_rows(self: Arc<Self>, count: usize) -> Arc<Self> {
        {
            let mut documents = self.documents.lock();
            for i in 0..count {
                let source = json!({"name": format!("user{i}"), "age": 20 + i});
                documents.push((i.to_string(), source.as_object().cloned().unwrap_or_default()));
            }
        }
        self
    }

    pub fn searches(&self) -> usize {
        self.searches.load(Ordering::SeqCst)
    }
}

impl Transport for StubTransport {
    fn search(&self, request: &SearchRequest) -> Result<SearchResponse, TransportError> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(request.clone());
        if let Some(error) = &self.failure {
            return Err(error.clone());
        }

        let documents = self.documents.lock();
        let hits: Vec<Hit> = documents
            .iter()
            .skip(request.from)
            .take(request.size)
            .map(|(id, source)| Hit {
                id: id.clone(),
                score: Some(1.0),
                source: source.clone(),
            })
            .collect();
        let mut body = json!({
            "took": 1,
            "timed_out": false,
            "_shards": {"total": 1, "successful": 1, "skipped": 0, "failed": 0},
            "hits": {"hits": hits},
        });
        match self.totals {
            Totals::Exact => {
                body["hits"]["total"] = json!({"value": documents.len(), "relation": "eq"});
            }
            Totals::LowerBound => {
                let value = documents.len().min(request.size);
                body["hits"]["total"] = json!({"value": value, "relation": "gte"});
            }
            Totals::Omitted => {}
        }
        SearchResponse::from_json(&body)
    }

    fn index(&self, _index: &str, id: Option<&str>, document: &Document) -> Result<(), TransportError> {
        let id = match id {
            Some(id) => id.to_string(),
            None => format!("auto-{}", self.next_id.fetch_add(1, Ordering::SeqCst)),
        };
        let mut documents = self.documents.lock();
        match documents.iter_mut().find(|(existing, _)| *existing == id) {
            Some((_, stored)) => *stored = document.clone(),
            None => documents.push((id, document.clone())),
        }
        Ok(())
    }

    fn delete(&self, _index: &str, id: &str) -> Result<(), TransportError> {
        self.documents.lock().retain(|(existing, _)| existing != id);
        Ok(())
    }

    fn create_index(&self, index: &str, body: &Value) -> Result<(), TransportError> {
        self.created.lock().push((index.to_string(), body.clone()));
        Ok(())
    }

    fn delete_index(&self, index: &str) -> Result<(), TransportError> {
        self.dropped.lock().push(index.to_string());
        Ok(())
    }
}
