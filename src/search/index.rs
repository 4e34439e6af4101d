//! Search index facade: one entity type, one backend index.

use std::sync::Arc;

use serde_json::{Value, json};
use tracing::debug;

use super::grammar::Grammar;
use super::paginator::Paginator;
use super::predicate::Predicate;
use super::transport::{Hit, Transport};
use crate::config::SearchConfig;
use crate::error::Result;
use crate::mapping::{EntityMapper, ID_KEY, IndexDefinition};
use crate::model::Entity;

/// Collects the filter, sort and paging of a search.
///
/// Clauses added with [`where_`](QueryBuilder::where_) and
/// [`scope`](QueryBuilder::scope) are AND-ed together.
#[derive(Clone)]
pub struct QueryBuilder {
    mapper: Arc<EntityMapper>,
    clauses: Vec<Predicate>,
    sort: Vec<Value>,
    page_size: Option<usize>,
    page: Option<usize>,
}

impl QueryBuilder {
    pub fn new(mapper: Arc<EntityMapper>) -> Self {
        Self {
            mapper,
            clauses: Vec::new(),
            sort: Vec::new(),
            page_size: None,
            page: None,
        }
    }

    pub fn where_(mut self, predicate: Predicate) -> Self {
        self.clauses.push(predicate);
        self
    }

    /// `where_` with a textual operator, e.g. `.filter("age", ">=", 18)`.
    pub fn filter(self, field: &str, operator: &str, value: impl Into<Value>) -> Result<Self> {
        Ok(self.where_(Predicate::parse(field, operator, value)?))
    }

    /// Match either everything collected so far or `predicate`.
    pub fn or_where(mut self, predicate: Predicate) -> Self {
        let current = Predicate::And(std::mem::take(&mut self.clauses));
        self.clauses.push(Predicate::or([current, predicate]));
        self
    }

    /// AND in a named scope of the entity configuration.
    pub fn scope(self, name: &str, args: &[Value]) -> Result<Self> {
        let predicate = self.mapper.scope(name, args)?;
        Ok(self.where_(predicate))
    }

    pub fn sort_by(mut self, field: &str, ascending: bool) -> Self {
        let order = if ascending { "asc" } else { "desc" };
        self.sort.push(json!({ field: { "order": order } }));
        self
    }

    pub fn page_size(mut self, size: usize) -> Self {
        self.page_size = Some(size);
        self
    }

    pub fn page(mut self, page: usize) -> Self {
        self.page = Some(page);
        self
    }

    /// The root predicate: all clauses AND-ed.
    pub fn predicate(&self) -> Predicate {
        Predicate::And(self.clauses.clone())
    }

    pub fn compile(&self, grammar: &Grammar) -> Result<Value> {
        Ok(grammar.compile(&self.predicate())?)
    }
}

/// Ties a mapper to a backend index through a transport.
pub struct SearchIndex {
    mapper: Arc<EntityMapper>,
    transport: Arc<dyn Transport>,
    config: SearchConfig,
    grammar: Grammar,
    name: String,
}

impl SearchIndex {
    pub fn new(
        mapper: Arc<EntityMapper>,
        transport: Arc<dyn Transport>,
        config: SearchConfig,
    ) -> Self {
        let name = config.index_name(mapper.index_name());
        Self {
            mapper,
            transport,
            config,
            grammar: Grammar::new(),
            name,
        }
    }

    /// Backend index name, prefix included.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mapper(&self) -> &Arc<EntityMapper> {
        &self.mapper
    }

    pub fn definition(&self) -> IndexDefinition {
        IndexDefinition::from_mapper(&self.mapper)
    }

    pub fn create(&self) -> Result<()> {
        debug!(index = %self.name, "create_index");
        self.transport
            .create_index(&self.name, &self.definition().to_json())?;
        Ok(())
    }

    pub fn drop(&self) -> Result<()> {
        debug!(index = %self.name, "delete_index");
        self.transport.delete_index(&self.name)?;
        Ok(())
    }

    /// Index one entity. Returns `false` when its should-index hook
    /// declines it.
    pub fn add(&self, entity: &dyn Entity) -> Result<bool> {
        if !self.mapper.should_index(entity) {
            debug!(index = %self.name, "entity skipped by should_index");
            return Ok(false);
        }
        let mut document = self.mapper.to_index(entity)?;
        let id = document
            .remove(ID_KEY)
            .and_then(|id| match id {
                Value::String(s) => Some(s),
                Value::Null => None,
                other => Some(other.to_string()),
            });
        debug!(index = %self.name, id = ?id, fields = document.len(), "index_document");
        self.transport.index(&self.name, id.as_deref(), &document)?;
        Ok(true)
    }

    /// Delete an entity's document. The entity must have an id.
    pub fn remove(&self, entity: &dyn Entity) -> Result<()> {
        let id = self.mapper.document_id(entity)?;
        debug!(index = %self.name, id = %id, "delete_document");
        self.transport.delete(&self.name, &id)?;
        Ok(())
    }

    /// Index everything the configuration's enumeration hook lists.
    /// Returns how many entities were indexed.
    pub fn refresh_all(&self) -> Result<usize> {
        let Some(entities) = self.mapper.enumerate() else {
            debug!(index = %self.name, "no enumeration hook, nothing to refresh");
            return Ok(0);
        };
        let mut indexed = 0;
        for entity in &entities {
            if self.add(entity.as_ref())? {
                indexed += 1;
            }
        }
        debug!(index = %self.name, listed = entities.len(), indexed, "refresh_all done");
        Ok(indexed)
    }

    /// A query bound to this index's scopes.
    pub fn query(&self) -> QueryBuilder {
        QueryBuilder::new(Arc::clone(&self.mapper))
    }

    /// Search and map hits back to entities.
    pub fn search(&self, query: &QueryBuilder) -> Result<Paginator<Box<dyn Entity>>> {
        let mapper = Arc::clone(&self.mapper);
        Ok(self
            .search_raw(query)?
            .map_rows(move |hit: Hit| Ok(mapper.from_index(&hit.to_document())?)))
    }

    /// Search returning raw hits.
    pub fn search_raw(&self, query: &QueryBuilder) -> Result<Paginator<Hit>> {
        let compiled = query.compile(&self.grammar)?;
        Ok(
            Paginator::new(Arc::clone(&self.transport), self.name.clone(), compiled)
                .with_config(self.config.clone())
                .with_page_size(query.page_size)
                .with_page(query.page)
                .with_sort(query.sort.clone()),
        )
    }
}
