//! Lazy, page-bounded search results.
//!
//! A [`Paginator`] is bound to one query and one page. Nothing is sent to
//! the backend until the first accessor call; that call issues the single
//! search request of the paginator and every later call reads the cached
//! page. A [`PageWalker`] strings paginators together to stream every hit
//! of a query.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::OnceCell;
use serde_json::Value;
use tracing::debug;

use super::transport::{Hit, SearchRequest, Transport};
use crate::config::SearchConfig;
use crate::error::Result;

/// Turns a raw hit into a result row.
pub type RowFn<T> = Arc<dyn Fn(Hit) -> Result<T> + Send + Sync>;

/// Everything needed to fetch any page of a query.
struct Bound<T> {
    transport: Arc<dyn Transport>,
    index: String,
    query: Value,
    sort: Vec<Value>,
    config: SearchConfig,
    rows: RowFn<T>,
}

/// The fetched state of a paginator.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub total: u64,
    pub accurate: bool,
    pub rows: Vec<T>,
    pub took: Duration,
    pub timed_out: bool,
}

pub struct Paginator<T = Hit> {
    bound: Bound<T>,
    page_size: Option<usize>,
    page: Option<usize>,
    fetched: OnceCell<Page<T>>,
}

impl Paginator<Hit> {
    /// Paginator over raw hits with the default configuration.
    pub fn new(transport: Arc<dyn Transport>, index: impl Into<String>, query: Value) -> Self {
        let rows: RowFn<Hit> = Arc::new(|hit: Hit| Ok(hit));
        Self {
            bound: Bound {
                transport,
                index: index.into(),
                query,
                sort: Vec::new(),
                config: SearchConfig::default(),
                rows,
            },
            page_size: None,
            page: None,
            fetched: OnceCell::new(),
        }
    }
}

impl<T> Paginator<T> {
    /// Rows per page. `None` uses the configured default.
    pub fn with_page_size(mut self, size: Option<usize>) -> Self {
        self.page_size = size;
        self.fetched = OnceCell::new();
        self
    }

    /// One-based page number. `None` and `0` mean the first page.
    pub fn with_page(mut self, page: Option<usize>) -> Self {
        self.page = page;
        self.fetched = OnceCell::new();
        self
    }

    pub fn with_sort(mut self, sort: Vec<Value>) -> Self {
        self.bound.sort = sort;
        self.fetched = OnceCell::new();
        self
    }

    pub fn with_config(mut self, config: SearchConfig) -> Self {
        self.bound.config = config;
        self.fetched = OnceCell::new();
        self
    }

    /// Map every row through `f`. Discards anything already fetched.
    pub fn map_rows<U>(self, f: impl Fn(T) -> Result<U> + Send + Sync + 'static) -> Paginator<U>
    where
        T: 'static,
    {
        let inner = self.bound.rows;
        let rows: RowFn<U> = Arc::new(move |hit: Hit| f(inner(hit)?));
        Paginator {
            bound: Bound {
                transport: self.bound.transport,
                index: self.bound.index,
                query: self.bound.query,
                sort: self.bound.sort,
                config: self.bound.config,
                rows,
            },
            page_size: self.page_size,
            page: self.page,
            fetched: OnceCell::new(),
        }
    }

    pub fn index(&self) -> &str {
        &self.bound.index
    }

    pub fn query(&self) -> &Value {
        &self.bound.query
    }

    /// Effective rows per page.
    pub fn page_size(&self) -> usize {
        self.bound.config.effective_page_size(self.page_size)
    }

    /// Effective one-based page number.
    pub fn page_number(&self) -> usize {
        self.page.unwrap_or(1).max(1)
    }

    /// Offset of the first row of this page.
    pub fn offset(&self) -> usize {
        (self.page_number() - 1).saturating_mul(self.page_size())
    }

    pub fn is_fetched(&self) -> bool {
        self.fetched.get().is_some()
    }

    /// Fetch the page on first call; return the cached page afterwards.
    pub fn fetch(&self) -> Result<&Page<T>> {
        self.fetched.get_or_try_init(|| fetch_page(&self.bound, self.page_size(), self.offset()))
    }

    /// Rows on this page.
    pub fn len(&self) -> Result<usize> {
        Ok(self.fetch()?.rows.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.fetch()?.rows.is_empty())
    }

    /// Total matches reported by the backend, exact or not; see
    /// [`is_accurate_count`](Paginator::is_accurate_count).
    pub fn size(&self) -> Result<u64> {
        Ok(self.fetch()?.total)
    }

    /// Whether [`size`](Paginator::size) is exact rather than a lower bound.
    pub fn is_accurate_count(&self) -> Result<bool> {
        Ok(self.fetch()?.accurate)
    }

    pub fn rows(&self) -> Result<&[T]> {
        Ok(&self.fetch()?.rows)
    }

    /// Iterate the cached rows. Can be called any number of times.
    pub fn iter(&self) -> Result<std::slice::Iter<'_, T>> {
        Ok(self.fetch()?.rows.iter())
    }

    /// Backend processing time.
    pub fn took(&self) -> Result<Duration> {
        Ok(self.fetch()?.took)
    }

    /// Number of pages needed for the reported total.
    pub fn page_count(&self) -> Result<u64> {
        Ok(self.size()?.div_ceil(self.page_size() as u64))
    }

    pub fn into_rows(self) -> Result<Vec<T>> {
        self.fetch()?;
        Ok(self.fetched.into_inner().map(|page| page.rows).unwrap_or_default())
    }

    /// Stream every row from this page onwards.
    pub fn walk(self) -> PageWalker<T> {
        PageWalker {
            size: self.page_size(),
            next_page: self.page_number(),
            bound: self.bound,
            buffer: VecDeque::new(),
            done: false,
        }
    }
}

impl<T> fmt::Debug for Paginator<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Paginator")
            .field("index", &self.bound.index)
            .field("query", &self.bound.query)
            .field("page_size", &self.page_size())
            .field("page", &self.page_number())
            .field("fetched", &self.is_fetched())
            .finish_non_exhaustive()
    }
}

fn fetch_page<T>(bound: &Bound<T>, size: usize, from: usize) -> Result<Page<T>> {
    let request = SearchRequest::new(bound.index.clone(), bound.query.clone())
        .page(size, from)
        .sort(bound.sort.clone());
    debug!(index = %bound.index, size, from, "search_start");

    let response = bound.transport.search(&request)?;
    let rows = response
        .hits
        .into_iter()
        .map(|hit| (bound.rows)(hit))
        .collect::<Result<Vec<T>>>()?;

    debug!(
        index = %bound.index,
        total = response.total,
        accurate = response.total_is_exact,
        rows = rows.len(),
        took_ms = response.took_ms,
        "search_done"
    );
    Ok(Page {
        total: response.total,
        accurate: response.total_is_exact,
        rows,
        took: Duration::from_millis(response.took_ms),
        timed_out: response.timed_out,
    })
}

/// Streams every row of a query, one page request at a time.
///
/// Stops after an empty or short page, or once the offset passes the
/// reported total when that total is exact.
/// An error ends the stream after it is yielded.
pub struct PageWalker<T = Hit> {
    bound: Bound<T>,
    size: usize,
    next_page: usize,
    buffer: VecDeque<T>,
    done: bool,
}

impl<T> PageWalker<T> {
    fn load_next_page(&mut self) -> Result<()> {
        let from = (self.next_page - 1).saturating_mul(self.size);
        let page = fetch_page(&self.bound, self.size, from)?;
        self.next_page += 1;

        // A lower-bound total says nothing about where the data ends.
        let seen = from.saturating_add(page.rows.len()) as u64;
        let short = page.rows.len() < self.size;
        if page.rows.is_empty() || short || (page.accurate && seen >= page.total) {
            self.done = true;
        }
        self.buffer.extend(page.rows);
        Ok(())
    }
}

impl<T> Iterator for PageWalker<T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(row) = self.buffer.pop_front() {
                return Some(Ok(row));
            }
            if self.done {
                return None;
            }
            if let Err(e) = self.load_next_page() {
                self.done = true;
                return Some(Err(e));
            }
        }
    }
}
