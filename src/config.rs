//! Search configuration.

use serde::{Deserialize, Serialize};

/// Page size used when a query does not ask for one.
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Largest page size a single request may ask for. Offsets are not capped.
pub const DEFAULT_MAX_PAGE_SIZE: usize = 10_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Rows per page when the caller does not choose (default: 10).
    pub page_size: usize,
    /// Upper bound for any requested page size (default: 10000).
    pub max_page_size: usize,
    /// Prepended to every index name, e.g. `staging_`.
    pub index_prefix: Option<String>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            max_page_size: DEFAULT_MAX_PAGE_SIZE,
            index_prefix: None,
        }
    }
}

impl SearchConfig {
    /// Load config from environment variables. Unparseable or zero values
    /// are ignored.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(val) = dotenvy::var("ENTITY_SEARCH_PAGE_SIZE")
            && let Ok(n) = val.parse::<usize>()
            && n > 0
        {
            cfg.page_size = n;
        }

        if let Ok(val) = dotenvy::var("ENTITY_SEARCH_MAX_PAGE_SIZE")
            && let Ok(n) = val.parse::<usize>()
            && n > 0
        {
            cfg.max_page_size = n;
        }

        if let Ok(prefix) = dotenvy::var("ENTITY_SEARCH_INDEX_PREFIX")
            && !prefix.trim().is_empty()
        {
            cfg.index_prefix = Some(prefix.trim().to_string());
        }

        cfg
    }

    /// Page size for a request: the requested size or the default, within
    /// `1..=max_page_size`.
    pub fn effective_page_size(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.page_size)
            .clamp(1, self.max_page_size.max(1))
    }

    /// Full index name for a mapper's base name.
    pub fn index_name(&self, base: &str) -> String {
        match &self.index_prefix {
            Some(prefix) => format!("{prefix}{base}"),
            None => base.to_string(),
        }
    }
}
