//! Search layer.
//!
//! - **[`predicate`]**: backend-agnostic filter predicates and operators.
//! - **[`grammar`]**: compiles predicates into backend query JSON.
//! - **[`transport`]**: the backend client contract and response parsing.
//! - **[`paginator`]**: lazy page-bounded results and the page walker.
//! - **[`index`]**: the per-entity search index facade and query builder.

pub mod grammar;
pub mod index;
pub mod paginator;
pub mod predicate;
pub mod transport;

pub use grammar::{Grammar, GrammarError};
pub use index::{QueryBuilder, SearchIndex};
pub use paginator::{Page, PageWalker, Paginator, RowFn};
pub use predicate::{Operator, Predicate};
pub use transport::{Hit, SearchRequest, SearchResponse, ShardStats, Transport, TransportError};
