use thiserror::Error;

use crate::mapping::MapperError;
use crate::resolver::ResolverError;
use crate::search::grammar::GrammarError;
use crate::search::transport::TransportError;

/// Any failure surfaced by the search facade.
///
/// Each variant carries the module error unchanged so callers can match on
/// it, e.g. to retry [`TransportError`]s that are transient.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error(transparent)]
    Grammar(#[from] GrammarError),

    #[error(transparent)]
    Mapper(#[from] MapperError),

    #[error(transparent)]
    Resolver(#[from] ResolverError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
