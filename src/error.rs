use thiserror::Error;

use crate::cache::CacheError;
use crate::parse::ParseError;
use crate::persist::PersistenceError;
use crate::types::{ConstructionError, EditError, LoadError};
use crate::wire::DecodeError;

/// Unified error type for callers that do not care which layer failed.
///
/// Returned by convenience entry points like
/// [`Config::from_file()`](crate::config::Config::from_file).
#[derive(Debug, Error)]
pub enum FormularyError {
    #[error(transparent)]
    Construction(#[from] ConstructionError),

    #[error(transparent)]
    Edit(#[from] EditError),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
