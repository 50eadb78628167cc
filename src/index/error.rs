use std::path::PathBuf;

use thiserror::Error;

use crate::registry::RegistryError;
use crate::storage::StorageError;
use crate::watcher::WatchError;

/// Errors from entry storage, link resolution, and index wiring.
#[derive(Error, Debug)]
pub enum IndexError {
    /// A link insertion or resolution ran into a cycle. The chain lists
    /// every identifier visited, ending with the repeat.
    #[error("circular link chain: {}", .chain.join(" -> "))]
    CircularLink { chain: Vec<String> },

    #[error("no file identity registered for {path}")]
    UnknownFile { path: PathBuf },

    #[error("live index setup failed: {reason}")]
    Setup { reason: String },

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Watch(#[from] WatchError),
}

pub type IndexResult<T> = Result<T, IndexError>;
