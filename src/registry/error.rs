use std::path::PathBuf;

use thiserror::Error;

use crate::storage::StorageError;

/// Errors from file identity tracking.
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("path {path} is not registered")]
    UnknownPath { path: PathBuf },

    #[error("nonsensical file range: {start} occurs after {end} in path history (did you swap start and end?)")]
    OutOfOrder { start: PathBuf, end: PathBuf },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

pub type RegistryResult<T> = Result<T, RegistryError>;
