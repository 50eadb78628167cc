use std::path::PathBuf;

use thiserror::Error;

use crate::index::IndexError;

/// Errors from range resolution and streaming.
#[derive(Error, Debug)]
pub enum RetrieveError {
    #[error(
        "invalid range: {start}:{start_position} does not precede {end}:{end_position}"
    )]
    InvalidRange {
        start: PathBuf,
        start_position: u64,
        end: PathBuf,
        end_position: u64,
    },

    #[error(transparent)]
    Index(#[from] IndexError),
}
