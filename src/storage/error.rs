use thiserror::Error;

/// Errors from the pluggable storage backend. Never retried by the core.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("storage backend error: {0}")]
    Backend(String),

    #[error("storage task failed: {0}")]
    TaskJoin(String),

    #[error("malformed value under key {key}: {reason}")]
    MalformedValue { key: String, reason: String },
}

pub type StorageResult<T> = Result<T, StorageError>;
