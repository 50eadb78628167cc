//! Pluggable key/value storage behind one asynchronous capability trait.
//!
//! The index never talks to a backend directly: asynchronous backends
//! implement [`Storage`], synchronous ones implement [`BlockingStorage`] and
//! are adapted once at construction by [`BlockingAdapter`]. Either way the
//! rest of the crate sees the same `get`/`set` surface.
//!
//! Values are JSON: the index relies on value *shape* to distinguish link
//! entries (bare strings) from direct entries (objects), so backends must
//! store values losslessly.

pub mod error;
pub mod memory;

pub use error::{StorageError, StorageResult};
pub use memory::MemoryStorage;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

/// Prefix applied to every key, so the index can share a backend with
/// other tenants.
const KEY_PREFIX: &str = "--tailindex:";

pub(crate) fn namespaced(key: &str) -> String {
    format!("{KEY_PREFIX}{key}")
}

/// Uniform asynchronous view of a key/value backend.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Fetch the value under `key`, or `None` if absent.
    async fn get(&self, key: &str) -> StorageResult<Option<Value>>;

    /// Store `value` under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: Value) -> StorageResult<()>;
}

/// A synchronous backend. Wrap it in a [`BlockingAdapter`] to use it with
/// the index.
pub trait BlockingStorage: Send + Sync {
    fn get(&self, key: &str) -> StorageResult<Option<Value>>;
    fn set(&self, key: &str, value: Value) -> StorageResult<()>;
}

/// Runs a [`BlockingStorage`] backend on the blocking thread pool so it
/// presents the same asynchronous surface as a native [`Storage`].
pub struct BlockingAdapter<B> {
    backend: Arc<B>,
}

impl<B: BlockingStorage + 'static> BlockingAdapter<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend: Arc::new(backend),
        }
    }
}

#[async_trait]
impl<B: BlockingStorage + 'static> Storage for BlockingAdapter<B> {
    async fn get(&self, key: &str) -> StorageResult<Option<Value>> {
        let backend = Arc::clone(&self.backend);
        let key = key.to_string();
        tokio::task::spawn_blocking(move || backend.get(&key))
            .await
            .map_err(|e| StorageError::TaskJoin(e.to_string()))?
    }

    async fn set(&self, key: &str, value: Value) -> StorageResult<()> {
        let backend = Arc::clone(&self.backend);
        let key = key.to_string();
        tokio::task::spawn_blocking(move || backend.set(&key, value))
            .await
            .map_err(|e| StorageError::TaskJoin(e.to_string()))?
    }
}
