//! In-memory storage backend.
//!
//! The default backend, and the one the test suite runs against. Contents
//! live for the lifetime of the process only.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;

use super::{Storage, StorageResult};

#[derive(Debug, Default)]
pub struct MemoryStorage {
    map: RwLock<HashMap<String, Value>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.map.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.read().is_empty()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn get(&self, key: &str) -> StorageResult<Option<Value>> {
        Ok(self.map.read().get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> StorageResult<()> {
        self.map.write().insert(key.to_string(), value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_set_then_get() {
        let store = MemoryStorage::new();
        assert!(store.is_empty());

        store.set("a", json!("one")).await.unwrap();
        store.set("a", json!("two")).await.unwrap();

        assert_eq!(store.get("a").await.unwrap(), Some(json!("two")));
        assert_eq!(store.get("b").await.unwrap(), None);
        assert_eq!(store.len(), 1);
    }
}
