//! Entry persistence and link resolution.
//!
//! Entries are stored as JSON through the storage adapter: a direct entry
//! is an object carrying a file identity and byte offset, a link is the
//! bare target identifier as a string. The two shapes share one key space;
//! nothing but the value shape tells them apart.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::events::{EventBroadcaster, IndexEvent};
use crate::registry::FileRegistry;
use crate::storage::{self, Storage, StorageError};
use crate::types::{FileId, FilePosition};

use super::error::{IndexError, IndexResult};

/// A stored index entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Entry {
    /// Alias to another identifier, resolved transitively.
    Link(String),
    /// Direct reference into a file incarnation.
    Direct { file: FileId, position: u64 },
}

/// Persists index entries through the storage adapter and resolves link
/// chains with cycle detection.
pub struct EntryStore {
    store: Arc<dyn Storage>,
    registry: Arc<RwLock<FileRegistry>>,
    events: EventBroadcaster,
    /// Links committed through this store, used for the synchronous
    /// pre-commit cycle check. Resolution-time traversal remains the
    /// authoritative guard for links written elsewhere.
    links: Mutex<HashMap<String, String>>,
}

impl EntryStore {
    pub fn new(
        store: Arc<dyn Storage>,
        registry: Arc<RwLock<FileRegistry>>,
        events: EventBroadcaster,
    ) -> Self {
        Self {
            store,
            registry,
            events,
            links: Mutex::new(HashMap::new()),
        }
    }

    /// Insert a direct entry for `identifier` at `position` in `file_path`.
    ///
    /// The path must already be known to the registry (the tail, a rotated
    /// incarnation, or a static file). Re-inserting an identifier
    /// overwrites the previous entry.
    pub async fn insert(
        &self,
        identifier: &str,
        file_path: &Path,
        position: u64,
    ) -> IndexResult<()> {
        let file = {
            let mut registry = self.registry.write().await;
            registry.identifier_for_path(file_path).await?
        };
        let file = file.ok_or_else(|| IndexError::UnknownFile {
            path: file_path.to_path_buf(),
        })?;

        self.put(identifier, &Entry::Direct { file, position }).await?;
        // a direct entry may overwrite a link under the same identifier
        self.links.lock().remove(identifier);
        crate::debug_event!(
            "index",
            "inserted",
            "{identifier} at {}:{position}",
            file_path.display()
        );
        self.events.send(IndexEvent::Inserted {
            identifier: identifier.to_string(),
        });
        Ok(())
    }

    /// Insert a link aliasing `identifier` to `target`.
    ///
    /// Fails with [`IndexError::CircularLink`] when the link would close a
    /// cycle over the locally-known link graph; a self-link always does.
    pub async fn insert_link(&self, identifier: &str, target: &str) -> IndexResult<()> {
        self.check_local_cycle(identifier, target)?;
        self.put(identifier, &Entry::Link(target.to_string())).await?;
        self.links
            .lock()
            .insert(identifier.to_string(), target.to_string());
        crate::debug_event!("index", "linked", "{identifier} -> {target}");
        Ok(())
    }

    /// Resolve `identifier` to a concrete file path and byte offset.
    ///
    /// Links are dereferenced transitively. Absent identifiers and file
    /// identities that no longer map to a path resolve to `None`; a link
    /// chain revisiting an identifier fails with the full chain.
    pub async fn file_and_position_for_identifier(
        &self,
        identifier: &str,
    ) -> IndexResult<Option<FilePosition>> {
        let mut visited = vec![identifier.to_string()];
        let mut cursor = identifier.to_string();
        loop {
            let Some(entry) = self.fetch(&cursor).await? else {
                return Ok(None);
            };
            match entry {
                Entry::Direct { file, position } => {
                    let path = {
                        let mut registry = self.registry.write().await;
                        registry.path_for_identifier(file).await?
                    };
                    return Ok(path.map(|file| FilePosition { file, position }));
                }
                Entry::Link(target) => {
                    if visited.contains(&target) {
                        visited.push(target);
                        return Err(IndexError::CircularLink { chain: visited });
                    }
                    visited.push(target.clone());
                    cursor = target;
                }
            }
        }
    }

    /// Walk the locally-known link graph from `target`; reaching any
    /// identifier twice means committing this link would close a cycle.
    fn check_local_cycle(&self, identifier: &str, target: &str) -> IndexResult<()> {
        let links = self.links.lock();
        let mut seen = vec![identifier.to_string()];
        let mut cursor = target.to_string();
        loop {
            if seen.contains(&cursor) {
                seen.push(cursor);
                return Err(IndexError::CircularLink { chain: seen });
            }
            seen.push(cursor.clone());
            match links.get(&cursor) {
                Some(next) => cursor = next.clone(),
                None => return Ok(()),
            }
        }
    }

    async fn put(&self, identifier: &str, entry: &Entry) -> IndexResult<()> {
        let key = storage::namespaced(identifier);
        let value = serde_json::to_value(entry).map_err(|e| StorageError::MalformedValue {
            key: key.clone(),
            reason: e.to_string(),
        })?;
        self.store.set(&key, value).await?;
        Ok(())
    }

    async fn fetch(&self, identifier: &str) -> IndexResult<Option<Entry>> {
        let key = storage::namespaced(identifier);
        let Some(value) = self.store.get(&key).await? else {
            return Ok(None);
        };
        let entry = serde_json::from_value(value).map_err(|e| StorageError::MalformedValue {
            key,
            reason: e.to_string(),
        })?;
        Ok(Some(entry))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use serde_json::json;

    const TAIL: &str = "/logs/app.log";

    fn store_over(backend: Arc<dyn Storage>) -> EntryStore {
        let registry = Arc::new(RwLock::new(FileRegistry::new(
            Arc::clone(&backend),
            TAIL,
        )));
        EntryStore::new(backend, registry, EventBroadcaster::new(16))
    }

    #[tokio::test]
    async fn test_insert_then_resolve() {
        let store = store_over(Arc::new(MemoryStorage::new()));

        store.insert("x", Path::new(TAIL), 5).await.unwrap();

        let hit = store
            .file_and_position_for_identifier("x")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(hit, FilePosition::new(TAIL, 5));
    }

    #[tokio::test]
    async fn test_reinsert_overwrites() {
        let store = store_over(Arc::new(MemoryStorage::new()));

        store.insert("x", Path::new(TAIL), 5).await.unwrap();
        store.insert("x", Path::new(TAIL), 99).await.unwrap();

        let hit = store
            .file_and_position_for_identifier("x")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(hit.position, 99);
    }

    #[tokio::test]
    async fn test_link_resolves_to_target_entry() {
        let store = store_over(Arc::new(MemoryStorage::new()));

        store.insert("foo", Path::new(TAIL), 9).await.unwrap();
        store.insert_link("bar", "foo").await.unwrap();

        let hit = store
            .file_and_position_for_identifier("bar")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(hit, FilePosition::new(TAIL, 9));
    }

    #[tokio::test]
    async fn test_unknown_identifier_is_not_found() {
        let store = store_over(Arc::new(MemoryStorage::new()));

        let hit = store
            .file_and_position_for_identifier("never-inserted")
            .await
            .unwrap();
        assert_eq!(hit, None);
    }

    #[tokio::test]
    async fn test_self_link_is_rejected() {
        let store = store_over(Arc::new(MemoryStorage::new()));

        let err = store.insert_link("foo", "foo").await.unwrap_err();
        match err {
            IndexError::CircularLink { chain } => assert_eq!(chain, vec!["foo", "foo"]),
            other => panic!("expected CircularLink, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_transitive_cycle_is_rejected_before_commit() {
        let store = store_over(Arc::new(MemoryStorage::new()));

        store.insert_link("a", "b").await.unwrap();
        store.insert_link("b", "c").await.unwrap();

        let err = store.insert_link("c", "a").await.unwrap_err();
        match err {
            IndexError::CircularLink { chain } => {
                assert_eq!(chain, vec!["c", "a", "b", "c"]);
            }
            other => panic!("expected CircularLink, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_resolution_detects_cycles_written_elsewhere() {
        // A cycle committed by another writer bypasses the local check;
        // resolution is the authoritative guard.
        let backend = Arc::new(MemoryStorage::new());
        backend
            .set(&storage::namespaced("a"), json!("b"))
            .await
            .unwrap();
        backend
            .set(&storage::namespaced("b"), json!("c"))
            .await
            .unwrap();
        backend
            .set(&storage::namespaced("c"), json!("a"))
            .await
            .unwrap();
        let store = store_over(backend);

        for id in ["a", "b", "c"] {
            let err = store
                .file_and_position_for_identifier(id)
                .await
                .unwrap_err();
            assert!(matches!(err, IndexError::CircularLink { .. }), "{id}");
        }

        let err = store
            .file_and_position_for_identifier("a")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "circular link chain: a -> b -> c -> a");
    }

    #[tokio::test]
    async fn test_insert_emits_event() {
        let backend: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        let registry = Arc::new(RwLock::new(FileRegistry::new(Arc::clone(&backend), TAIL)));
        let events = EventBroadcaster::new(16);
        let mut rx = events.subscribe();
        let store = EntryStore::new(backend, registry, events);

        store.insert("x", Path::new(TAIL), 0).await.unwrap();

        match rx.recv().await.unwrap() {
            IndexEvent::Inserted { identifier } => assert_eq!(identifier, "x"),
            other => panic!("expected Inserted, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_insert_against_unknown_path_fails() {
        let store = store_over(Arc::new(MemoryStorage::new()));

        let err = store
            .insert("x", Path::new("/logs/unregistered.log"), 0)
            .await
            .unwrap_err();
        assert!(matches!(err, IndexError::UnknownFile { .. }));
    }
}
