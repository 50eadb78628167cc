//! File identity registry: stable identifiers for watched files across
//! rename-based rotation.
//!
//! Every physical file incarnation gets one [`FileId`] for its whole life.
//! When the tailed file rotates, the outgoing identity is permanently bound
//! to the path it was renamed to and a fresh identity takes over the tail.
//! Identifier/path mappings are written through the storage adapter in both
//! directions, so a registry rebuilt over the same backend resolves the
//! same identities.
//!
//! Path history is append-only for the process lifetime: once a path is
//! observed, its position in [`FileRegistry::paths`] never changes.

mod error;

pub use error::{RegistryError, RegistryResult};

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;

use crate::storage::{self, Storage, StorageError};
use crate::types::FileId;

/// Registry of watched-file identities and the time-ordered path history.
pub struct FileRegistry {
    store: Arc<dyn Storage>,
    /// Identity of the incarnation currently accumulating at the tail path.
    tail_id: FileId,
    /// Path the tail is followed at. Constant across rotations.
    tail_path: PathBuf,
    /// All paths observed so far, in discovery order. The live tail path is
    /// appended by the accessor, not stored here.
    history: Vec<PathBuf>,
    /// Read cache over the store. Never invalidated: non-tail mappings are
    /// immutable once written.
    cache: HashMap<String, String>,
}

impl FileRegistry {
    pub fn new(store: Arc<dyn Storage>, tail_path: impl Into<PathBuf>) -> Self {
        Self {
            store,
            tail_id: FileId::mint(),
            tail_path: tail_path.into(),
            history: Vec::new(),
            cache: HashMap::new(),
        }
    }

    /// Identifier of the file currently being tailed. Changes on rotation.
    pub fn identifier_for_tail_file(&self) -> FileId {
        self.tail_id
    }

    /// Path the tail is followed at.
    pub fn tail_path(&self) -> &Path {
        &self.tail_path
    }

    /// Full path history with the live tail path appended.
    pub fn paths(&self) -> Vec<PathBuf> {
        let mut all = self.history.clone();
        all.push(self.tail_path.clone());
        all
    }

    /// Register a static file.
    ///
    /// Idempotent: a path already known to the backend keeps its stored
    /// identifier, and a path already in history is not appended again.
    pub async fn add_file(&mut self, path: impl Into<PathBuf>) -> RegistryResult<()> {
        let path = path.into();
        if path == self.tail_path {
            return Ok(());
        }
        if !self.history.contains(&path) {
            self.history.push(path.clone());
        }
        let key = path.to_string_lossy().into_owned();
        if self.lookup(&key).await?.is_some() {
            return Ok(());
        }

        let id = FileId::mint();
        crate::debug_event!("registry", "added", "{} as {id}", path.display());
        self.put(&id.to_string(), &key).await?;
        self.put(&key, &id.to_string()).await?;
        Ok(())
    }

    /// Record a rotation of the tail file.
    ///
    /// The current tail identity becomes permanently bound to `new_path`;
    /// a fresh identity represents the tail going forward.
    pub async fn handle_rename(&mut self, new_path: impl Into<PathBuf>) -> RegistryResult<()> {
        let new_path = new_path.into();
        let key = new_path.to_string_lossy().into_owned();
        let rotated = self.tail_id;
        self.history.push(new_path.clone());
        self.tail_id = FileId::mint();
        crate::log_event!(
            "registry",
            "rotated",
            "{rotated} -> {} (tail now {})",
            new_path.display(),
            self.tail_id
        );
        self.put(&rotated.to_string(), &key).await?;
        self.put(&key, &rotated.to_string()).await?;
        Ok(())
    }

    /// Resolve an identifier to its path.
    ///
    /// The live tail identifier resolves to the live tail path, bypassing
    /// the cache; anything else is fixed at the time it stopped being live.
    pub async fn path_for_identifier(&mut self, id: FileId) -> RegistryResult<Option<PathBuf>> {
        if id == self.tail_id {
            return Ok(Some(self.tail_path.clone()));
        }
        Ok(self.lookup(&id.to_string()).await?.map(PathBuf::from))
    }

    /// Resolve a path to its identifier.
    pub async fn identifier_for_path(&mut self, path: &Path) -> RegistryResult<Option<FileId>> {
        if path == self.tail_path {
            return Ok(Some(self.tail_id));
        }
        let Some(raw) = self.lookup(&path.to_string_lossy()).await? else {
            return Ok(None);
        };
        let id = FileId::parse(&raw).ok_or_else(|| StorageError::MalformedValue {
            key: path.display().to_string(),
            reason: "expected a file identifier".to_string(),
        })?;
        Ok(Some(id))
    }

    /// Inclusive sub-sequence of path history from `start` to `end`.
    pub fn between(&self, start: &Path, end: &Path) -> RegistryResult<Vec<PathBuf>> {
        let all = self.paths();
        let position = |wanted: &Path| {
            all.iter()
                .position(|p| p == wanted)
                .ok_or_else(|| RegistryError::UnknownPath {
                    path: wanted.to_path_buf(),
                })
        };
        let start_index = position(start)?;
        let end_index = position(end)?;
        if start_index > end_index {
            return Err(RegistryError::OutOfOrder {
                start: start.to_path_buf(),
                end: end.to_path_buf(),
            });
        }
        Ok(all[start_index..=end_index].to_vec())
    }

    /// Write `key -> value` through the cache to the store.
    async fn put(&mut self, key: &str, value: &str) -> RegistryResult<()> {
        let wrapped = storage::namespaced(key);
        self.cache.insert(wrapped.clone(), value.to_string());
        self.store
            .set(&wrapped, Value::String(value.to_string()))
            .await?;
        Ok(())
    }

    /// Cache-through read.
    async fn lookup(&mut self, key: &str) -> RegistryResult<Option<String>> {
        let wrapped = storage::namespaced(key);
        if let Some(hit) = self.cache.get(&wrapped) {
            return Ok(Some(hit.clone()));
        }
        let Some(value) = self.store.get(&wrapped).await? else {
            return Ok(None);
        };
        let Value::String(found) = value else {
            return Err(StorageError::MalformedValue {
                key: wrapped,
                reason: "expected a string mapping".to_string(),
            }
            .into());
        };
        self.cache.insert(wrapped, found.clone());
        Ok(Some(found))
    }
}
