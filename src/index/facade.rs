//! LiveIndex - facade wiring storage, registry, entry store, chunk
//! processor, tailer, and event broadcasting.
//!
//! # Architecture
//!
//! ```text
//! LiveIndex
//!   ├── Arc<dyn Storage>           - pluggable backend
//!   ├── Arc<RwLock<FileRegistry>>  - file identities + path history
//!   ├── Arc<EntryStore>            - direct + link entries
//!   ├── Arc<ChunkProcessor>        - leftover state + indexer drive
//!   ├── Arc<dyn Tailer>            - chunk/rename event source
//!   ├── RangeResolver              - identifier pair -> byte stream
//!   └── EventBroadcaster           - insert/error notifications
//! ```
//!
//! One event loop per watch handle consumes the tailer's channel, so
//! chunks and the rotation event for a handle are processed in the order
//! they were emitted.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use regex::bytes::Regex;
use tokio::sync::{RwLock, broadcast, mpsc};

use crate::config::Settings;
use crate::events::{EventBroadcaster, IndexEvent};
use crate::registry::FileRegistry;
use crate::retrieve::{FsConcat, RangeResolver, RangeStream, RangeStreamer, RetrieveError};
use crate::storage::{MemoryStorage, Storage};
use crate::types::{FileId, FilePosition, WatchId};
use crate::watcher::{FsTailer, TailEvent, Tailer, WatchError};

use super::chunk::{ChunkProcessor, RecordIndexer};
use super::entries::EntryStore;
use super::error::{IndexError, IndexResult};
use super::record::PatternIndexer;

/// Live index over a tailed log file and any number of static files.
pub struct LiveIndex {
    registry: Arc<RwLock<FileRegistry>>,
    entries: Arc<EntryStore>,
    chunks: Arc<ChunkProcessor>,
    tailer: Arc<dyn Tailer>,
    resolver: RangeResolver,
    events: EventBroadcaster,
    settings: Settings,
    tail_path: PathBuf,
    next_watch: AtomicU32,
    watching: AtomicBool,
}

impl LiveIndex {
    /// Create a builder for configuring the index.
    pub fn builder() -> LiveIndexBuilder {
        LiveIndexBuilder::new()
    }

    /// Start following the tail file.
    ///
    /// Spawns the tailer and the event loop that feeds the chunk pipeline;
    /// both run until the index is dropped. Must be called from within a
    /// tokio runtime.
    pub fn watch(&self) -> IndexResult<WatchId> {
        if self.watching.swap(true, Ordering::SeqCst) {
            return Err(IndexError::Setup {
                reason: "already watching the tail file".to_string(),
            });
        }

        let watch = self.allocate_watch();
        let (tx, mut rx) = mpsc::channel(self.settings.channel_capacity);

        {
            let tailer = Arc::clone(&self.tailer);
            let events = self.events.clone();
            let path = self.tail_path.clone();
            tokio::spawn(async move {
                if let Err(e) = tailer.follow(&path, tx).await {
                    tracing::error!("[watch] follow failed for {}: {e}", path.display());
                    events.send(IndexEvent::Error {
                        source: Arc::new(e.into()),
                    });
                }
            });
        }

        let registry = Arc::clone(&self.registry);
        let chunks = Arc::clone(&self.chunks);
        let events = self.events.clone();
        let path = self.tail_path.clone();
        crate::log_event!("watch", "started", "{}", path.display());
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                match event {
                    TailEvent::Data { offset, bytes } => {
                        chunks.process_chunk(watch, &path, offset, &bytes);
                    }
                    TailEvent::Rename { new, .. } => {
                        crate::log_event!(
                            "watch",
                            "rotated",
                            "{} -> {}",
                            path.display(),
                            new.display()
                        );
                        let renamed = registry.write().await.handle_rename(&new).await;
                        if let Err(e) = renamed {
                            events.send(IndexEvent::Error {
                                source: Arc::new(e.into()),
                            });
                        }
                    }
                    TailEvent::Error(details) => {
                        tracing::error!("[watch] {}: {details}", path.display());
                        events.send(IndexEvent::Error {
                            source: Arc::new(WatchError::EventError { details }.into()),
                        });
                    }
                    TailEvent::End => break,
                }
            }
            chunks.discard(watch);
        });

        Ok(watch)
    }

    /// Register `path` without tailing it, then run one indexing pass over
    /// its current contents through the chunk pipeline.
    ///
    /// Resolves when the pass ends. Entry writes it triggered may still be
    /// in flight; subscribe to [`IndexEvent::Inserted`] to observe them.
    pub async fn add_static_data_file(&self, path: &Path) -> IndexResult<()> {
        self.registry.write().await.add_file(path).await?;

        let watch = self.allocate_watch();
        let (tx, mut rx) = mpsc::channel(self.settings.channel_capacity);
        let tailer = Arc::clone(&self.tailer);
        let task = {
            let path = path.to_path_buf();
            tokio::spawn(async move { tailer.read_once(&path, tx).await })
        };

        while let Some(event) = rx.recv().await {
            match event {
                TailEvent::Data { offset, bytes } => {
                    self.chunks.process_chunk(watch, path, offset, &bytes);
                }
                TailEvent::Error(details) => {
                    self.chunks.discard(watch);
                    return Err(WatchError::EventError { details }.into());
                }
                TailEvent::End => break,
                TailEvent::Rename { .. } => {}
            }
        }
        self.chunks.discard(watch);

        match task.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(e.into()),
            Err(e) => Err(IndexError::Setup {
                reason: format!("static read task failed: {e}"),
            }),
        }
    }

    /// Insert a direct entry. See [`EntryStore::insert`].
    pub async fn insert(&self, identifier: &str, file_path: &Path, position: u64) -> IndexResult<()> {
        self.entries.insert(identifier, file_path, position).await
    }

    /// Insert a link entry. See [`EntryStore::insert_link`].
    pub async fn insert_link(&self, identifier: &str, target: &str) -> IndexResult<()> {
        self.entries.insert_link(identifier, target).await
    }

    /// Resolve an identifier to its file path and byte offset.
    pub async fn file_and_position_for_identifier(
        &self,
        identifier: &str,
    ) -> IndexResult<Option<FilePosition>> {
        self.entries.file_and_position_for_identifier(identifier).await
    }

    /// Stream the raw bytes between two indexed identifiers.
    pub async fn read_stream_between_indexes(
        &self,
        start_id: &str,
        end_id: &str,
    ) -> Result<Option<RangeStream>, RetrieveError> {
        self.resolver
            .read_stream_between_indexes(start_id, end_id)
            .await
    }

    /// Identity of the file currently being tailed.
    pub async fn identifier_for_tail_file(&self) -> FileId {
        self.registry.read().await.identifier_for_tail_file()
    }

    /// Path history with the live tail path appended.
    pub async fn paths(&self) -> Vec<PathBuf> {
        self.registry.read().await.paths()
    }

    /// Subscribe to insert/error notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<IndexEvent> {
        self.events.subscribe()
    }

    fn allocate_watch(&self) -> WatchId {
        let raw = self.next_watch.fetch_add(1, Ordering::Relaxed);
        WatchId::new(raw).unwrap_or(WatchId::MIN)
    }
}

/// Builder for constructing a [`LiveIndex`].
pub struct LiveIndexBuilder {
    storage: Option<Arc<dyn Storage>>,
    tailer: Option<Arc<dyn Tailer>>,
    streamer: Option<Arc<dyn RangeStreamer>>,
    indexer: Option<Arc<dyn RecordIndexer>>,
    pattern: Option<Regex>,
    path_to_watch: Option<PathBuf>,
    settings: Settings,
}

impl LiveIndexBuilder {
    pub fn new() -> Self {
        Self {
            storage: None,
            tailer: None,
            streamer: None,
            indexer: None,
            pattern: None,
            path_to_watch: None,
            settings: Settings::default(),
        }
    }

    /// Set the storage backend. Defaults to [`MemoryStorage`].
    pub fn storage(mut self, storage: Arc<dyn Storage>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Set the tail event source. Defaults to [`FsTailer`].
    pub fn tailer(mut self, tailer: Arc<dyn Tailer>) -> Self {
        self.tailer = Some(tailer);
        self
    }

    /// Set the range streamer. Defaults to [`FsConcat`].
    pub fn streamer(mut self, streamer: Arc<dyn RangeStreamer>) -> Self {
        self.streamer = Some(streamer);
        self
    }

    /// Set the record indexer driven by the chunk pipeline.
    pub fn indexer(mut self, indexer: Arc<dyn RecordIndexer>) -> Self {
        self.indexer = Some(indexer);
        self
    }

    /// Shorthand for a [`PatternIndexer`] with the given identifier
    /// pattern and newline-separated records.
    pub fn pattern(mut self, pattern: Regex) -> Self {
        self.pattern = Some(pattern);
        self
    }

    /// Set the path the tail file lives at. Required.
    pub fn path_to_watch(mut self, path: impl Into<PathBuf>) -> Self {
        self.path_to_watch = Some(path.into());
        self
    }

    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    pub fn build(self) -> IndexResult<LiveIndex> {
        let path = self.path_to_watch.ok_or_else(|| IndexError::Setup {
            reason: "a path to watch is required".to_string(),
        })?;

        let indexer: Arc<dyn RecordIndexer> = match (self.indexer, self.pattern) {
            (Some(indexer), _) => indexer,
            (None, Some(pattern)) => Arc::new(PatternIndexer::new(pattern)),
            (None, None) => {
                return Err(IndexError::Setup {
                    reason: "a record indexer or identifier pattern is required".to_string(),
                });
            }
        };

        let settings = self.settings;
        let storage = self
            .storage
            .unwrap_or_else(|| Arc::new(MemoryStorage::new()));
        let tailer = self.tailer.unwrap_or_else(|| {
            Arc::new(
                FsTailer::new()
                    .with_chunk_size(settings.watch.chunk_size)
                    .with_poll_interval(Duration::from_millis(settings.watch.poll_interval_ms)),
            )
        });
        let streamer = self.streamer.unwrap_or_else(|| Arc::new(FsConcat::new()));

        let events = EventBroadcaster::new(settings.broadcast_capacity);
        let registry = Arc::new(RwLock::new(FileRegistry::new(
            Arc::clone(&storage),
            path.clone(),
        )));
        let entries = Arc::new(EntryStore::new(
            storage,
            Arc::clone(&registry),
            events.clone(),
        ));
        let chunks = Arc::new(ChunkProcessor::new(
            Arc::clone(&entries),
            events.clone(),
            indexer,
        ));
        let resolver = RangeResolver::new(Arc::clone(&entries), Arc::clone(&registry), streamer);

        Ok(LiveIndex {
            registry,
            entries,
            chunks,
            tailer,
            resolver,
            events,
            settings,
            tail_path: path,
            next_watch: AtomicU32::new(1),
            watching: AtomicBool::new(false),
        })
    }
}

impl Default for LiveIndexBuilder {
    fn default() -> Self {
        Self::new()
    }
}
