//! Chunk processing: leftover carryover and the pluggable indexer drive.
//!
//! Chunks for one watch handle arrive in strictly increasing offset order.
//! Whatever the indexer leaves unconsumed (`mark_processed`) is carried
//! over and prepended verbatim to the handle's next chunk, with the
//! effective offset shifted back accordingly, so a record split across a
//! chunk boundary is seen whole exactly once.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::events::{EventBroadcaster, IndexEvent};
use crate::types::WatchId;

use super::entries::EntryStore;

/// One indexing instruction collected from a [`RecordIndexer`] run.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum SinkOp {
    Direct { identifier: String, offset: usize },
    Link { identifier: String, target: String },
}

/// Collects indexing instructions during one synchronous indexer run.
#[derive(Debug, Default)]
pub struct ChunkSink {
    pub(crate) ops: Vec<SinkOp>,
    pub(crate) processed_to: Option<usize>,
}

impl ChunkSink {
    /// Record a direct entry for the record starting `offset` bytes into
    /// the current buffer.
    pub fn add_index(&mut self, identifier: impl Into<String>, offset: usize) {
        self.ops.push(SinkOp::Direct {
            identifier: identifier.into(),
            offset,
        });
    }

    /// Record a link entry aliasing `identifier` to `target`.
    pub fn add_link(&mut self, identifier: impl Into<String>, target: impl Into<String>) {
        self.ops.push(SinkOp::Link {
            identifier: identifier.into(),
            target: target.into(),
        });
    }

    /// Mark everything before `offset` as consumed. The remainder is
    /// carried over to the next chunk for this watch handle. The last call
    /// wins; without a call the whole buffer counts as consumed.
    pub fn mark_processed(&mut self, offset: usize) {
        self.processed_to = Some(offset);
    }
}

/// Record extraction logic supplied by the caller.
///
/// Called once per merged chunk. Must be side-effect-free beyond the sink
/// calls; the buffer it sees is the previous leftover plus the new chunk.
pub trait RecordIndexer: Send + Sync {
    fn index_chunk(&self, buffer: &[u8], sink: &mut ChunkSink);
}

impl<F> RecordIndexer for F
where
    F: Fn(&[u8], &mut ChunkSink) + Send + Sync,
{
    fn index_chunk(&self, buffer: &[u8], sink: &mut ChunkSink) {
        self(buffer, sink)
    }
}

/// Drives the pluggable indexer over incoming chunks.
pub struct ChunkProcessor {
    entries: Arc<EntryStore>,
    events: EventBroadcaster,
    indexer: Arc<dyn RecordIndexer>,
    /// Leftover bytes per live watch handle.
    leftovers: Mutex<HashMap<WatchId, Vec<u8>>>,
}

impl ChunkProcessor {
    pub fn new(
        entries: Arc<EntryStore>,
        events: EventBroadcaster,
        indexer: Arc<dyn RecordIndexer>,
    ) -> Self {
        Self {
            entries,
            events,
            indexer,
            leftovers: Mutex::new(HashMap::new()),
        }
    }

    /// Process one chunk delivered for `watch` at `offset` within `path`.
    ///
    /// The indexer runs synchronously; the storage writes it requests are
    /// spawned and not awaited, so chunk processing never blocks on the
    /// backend. Failed writes surface as [`IndexEvent::Error`].
    pub fn process_chunk(&self, watch: WatchId, path: &Path, offset: u64, bytes: &[u8]) {
        let (buffer, effective_offset) = match self.leftovers.lock().remove(&watch) {
            Some(mut leftover) => {
                let shifted = offset.saturating_sub(leftover.len() as u64);
                leftover.extend_from_slice(bytes);
                (leftover, shifted)
            }
            None => (bytes.to_vec(), offset),
        };

        let mut sink = ChunkSink::default();
        self.indexer.index_chunk(&buffer, &mut sink);

        if let Some(processed_to) = sink.processed_to {
            if processed_to < buffer.len() {
                self.leftovers
                    .lock()
                    .insert(watch, buffer[processed_to..].to_vec());
            }
        }

        for op in sink.ops {
            self.dispatch(op, path.to_path_buf(), effective_offset);
        }
    }

    /// Drop carried-over state for a discarded watch handle.
    pub fn discard(&self, watch: WatchId) {
        self.leftovers.lock().remove(&watch);
    }

    fn dispatch(&self, op: SinkOp, path: PathBuf, effective_offset: u64) {
        let entries = Arc::clone(&self.entries);
        let events = self.events.clone();
        tokio::spawn(async move {
            let outcome = match op {
                SinkOp::Direct { identifier, offset } => {
                    entries
                        .insert(&identifier, &path, effective_offset + offset as u64)
                        .await
                }
                SinkOp::Link { identifier, target } => {
                    entries.insert_link(&identifier, &target).await
                }
            };
            if let Err(e) = outcome {
                tracing::error!("[chunk] deferred write failed: {e}");
                events.send(IndexEvent::Error {
                    source: Arc::new(e),
                });
            }
        });
    }
}
