//! Cross-file range resolution and streaming.
//!
//! Two identifiers become a byte range: each resolves to a (file,
//! position) pair, path history orders the files, and the range streamer
//! collaborator delivers the bytes in between as one continuous stream,
//! transparently crossing rotation boundaries.

mod concat;
mod error;

pub use concat::FsConcat;
pub use error::RetrieveError;

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{RwLock, mpsc};

use crate::index::EntryStore;
use crate::index::IndexError;
use crate::registry::{FileRegistry, RegistryError};

/// A pull stream of raw bytes produced by a [`RangeStreamer`].
#[derive(Debug)]
pub struct RangeStream {
    rx: mpsc::Receiver<std::io::Result<Vec<u8>>>,
}

impl RangeStream {
    pub(crate) fn new(rx: mpsc::Receiver<std::io::Result<Vec<u8>>>) -> Self {
        Self { rx }
    }

    /// Next chunk of bytes, or `None` at end of stream.
    pub async fn next_chunk(&mut self) -> Option<std::io::Result<Vec<u8>>> {
        self.rx.recv().await
    }

    /// Collect the remainder of the stream into one buffer.
    pub async fn collect(mut self) -> std::io::Result<Vec<u8>> {
        let mut out = Vec::new();
        while let Some(chunk) = self.rx.recv().await {
            out.extend_from_slice(&chunk?);
        }
        Ok(out)
    }
}

/// Produces one continuous byte stream spanning an ordered list of files.
#[async_trait]
pub trait RangeStreamer: Send + Sync {
    /// Stream from `start` in the first file up to the exclusive `end`
    /// offset in the last.
    async fn stream(
        &self,
        files: &[PathBuf],
        start: u64,
        end: u64,
    ) -> Result<RangeStream, RetrieveError>;
}

/// Resolves identifier pairs to cross-file byte streams.
pub struct RangeResolver {
    entries: Arc<EntryStore>,
    registry: Arc<RwLock<FileRegistry>>,
    streamer: Arc<dyn RangeStreamer>,
}

impl RangeResolver {
    pub fn new(
        entries: Arc<EntryStore>,
        registry: Arc<RwLock<FileRegistry>>,
        streamer: Arc<dyn RangeStreamer>,
    ) -> Self {
        Self {
            entries,
            registry,
            streamer,
        }
    }

    /// Stream the raw bytes from the record at `start_id` up to (not
    /// including) the record at `end_id`.
    ///
    /// Resolves to `None` when either identifier is unknown; fails with
    /// [`RetrieveError::InvalidRange`] when `start` does not precede `end`
    /// by file order, or by offset within one file.
    pub async fn read_stream_between_indexes(
        &self,
        start_id: &str,
        end_id: &str,
    ) -> Result<Option<RangeStream>, RetrieveError> {
        let Some(start) = self
            .entries
            .file_and_position_for_identifier(start_id)
            .await?
        else {
            return Ok(None);
        };
        let Some(end) = self.entries.file_and_position_for_identifier(end_id).await? else {
            return Ok(None);
        };

        let invalid_range = || RetrieveError::InvalidRange {
            start: start.file.clone(),
            start_position: start.position,
            end: end.file.clone(),
            end_position: end.position,
        };

        let files = {
            let registry = self.registry.read().await;
            match registry.between(&start.file, &end.file) {
                Ok(files) => files,
                Err(RegistryError::OutOfOrder { .. }) => return Err(invalid_range()),
                Err(e) => return Err(IndexError::from(e).into()),
            }
        };
        if files.len() == 1 && start.position > end.position {
            return Err(invalid_range());
        }

        crate::debug_event!(
            "retrieve",
            "streaming",
            "{start_id} -> {end_id} across {} file(s)",
            files.len()
        );
        let stream = self
            .streamer
            .stream(&files, start.position, end.position)
            .await?;
        Ok(Some(stream))
    }
}
