//! Tail watching: the event contract the index core consumes, plus the
//! filesystem implementation.
//!
//! # Architecture
//!
//! ```text
//! Tailer (trait)
//!   └── FsTailer
//!         - notify events bridged into a tokio channel
//!         - data chunks in strictly increasing offset order
//!         - rotation: drain the held handle, emit Rename, reopen
//!         - one-shot non-following mode for static files
//! ```

mod error;
mod tail;

pub use error::WatchError;
pub use tail::FsTailer;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::mpsc;

/// Events a tail source delivers for one watched path.
#[derive(Debug, Clone)]
pub enum TailEvent {
    /// Raw bytes starting at `offset` within the current tail incarnation.
    Data { offset: u64, bytes: Vec<u8> },
    /// The tailed file was rotated: the content at `old` now lives at
    /// `new`, and a fresh incarnation accumulates at `old`.
    Rename { old: PathBuf, new: PathBuf },
    /// Unrecoverable failure reported in-band. Scoped to this watch.
    Error(String),
    /// End of a one-shot pass.
    End,
}

/// A source of tail events.
///
/// Implementations must deliver `Data` chunks in strictly increasing
/// offset order and survive rename-based rotation without losing bytes.
#[async_trait]
pub trait Tailer: Send + Sync {
    /// Follow `path` until the receiver is dropped, sending chunks as the
    /// file grows and `Rename` when it rotates.
    async fn follow(&self, path: &Path, tx: mpsc::Sender<TailEvent>) -> Result<(), WatchError>;

    /// One-shot pass over a static file: send its current contents as
    /// chunks, then `End`. Never follows growth.
    async fn read_once(&self, path: &Path, tx: mpsc::Sender<TailEvent>) -> Result<(), WatchError>;
}
