//! The live index core: entry storage, link resolution, chunk processing,
//! and the facade wiring them to a tail watcher.
//!
//! # Architecture
//!
//! ```text
//! tailer events -> ChunkProcessor -> RecordIndexer (pluggable)
//!                       |                 | add_index / add_link
//!                       |                 v
//!                leftover table      EntryStore -> Storage
//!                                         |
//!                                         +-> Inserted / Error events
//! ```

mod chunk;
mod entries;
mod error;
mod facade;
mod record;

pub use chunk::{ChunkProcessor, ChunkSink, RecordIndexer};
pub use entries::{Entry, EntryStore};
pub use error::{IndexError, IndexResult};
pub use facade::{LiveIndex, LiveIndexBuilder};
pub use record::PatternIndexer;
