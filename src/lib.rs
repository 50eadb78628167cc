pub mod config;
pub mod events;
pub mod index;
pub mod logging;
pub mod registry;
pub mod retrieve;
pub mod storage;
pub mod types;
pub mod watcher;

pub use config::Settings;
pub use events::{EventBroadcaster, IndexEvent};
pub use index::{
    ChunkSink, Entry, EntryStore, IndexError, LiveIndex, LiveIndexBuilder, PatternIndexer,
    RecordIndexer,
};
pub use registry::{FileRegistry, RegistryError};
pub use retrieve::{FsConcat, RangeResolver, RangeStream, RangeStreamer, RetrieveError};
pub use storage::{BlockingAdapter, BlockingStorage, MemoryStorage, Storage, StorageError};
pub use types::{FileId, FilePosition, WatchId};
pub use watcher::{FsTailer, TailEvent, Tailer, WatchError};
