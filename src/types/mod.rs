use std::fmt;
use std::num::NonZeroU32;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identity of one physical file incarnation.
///
/// Minted when a file is first observed (or when the tail rotates) and never
/// reused. Survives process restarts through the storage backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId(Uuid);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WatchId(NonZeroU32);

/// A resolved index entry: concrete file path plus byte offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePosition {
    pub file: PathBuf,
    pub position: u64,
}

impl FileId {
    /// Mint a fresh, globally unique identity.
    pub fn mint() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse the hyphenated string form produced by `Display`.
    pub fn parse(value: &str) -> Option<Self> {
        Uuid::parse_str(value).ok().map(Self)
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl WatchId {
    pub const MIN: WatchId = WatchId(NonZeroU32::MIN);

    pub fn new(value: u32) -> Option<Self> {
        NonZeroU32::new(value).map(Self)
    }

    pub fn value(&self) -> u32 {
        self.0.get()
    }
}

impl FilePosition {
    pub fn new(file: impl Into<PathBuf>, position: u64) -> Self {
        Self {
            file: file.into(),
            position,
        }
    }
}
