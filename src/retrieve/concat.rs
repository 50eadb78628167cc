//! Filesystem implementation of the range streamer.

use std::io::SeekFrom;
use std::path::PathBuf;

use async_trait::async_trait;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::sync::mpsc;

use super::error::RetrieveError;
use super::{RangeStream, RangeStreamer};

/// Streams a byte range across consecutive files as one continuous
/// sequence of chunks.
///
/// Files are opened lazily, one at a time, by a spawned reader task; open
/// and read failures arrive in-stream.
pub struct FsConcat {
    chunk_size: usize,
}

impl FsConcat {
    pub fn new() -> Self {
        Self {
            chunk_size: 64 * 1024,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }
}

impl Default for FsConcat {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RangeStreamer for FsConcat {
    async fn stream(
        &self,
        files: &[PathBuf],
        start: u64,
        end: u64,
    ) -> Result<RangeStream, RetrieveError> {
        let (tx, rx) = mpsc::channel(16);
        let files = files.to_vec();
        let chunk_size = self.chunk_size;
        tokio::spawn(async move {
            if let Err(e) = pump(&files, start, end, chunk_size, &tx).await {
                let _ = tx.send(Err(e)).await;
            }
        });
        Ok(RangeStream::new(rx))
    }
}

async fn pump(
    files: &[PathBuf],
    start: u64,
    end: u64,
    chunk_size: usize,
    tx: &mpsc::Sender<std::io::Result<Vec<u8>>>,
) -> std::io::Result<()> {
    let last = files.len().saturating_sub(1);
    for (index, path) in files.iter().enumerate() {
        let mut file = File::open(path).await?;
        let mut position = 0u64;
        if index == 0 && start > 0 {
            file.seek(SeekFrom::Start(start)).await?;
            position = start;
        }
        let limit = (index == last).then_some(end);

        let mut buf = vec![0u8; chunk_size];
        loop {
            let want = match limit {
                Some(end) if position >= end => break,
                Some(end) => chunk_size.min((end - position) as usize),
                None => chunk_size,
            };
            let n = file.read(&mut buf[..want]).await?;
            if n == 0 {
                break;
            }
            if tx.send(Ok(buf[..n].to_vec())).await.is_err() {
                return Ok(());
            }
            position += n as u64;
        }
    }
    Ok(())
}
