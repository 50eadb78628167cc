//! Filesystem tail follower built on notify.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use notify::event::{EventKind, ModifyKind};
use notify::{Event, RecursiveMode, Watcher};
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

use super::error::WatchError;
use super::{TailEvent, Tailer};

/// Follows a file through appends and rename-based rotation.
///
/// Filesystem events drive reads; a periodic poll catches appends the
/// notifier missed. On rotation the held file handle is drained before the
/// `Rename` event goes out, so no bytes of the outgoing incarnation are
/// lost, then the original path is reopened as the new incarnation.
pub struct FsTailer {
    /// Bytes per read.
    chunk_size: usize,
    /// Fallback poll period.
    poll_interval: Duration,
}

impl FsTailer {
    pub fn new() -> Self {
        Self {
            chunk_size: 64 * 1024,
            poll_interval: Duration::from_millis(100),
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Read to EOF, sending chunks in offset order. Returns the offset
    /// after the last byte sent.
    async fn drain(
        &self,
        file: &mut File,
        path: &Path,
        mut offset: u64,
        tx: &mpsc::Sender<TailEvent>,
    ) -> Result<u64, WatchError> {
        let mut buf = vec![0u8; self.chunk_size];
        loop {
            let n = file
                .read(&mut buf)
                .await
                .map_err(|e| WatchError::ReadFailed {
                    path: path.to_path_buf(),
                    source: e,
                })?;
            if n == 0 {
                return Ok(offset);
            }
            let chunk = TailEvent::Data {
                offset,
                bytes: buf[..n].to_vec(),
            };
            if tx.send(chunk).await.is_err() {
                // receiver gone; the follow loop exits via tx.closed()
                return Ok(offset);
            }
            offset += n as u64;
        }
    }

    /// Open `path`, waiting for it to appear. Rotation leaves a window
    /// where the new incarnation does not exist yet.
    async fn open_when_present(&self, path: &Path) -> Result<File, WatchError> {
        loop {
            match File::open(path).await {
                Ok(file) => return Ok(file),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    tokio::time::sleep(self.poll_interval).await;
                }
                Err(e) => {
                    return Err(WatchError::ReadFailed {
                        path: path.to_path_buf(),
                        source: e,
                    });
                }
            }
        }
    }
}

impl Default for FsTailer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tailer for FsTailer {
    async fn follow(&self, path: &Path, tx: mpsc::Sender<TailEvent>) -> Result<(), WatchError> {
        // watch the canonical directory so event paths compare cleanly
        let dir = watch_dir(path);
        let dir = dir.canonicalize().unwrap_or(dir);
        let watched = match path.file_name() {
            Some(name) => dir.join(name),
            None => path.to_path_buf(),
        };

        let (fs_tx, mut fs_rx) = mpsc::channel(256);
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let _ = fs_tx.blocking_send(res);
        })?;
        watcher
            .watch(&dir, RecursiveMode::NonRecursive)
            .map_err(|e| WatchError::PathWatchFailed {
                path: dir.clone(),
                reason: e.to_string(),
            })?;

        crate::debug_event!("tail", "following", "{}", watched.display());

        let mut file = self.open_when_present(path).await?;
        let mut offset: u64 = 0;
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            offset = self.drain(&mut file, path, offset, &tx).await?;

            tokio::select! {
                received = fs_rx.recv() => {
                    match received {
                        Some(Ok(event)) => {
                            if let Some(new_path) = rename_target(&event, &watched) {
                                // finish the outgoing incarnation through the
                                // still-open handle before switching over
                                offset = self.drain(&mut file, path, offset, &tx).await?;
                                crate::debug_event!(
                                    "tail",
                                    "rotated",
                                    "{} -> {}",
                                    watched.display(),
                                    new_path.display()
                                );
                                let rename = TailEvent::Rename {
                                    old: path.to_path_buf(),
                                    new: new_path,
                                };
                                if tx.send(rename).await.is_err() {
                                    return Ok(());
                                }
                                file = self.open_when_present(path).await?;
                                offset = 0;
                            }
                        }
                        Some(Err(e)) => {
                            tracing::warn!("[tail] notify error for {}: {e}", watched.display());
                        }
                        None => return Err(WatchError::ChannelClosed),
                    }
                }
                _ = ticker.tick() => {}
                _ = tx.closed() => return Ok(()),
            }
        }
    }

    async fn read_once(&self, path: &Path, tx: mpsc::Sender<TailEvent>) -> Result<(), WatchError> {
        let mut file = File::open(path).await.map_err(|e| WatchError::ReadFailed {
            path: path.to_path_buf(),
            source: e,
        })?;
        let offset = self.drain(&mut file, path, 0, &tx).await?;
        crate::debug_event!("tail", "read", "{} bytes from {}", offset, path.display());
        let _ = tx.send(TailEvent::End).await;
        Ok(())
    }
}

/// Directory to register with the notifier: the file's parent, `.` for
/// bare file names.
fn watch_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// If `event` renames `watched` away, return the destination path.
fn rename_target(event: &Event, watched: &Path) -> Option<PathBuf> {
    if !matches!(event.kind, EventKind::Modify(ModifyKind::Name(_))) {
        return None;
    }
    if event.paths.len() == 2 && event.paths[0] == watched {
        return Some(event.paths[1].clone());
    }
    None
}
