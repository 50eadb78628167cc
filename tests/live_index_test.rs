//! End-to-end tests: watch a growing log file, index its records, and
//! query them back by identifier.

use std::path::Path;
use std::time::Duration;

use regex::bytes::Regex;
use tailindex::{IndexEvent, LiveIndex};
use tempfile::TempDir;
use tokio::io::AsyncWriteExt;
use tokio::sync::broadcast;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(10);

async fn append(path: &Path, bytes: &str) {
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .unwrap();
    file.write_all(bytes.as_bytes()).await.unwrap();
    file.flush().await.unwrap();
}

async fn await_insert(rx: &mut broadcast::Receiver<IndexEvent>, wanted: &str) {
    timeout(WAIT, async {
        loop {
            match rx.recv().await.unwrap() {
                IndexEvent::Inserted { identifier } if identifier == wanted => break,
                _ => {}
            }
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for insert of {wanted}"));
}

fn build_index(log: &Path) -> LiveIndex {
    tailindex::logging::init();
    LiveIndex::builder()
        .path_to_watch(log)
        .pattern(Regex::new("^([^:]+)").unwrap())
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_indexes_records_appended_to_watched_file() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().canonicalize().unwrap();
    let log = root.join("foo.log");
    append(&log, "").await;

    let index = build_index(&log);
    let mut events = index.subscribe();
    index.watch().unwrap();

    append(&log, "alpha:one\n").await;
    await_insert(&mut events, "alpha").await;

    let hit = index
        .file_and_position_for_identifier("alpha")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(hit.file, log);
    assert_eq!(hit.position, 0);

    append(&log, "beta:two\ngamma:three\n").await;
    await_insert(&mut events, "gamma").await;

    let beta = index
        .file_and_position_for_identifier("beta")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(beta.position, 10);
    let gamma = index
        .file_and_position_for_identifier("gamma")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(gamma.position, 19);
}

#[tokio::test]
async fn test_indexes_content_present_before_watching() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().canonicalize().unwrap();
    let log = root.join("foo.log");
    append(&log, "early:bird\n").await;

    let index = build_index(&log);
    let mut events = index.subscribe();
    index.watch().unwrap();

    await_insert(&mut events, "early").await;
    let hit = index
        .file_and_position_for_identifier("early")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(hit.position, 0);
}

#[tokio::test]
async fn test_record_split_across_chunks_is_indexed_once_whole() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().canonicalize().unwrap();
    let log = root.join("foo.log");
    append(&log, "").await;

    let index = build_index(&log);
    let mut events = index.subscribe();
    index.watch().unwrap();

    // a complete record, then the head of a partial one
    append(&log, "whole:yes\npar").await;
    await_insert(&mut events, "whole").await;
    assert_eq!(
        index
            .file_and_position_for_identifier("par")
            .await
            .unwrap(),
        None
    );

    // completing the record indexes it at its true start offset
    append(&log, "tial:done\n").await;
    await_insert(&mut events, "partial").await;
    let hit = index
        .file_and_position_for_identifier("partial")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(hit.position, 10);
}

#[tokio::test]
async fn test_rotation_keeps_rotated_content_resolvable() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().canonicalize().unwrap();
    let log = root.join("app.log");
    append(&log, "alpha:one\n").await;

    let index = build_index(&log);
    let mut events = index.subscribe();
    index.watch().unwrap();
    await_insert(&mut events, "alpha").await;

    let first_tail_id = index.identifier_for_tail_file().await;

    let rotated = root.join("app.log.1");
    tokio::fs::rename(&log, &rotated).await.unwrap();
    append(&log, "beta:two\n").await;
    await_insert(&mut events, "beta").await;

    assert_ne!(index.identifier_for_tail_file().await, first_tail_id);

    // the pre-rotation record now resolves to the rotated-out file
    let alpha = index
        .file_and_position_for_identifier("alpha")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(alpha.file, rotated);
    assert_eq!(alpha.position, 0);

    // the post-rotation record lives in the new incarnation at the tail path
    let beta = index
        .file_and_position_for_identifier("beta")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(beta.file, log);
    assert_eq!(beta.position, 0);

    assert_eq!(index.paths().await, vec![rotated, log]);
}

#[tokio::test]
async fn test_add_static_data_file_indexes_existing_contents() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().canonicalize().unwrap();
    let log = root.join("live.log");
    append(&log, "").await;
    let archive = root.join("archive.log");
    append(&archive, "old1:a\nold2:b\n").await;

    let index = build_index(&log);
    let mut events = index.subscribe();

    index.add_static_data_file(&archive).await.unwrap();
    await_insert(&mut events, "old1").await;
    await_insert(&mut events, "old2").await;

    let old2 = index
        .file_and_position_for_identifier("old2")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(old2.file, archive);
    assert_eq!(old2.position, 7);

    assert_eq!(index.paths().await, vec![archive, log]);
}

#[tokio::test]
async fn test_add_static_data_file_fails_for_missing_file() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().canonicalize().unwrap();
    let log = root.join("live.log");
    append(&log, "").await;

    let index = build_index(&log);
    let missing = root.join("nope.log");
    assert!(index.add_static_data_file(&missing).await.is_err());
}

#[tokio::test]
async fn test_watch_can_only_be_started_once() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().canonicalize().unwrap();
    let log = root.join("foo.log");
    append(&log, "").await;

    let index = build_index(&log);
    index.watch().unwrap();
    assert!(index.watch().is_err());
}
