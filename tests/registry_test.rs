//! Tests for file identity tracking across rotation and registry
//! reconstruction over a shared backend.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tailindex::{FileRegistry, MemoryStorage, Storage};

const TAIL: &str = "/foo/bar";

fn shared_store() -> Arc<dyn Storage> {
    Arc::new(MemoryStorage::new())
}

fn fresh(store: &Arc<dyn Storage>) -> FileRegistry {
    FileRegistry::new(Arc::clone(store), TAIL)
}

#[tokio::test]
async fn test_identifier_for_tail_file_changes_after_rotation() {
    let store = shared_store();
    let mut registry = fresh(&store);

    let first = registry.identifier_for_tail_file();
    registry.handle_rename("/foo/bar-1").await.unwrap();
    let second = registry.identifier_for_tail_file();

    assert_ne!(first, second, "{first} is same");
}

#[tokio::test]
async fn test_rotated_identifier_resolves_to_rotated_path() {
    let store = shared_store();
    let mut registry = fresh(&store);

    let id = registry.identifier_for_tail_file();
    registry.handle_rename("/foo/bar-1").await.unwrap();

    assert_eq!(
        registry.path_for_identifier(id).await.unwrap(),
        Some(PathBuf::from("/foo/bar-1"))
    );
    assert_eq!(
        registry
            .identifier_for_path(Path::new("/foo/bar-1"))
            .await
            .unwrap(),
        Some(id)
    );
}

#[tokio::test]
async fn test_reconstruction_reads_mappings_from_storage() {
    let store = shared_store();
    let mut registry = fresh(&store);

    let id = registry.identifier_for_tail_file();
    registry.handle_rename("/foo/bar-1").await.unwrap();

    // a registry rebuilt over the same backend resolves the same identity
    let mut rebuilt = fresh(&store);
    assert_eq!(
        rebuilt.path_for_identifier(id).await.unwrap(),
        Some(PathBuf::from("/foo/bar-1"))
    );
}

#[tokio::test]
async fn test_tail_path_resolves_to_tail_identifier() {
    let store = shared_store();
    let mut registry = fresh(&store);

    let id = registry
        .identifier_for_path(Path::new(TAIL))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(id, registry.identifier_for_tail_file());
    assert_eq!(
        registry.path_for_identifier(id).await.unwrap(),
        Some(PathBuf::from(TAIL))
    );
}

#[tokio::test]
async fn test_never_live_identifier_is_not_found() {
    let store = shared_store();
    let mut registry = fresh(&store);

    let orphan = tailindex::FileId::mint();
    assert_eq!(registry.path_for_identifier(orphan).await.unwrap(), None);
    assert_eq!(
        registry
            .identifier_for_path(Path::new("/foo/unseen"))
            .await
            .unwrap(),
        None
    );
}

#[tokio::test]
async fn test_add_file_keeps_stored_identifier_across_rebuilds() {
    let store = shared_store();
    let mut registry = fresh(&store);

    registry.add_file("/foo/baaz").await.unwrap();
    let id1 = registry
        .identifier_for_path(Path::new("/foo/baaz"))
        .await
        .unwrap()
        .unwrap();

    let mut rebuilt = fresh(&store);
    rebuilt.add_file("/foo/baaz").await.unwrap();
    let id2 = rebuilt
        .identifier_for_path(Path::new("/foo/baaz"))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(id1, id2);
}

#[tokio::test]
async fn test_paths_lists_added_files_in_discovery_order() {
    let store = shared_store();
    let mut registry = fresh(&store);

    registry.add_file("/foo/baaz").await.unwrap();
    registry.add_file("/foo/quux").await.unwrap();
    registry.add_file("/foo/baaz").await.unwrap();

    let expected = vec![
        PathBuf::from("/foo/baaz"),
        PathBuf::from("/foo/quux"),
        PathBuf::from(TAIL),
    ];
    assert_eq!(registry.paths(), expected);
}

#[tokio::test]
async fn test_paths_lists_rotated_files_in_rotation_order() {
    let store = shared_store();
    let mut registry = fresh(&store);

    registry.handle_rename("/foo/bar-1").await.unwrap();
    registry.handle_rename("/foo/bar-2").await.unwrap();
    registry.handle_rename("/foo/bar-3").await.unwrap();

    let expected = vec![
        PathBuf::from("/foo/bar-1"),
        PathBuf::from("/foo/bar-2"),
        PathBuf::from("/foo/bar-3"),
        PathBuf::from(TAIL),
    ];
    assert_eq!(registry.paths(), expected);
}
