//! Path-level behavior of the on-disk registry format.

use std::collections::BTreeSet;

use xlite_registry::{ProcessRegistry, RegistryRole};
use xlite_registry_fs::{FsRegistry, delete, read, record};

#[tokio::test]
async fn test_round_trip_is_independent_of_write_order() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(".cluster_pids");

    let shuffled: BTreeSet<u32> = [31337, 2, 65536, 404, 1].into_iter().collect();
    record(&shuffled, &path).await.unwrap();

    // Same set written from a file with a different line order reads back equal.
    let other = dir.path().join("other");
    tokio::fs::write(&other, "404\n1\n65536\n2\n31337\n")
        .await
        .unwrap();

    assert_eq!(read(&path).await.unwrap(), shuffled);
    assert_eq!(read(&other).await.unwrap(), shuffled);
}

#[tokio::test]
async fn test_malformed_lines_are_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(".vector_xlite_pids");
    tokio::fs::write(&path, "123\ngarbage\n\n456\n12.5\n")
        .await
        .unwrap();

    assert_eq!(read(&path).await.unwrap(), BTreeSet::from([123, 456]));
}

#[tokio::test]
async fn test_file_layout_matches_role_names() {
    let dir = tempfile::tempdir().unwrap();
    let registry = FsRegistry::new(dir.path().join("distributed").join("cluster"));

    registry
        .record(RegistryRole::Storage, &BTreeSet::from([11, 22]))
        .await
        .unwrap();

    let path = dir
        .path()
        .join("distributed")
        .join("cluster")
        .join(".vector_xlite_pids");
    assert_eq!(registry.path(RegistryRole::Storage), path);

    let contents = tokio::fs::read_to_string(&path).await.unwrap();
    assert_eq!(contents, "11\n22\n");

    delete(&path).await.unwrap();
    assert!(read(&path).await.unwrap().is_empty());
}
