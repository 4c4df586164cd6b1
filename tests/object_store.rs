//! Local object store behaviour
//!
//! Round trips, listing shape, idempotent deletes and recursive copies,
//! exercised through the `StorageBackend` trait object.

use std::fs;
use std::sync::Arc;

use aerostore::file_storage::{
    LocalBackend, ObjectBody, StorageBackend, StorageConfig, StorageError,
};
use tempfile::TempDir;
use tokio::io::AsyncReadExt;

// =============================================================================
// Test Utilities
// =============================================================================

async fn open_store(temp: &TempDir) -> Arc<dyn StorageBackend> {
    let config = StorageConfig::new("docs", "files", temp.path().join("root"), "secret");
    Arc::new(LocalBackend::open(&config).await.expect("open backend"))
}

fn body(data: &[u8]) -> ObjectBody {
    ObjectBody::from(data.to_vec())
}

// =============================================================================
// Round Trips
// =============================================================================

/// Buffered and streamed puts both read back byte-for-byte.
#[tokio::test]
async fn test_put_get_round_trip() {
    let temp = TempDir::new().unwrap();
    let store = open_store(&temp).await;

    let payloads: [(&str, Vec<u8>); 3] = [
        ("doc-1/Editor.bin", b"editor state".to_vec()),
        ("doc-1/media/image1.png", (0..=255u8).collect()),
        ("empty/file", Vec::new()),
    ];

    for (key, data) in &payloads {
        store.put_object(key, body(data), Some(data.len() as u64)).await.unwrap();
    }
    for (key, data) in &payloads {
        assert_eq!(&store.get_object(key).await.unwrap()[..], &data[..], "key {}", key);
        assert_eq!(store.head_object(key).await.unwrap().content_length, data.len() as u64);
    }
}

/// A streamed read reports the length and yields the full content.
#[tokio::test]
async fn test_read_stream() {
    let temp = TempDir::new().unwrap();
    let store = open_store(&temp).await;

    let data = vec![7u8; 256 * 1024];
    let reader = std::io::Cursor::new(data.clone());
    store
        .put_object("big/blob.bin", ObjectBody::from_reader(reader), None)
        .await
        .unwrap();

    let mut object = store.create_read_stream("big/blob.bin").await.unwrap();
    assert_eq!(object.content_length, data.len() as u64);

    let mut read = Vec::new();
    object.stream.read_to_end(&mut read).await.unwrap();
    assert_eq!(read, data);
}

// =============================================================================
// Listing
// =============================================================================

/// Listing returns every key under the prefix, sorted, and nothing else.
#[tokio::test]
async fn test_list_exact_set() {
    let temp = TempDir::new().unwrap();
    let store = open_store(&temp).await;

    for key in ["a/2.txt", "a/1.txt", "a/sub/deep/3.txt", "ab/other.txt", "b/4.txt"] {
        store.put_object(key, body(b"x"), None).await.unwrap();
    }

    let keys = store.list_objects("a").await.unwrap();
    assert_eq!(keys, vec!["a/1.txt", "a/2.txt", "a/sub/deep/3.txt"]);

    let all = store.list_objects("").await.unwrap();
    assert_eq!(all.len(), 5);
    assert!(all.iter().all(|k| !k.contains('\\')));
}

/// An absent prefix lists as empty rather than failing.
#[tokio::test]
async fn test_list_missing_prefix() {
    let temp = TempDir::new().unwrap();
    let store = open_store(&temp).await;

    assert!(store.list_objects("never/written").await.unwrap().is_empty());
}

/// A prefix naming a single object lists that object.
#[tokio::test]
async fn test_list_single_object() {
    let temp = TempDir::new().unwrap();
    let store = open_store(&temp).await;

    store.put_object("one/file.txt", body(b"1"), None).await.unwrap();
    assert_eq!(store.list_objects("one/file.txt").await.unwrap(), vec!["one/file.txt"]);
}

// =============================================================================
// Deletes
// =============================================================================

/// Deleting a key that was never written succeeds.
#[tokio::test]
async fn test_delete_is_idempotent() {
    let temp = TempDir::new().unwrap();
    let store = open_store(&temp).await;

    store.delete_object("ghost/key").await.unwrap();
    store.delete_path("ghost").await.unwrap();
}

/// Deleting a prefix removes the whole tree.
#[tokio::test]
async fn test_delete_tree() {
    let temp = TempDir::new().unwrap();
    let store = open_store(&temp).await;

    store.put_object("doc/a.txt", body(b"a"), None).await.unwrap();
    store.put_object("doc/nested/b.txt", body(b"b"), None).await.unwrap();
    store.put_object("keep/c.txt", body(b"c"), None).await.unwrap();

    store.delete_object("doc").await.unwrap();

    assert!(store.list_objects("doc").await.unwrap().is_empty());
    assert_eq!(store.list_objects("").await.unwrap(), vec!["keep/c.txt"]);
}

// =============================================================================
// Copies
// =============================================================================

/// Copying a tree duplicates every object and overwrites existing ones.
#[tokio::test]
async fn test_copy_tree_overwrites() {
    let temp = TempDir::new().unwrap();
    let store = open_store(&temp).await;

    store.put_object("src/a.txt", body(b"new a"), None).await.unwrap();
    store.put_object("src/x/b.txt", body(b"new b"), None).await.unwrap();
    store.put_object("dst/a.txt", body(b"old a"), None).await.unwrap();

    store.copy_object("src", "dst").await.unwrap();

    assert_eq!(store.list_objects("dst").await.unwrap(), vec!["dst/a.txt", "dst/x/b.txt"]);
    assert_eq!(&store.get_object("dst/a.txt").await.unwrap()[..], b"new a");
    // Source untouched
    assert_eq!(&store.get_object("src/a.txt").await.unwrap()[..], b"new a");
}

/// Uploading a local directory copies it recursively under the key.
#[tokio::test]
async fn test_upload_directory() {
    let temp = TempDir::new().unwrap();
    let store = open_store(&temp).await;

    let local = temp.path().join("local");
    fs::create_dir_all(local.join("media")).unwrap();
    fs::write(local.join("Editor.bin"), b"bin").unwrap();
    fs::write(local.join("media/image.png"), b"png").unwrap();

    store.upload_object("doc-9", &local).await.unwrap();

    assert_eq!(
        store.list_objects("doc-9").await.unwrap(),
        vec!["doc-9/Editor.bin", "doc-9/media/image.png"]
    );
}

/// Uploading a missing local path is a copy error.
#[tokio::test]
async fn test_upload_missing_source() {
    let temp = TempDir::new().unwrap();
    let store = open_store(&temp).await;

    let result = store.upload_object("k", &temp.path().join("nope")).await;
    assert!(matches!(result, Err(StorageError::CopyError(_))));
}

// =============================================================================
// Key Hardening
// =============================================================================

/// Keys that climb out of the root are rejected by every operation.
#[tokio::test]
async fn test_traversal_rejected_everywhere() {
    let temp = TempDir::new().unwrap();
    let store = open_store(&temp).await;
    let bad = "../outside.txt";

    assert!(matches!(store.head_object(bad).await, Err(StorageError::InvalidPath(_))));
    assert!(matches!(store.get_object(bad).await, Err(StorageError::InvalidPath(_))));
    assert!(matches!(
        store.put_object(bad, body(b"x"), None).await,
        Err(StorageError::InvalidPath(_))
    ));
    assert!(matches!(
        store.copy_object("a", bad).await,
        Err(StorageError::InvalidPath(_))
    ));
    assert!(matches!(store.list_objects(bad).await, Err(StorageError::InvalidPath(_))));
    assert!(matches!(store.delete_object(bad).await, Err(StorageError::InvalidPath(_))));

    assert!(!temp.path().join("outside.txt").exists());
}
