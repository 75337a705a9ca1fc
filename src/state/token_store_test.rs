use super::*;
use std::sync::atomic::{AtomicU32, Ordering};

fn scratch_path(name: &str) -> PathBuf {
    static SEQ: AtomicU32 = AtomicU32::new(0);
    let seq = SEQ.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir()
        .join(format!("bitacora-test-{}-{seq}", std::process::id()))
        .join(name)
}

fn cleanup(path: &Path) {
    if let Some(parent) = path.parent() {
        let _ = std::fs::remove_dir_all(parent);
    }
}

// =============================================================================
// MemoryStorage / TokenStore
// =============================================================================

#[test]
fn token_store_starts_empty() {
    let store = TokenStore::in_memory();
    assert!(store.read().is_none());
}

#[test]
fn token_store_save_read_clear() {
    let store = TokenStore::in_memory();
    store.save("eyJ.a.b").unwrap();
    assert_eq!(store.read().as_deref(), Some("eyJ.a.b"));
    store.clear().unwrap();
    assert!(store.read().is_none());
}

#[test]
fn token_store_save_overwrites() {
    let store = TokenStore::in_memory();
    store.save("first").unwrap();
    store.save("second").unwrap();
    assert_eq!(store.read().as_deref(), Some("second"));
}

#[test]
fn token_store_treats_empty_string_as_absent() {
    let storage = Arc::new(MemoryStorage::new());
    storage.set_item(TOKEN_KEY, "").unwrap();
    let store = TokenStore::new(storage);
    assert!(store.read().is_none());
}

#[test]
fn token_store_clones_share_storage() {
    let store = TokenStore::in_memory();
    let other = store.clone();
    store.save("shared").unwrap();
    assert_eq!(other.read().as_deref(), Some("shared"));
}

#[test]
fn clear_on_empty_store_is_ok() {
    let store = TokenStore::in_memory();
    assert!(store.clear().is_ok());
}

// =============================================================================
// FileStorage
// =============================================================================

#[test]
fn file_storage_missing_file_reads_empty() {
    let path = scratch_path("storage.json");
    let storage = FileStorage::new(&path);
    assert!(storage.get_item(TOKEN_KEY).unwrap().is_none());
    cleanup(&path);
}

#[test]
fn file_storage_persists_across_instances() {
    let path = scratch_path("storage.json");
    FileStorage::new(&path).set_item(TOKEN_KEY, "durable").unwrap();

    let reopened = TokenStore::new(Arc::new(FileStorage::new(&path)));
    assert_eq!(reopened.read().as_deref(), Some("durable"));

    reopened.clear().unwrap();
    assert!(FileStorage::new(&path).get_item(TOKEN_KEY).unwrap().is_none());
    cleanup(&path);
}

#[test]
fn file_storage_keeps_unrelated_keys() {
    let path = scratch_path("storage.json");
    let storage = FileStorage::new(&path);
    storage.set_item("theme", "light").unwrap();
    storage.set_item(TOKEN_KEY, "t").unwrap();
    storage.remove_item(TOKEN_KEY).unwrap();
    assert_eq!(storage.get_item("theme").unwrap().as_deref(), Some("light"));
    cleanup(&path);
}

#[test]
fn file_storage_rejects_corrupt_file() {
    let path = scratch_path("storage.json");
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, "[1, 2, 3]").unwrap();
    let storage = FileStorage::new(&path);
    assert!(matches!(storage.get_item(TOKEN_KEY), Err(StorageError::Json { .. })));

    let store = TokenStore::new(Arc::new(FileStorage::new(&path)));
    assert!(store.read().is_none());
    cleanup(&path);
}

#[cfg(unix)]
#[test]
fn file_storage_writes_owner_only_file() {
    use std::os::unix::fs::PermissionsExt;

    let path = scratch_path("storage.json");
    FileStorage::new(&path).set_item(TOKEN_KEY, "secret").unwrap();
    let mode = std::fs::metadata(&path).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o600);
    cleanup(&path);
}

#[test]
fn corrupt_file_is_replaced_on_save_and_clear() {
    let path = scratch_path("storage.json");
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, "{ garbage").unwrap();
    let store = TokenStore::new(Arc::new(FileStorage::new(&path)));

    store.save("fresh").unwrap();
    assert_eq!(store.read().as_deref(), Some("fresh"));

    std::fs::write(&path, "{ garbage").unwrap();
    store.clear().unwrap();
    assert!(store.read().is_none());
    let rewritten = std::fs::read_to_string(&path).unwrap();
    assert!(serde_json::from_str::<BTreeMap<String, String>>(&rewritten).unwrap().is_empty());
    cleanup(&path);
}
