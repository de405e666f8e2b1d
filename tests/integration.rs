//! Integration tests for linkstore

use linkstore::store::{LocalStore, LogOptions};
use linkstore::Store;
use std::sync::Arc;
use tempfile::TempDir;

#[tokio::test]
async fn test_store_scenario() {
    let store = LocalStore::in_memory();

    let c0 = store.put("http://example.com/a").await.unwrap();
    assert_eq!(store.get(&c0).as_deref(), Some("http://example.com/a"));

    let c1 = store.put("http://example.com/b").await.unwrap();
    assert_ne!(c0, c1);

    assert!(store.get("nonexistent").is_none());
}

#[tokio::test]
async fn test_persistence_across_restart() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("store.log");
    let mut accepted = Vec::new();

    // Write data
    {
        let store = LocalStore::open(&path, LogOptions::default()).unwrap();
        for i in 0..25 {
            let url = format!("https://example.org/page/{}", i);
            accepted.push((store.put(&url).await.unwrap(), url));
        }
    }

    // Reopen and verify
    {
        let store = LocalStore::open(&path, LogOptions::default()).unwrap();
        assert_eq!(store.count(), 25);
        for (code, url) in &accepted {
            assert_eq!(store.get(code).as_ref(), Some(url));
        }
    }
}

#[tokio::test]
async fn test_store_behind_trait_object() {
    let dir = TempDir::new().unwrap();
    let store: Arc<dyn Store> =
        Arc::new(LocalStore::open(dir.path().join("store.log"), LogOptions::default()).unwrap());

    let code = store.put("http://example.com/dyn").await.unwrap();
    assert_eq!(
        store.get(&code).await.unwrap().as_deref(),
        Some("http://example.com/dyn")
    );
    assert!(store.get("missing").await.unwrap().is_none());
    store.flush().await.unwrap();
    assert_eq!(store.count(), 1);
}

#[tokio::test]
async fn test_replay_keeps_first_writer() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("store.log");

    // Two records for the same code: the earlier one wins on replay
    let mut bytes = linkstore::store::durable_log::encode_record(&linkstore::common::Record::new(
        "a",
        "http://first",
    ));
    bytes.extend(linkstore::store::durable_log::encode_record(
        &linkstore::common::Record::new("a", "http://second"),
    ));
    std::fs::write(&path, bytes).unwrap();

    let store = LocalStore::open(&path, LogOptions::default()).unwrap();
    assert_eq!(store.count(), 1);
    assert_eq!(store.get("a").as_deref(), Some("http://first"));
}
