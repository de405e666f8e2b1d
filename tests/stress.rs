//! Stress test: many concurrent writers and readers on one durable store

use linkstore::common::SyncPolicy;
use linkstore::store::{LocalStore, LogOptions};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tempfile::TempDir;

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn stress_concurrent_put_get() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("store.log");
    let options = LogOptions {
        sync_policy: SyncPolicy::Never,
        queue_capacity: 64,
    };

    let writers = 16;
    let per_writer = 200;
    let start = Instant::now();

    let accepted: HashMap<String, String> = {
        let store = Arc::new(LocalStore::open(&path, options).unwrap());
        let mut handles = Vec::new();

        for w in 0..writers {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let mut mine = Vec::with_capacity(per_writer);
                for i in 0..per_writer {
                    let url = format!("http://stress/{}/{}", w, i);
                    let code = store.put(&url).await.unwrap();
                    // read back through the shared lock while others write
                    assert_eq!(store.get(&code).as_ref(), Some(&url));
                    mine.push((code, url));
                }
                mine
            }));
        }

        let mut accepted = HashMap::new();
        for handle in handles {
            for (code, url) in handle.await.unwrap() {
                assert!(
                    accepted.insert(code.clone(), url).is_none(),
                    "code {} handed out twice",
                    code
                );
            }
        }
        assert_eq!(store.count(), writers * per_writer);
        store.flush().await.unwrap();
        accepted
    };

    let write_time = start.elapsed();
    println!("Wrote {} codes: {:?}", writers * per_writer, write_time);

    // Replay reproduces exactly the accepted set
    let store = LocalStore::open(&path, options).unwrap();
    assert_eq!(store.count(), accepted.len());
    for (code, url) in &accepted {
        assert_eq!(store.get(code).as_ref(), Some(url));
    }
    assert!(write_time.as_secs_f64() < 30.0, "Write too slow");
}
