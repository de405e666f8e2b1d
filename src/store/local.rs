//! In-memory mapping with an optional durable log
//!
//! A single reader/writer lock guards the mapping. Lookups share it; inserts
//! hold it exclusively only for the presence check and the insert. Log I/O
//! happens on the writer thread, never under the lock.

use crate::common::{keygen, Error, NodeRole, Record, Result, METRICS};
use crate::store::durable_log::{DurableLog, LogOptions, MAX_FIELD_LEN};
use crate::store::Store;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::num::NonZeroUsize;
use std::path::Path;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Default)]
struct Mapping {
    entries: HashMap<String, String>,
    /// Insertion order, tracked only when bounded
    order: VecDeque<String>,
    capacity: Option<NonZeroUsize>,
}

impl Mapping {
    fn bounded(capacity: Option<NonZeroUsize>) -> Self {
        Self {
            capacity,
            ..Default::default()
        }
    }

    fn insert_if_absent(&mut self, code: &str, url: &str) -> bool {
        if self.entries.contains_key(code) {
            return false;
        }

        if let Some(capacity) = self.capacity {
            while self.entries.len() >= capacity.get() {
                let Some(oldest) = self.order.pop_front() else {
                    break;
                };
                self.entries.remove(&oldest);
                METRICS.cache_evictions.inc();
            }
            self.order.push_back(code.to_string());
        }

        self.entries.insert(code.to_string(), url.to_string());
        true
    }
}

/// The authoritative code → target mapping, or a proxy's cache of it.
pub struct LocalStore {
    mapping: RwLock<Mapping>,
    log: Option<DurableLog>,
}

impl LocalStore {
    /// Unbounded store without persistence.
    pub fn in_memory() -> Self {
        Self::cache(None)
    }

    /// Store without persistence, optionally bounded.
    ///
    /// A bounded store evicts its oldest entry when full and can only be
    /// filled through [`LocalStore::insert`].
    pub fn cache(capacity: Option<NonZeroUsize>) -> Self {
        Self {
            mapping: RwLock::new(Mapping::bounded(capacity)),
            log: None,
        }
    }

    /// Open a durable store, replaying the log at `path` before returning.
    pub fn open(path: impl AsRef<Path>, options: LogOptions) -> Result<Self> {
        let mut store = Self::in_memory();
        let mut duplicates = 0u64;

        let log = DurableLog::open(path, options, |record| {
            if !store.insert(&record.code, &record.url) {
                duplicates += 1;
            }
        })?;
        if duplicates > 0 {
            tracing::warn!(duplicates, "Ignored log records for codes already present");
        }

        store.log = Some(log);
        tracing::info!(entries = store.count(), "Store opened");
        Ok(store)
    }

    fn read(&self) -> RwLockReadGuard<'_, Mapping> {
        self.mapping.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Mapping> {
        self.mapping.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, code: &str) -> Option<String> {
        self.read().entries.get(code).cloned()
    }

    /// Insert `code` only if it is absent. First writer wins.
    ///
    /// Used by log replay and cache back-fill; never written to the log.
    pub fn insert(&self, code: &str, url: &str) -> bool {
        self.write().insert_if_absent(code, url)
    }

    /// Assign a fresh code to `url`.
    ///
    /// The candidate is derived from the current size; if it is already taken
    /// the lock is released and a later candidate is tried. With a log, the
    /// record is enqueued before the code is returned.
    pub async fn put(&self, url: &str) -> Result<String> {
        if self.read().capacity.is_some() {
            return Err(Error::CacheOnly);
        }
        if url.len() > MAX_FIELD_LEN {
            return Err(Error::InvalidTarget(format!(
                "target longer than {} bytes",
                MAX_FIELD_LEN
            )));
        }

        // Reserve queue space first so a full queue never stalls the lock holder
        let permit = match &self.log {
            Some(log) => Some(log.reserve().await?),
            None => None,
        };

        let mut floor = 0u64;
        loop {
            let mut mapping = self.write();
            let seq = (mapping.entries.len() as u64).max(floor);
            let code = keygen::generate(seq);

            if mapping.insert_if_absent(&code, url) {
                // Enqueued under the lock so log order matches acceptance order
                if let Some(permit) = permit {
                    permit.append(Record::new(code.clone(), url));
                }
                drop(mapping);
                METRICS.puts.inc();
                return Ok(code);
            }
            drop(mapping);

            METRICS.key_collisions.inc();
            tracing::debug!(code = %code, "Code already taken, retrying");
            floor = seq + 1;
        }
    }

    pub fn count(&self) -> usize {
        self.read().entries.len()
    }

    pub fn is_durable(&self) -> bool {
        self.log.is_some()
    }

    /// Force everything accepted so far to stable storage.
    pub async fn flush(&self) -> Result<()> {
        match &self.log {
            Some(log) => log.flush().await,
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Store for LocalStore {
    async fn get(&self, code: &str) -> Result<Option<String>> {
        Ok(LocalStore::get(self, code))
    }

    async fn put(&self, target: &str) -> Result<String> {
        LocalStore::put(self, target).await
    }

    fn count(&self) -> usize {
        LocalStore::count(self)
    }

    fn role(&self) -> NodeRole {
        NodeRole::Master
    }

    async fn flush(&self) -> Result<()> {
        LocalStore::flush(self).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::SyncPolicy;
    use crate::store::durable_log::testing::FailingSink;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::tempdir;

    fn with_sink(sink: FailingSink, options: LogOptions) -> LocalStore {
        LocalStore {
            mapping: RwLock::new(Mapping::default()),
            log: Some(DurableLog::start(sink, options).unwrap()),
        }
    }

    #[tokio::test]
    async fn test_put_get_scenario() {
        let store = LocalStore::in_memory();

        let c0 = store.put("http://example.com/a").await.unwrap();
        assert_eq!(store.get(&c0).as_deref(), Some("http://example.com/a"));

        let c1 = store.put("http://example.com/b").await.unwrap();
        assert_ne!(c0, c1);
        assert_eq!(store.get(&c1).as_deref(), Some("http://example.com/b"));

        assert!(store.get("nonexistent").is_none());
        assert_eq!(store.count(), 2);
    }

    #[tokio::test]
    async fn test_same_target_gets_new_code() {
        let store = LocalStore::in_memory();
        let a = store.put("http://dup").await.unwrap();
        let b = store.put("http://dup").await.unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_insert_first_writer_wins() {
        let store = LocalStore::in_memory();
        assert!(store.insert("x1", "http://first"));
        assert!(!store.insert("x1", "http://second"));
        assert_eq!(store.get("x1").as_deref(), Some("http://first"));
        assert_eq!(store.count(), 1);
    }

    #[tokio::test]
    async fn test_put_retries_past_taken_codes() {
        let store = LocalStore::in_memory();
        // size is 1, so the first candidate is "b"
        assert!(store.insert("b", "http://taken"));

        let code = store.put("http://new").await.unwrap();
        assert_eq!(code, "c");
        assert_eq!(store.get("b").as_deref(), Some("http://taken"));

        // size is 2, candidate "c" is taken, "d" is next
        let code = store.put("http://newer").await.unwrap();
        assert_eq!(code, "d");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_puts_yield_unique_codes() {
        let store = Arc::new(LocalStore::in_memory());
        let mut handles = Vec::new();

        for t in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let mut out = Vec::new();
                for i in 0..250 {
                    let url = format!("http://host/{}/{}", t, i);
                    let code = store.put(&url).await.unwrap();
                    out.push((code, url));
                }
                out
            }));
        }

        let mut seen = HashSet::new();
        for handle in handles {
            for (code, url) in handle.await.unwrap() {
                assert!(seen.insert(code.clone()), "duplicate code {}", code);
                assert_eq!(store.get(&code), Some(url));
            }
        }
        assert_eq!(store.count(), 2000);
    }

    #[tokio::test]
    async fn test_bounded_cache_evicts_oldest() {
        let cache = LocalStore::cache(NonZeroUsize::new(2));
        assert!(cache.insert("a", "http://1"));
        assert!(cache.insert("b", "http://2"));
        assert!(cache.insert("c", "http://3"));

        assert_eq!(cache.count(), 2);
        assert!(cache.get("a").is_none());
        assert_eq!(cache.get("c").as_deref(), Some("http://3"));

        // a bounded cache never assigns codes
        assert!(matches!(cache.put("http://4").await, Err(Error::CacheOnly)));
    }

    #[tokio::test]
    async fn test_oversized_target_rejected() {
        let store = LocalStore::in_memory();
        let url = "x".repeat(MAX_FIELD_LEN + 1);
        assert!(matches!(store.put(&url).await, Err(Error::InvalidTarget(_))));
        assert_eq!(store.count(), 0);
    }

    #[tokio::test]
    async fn test_durable_store_restart() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.log");
        let mut accepted = Vec::new();

        {
            let store = LocalStore::open(&path, LogOptions::default()).unwrap();
            assert!(store.is_durable());
            for i in 0..10 {
                let url = format!("http://example.com/{}", i);
                accepted.push((store.put(&url).await.unwrap(), url));
            }
            store.flush().await.unwrap();
        }

        let store = LocalStore::open(&path, LogOptions::default()).unwrap();
        assert_eq!(store.count(), accepted.len());
        for (code, url) in &accepted {
            assert_eq!(store.get(code).as_ref(), Some(url));
        }

        // codes keep advancing after a restart
        let next = store.put("http://example.com/next").await.unwrap();
        assert!(accepted.iter().all(|(code, _)| code != &next));
    }

    #[tokio::test]
    async fn test_small_queue_applies_backpressure() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.log");
        let options = LogOptions {
            sync_policy: SyncPolicy::Always,
            queue_capacity: 1,
        };

        {
            let store = LocalStore::open(&path, options).unwrap();
            for i in 0..50 {
                store.put(&format!("http://bp/{}", i)).await.unwrap();
            }
        }

        let store = LocalStore::open(&path, options).unwrap();
        assert_eq!(store.count(), 50);
    }

    #[tokio::test]
    async fn test_full_queue_blocks_put() {
        let options = LogOptions {
            sync_policy: SyncPolicy::Never,
            queue_capacity: 1,
        };
        let store = with_sink(FailingSink::default(), options);

        // hold the only slot
        let held = store.log.as_ref().unwrap().reserve().await.unwrap();
        let blocked =
            tokio::time::timeout(Duration::from_millis(100), store.put("http://blocked")).await;
        assert!(blocked.is_err(), "put returned while the queue was full");
        assert_eq!(store.count(), 0);

        drop(held);
        let code = store.put("http://unblocked").await.unwrap();
        assert_eq!(store.get(&code).as_deref(), Some("http://unblocked"));
    }

    #[tokio::test]
    async fn test_failed_append_keeps_entry() {
        let sink = FailingSink::failing_at(1);
        let store = with_sink(sink.clone(), LogOptions::default());

        let a = store.put("http://one").await.unwrap();
        let b = store.put("http://two").await.unwrap();
        let c = store.put("http://three").await.unwrap();
        store.flush().await.unwrap();

        assert_eq!(store.count(), 3);
        assert_eq!(store.get(&b).as_deref(), Some("http://two"));

        let logged: Vec<_> = sink.records().into_iter().map(|r| r.code).collect();
        assert_eq!(logged, vec![a, c]);
    }
}
