//! Caching proxy in front of the master
//!
//! Lookups are answered from the local cache when possible and otherwise
//! forwarded to the master, with the answer cached on the way back. Every
//! put is forwarded: the master alone assigns codes, so a proxy never inserts
//! a mapping the master has not already accepted.

use crate::common::{Error, NodeRole, Result, METRICS};
use crate::rpc::{Method, RemoteCallChannel};
use crate::store::{LocalStore, Store};
use async_trait::async_trait;
use std::num::NonZeroUsize;

pub struct ReplicaProxy<C> {
    cache: LocalStore,
    channel: C,
}

impl<C: RemoteCallChannel> ReplicaProxy<C> {
    /// `cache_capacity` bounds the cache; `None` keeps every entry.
    pub fn new(channel: C, cache_capacity: Option<NonZeroUsize>) -> Self {
        Self {
            cache: LocalStore::cache(cache_capacity),
            channel,
        }
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    pub fn cached(&self) -> usize {
        self.cache.count()
    }

    async fn call(&self, method: Method, arg: &str) -> Result<String> {
        METRICS.remote_calls.inc();
        let result = self.channel.call(method, arg).await;
        if let Err(e) = &result {
            if !e.is_not_found() {
                METRICS.remote_errors.inc();
                tracing::warn!(method = %method, "Call to master failed: {}", e);
            }
        }
        result
    }

    pub async fn get(&self, code: &str) -> Result<Option<String>> {
        if let Some(url) = self.cache.get(code) {
            METRICS.cache_hits.inc();
            tracing::trace!(code, "Cache hit");
            return Ok(Some(url));
        }
        METRICS.cache_misses.inc();

        match self.call(Method::Get, code).await {
            Ok(url) => {
                // A concurrent back-fill may have won; the master's answer is the same
                if !self.cache.insert(code, &url) {
                    tracing::debug!(code, "Cache already filled");
                }
                Ok(Some(url))
            }
            Err(Error::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn put(&self, target: &str) -> Result<String> {
        let code = self.call(Method::Put, target).await?;
        self.cache.insert(&code, target);
        Ok(code)
    }
}

#[async_trait]
impl<C: RemoteCallChannel> Store for ReplicaProxy<C> {
    async fn get(&self, code: &str) -> Result<Option<String>> {
        ReplicaProxy::get(self, code).await
    }

    async fn put(&self, target: &str) -> Result<String> {
        ReplicaProxy::put(self, target).await
    }

    fn count(&self) -> usize {
        self.cached()
    }

    fn role(&self) -> NodeRole {
        NodeRole::Proxy
    }
}
