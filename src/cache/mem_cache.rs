/*
 * SPDX-FileCopyrightText: 2025 Sven Shi
 * SPDX-License-Identifier: GPL-3.0-or-later
 */

//! Sharded in-memory cache backend
//!
//! Keys are spread over a fixed number of independently locked shards so
//! operations on different keys rarely contend. Each shard enforces its own
//! capacity: a full shard evicts its oldest entry on insert. A background
//! sweeper reclaims expired entries on a fixed interval, taking one shard
//! lock at a time; `get` enforces TTL on its own, so an expired entry is a
//! miss whether or not the sweeper has visited it yet.

use crate::cache::DnsCache;
use crate::core::error::Result;
use crate::core::exec_ctx::ExecCtx;
use ahash::AHashMap;
use async_trait::async_trait;
use hickory_proto::op::Message;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::debug;

struct Elem {
    response: Message,
    stored_at: Instant,
    expire_at: Instant,
}

struct Shard {
    entries: AHashMap<String, Elem>,
    max_size: usize,
}

impl Shard {
    /// Insert, evicting the oldest entry when full. The displaced entry is
    /// always at least as old as every entry that stays (key order breaks
    /// timestamp ties so eviction is deterministic).
    fn insert(&mut self, key: String, elem: Elem) {
        if self.entries.len() >= self.max_size && !self.entries.contains_key(&key) {
            let oldest = self
                .entries
                .iter()
                .min_by(|(ka, a), (kb, b)| a.stored_at.cmp(&b.stored_at).then(ka.cmp(kb)))
                .map(|(k, _)| k.clone());
            if let Some(oldest) = oldest {
                self.entries.remove(&oldest);
            }
        }
        self.entries.insert(key, elem);
    }
}

/// Local cache backend with per-shard locking and a background sweeper
pub struct MemCache {
    shards: Vec<Mutex<Shard>>,
    cancel: CancellationToken,
}

impl MemCache {
    /// Build the cache and start its sweeper task. The task is owned by this
    /// instance: `close` (or dropping every handle) stops it.
    pub fn new(
        shard_num: usize,
        max_size_per_shard: usize,
        cleaner_interval: Duration,
    ) -> Arc<Self> {
        assert!(shard_num > 0, "mem cache requires at least one shard");
        assert!(
            max_size_per_shard > 0,
            "mem cache requires at least one entry per shard"
        );

        let shards = (0..shard_num)
            .map(|_| {
                Mutex::new(Shard {
                    entries: AHashMap::new(),
                    max_size: max_size_per_shard,
                })
            })
            .collect();

        let cache = Arc::new(Self {
            shards,
            cancel: CancellationToken::new(),
        });

        let weak = Arc::downgrade(&cache);
        let cancel = cache.cancel.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(cleaner_interval);
            ticker.tick().await; // first tick resolves immediately
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                let Some(cache) = weak.upgrade() else { break };
                cache.sweep();
            }
        });

        cache
    }

    fn shard(&self, key: &str) -> &Mutex<Shard> {
        let mut hasher = ahash::AHasher::default();
        key.hash(&mut hasher);
        &self.shards[hasher.finish() as usize % self.shards.len()]
    }

    /// Reclaim expired entries, one shard lock at a time.
    fn sweep(&self) {
        let now = Instant::now();
        let mut removed = 0usize;
        for shard in &self.shards {
            let mut shard = shard.lock().expect("shard lock poisoned");
            let before = shard.entries.len();
            shard.entries.retain(|_, elem| elem.expire_at > now);
            removed += before - shard.entries.len();
        }
        if removed > 0 {
            debug!(removed, "swept expired cache entries");
        }
    }

    /// Total entries across shards (diagnostics and tests).
    pub fn len(&self) -> usize {
        self.shards
            .iter()
            .map(|s| s.lock().expect("shard lock poisoned").entries.len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Drop for MemCache {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[async_trait]
impl DnsCache for MemCache {
    async fn get(&self, _ctx: &ExecCtx, key: &str) -> Result<Option<(Message, Duration)>> {
        let now = Instant::now();
        let mut shard = self.shard(key).lock().expect("shard lock poisoned");
        match shard.entries.get(key) {
            Some(elem) if elem.expire_at > now => {
                let remaining = elem.expire_at - now;
                Ok(Some((elem.response.clone(), remaining)))
            }
            Some(_) => {
                // Passive expiry: reap it now instead of waiting for the sweeper.
                shard.entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn store(
        &self,
        _ctx: &ExecCtx,
        key: &str,
        response: &Message,
        ttl: Duration,
    ) -> Result<()> {
        if ttl.is_zero() {
            return Ok(());
        }
        let now = Instant::now();
        let elem = Elem {
            response: response.clone(),
            stored_at: now,
            expire_at: now + ttl,
        };
        let mut shard = self.shard(key).lock().expect("shard lock poisoned");
        shard.insert(key.to_string(), elem);
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.cancel.cancel();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hickory_proto::op::{Message, Query};
    use hickory_proto::rr::{DNSClass, Name, RecordType};

    fn make_response(id: u16) -> Message {
        let mut response = Message::new();
        response.set_id(id);
        let mut query = Query::query(Name::from_ascii("example.com.").unwrap(), RecordType::A);
        query.set_query_class(DNSClass::IN);
        response.add_query(query);
        response
    }

    #[tokio::test]
    async fn test_store_then_get_bounds_remaining_ttl() {
        let cache = MemCache::new(4, 8, Duration::from_secs(120));
        let ctx = ExecCtx::background();

        cache
            .store(&ctx, "key", &make_response(7), Duration::from_secs(300))
            .await
            .unwrap();

        let (response, remaining) = cache.get(&ctx, "key").await.unwrap().unwrap();
        assert_eq!(response.id(), 7);
        assert!(remaining <= Duration::from_secs(300));
        assert!(remaining > Duration::from_secs(290));
    }

    #[tokio::test]
    async fn test_zero_ttl_store_is_noop() {
        let cache = MemCache::new(4, 8, Duration::from_secs(120));
        let ctx = ExecCtx::background();

        cache
            .store(&ctx, "key", &make_response(1), Duration::ZERO)
            .await
            .unwrap();
        assert!(cache.get(&ctx, "key").await.unwrap().is_none());
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_expired_entry_is_miss_without_sweep() {
        // Sweeper interval far in the future; only passive expiry can apply.
        let cache = MemCache::new(1, 8, Duration::from_secs(3600));
        let ctx = ExecCtx::background();

        cache
            .store(&ctx, "key", &make_response(1), Duration::from_millis(10))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;

        assert!(cache.get(&ctx, "key").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_full_shard_evicts_oldest_entry() {
        let cache = MemCache::new(1, 4, Duration::from_secs(3600));
        let ctx = ExecCtx::background();

        for i in 0..5 {
            cache
                .store(
                    &ctx,
                    &format!("key-{i}"),
                    &make_response(i as u16),
                    Duration::from_secs(300),
                )
                .await
                .unwrap();
            // Distinct store timestamps keep eviction order observable.
            tokio::time::sleep(Duration::from_millis(2)).await;
        }

        assert_eq!(cache.len(), 4);
        assert!(cache.get(&ctx, "key-0").await.unwrap().is_none());
        assert!(cache.get(&ctx, "key-4").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_overwrite_does_not_evict() {
        let cache = MemCache::new(1, 2, Duration::from_secs(3600));
        let ctx = ExecCtx::background();

        cache
            .store(&ctx, "a", &make_response(1), Duration::from_secs(300))
            .await
            .unwrap();
        cache
            .store(&ctx, "b", &make_response(2), Duration::from_secs(300))
            .await
            .unwrap();
        cache
            .store(&ctx, "a", &make_response(3), Duration::from_secs(300))
            .await
            .unwrap();

        assert_eq!(cache.len(), 2);
        let (response, _) = cache.get(&ctx, "a").await.unwrap().unwrap();
        assert_eq!(response.id(), 3);
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let cache = MemCache::new(2, 2, Duration::from_secs(120));
        cache.close().await.unwrap();
        cache.close().await.unwrap();
    }
}
