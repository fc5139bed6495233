/*
 * SPDX-FileCopyrightText: 2025 Sven Shi
 * SPDX-License-Identifier: GPL-3.0-or-later
 */

//! `cache` plugin
//!
//! Answers repeated questions from a response cache. On a hit the chain
//! stops early; on a miss the store is deferred until the rest of the chain
//! has produced the final response, so cache I/O never gates the
//! client-visible outcome. A cache fault of any kind degrades to "skip the
//! cache for this query" and never aborts it.

use crate::cache::mem_cache::MemCache;
use crate::cache::redis_cache::RedisCache;
use crate::cache::DnsCache;
use crate::core::context::{ContextStatus, DeferredAction, DnsContext};
use crate::core::dns_utils::{minimal_ttl, msg_cache_key, set_msg_ttl};
use crate::core::error::Result;
use crate::core::exec_ctx::ExecCtx;
use crate::plugin::wrapper::PluginWrapper;
use crate::plugin::{ContextConnector, EsExecutable, Plugin, Service};
use crate::plugin::pipeline::PipeContext;
use async_trait::async_trait;
use hickory_proto::op::ResponseCode;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Ceiling on stored TTLs, one week. Bounds staleness from misconfigured
/// upstreams.
const MAX_TTL: u32 = 3600 * 24 * 7;

const DEFAULT_CACHE_SIZE: usize = 1024;
const DEFAULT_CLEANER_INTERVAL: u64 = 120;
const SHARD_NUM: usize = 64;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct CacheArgs {
    /// Maximum entry count of the local backend, default 1024, subdivided
    /// across a fixed shard count with a floor of one entry per shard
    #[serde(default)]
    pub size: usize,

    /// Sweep interval of the local backend's cleaner, seconds, default 120
    #[serde(default)]
    pub cleaner_interval: u64,

    /// Redis address; when set it fully replaces the local backend
    #[serde(default)]
    pub redis: Option<String>,
}

/// Response cache plugin
pub struct CachePlugin {
    tag: String,
    backend: Arc<dyn DnsCache>,
}

impl CachePlugin {
    /// Build the plugin from its configuration. A redis address that fails
    /// to connect is fatal here rather than silently falling back to the
    /// local backend.
    pub async fn new(tag: impl Into<String>, args: CacheArgs) -> Result<Self> {
        let backend: Arc<dyn DnsCache> = match args.redis.as_deref() {
            Some(addr) if !addr.is_empty() => Arc::new(RedisCache::connect(addr).await?),
            _ => {
                let size = if args.size == 0 {
                    DEFAULT_CACHE_SIZE
                } else {
                    args.size
                };
                let per_shard = (size / SHARD_NUM).max(1);
                let interval = if args.cleaner_interval == 0 {
                    DEFAULT_CLEANER_INTERVAL
                } else {
                    args.cleaner_interval
                };
                MemCache::new(SHARD_NUM, per_shard, Duration::from_secs(interval))
            }
        };
        Ok(Self::with_backend(tag, backend))
    }

    /// Build the plugin over an explicit backend.
    pub fn with_backend(tag: impl Into<String>, backend: Arc<dyn DnsCache>) -> Self {
        Self {
            tag: tag.into(),
            backend,
        }
    }

    /// Wrap with every role this plugin implements.
    pub fn into_wrapper(self: Arc<Self>) -> PluginWrapper {
        PluginWrapper::new(self.clone())
            .with_es_executable(self.clone())
            .with_connector(self.clone())
            .with_service(self)
    }

    fn defer_store(&self, key: String) -> DeferredStore {
        DeferredStore {
            key,
            backend: self.backend.clone(),
            tag: self.tag.clone(),
        }
    }

    /// Search the cache and answer from it on a hit. Returns the derived
    /// key (when one could be derived) and whether the query was answered.
    async fn search_and_reply(&self, ctx: &ExecCtx, qctx: &mut DnsContext) -> (Option<String>, bool) {
        let Some(key) = msg_cache_key(&qctx.request) else {
            warn!(
                query = qctx.info_tag(),
                plugin = %self.tag,
                "unable to derive cache key, skip it"
            );
            return (None, false);
        };

        let cached = match self.backend.get(ctx, &key).await {
            Ok(cached) => cached,
            Err(e) => {
                warn!(
                    query = qctx.info_tag(),
                    plugin = %self.tag,
                    error = %e,
                    "unable to access cache, skip it"
                );
                return (Some(key), false);
            }
        };

        match cached {
            Some((mut response, remaining)) => {
                debug!(query = qctx.info_tag(), plugin = %self.tag, "cache hit");
                response.set_id(qctx.request.id());
                set_msg_ttl(&mut response, remaining.as_secs() as u32);
                qctx.set_response(response, ContextStatus::Responded);
                (Some(key), true)
            }
            None => (Some(key), false),
        }
    }
}

impl Plugin for CachePlugin {
    fn tag(&self) -> &str {
        &self.tag
    }

    fn type_name(&self) -> &str {
        "cache"
    }
}

#[async_trait]
impl EsExecutable for CachePlugin {
    /// Searches the cache. A hit is an early stop; a miss attaches the
    /// deferred store and lets the chain continue. Never returns an error:
    /// a cache fault must not terminate the query.
    async fn exec_es(&self, ctx: &ExecCtx, qctx: &mut DnsContext) -> Result<bool> {
        let (key, cache_hit) = self.search_and_reply(ctx, qctx).await;
        if cache_hit {
            return Ok(true);
        }

        if let Some(key) = key {
            qctx.defer_exec(Arc::new(self.defer_store(key)));
        }
        Ok(false)
    }
}

#[async_trait]
impl ContextConnector for CachePlugin {
    /// Wrap-around mode: hit check, then drive the remainder of the chain
    /// and store its result synchronously. Same end state as the deferred
    /// path, different scheduling point.
    async fn connect(
        &self,
        ctx: &ExecCtx,
        qctx: &mut DnsContext,
        pipe: &mut PipeContext,
    ) -> Result<()> {
        let (key, cache_hit) = self.search_and_reply(ctx, qctx).await;
        if cache_hit {
            return Ok(());
        }

        pipe.exec_next_plugin(ctx, qctx).await?;

        if let Some(key) = key {
            let _ = self.defer_store(key).run(ctx, qctx).await;
        }
        Ok(())
    }
}

#[async_trait]
impl Service for CachePlugin {
    async fn shutdown(&self) -> Result<()> {
        self.backend.close().await
    }
}

/// Stores whatever the final response turns out to be, once the rest of the
/// chain has produced it.
struct DeferredStore {
    key: String,
    backend: Arc<dyn DnsCache>,
    tag: String,
}

impl DeferredStore {
    async fn store_final_response(&self, ctx: &ExecCtx, qctx: &DnsContext) -> Result<()> {
        let Some(response) = qctx.response() else {
            return Ok(());
        };
        if response.response_code() != ResponseCode::NoError
            || response.truncated()
            || response.answers().is_empty()
        {
            return Ok(());
        }

        let ttl = minimal_ttl(response).min(MAX_TTL);
        self.backend
            .store(ctx, &self.key, response, Duration::from_secs(ttl as u64))
            .await
    }
}

#[async_trait]
impl DeferredAction for DeferredStore {
    /// Never returns an error: a failed cache write is logged and swallowed
    /// so it cannot affect the already-final response.
    async fn run(&self, ctx: &ExecCtx, qctx: &mut DnsContext) -> Result<()> {
        if let Err(e) = self.store_final_response(ctx, qctx).await {
            warn!(
                query = qctx.info_tag(),
                plugin = %self.tag,
                error = %e,
                "failed to cache the response"
            );
        }
        Ok(())
    }
}
