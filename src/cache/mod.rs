/*
 * SPDX-FileCopyrightText: 2025 Sven Shi
 * SPDX-License-Identifier: GPL-3.0-or-later
 */

//! Response cache backends
//!
//! A common contract over TTL'd response entries with two implementations:
//! a sharded in-memory cache and a redis-backed one. Callers must treat a
//! backend fault the same as a miss operationally (proceed without cached
//! data), distinguishing the two only for logging.

pub mod mem_cache;
pub mod redis_cache;

use crate::core::error::Result;
use crate::core::exec_ctx::ExecCtx;
use async_trait::async_trait;
use hickory_proto::op::Message;
use std::time::Duration;

/// Backend contract for the cache plugin
#[async_trait]
pub trait DnsCache: Send + Sync + 'static {
    /// Look up a cached response and its remaining TTL.
    ///
    /// A miss is `Ok(None)`; an expired entry is a miss even if it has not
    /// been reaped yet. `Err` means the backend itself failed and must never
    /// be collapsed into a miss by the implementation.
    async fn get(&self, ctx: &ExecCtx, key: &str) -> Result<Option<(Message, Duration)>>;

    /// Upsert a response under `key` for `ttl`. A zero TTL is a no-op, not
    /// an error.
    async fn store(&self, ctx: &ExecCtx, key: &str, response: &Message, ttl: Duration)
        -> Result<()>;

    /// Release backend resources. Idempotent.
    async fn close(&self) -> Result<()>;
}
