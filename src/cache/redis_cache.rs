/*
 * SPDX-FileCopyrightText: 2025 Sven Shi
 * SPDX-License-Identifier: GPL-3.0-or-later
 */

//! Redis cache backend
//!
//! Thin adapter over a redis connection: responses are stored as DNS wire
//! bytes with redis's own TTL mechanism (`PX`). Construction performs the
//! handshake, so an unreachable store fails plugin initialization instead of
//! silently degrading. Every call is raced against the query's cancellation
//! signal.

use crate::cache::DnsCache;
use crate::core::error::{DnsError, Result};
use crate::core::exec_ctx::ExecCtx;
use async_trait::async_trait;
use hickory_proto::op::Message;
use hickory_proto::serialize::binary::{BinDecodable, BinEncodable};
use redis::aio::ConnectionManager;
use redis::Client;
use std::time::Duration;

pub struct RedisCache {
    conn: ConnectionManager,
}

impl RedisCache {
    /// Connect to the store at `addr` (a `redis://` URL). Any connectivity
    /// error here is fatal to the caller's initialization.
    pub async fn connect(addr: &str) -> Result<Self> {
        let client = Client::open(addr)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl DnsCache for RedisCache {
    async fn get(&self, ctx: &ExecCtx, key: &str) -> Result<Option<(Message, Duration)>> {
        let mut conn = self.conn.clone();
        let query = async {
            let (bytes, pttl): (Option<Vec<u8>>, i64) = redis::pipe()
                .cmd("GET")
                .arg(key)
                .cmd("PTTL")
                .arg(key)
                .query_async(&mut conn)
                .await?;
            Ok::<_, DnsError>((bytes, pttl))
        };

        let (bytes, pttl) = tokio::select! {
            biased;
            _ = ctx.cancelled() => return Err(DnsError::Cancelled),
            res = query => res?,
        };

        let Some(bytes) = bytes else {
            return Ok(None);
        };
        // PTTL < 0: key vanished or carries no expiry; treat both as a miss.
        if pttl <= 0 {
            return Ok(None);
        }

        let response = Message::from_bytes(&bytes)?;
        Ok(Some((response, Duration::from_millis(pttl as u64))))
    }

    async fn store(
        &self,
        ctx: &ExecCtx,
        key: &str,
        response: &Message,
        ttl: Duration,
    ) -> Result<()> {
        if ttl.is_zero() {
            return Ok(());
        }
        let bytes = response.to_bytes()?;
        let mut conn = self.conn.clone();
        let set = async {
            let _: () = redis::cmd("SET")
                .arg(key)
                .arg(bytes)
                .arg("PX")
                .arg(ttl.as_millis() as u64)
                .query_async(&mut conn)
                .await?;
            Ok::<_, DnsError>(())
        };

        tokio::select! {
            biased;
            _ = ctx.cancelled() => Err(DnsError::Cancelled),
            res = set => res,
        }
    }

    async fn close(&self) -> Result<()> {
        // The connection manager owns no background resources that need
        // explicit teardown; dropping the last handle closes the socket.
        Ok(())
    }
}
