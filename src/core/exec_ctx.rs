/*
 * SPDX-FileCopyrightText: 2025 Sven Shi
 * SPDX-License-Identifier: GPL-3.0-or-later
 */

//! Per-query execution signal
//!
//! Every dispatch into a plugin is bounded by an externally supplied
//! cancellation token and optional deadline. The wrapper checks the signal
//! before invoking a plugin, and blocking backend I/O (the redis cache) is
//! raced against it so a slow remote store cannot hang a query.

use crate::core::error::{DnsError, Result};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Cancellation/deadline signal shared by every dispatch of one query
#[derive(Debug, Clone)]
pub struct ExecCtx {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl ExecCtx {
    /// A signal that never fires (tests, background work)
    pub fn background() -> Self {
        Self {
            cancel: CancellationToken::new(),
            deadline: None,
        }
    }

    /// Bind to an externally owned cancellation token
    pub fn with_cancellation(cancel: CancellationToken) -> Self {
        Self {
            cancel,
            deadline: None,
        }
    }

    /// A fresh signal that fires once `timeout` has elapsed
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            cancel: CancellationToken::new(),
            deadline: Some(Instant::now() + timeout),
        }
    }

    /// Handle for external cancellation of this query
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Non-blocking check, called before each plugin invocation
    pub fn check(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(DnsError::Cancelled);
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return Err(DnsError::DeadlineExceeded);
            }
        }
        Ok(())
    }

    /// Resolves when the signal fires; used to bound blocking backend I/O
    pub async fn cancelled(&self) {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = self.cancel.cancelled() => {}
                    _ = tokio::time::sleep_until(deadline) => {}
                }
            }
            None => self.cancel.cancelled().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_background_never_fires() {
        let ctx = ExecCtx::background();
        assert!(ctx.check().is_ok());
    }

    #[tokio::test]
    async fn test_cancelled_token_is_observed() {
        let token = CancellationToken::new();
        let ctx = ExecCtx::with_cancellation(token.clone());
        assert!(ctx.check().is_ok());

        token.cancel();
        assert!(matches!(ctx.check(), Err(DnsError::Cancelled)));
    }

    #[tokio::test]
    async fn test_elapsed_deadline_is_observed() {
        let ctx = ExecCtx::with_timeout(Duration::from_millis(0));
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(matches!(ctx.check(), Err(DnsError::DeadlineExceeded)));
    }
}
