/*
 * SPDX-FileCopyrightText: 2025 Sven Shi
 * SPDX-License-Identifier: GPL-3.0-or-later
 */

//! Pipeline walker
//!
//! [`PipeContext`] carries the remaining chain through a query: the
//! dispatcher pulls the next plugin, a [`ContextConnector`] plugin takes
//! over the walk itself, and an early-stop signal ends it. After the walk
//! returns, [`execute_chain`] runs the finalize phase: every deferred action
//! in attachment order, each failure isolated from the others and from the
//! already-final response.
//!
//! [`ContextConnector`]: crate::plugin::ContextConnector

use crate::core::context::DnsContext;
use crate::core::error::Result;
use crate::core::exec_ctx::ExecCtx;
use crate::plugin::wrapper::PluginWrapper;
use crate::plugin::Role;
use std::sync::Arc;
use tracing::warn;

/// Handle to "run the rest of the chain", passed to connector plugins
pub struct PipeContext {
    chain: Arc<[Arc<PluginWrapper>]>,
    next: usize,
}

impl PipeContext {
    pub fn new(chain: Arc<[Arc<PluginWrapper>]>) -> Self {
        Self { chain, next: 0 }
    }

    /// Walk the remaining chain. Returns once a plugin signals early stop,
    /// a connector plugin finishes driving the tail, or the chain runs out.
    pub async fn exec_next_plugin(&mut self, ctx: &ExecCtx, qctx: &mut DnsContext) -> Result<()> {
        while self.next < self.chain.len() {
            let wrapper = self.chain[self.next].clone();
            self.next += 1;

            if wrapper.is(Role::ContextConnector) {
                return wrapper.connect(ctx, qctx, self).await;
            }

            let early_stop = wrapper.exec_es(ctx, qctx).await?;
            if early_stop {
                break;
            }
        }
        Ok(())
    }
}

/// Pipeline entry point: run the chain for one query, then the finalize
/// phase. Deferred actions run on the query's task, after the response is
/// final, regardless of which branch terminated the walk.
pub async fn execute_chain(
    ctx: &ExecCtx,
    qctx: &mut DnsContext,
    chain: &[Arc<PluginWrapper>],
) -> Result<()> {
    let mut pipe = PipeContext::new(chain.to_vec().into());
    let result = pipe.exec_next_plugin(ctx, qctx).await;

    for action in qctx.take_deferred() {
        if let Err(e) = action.run(ctx, qctx).await {
            warn!(query = qctx.info_tag(), error = %e, "deferred action failed");
        }
    }

    result
}
