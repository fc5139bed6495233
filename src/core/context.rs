/*
 * SPDX-FileCopyrightText: 2025 Sven Shi
 * SPDX-License-Identifier: GPL-3.0-or-later
 */

//! DNS request/response context management
//!
//! Provides a container for DNS queries as they flow through the plugin
//! pipeline. Each context carries the request, the current response with its
//! status, and the deferred actions attached during the forward pass. A
//! context is owned by exactly one query's task and is never shared.

use crate::core::error::Result;
use crate::core::exec_ctx::ExecCtx;
use async_trait::async_trait;
use hickory_proto::op::Message;
use std::sync::Arc;

/// Where the pipeline stands with respect to producing a response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextStatus {
    /// No plugin has produced a response yet
    Unset,
    /// A plugin answered the query
    Responded,
    /// A plugin rejected the query (e.g. blocked domain)
    Rejected,
    /// A plugin signalled an upstream/server failure
    ServerFailed,
}

/// Work attached during query processing but executed only after the
/// response is finalized, so non-essential side effects never gate
/// client-visible latency.
#[async_trait]
pub trait DeferredAction: Send + Sync {
    async fn run(&self, ctx: &ExecCtx, qctx: &mut DnsContext) -> Result<()>;
}

/// Context object for a DNS request/response lifecycle
pub struct DnsContext {
    /// DNS request message from the client
    pub request: Message,

    response: Option<Message>,
    status: ContextStatus,
    deferred: Vec<Arc<dyn DeferredAction>>,
    info_tag: String,
}

impl DnsContext {
    /// Create a context for one incoming query
    pub fn new(request: Message) -> Self {
        let info_tag = match request.queries().first() {
            Some(q) => format!("{} {} {}", q.name(), q.query_type(), q.query_class()),
            None => "empty question".to_string(),
        };
        Self {
            request,
            response: None,
            status: ContextStatus::Unset,
            deferred: Vec::new(),
            info_tag,
        }
    }

    /// Overwrite the response and its status. Last writer wins: a downstream
    /// plugin that deliberately re-answers the query replaces the previous
    /// response wholesale.
    pub fn set_response(&mut self, response: Message, status: ContextStatus) {
        self.response = Some(response);
        self.status = status;
    }

    pub fn response(&self) -> Option<&Message> {
        self.response.as_ref()
    }

    /// Hand the final response to the caller once the pipeline is done
    pub fn take_response(&mut self) -> Option<Message> {
        self.response.take()
    }

    pub fn status(&self) -> ContextStatus {
        self.status
    }

    /// Append an action to run after the pipeline finishes, regardless of
    /// which branch terminated it. Actions run in attachment order.
    pub fn defer_exec(&mut self, action: Arc<dyn DeferredAction>) {
        self.deferred.push(action);
    }

    /// Drain the deferred actions for the finalize phase
    pub fn take_deferred(&mut self) -> Vec<Arc<dyn DeferredAction>> {
        std::mem::take(&mut self.deferred)
    }

    /// Stable diagnostic identifier: "name type class"
    pub fn info_tag(&self) -> &str {
        &self.info_tag
    }
}
