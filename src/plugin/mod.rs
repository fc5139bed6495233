/*
 * SPDX-FileCopyrightText: 2025 Sven Shi
 * SPDX-License-Identifier: GPL-3.0-or-later
 */

//! Plugin system for ChainDNS
//!
//! A plugin has a fixed identity (tag + type name) and implements any subset
//! of the capability roles below:
//! - [`Executable`]: mutates the context and always continues the chain
//! - [`EsExecutable`]: like `Executable` but may signal early stop
//! - [`Matcher`]: a pure predicate over the context
//! - [`ContextConnector`]: drives the remainder of the chain itself
//! - [`Service`]: holds background resources and exposes shutdown
//!
//! Which roles an instance implements is declared once when it is wrapped
//! into a [`wrapper::PluginWrapper`], never re-derived per call.

pub mod cache;
pub mod hosts;
pub mod pipeline;
pub mod wrapper;

use crate::core::context::DnsContext;
use crate::core::error::Result;
use crate::core::exec_ctx::ExecCtx;
use crate::plugin::pipeline::PipeContext;
use async_trait::async_trait;

/// Identity shared by every plugin, used for diagnostics and error
/// attribution only.
pub trait Plugin: Send + Sync + 'static {
    /// Unique tag of this plugin instance
    fn tag(&self) -> &str;

    /// Type name of this plugin (e.g. "cache", "hosts")
    fn type_name(&self) -> &str;
}

/// Performs a side effect or mutation and always continues the chain.
/// Failure aborts the query.
#[async_trait]
pub trait Executable: Plugin {
    async fn exec(&self, ctx: &ExecCtx, qctx: &mut DnsContext) -> Result<()>;
}

/// Like [`Executable`], but may also signal "stop the chain now, the
/// response is final" by returning `Ok(true)`.
#[async_trait]
pub trait EsExecutable: Plugin {
    async fn exec_es(&self, ctx: &ExecCtx, qctx: &mut DnsContext) -> Result<bool>;
}

/// A predicate over the context, used for conditional branching and for
/// direct-answer lookups.
#[async_trait]
pub trait Matcher: Plugin {
    async fn is_match(&self, ctx: &ExecCtx, qctx: &mut DnsContext) -> Result<bool>;
}

/// Receives a handle to the remainder of the chain and decides when and
/// whether to run it, enabling pre- and post-processing around it.
#[async_trait]
pub trait ContextConnector: Plugin {
    async fn connect(
        &self,
        ctx: &ExecCtx,
        qctx: &mut DnsContext,
        pipe: &mut PipeContext,
    ) -> Result<()>;
}

/// Shutdown hook for plugins that own background resources. Not part of the
/// query path.
#[async_trait]
pub trait Service: Plugin {
    async fn shutdown(&self) -> Result<()>;
}

/// Capability roles a wrapper can be probed for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Satisfied by either [`EsExecutable`] or [`Executable`] (the latter is
    /// adapted as "never stops early")
    EsExecutable,
    Matcher,
    ContextConnector,
    Service,
}
