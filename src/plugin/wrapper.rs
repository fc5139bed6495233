/*
 * SPDX-FileCopyrightText: 2025 Sven Shi
 * SPDX-License-Identifier: GPL-3.0-or-later
 */

//! Uniform dispatch surface over heterogeneous plugins
//!
//! [`PluginWrapper`] holds one handle per capability role, populated once at
//! wrap time, so the pipeline probes and dispatches without any per-call
//! type inspection. Every dispatch checks the query's cancellation signal
//! before touching the plugin, and every plugin fault comes back wrapped
//! with the plugin's tag so failures are attributable in logs.

use crate::core::context::DnsContext;
use crate::core::error::{DnsError, Result};
use crate::core::exec_ctx::ExecCtx;
use crate::plugin::pipeline::PipeContext;
use crate::plugin::{ContextConnector, EsExecutable, Executable, Matcher, Plugin, Role, Service};
use std::sync::Arc;
use tracing::debug;

pub struct PluginWrapper {
    plugin: Arc<dyn Plugin>,
    executable: Option<Arc<dyn Executable>>,
    es_executable: Option<Arc<dyn EsExecutable>>,
    matcher: Option<Arc<dyn Matcher>>,
    connector: Option<Arc<dyn ContextConnector>>,
    service: Option<Arc<dyn Service>>,
}

impl PluginWrapper {
    /// Wrap a plugin with no roles attached yet; chain `with_*` calls for
    /// every role the instance implements.
    pub fn new(plugin: Arc<dyn Plugin>) -> Self {
        Self {
            plugin,
            executable: None,
            es_executable: None,
            matcher: None,
            connector: None,
            service: None,
        }
    }

    pub fn with_executable(mut self, handle: Arc<dyn Executable>) -> Self {
        self.executable = Some(handle);
        self
    }

    pub fn with_es_executable(mut self, handle: Arc<dyn EsExecutable>) -> Self {
        self.es_executable = Some(handle);
        self
    }

    pub fn with_matcher(mut self, handle: Arc<dyn Matcher>) -> Self {
        self.matcher = Some(handle);
        self
    }

    pub fn with_connector(mut self, handle: Arc<dyn ContextConnector>) -> Self {
        self.connector = Some(handle);
        self
    }

    pub fn with_service(mut self, handle: Arc<dyn Service>) -> Self {
        self.service = Some(handle);
        self
    }

    pub fn tag(&self) -> &str {
        self.plugin.tag()
    }

    pub fn type_name(&self) -> &str {
        self.plugin.type_name()
    }

    /// O(1) capability probe
    pub fn is(&self, role: Role) -> bool {
        match role {
            Role::EsExecutable => self.es_executable.is_some() || self.executable.is_some(),
            Role::Matcher => self.matcher.is_some(),
            Role::ContextConnector => self.connector.is_some(),
            Role::Service => self.service.is_some(),
        }
    }

    fn log_dispatch(&self, qctx: &DnsContext) {
        debug!(
            query = qctx.info_tag(),
            exec = self.plugin.tag(),
            "exec plugin"
        );
    }

    fn attribute(&self, err: DnsError) -> DnsError {
        if err.is_cancellation() {
            err
        } else {
            err.with_tag(self.plugin.tag())
        }
    }

    fn not_a(&self, role: &'static str) -> DnsError {
        DnsError::CapabilityMismatch {
            tag: self.plugin.tag().to_string(),
            type_name: self.plugin.type_name().to_string(),
            role,
        }
    }

    /// Dispatch to the executable role. A plain [`Executable`] is adapted
    /// as "never stops early".
    pub async fn exec_es(&self, ctx: &ExecCtx, qctx: &mut DnsContext) -> Result<bool> {
        self.log_dispatch(qctx);
        ctx.check()?;

        if let Some(es) = &self.es_executable {
            es.exec_es(ctx, qctx).await.map_err(|e| self.attribute(e))
        } else if let Some(e) = &self.executable {
            e.exec(ctx, qctx)
                .await
                .map(|_| false)
                .map_err(|e| self.attribute(e))
        } else {
            Err(self.not_a("an EsExecutable nor Executable"))
        }
    }

    /// Dispatch to the matcher role.
    pub async fn is_match(&self, ctx: &ExecCtx, qctx: &mut DnsContext) -> Result<bool> {
        self.log_dispatch(qctx);
        ctx.check()?;

        match &self.matcher {
            Some(m) => m.is_match(ctx, qctx).await.map_err(|e| self.attribute(e)),
            None => Err(self.not_a("a Matcher")),
        }
    }

    /// Dispatch to the connector role, handing over the rest of the chain.
    pub async fn connect(
        &self,
        ctx: &ExecCtx,
        qctx: &mut DnsContext,
        pipe: &mut PipeContext,
    ) -> Result<()> {
        self.log_dispatch(qctx);
        ctx.check()?;

        match &self.connector {
            Some(cc) => cc
                .connect(ctx, qctx, pipe)
                .await
                .map_err(|e| self.attribute(e)),
            None => Err(self.not_a("a ContextConnector")),
        }
    }

    /// Dispatch to the service role.
    pub async fn shutdown(&self) -> Result<()> {
        match &self.service {
            Some(s) => s.shutdown().await.map_err(|e| self.attribute(e)),
            None => Err(self.not_a("a Service")),
        }
    }
}
