/*
 * SPDX-FileCopyrightText: 2025 Sven Shi
 * SPDX-License-Identifier: GPL-3.0-or-later
 */

//! ChainDNS - the request-processing core of a plugin-composed DNS resolver
//!
//! Every query flows through a chain of plugins that may rewrite it, answer
//! it from local data, fetch it from upstream and cache the result. This
//! crate provides:
//! - The capability-based plugin model and the wrapper that dispatches to it
//! - The pipeline walker with early-stop and deferred-action semantics
//! - A sharded in-memory response cache and a redis-backed alternative
//! - The `cache` and `hosts` plugins built on top of them
//!
//! Server listeners, upstream transports and config-driven plugin wiring are
//! left to the embedding application.

pub mod cache;
pub mod config;
pub mod core;
pub mod plugin;
