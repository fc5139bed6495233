/*
 * SPDX-FileCopyrightText: 2025 Sven Shi
 * SPDX-License-Identifier: GPL-3.0-or-later
 */

//! Unified error handling module for ChainDNS
//!
//! Provides a centralized error type that can represent various error
//! conditions throughout the pipeline, making error handling more consistent
//! and easier to maintain.

use crate::config::ConfigError;
use thiserror::Error;

/// Main error type for ChainDNS
///
/// This enum represents all possible errors that can occur in the pipeline.
/// It can be constructed from various error types using the `From` trait
/// implementations.
#[derive(Debug, Error)]
pub enum DnsError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing or serialization failed
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yml::Error),

    /// Configuration validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Plugin initialization or operation error
    #[error("Plugin error: {0}")]
    Plugin(String),

    /// A plugin execution fault, attributed to the plugin that raised it
    #[error("plugin {tag}: {source}")]
    PluginExec {
        tag: String,
        #[source]
        source: Box<DnsError>,
    },

    /// A dispatch call was invoked on a role the plugin does not implement
    #[error("plugin tag: {tag}, type: {type_name} is not {role}")]
    CapabilityMismatch {
        tag: String,
        type_name: String,
        role: &'static str,
    },

    /// The query's cancellation signal fired
    #[error("query cancelled")]
    Cancelled,

    /// The query's deadline elapsed
    #[error("query deadline exceeded")]
    DeadlineExceeded,

    /// DNS protocol error
    #[error("DNS protocol error: {0}")]
    Proto(#[from] hickory_proto::ProtoError),

    /// Redis backend error
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Generic error with custom message
    #[error("{0}")]
    Generic(String),
}

impl DnsError {
    /// Create a configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        DnsError::Config(msg.into())
    }

    /// Create a plugin error
    pub fn plugin<S: Into<String>>(msg: S) -> Self {
        DnsError::Plugin(msg.into())
    }

    /// Wrap this error with the tag of the plugin it originated from
    pub fn with_tag(self, tag: &str) -> Self {
        DnsError::PluginExec {
            tag: tag.to_string(),
            source: Box::new(self),
        }
    }

    /// Whether this error came from the query's cancellation/deadline signal
    ///
    /// Cancellation halts the chain and is propagated unwrapped, so it must
    /// never be re-attributed to an individual plugin.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, DnsError::Cancelled | DnsError::DeadlineExceeded)
    }
}

/// Allow conversion from String to DnsError
impl From<String> for DnsError {
    fn from(s: String) -> Self {
        DnsError::Generic(s)
    }
}

/// Allow conversion from &str to DnsError
impl From<&str> for DnsError {
    fn from(s: &str) -> Self {
        DnsError::Generic(s.to_string())
    }
}

/// Allow conversion from ConfigError to DnsError
impl From<ConfigError> for DnsError {
    fn from(e: ConfigError) -> Self {
        DnsError::Config(e.to_string())
    }
}

/// Convenient type alias for Results using DnsError
pub type Result<T> = std::result::Result<T, DnsError>;
