//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Root configuration for the response override proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// The single upstream every request is forwarded to.
    pub upstream: UpstreamConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Override rules applied to upstream responses.
    pub response_override: OverrideConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Upstream server configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Upstream address (e.g., "127.0.0.1:3000").
    pub address: String,

    /// Connection establishment timeout in seconds.
    pub connect_timeout_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:3000".to_string(),
            connect_timeout_secs: 5,
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    /// Also bounds how long an upstream body may take to be buffered.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human readable output for development.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// A named set of override rules.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct OverrideConfig {
    /// Instance name, reported in the diagnostic marker header.
    pub name: String,

    /// Diagnostic mode: verbose notifications and the marker header.
    pub debug: bool,

    /// Rules, evaluated in declaration order.
    pub overrides: Vec<OverrideRule>,
}

impl Default for OverrideConfig {
    fn default() -> Self {
        Self {
            name: "response-override".to_string(),
            debug: false,
            overrides: Vec::new(),
        }
    }
}

/// A single override rule.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Default)]
pub struct OverrideRule {
    /// Status codes this rule triggers on.
    pub from: Vec<u16>,

    /// Status code assigned when the rule triggers.
    pub to: u16,

    /// Headers to set; each listed name has its values fully replaced.
    #[serde(default)]
    pub headers: BTreeMap<String, Vec<String>>,

    /// Header names deleted before `headers` is applied.
    #[serde(default, alias = "removeHeaders")]
    pub remove_headers: Vec<String>,

    /// Body text, combined with the current body according to `mode`.
    #[serde(default)]
    pub body: String,

    /// How `body` is combined with the current body.
    #[serde(default)]
    pub mode: BodyMode,
}

/// Body rewrite policy of a rule.
///
/// Unknown mode strings deserialize into [`BodyMode::Unsupported`] and are
/// rejected when a matching response is rewritten.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(from = "String", into = "String")]
pub enum BodyMode {
    /// Discard the current body and use the rule's body.
    #[default]
    Replace,
    /// Leave the current body untouched.
    Keep,
    /// Current body followed by the rule's body.
    Append,
    /// Rule's body followed by the current body.
    Prepend,
    /// Anything else.
    Unsupported(String),
}

impl From<String> for BodyMode {
    fn from(mode: String) -> Self {
        match mode.as_str() {
            "" | "replace" => BodyMode::Replace,
            "keep" => BodyMode::Keep,
            "append" => BodyMode::Append,
            "prepend" => BodyMode::Prepend,
            _ => BodyMode::Unsupported(mode),
        }
    }
}

impl From<&str> for BodyMode {
    fn from(mode: &str) -> Self {
        BodyMode::from(mode.to_string())
    }
}

impl From<BodyMode> for String {
    fn from(mode: BodyMode) -> Self {
        mode.to_string()
    }
}

impl fmt::Display for BodyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BodyMode::Replace => f.write_str("replace"),
            BodyMode::Keep => f.write_str("keep"),
            BodyMode::Append => f.write_str("append"),
            BodyMode::Prepend => f.write_str("prepend"),
            BodyMode::Unsupported(mode) => f.write_str(mode),
        }
    }
}
