//! Notification sinks.
//!
//! The engine reports diagnostics through an injected [`Notifier`] instead of
//! writing to process-wide hooks, so every engine (and every test) owns its
//! own sinks.

use std::fmt;

/// One-way diagnostic sinks used by the engine.
pub trait Notifier: Send + Sync + fmt::Debug {
    /// Verbose diagnostics, only emitted in diagnostic mode.
    fn info(&self, message: &str);

    /// Failures, emitted right before a fallback response is produced.
    fn error(&self, message: &str);
}

/// Forwards notifications to `tracing`, tagged with the instance name.
#[derive(Debug, Clone)]
pub struct TracingNotifier {
    instance: String,
}

impl TracingNotifier {
    pub fn new(instance: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
        }
    }
}

impl Notifier for TracingNotifier {
    fn info(&self, message: &str) {
        tracing::info!(instance = %self.instance, "{}", message);
    }

    fn error(&self, message: &str) {
        tracing::error!(instance = %self.instance, "{}", message);
    }
}
