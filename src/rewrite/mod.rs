//! Response rewrite subsystem.
//!
//! # Data Flow
//! ```text
//! OverrideConfig
//!     → rule.rs (compile: status codes, header names/values, body mode)
//!     → engine.rs (immutable OverrideEngine, shared via Arc)
//!
//! Per request:
//!     CapturedResponse (from http::capture)
//!     → engine.rs (match on original status → merge headers → rewrite body)
//!     → Content-Length + diagnostic marker
//!     → emitted Response
//!
//! Diagnostics:
//!     engine.rs → notify.rs (info / error sinks, injected)
//! ```

pub mod engine;
pub mod notify;
pub mod rule;

pub use engine::{OverrideEngine, OverrideError, X_APPLIED_OVERRIDE};
pub use notify::{Notifier, TracingNotifier};
pub use rule::CompiledRule;
