//! Response override proxy library.
//!
//! Buffers upstream HTTP responses and rewrites their status, headers and body
//! with ordered rules keyed on the upstream status code.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod rewrite;

pub use config::schema::ProxyConfig;
pub use http::{HttpServer, ResponseCapture, ResponseOverrideLayer};
pub use lifecycle::Shutdown;
pub use rewrite::{Notifier, OverrideEngine};
