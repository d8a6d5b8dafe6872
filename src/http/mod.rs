//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, timeout)
//!     → layer.rs (ResponseOverrideLayer)
//!     → server.rs proxy_handler (forward to upstream)
//!     → capture.rs (buffer upstream status, headers, body)
//!     → rewrite engine (rules, Content-Length, marker)
//!     → Send to client
//! ```

pub mod capture;
pub mod layer;
pub mod server;

pub use capture::{CaptureError, CapturedResponse, ResponseCapture};
pub use layer::{ResponseOverride, ResponseOverrideLayer};
pub use server::HttpServer;
