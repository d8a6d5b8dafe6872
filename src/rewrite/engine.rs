//! Override engine.
//!
//! # Responsibilities
//! - Match rules against the status the upstream declared
//! - Merge headers and rewrite the body per matching rule
//! - Recompute `Content-Length` and add the diagnostic marker
//! - Emit the final response exactly once, or a clean fallback on failure
//!
//! # Design Decisions
//! - Rules are matched against the original status for the whole pass, so
//!   several rules sharing a `from` code chain: each one fires in order and
//!   the last target status wins
//! - Headers are replaced by name, never merged by value
//! - The emitted response is fully built before the host flushes anything

use std::sync::Arc;

use axum::body::{Body, Bytes, HttpBody};
use axum::http::{header, HeaderValue, Response, StatusCode};
use axum::BoxError;
use bytes::BytesMut;
use thiserror::Error;

use crate::config::loader::ConfigError;
use crate::config::schema::{BodyMode, OverrideConfig};
use crate::http::capture::{CapturedResponse, ResponseCapture};
use crate::observability::metrics;
use crate::rewrite::notify::Notifier;
use crate::rewrite::rule::{compile_rules, instance_marker, CompiledRule};

/// Marker header naming the instance that rewrote a response.
pub const X_APPLIED_OVERRIDE: &str = "x-applied-override";

/// Request-time failure of a rule pass.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum OverrideError {
    #[error("unsupported override mode {mode:?} in override #{rule}")]
    UnsupportedMode { rule: usize, mode: String },
}

/// Rewrites buffered upstream responses with an ordered rule list.
#[derive(Debug)]
pub struct OverrideEngine {
    name: String,
    marker: HeaderValue,
    debug: bool,
    rules: Vec<CompiledRule>,
    notifier: Arc<dyn Notifier>,
}

impl OverrideEngine {
    /// Compile the rule set. Fails if there are no rules or any rule is malformed.
    pub fn new(config: &OverrideConfig, notifier: Arc<dyn Notifier>) -> Result<Self, ConfigError> {
        let rules = compile_rules(config).map_err(ConfigError::Validation)?;
        let marker = instance_marker(&config.name).map_err(|e| ConfigError::Validation(vec![e]))?;

        if config.debug {
            notifier.info(&format!("defined config {}: {:?}", config.name, config));
        }

        Ok(Self {
            name: config.name.clone(),
            marker,
            debug: config.debug,
            rules,
            notifier,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Run every rule against `response`, then fix up `Content-Length` and the
    /// diagnostic marker. Returns whether any rule matched.
    pub fn apply(&self, response: &mut CapturedResponse) -> Result<bool, OverrideError> {
        let original = response.original_status();
        let mut applied = false;

        for (index, rule) in self.rules.iter().enumerate() {
            if !rule.matches(original) {
                continue;
            }
            applied = true;
            response.status = rule.target();

            for name in &rule.remove_headers {
                response.headers.remove(name);
            }

            for (name, values) in &rule.set_headers {
                response.headers.remove(name);
                for value in values {
                    response.headers.append(name.clone(), value.clone());
                }
            }

            rewrite_body(&mut response.body, rule).map_err(|mode| OverrideError::UnsupportedMode {
                rule: index + 1,
                mode,
            })?;

            if self.debug {
                self.notifier.info(&format!(
                    "override #{} matched {} -> {}",
                    index + 1,
                    original.as_u16(),
                    rule.target().as_u16()
                ));
            }
        }

        response
            .headers
            .insert(header::CONTENT_LENGTH, HeaderValue::from(response.body.len()));

        if applied && self.debug {
            response.headers.append(X_APPLIED_OVERRIDE, self.marker.clone());
        }

        Ok(applied)
    }

    /// Rewrite a finished capture and build the response to emit.
    ///
    /// A rule pass failure is reported to the error sink and answered with a
    /// `500`; nothing from the failed pass is emitted.
    pub fn respond(&self, capture: ResponseCapture) -> Response<Body> {
        let mut captured = capture.finish();

        match self.apply(&mut captured) {
            Ok(applied) => {
                metrics::record_rewrite(&self.name, applied);
                self.emit(captured)
            }
            Err(e) => {
                metrics::record_failure(&self.name, "unsupported_mode");
                self.fail(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string())
            }
        }
    }

    /// Invoke a synchronous upstream handler once against a fresh capture.
    pub fn serve<F>(&self, handler: F) -> Response<Body>
    where
        F: FnOnce(&mut ResponseCapture),
    {
        let mut capture = ResponseCapture::new();
        handler(&mut capture);
        self.respond(capture)
    }

    /// Buffer an upstream response and rewrite it.
    pub async fn process<B>(&self, response: Response<B>) -> Response<Body>
    where
        B: HttpBody<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        match ResponseCapture::from_response(response).await {
            Ok(capture) => self.respond(capture),
            Err(e) => {
                metrics::record_failure(&self.name, "capture");
                self.fail(StatusCode::BAD_GATEWAY, &e.to_string())
            }
        }
    }

    fn emit(&self, captured: CapturedResponse) -> Response<Body> {
        if self.debug {
            self.notifier.info(&format!(
                "writing body: [{}] {}",
                captured.body.len(),
                String::from_utf8_lossy(&captured.body)
            ));
        }
        captured.into_response()
    }

    fn fail(&self, status: StatusCode, message: &str) -> Response<Body> {
        self.notifier.error(message);

        let reason = status.canonical_reason().unwrap_or("Error");
        let mut response = Response::new(Body::from(reason));
        *response.status_mut() = status;
        response
            .headers_mut()
            .insert(header::CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"));
        response
            .headers_mut()
            .insert(header::CONTENT_LENGTH, HeaderValue::from(reason.len()));
        response
    }
}

/// Apply one rule's body mode. Returns the offending mode string if unsupported.
fn rewrite_body(body: &mut BytesMut, rule: &CompiledRule) -> Result<(), String> {
    match rule.mode() {
        BodyMode::Keep => {}
        BodyMode::Append => body.extend_from_slice(&rule.body),
        BodyMode::Prepend => {
            let mut prefixed = BytesMut::with_capacity(rule.body.len() + body.len());
            prefixed.extend_from_slice(&rule.body);
            prefixed.extend_from_slice(body);
            *body = prefixed;
        }
        BodyMode::Replace => {
            body.clear();
            body.extend_from_slice(&rule.body);
        }
        BodyMode::Unsupported(mode) => return Err(mode.clone()),
    }
    Ok(())
}
