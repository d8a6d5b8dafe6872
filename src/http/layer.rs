//! Tower middleware running the override engine on every response.
//!
//! # Responsibilities
//! - Call the inner service (the upstream handler) exactly once per request
//! - Buffer its response and hand it to the current [`OverrideEngine`]
//! - Tag the rewrite with the request ID for tracing
//!
//! # Design Decisions
//! - The engine lives in an `ArcSwap`; each request loads one snapshot and
//!   keeps it for the whole pass, so reloads never split a pass
//! - Errors of the inner service pass through untouched

use std::sync::Arc;
use std::task::{Context, Poll};

use arc_swap::ArcSwap;
use axum::body::{Body, Bytes, HttpBody};
use axum::http::{Request, Response};
use axum::BoxError;
use futures_util::future::BoxFuture;
use tower::{Layer, Service};
use tracing::Instrument;

use crate::rewrite::OverrideEngine;

/// Applies response overrides to an inner service.
#[derive(Clone)]
pub struct ResponseOverrideLayer {
    engine: Arc<ArcSwap<OverrideEngine>>,
}

impl ResponseOverrideLayer {
    /// Layer with a fixed engine.
    pub fn new(engine: OverrideEngine) -> Self {
        Self::shared(Arc::new(ArcSwap::from_pointee(engine)))
    }

    /// Layer reading the engine from a swappable slot.
    pub fn shared(engine: Arc<ArcSwap<OverrideEngine>>) -> Self {
        Self { engine }
    }
}

impl<S> Layer<S> for ResponseOverrideLayer {
    type Service = ResponseOverride<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ResponseOverride {
            inner,
            engine: self.engine.clone(),
        }
    }
}

/// Service produced by [`ResponseOverrideLayer`].
#[derive(Clone)]
pub struct ResponseOverride<S> {
    inner: S,
    engine: Arc<ArcSwap<OverrideEngine>>,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for ResponseOverride<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: Send + 'static,
    ReqBody: Send + 'static,
    ResBody: HttpBody<Data = Bytes> + Send + 'static,
    ResBody::Error: Into<BoxError>,
{
    type Response = Response<Body>;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<ReqBody>) -> Self::Future {
        // The ready clone must serve this call; leave a fresh clone behind.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let engine = self.engine.load_full();

        let request_id = request
            .headers()
            .get("x-request-id")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown")
            .to_string();
        let span = tracing::debug_span!(
            "response_override",
            instance = %engine.name(),
            request_id = %request_id
        );

        Box::pin(
            async move {
                let response = inner.call(request).await?;
                let status = response.status();
                let rewritten = engine.process(response).await;

                tracing::debug!(
                    upstream_status = status.as_u16(),
                    status = rewritten.status().as_u16(),
                    "Response rewritten"
                );
                Ok(rewritten)
            }
            .instrument(span),
        )
    }
}
