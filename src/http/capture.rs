//! Response capture.
//!
//! # Responsibilities
//! - Stand in for the client-facing writer while the upstream produces its response
//! - Record status, headers and every body write without forwarding anything
//! - Hand the buffered response to the override engine as a [`CapturedResponse`]
//!
//! # Design Decisions
//! - No size cap: the whole upstream body is held in memory for the request.
//!   Bounding it (request timeout, upstream limits) is the deployment's job.
//! - Status declarations overwrite each other; the value present when
//!   [`ResponseCapture::finish`] runs becomes the match key for the rule pass.

use std::io;

use axum::body::{Body, Bytes, HttpBody};
use axum::http::{HeaderMap, Response, StatusCode};
use axum::BoxError;
use bytes::BytesMut;
use futures_util::StreamExt;
use thiserror::Error;

/// Failure while buffering an upstream response.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("cannot read upstream response body: {0}")]
    Body(#[from] axum::Error),
}

/// Buffers an upstream response instead of streaming it.
#[derive(Debug, Default)]
pub struct ResponseCapture {
    status: StatusCode,
    headers: HeaderMap,
    body: BytesMut,
}

impl ResponseCapture {
    /// An empty capture with status `200 OK`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain an upstream response into a capture, chunk by chunk.
    pub async fn from_response<B>(response: Response<B>) -> Result<Self, CaptureError>
    where
        B: HttpBody<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        let (parts, body) = response.into_parts();

        let mut capture = Self::new();
        capture.declare_status(parts.status);
        *capture.headers_mut() = parts.headers;

        let mut chunks = Body::new(body).into_data_stream();
        while let Some(chunk) = chunks.next().await {
            capture.write(&chunk?);
        }

        Ok(capture)
    }

    /// Record the status code. The last declaration wins.
    pub fn declare_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Append to the body buffer. Always accepts every byte.
    pub fn write(&mut self, bytes: &[u8]) -> usize {
        self.body.extend_from_slice(bytes);
        bytes.len()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Header map as the upstream sees it: `insert` replaces, `append` adds a value.
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Freeze the capture. The current status becomes the original status.
    pub fn finish(self) -> CapturedResponse {
        CapturedResponse {
            original_status: self.status,
            status: self.status,
            headers: self.headers,
            body: self.body,
        }
    }
}

impl io::Write for ResponseCapture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(ResponseCapture::write(self, buf))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// A fully buffered response going through one rule pass.
#[derive(Debug, Clone)]
pub struct CapturedResponse {
    original_status: StatusCode,
    /// Working status, updated by every matching rule.
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: BytesMut,
}

impl CapturedResponse {
    /// Status declared by the upstream. Rules always match against this.
    pub fn original_status(&self) -> StatusCode {
        self.original_status
    }

    /// Build the client-facing response. Nothing is flushed until the host
    /// writes it, so the whole response is known before the first byte leaves.
    pub fn into_response(self) -> Response<Body> {
        let mut response = Response::new(Body::from(self.body.freeze()));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}
