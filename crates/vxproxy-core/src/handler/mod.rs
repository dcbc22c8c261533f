pub mod chat;
pub mod gemini;
pub mod health;
pub mod models;

use std::time::Instant;

use axum::body::Body;
use axum::response::Response;
use bytes::{Bytes, BytesMut};
use http::header::CONTENT_TYPE;
use http::{HeaderValue, StatusCode};
use tokio::sync::mpsc;
use tracing::info;
use vxproxy_provider_core::{
    Attempt, ByteStream, Headers, UpstreamBody, UpstreamClient, UpstreamError, UpstreamFailure,
    UpstreamHttpRequest, UpstreamHttpResponse, header_get, redact_key,
};

/// Sends one attempt. Non-2xx responses are drained and returned as
/// `UpstreamError::Http` so the retry loop treats them as failures.
pub(crate) async fn send_checked(
    client: &dyn UpstreamClient,
    request: UpstreamHttpRequest,
    attempt: &Attempt,
    trace_id: &str,
) -> Result<UpstreamHttpResponse, UpstreamError> {
    let started_at = Instant::now();
    let url = redact_key(&request.url);
    let is_stream = request.is_stream;
    let response = client.send(request).await?;
    info!(
        event = "upstream_request",
        trace_id = %trace_id,
        url = %url,
        attempt = attempt.number,
        credential_index = attempt.credential.index(),
        status = response.status,
        is_stream,
        elapsed_ms = started_at.elapsed().as_millis()
    );
    if response.is_success() {
        return Ok(response);
    }
    let status = response.status;
    let headers = response.headers;
    let body = response.body.collect().await?;
    Err(UpstreamError::Http {
        status,
        headers,
        body,
    })
}

/// Uniform chunk receiver over either body shape.
fn body_stream(body: UpstreamBody) -> ByteStream {
    match body {
        UpstreamBody::Stream(rx) => rx,
        UpstreamBody::Bytes(bytes) => {
            let (tx, rx) = mpsc::channel(1);
            let _ = tx.try_send(Ok(bytes));
            rx
        }
    }
}

/// Forwards an upstream body as received, keeping its status and content type.
pub(crate) fn raw_response(status: u16, headers: &Headers, body: Bytes) -> Response {
    let mut response = Response::new(Body::from(body));
    *response.status_mut() = StatusCode::from_u16(status).unwrap_or(StatusCode::OK);
    let content_type = header_get(headers, "content-type").unwrap_or("application/json");
    if let Ok(value) = HeaderValue::from_str(content_type) {
        response.headers_mut().insert(CONTENT_TYPE, value);
    }
    response
}

/// A streamed body whose first bytes were already read inside the retry loop.
pub(crate) struct PrimedStream {
    head: Option<Bytes>,
    rest: ByteStream,
}

impl PrimedStream {
    pub(crate) async fn recv(&mut self) -> Option<Result<Bytes, UpstreamFailure>> {
        if let Some(head) = self.head.take() {
            return Some(Ok(head));
        }
        self.rest.recv().await
    }
}

/// Reads ahead until `ready` accepts the buffered prefix or the body ends.
/// A connection that breaks before that point fails the attempt, so nothing
/// has reached the client yet and the retry loop may try another credential.
pub(crate) async fn prime(
    body: UpstreamBody,
    ready: fn(&[u8]) -> bool,
) -> Result<PrimedStream, UpstreamError> {
    let mut rest = body_stream(body);
    let mut head = BytesMut::new();
    while !ready(&head) {
        match rest.recv().await {
            Some(chunk) => head.extend_from_slice(&chunk?),
            None => break,
        }
    }
    Ok(PrimedStream {
        head: (!head.is_empty()).then(|| head.freeze()),
        rest,
    })
}

/// At least one complete SSE event is buffered.
pub(crate) fn has_sse_event(buf: &[u8]) -> bool {
    buf.windows(2).any(|w| w == b"\n\n" || w == b"\r\r")
        || buf.windows(4).any(|w| w == b"\r\n\r\n")
}

/// At least one complete line is buffered.
pub(crate) fn has_line(buf: &[u8]) -> bool {
    buf.contains(&b'\n')
}
