use std::convert::Infallible;

use axum::body::Body;
use axum::response::Response;
use bytes::Bytes;
use futures_util::StreamExt;
use http::header::{CACHE_CONTROL, CONNECTION, CONTENT_TYPE};
use http::{HeaderValue, StatusCode};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use vxproxy_protocol::error::ErrorResponse;

/// Bound on SSE frames queued toward a slow client.
pub const EVENT_CHANNEL_CAPACITY: usize = 16;

pub fn sse_json<T: Serialize>(value: &T) -> Option<Bytes> {
    let json = serde_json::to_vec(value).ok()?;
    Some(sse_data(&json))
}

/// Wraps an already-encoded payload as one `data:` frame.
pub fn sse_data(payload: &[u8]) -> Bytes {
    let mut out = Vec::with_capacity(payload.len() + 8);
    out.extend_from_slice(b"data: ");
    out.extend_from_slice(payload);
    out.extend_from_slice(b"\n\n");
    Bytes::from(out)
}

pub fn sse_done() -> Bytes {
    Bytes::from_static(b"data: [DONE]\n\n")
}

pub fn sse_error(message: impl Into<String>) -> Bytes {
    let body = ErrorResponse::new(message, "server_error");
    sse_json(&body).unwrap_or_else(|| {
        Bytes::from_static(b"data: {\"error\":{\"message\":\"stream failed\",\"type\":\"server_error\"}}\n\n")
    })
}

/// Write half of an SSE response. Sends fail once the client has gone away.
#[derive(Debug, Clone)]
pub struct SseSender {
    tx: mpsc::Sender<Bytes>,
}

impl SseSender {
    /// Returns `false` when the downstream receiver was dropped.
    pub async fn send(&self, frame: Bytes) -> bool {
        self.tx.send(frame).await.is_ok()
    }

    pub async fn send_json<T: Serialize>(&self, value: &T) -> bool {
        match sse_json(value) {
            Some(frame) => self.send(frame).await,
            None => true,
        }
    }

    /// Terminal error frame followed by `[DONE]`.
    pub async fn fail(&self, message: impl Into<String>) {
        if self.send(sse_error(message)).await {
            let _ = self.send(sse_done()).await;
        }
    }
}

pub fn sse_channel() -> (SseSender, mpsc::Receiver<Bytes>) {
    let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    (SseSender { tx }, rx)
}

pub fn sse_response(rx: mpsc::Receiver<Bytes>) -> Response {
    stream_response(rx, "text/event-stream")
}

/// Streams frames from `rx` as the response body.
pub fn stream_response(rx: mpsc::Receiver<Bytes>, content_type: &str) -> Response {
    let stream = ReceiverStream::new(rx).map(Ok::<_, Infallible>);
    let mut response = Response::new(Body::from_stream(stream));
    *response.status_mut() = StatusCode::OK;
    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(content_type) {
        headers.insert(CONTENT_TYPE, value);
    }
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
    headers.insert("x-accel-buffering", HeaderValue::from_static("no"));
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_are_data_lines() {
        assert_eq!(&sse_data(br#"{"a":1}"#)[..], b"data: {\"a\":1}\n\n");
        assert_eq!(&sse_done()[..], b"data: [DONE]\n\n");
    }

    #[test]
    fn error_frame_shape() {
        let frame = sse_error("boom");
        let text = std::str::from_utf8(&frame).unwrap();
        let json: serde_json::Value =
            serde_json::from_str(text.trim_start_matches("data: ").trim()).unwrap();
        assert_eq!(json["error"]["message"], "boom");
        assert_eq!(json["error"]["type"], "server_error");
        assert!(json["error"].get("code").is_none());
    }

    #[tokio::test]
    async fn send_reports_dropped_receiver() {
        let (tx, rx) = sse_channel();
        assert!(tx.send(sse_done()).await);
        drop(rx);
        assert!(!tx.send(sse_done()).await);
    }
}
