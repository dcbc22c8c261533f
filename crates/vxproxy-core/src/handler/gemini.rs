use std::sync::Arc;

use axum::extract::{Extension, Path, State};
use axum::response::{IntoResponse, Response};
use bytes::{Bytes, BytesMut};
use tracing::{info, warn};
use vxproxy_provider_core::{Headers, UpstreamError, UpstreamHttpRequest, execute, vertex};

use super::{PrimedStream, has_line, prime, raw_response, send_checked};
use crate::core::CoreState;
use crate::emitter::{SseSender, sse_channel, stream_response};
use crate::error::ProxyError;
use crate::middleware::RequestId;

const STREAM_ACTION: &str = "streamGenerateContent";

/// Splits `gemini-2.5-pro:generateContent` into model and action.
pub fn parse_model_action(path: &str) -> Option<(&str, &str)> {
    let (model, action) = path.split_once(':')?;
    if model.is_empty() || action.is_empty() || model.contains('/') {
        return None;
    }
    Some((model, action))
}

pub async fn gemini_passthrough(
    State(state): State<Arc<CoreState>>,
    Extension(RequestId(trace_id)): Extension<RequestId>,
    Path(model_action): Path<String>,
    body: Bytes,
) -> Response {
    let Some((model, action)) = parse_model_action(&model_action) else {
        return ProxyError::bad_request(
            "Invalid path format. Expected: /gemini/v1beta/models/{model}:{action}",
        )
        .into_response();
    };
    let is_stream = action == STREAM_ACTION;
    info!(
        event = "downstream_received",
        trace_id = %trace_id,
        model = %model,
        action = %action,
        is_stream
    );

    let client = state.client.as_ref();
    let location = state.location.as_str();
    let trace = trace_id.as_str();
    let result = execute(&state.pool, &state.retry, |attempt| {
        let url = vertex::gemini_passthrough_url(
            &attempt.project,
            location,
            model,
            action,
            attempt.credential.key(),
        );
        let mut req = UpstreamHttpRequest::post_json(url, body.clone());
        if is_stream {
            req = req.streaming();
        }
        async move {
            let response = send_checked(client, req, &attempt, trace).await?;
            if is_stream {
                return Ok(Relay::Stream(prime(response.body, has_line).await?));
            }
            let body = response.body.collect().await?;
            Ok::<_, UpstreamError>(Relay::Complete(response.status, response.headers, body))
        }
    })
    .await;

    match result {
        Ok(Relay::Stream(upstream)) => {
            let (tx, rx) = sse_channel();
            tokio::spawn(relay_lines(upstream, tx, trace_id));
            stream_response(rx, "text/event-stream")
        }
        Ok(Relay::Complete(status, headers, body)) => raw_response(status, &headers, body),
        Err(err) => {
            warn!(event = "gemini_passthrough_failed", trace_id = %trace_id, error = %err);
            ProxyError::from_upstream(err).into_response()
        }
    }
}

enum Relay {
    Stream(PrimedStream),
    Complete(u16, Headers, Bytes),
}

/// Forwards the upstream body one complete line at a time.
async fn relay_lines(mut upstream: PrimedStream, tx: SseSender, trace_id: String) {
    let mut pending = BytesMut::new();
    let mut lines = 0usize;
    while let Some(item) = upstream.recv().await {
        let chunk = match item {
            Ok(chunk) => chunk,
            Err(err) => {
                warn!(event = "upstream_stream_failed", trace_id = %trace_id, lines, error = ?err);
                return;
            }
        };
        pending.extend_from_slice(&chunk);
        while let Some(pos) = pending.iter().position(|byte| *byte == b'\n') {
            let line = pending.split_to(pos + 1).freeze();
            if !tx.send(line).await {
                return;
            }
            lines += 1;
        }
    }
    if !pending.is_empty() {
        let mut last = pending;
        last.extend_from_slice(b"\n");
        if !tx.send(last.freeze()).await {
            return;
        }
        lines += 1;
    }
    info!(event = "stream_completed", trace_id = %trace_id, lines);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_model_and_action() {
        assert_eq!(
            parse_model_action("gemini-2.5-pro:streamGenerateContent"),
            Some(("gemini-2.5-pro", "streamGenerateContent"))
        );
        assert_eq!(parse_model_action("gemini-2.5-pro"), None);
        assert_eq!(parse_model_action(":generateContent"), None);
        assert_eq!(parse_model_action("gemini-2.5-pro:"), None);
    }
}
