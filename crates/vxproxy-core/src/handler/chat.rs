use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Extension, State};
use axum::Json;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use http::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::{info, warn};

use vxproxy_common::UpstreamMode;
use vxproxy_protocol::gemini::generate_content::GenerateContentResponse;
use vxproxy_protocol::openai::create_chat_completions::{
    CreateChatCompletionRequest, CreateChatCompletionResponse, CreateChatCompletionStreamResponse,
};
use vxproxy_protocol::sse::{SseEvent, SseParser};
use vxproxy_provider_core::{UpstreamError, UpstreamHttpRequest, execute, vertex};
use vxproxy_transform::generate_content::ChatCompletionMeta;
use vxproxy_transform::generate_content::openai_chat_completions2gemini as native;
use vxproxy_transform::generate_content::openai_chat_completions_passthrough as passthrough;
use vxproxy_transform::{ModelTarget, TransformError};

use super::{PrimedStream, has_sse_event, prime, raw_response, send_checked};
use crate::core::CoreState;
use crate::emitter::{SseSender, sse_channel, sse_data, sse_done, sse_response};
use crate::error::ProxyError;
use crate::middleware::RequestId;

/// Server-side limit for a complete non-streaming exchange, retries included.
const SYNC_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

pub async fn chat_completions(
    State(state): State<Arc<CoreState>>,
    Extension(RequestId(trace_id)): Extension<RequestId>,
    body: Bytes,
) -> Response {
    let request = match parse_request(&body) {
        Ok(request) => request,
        Err(err) => return err.into_response(),
    };
    let target = state.catalog.resolve(&request.model);
    let is_stream = request.stream;
    info!(
        event = "downstream_received",
        trace_id = %trace_id,
        model = %request.model,
        upstream_model = %target.model,
        thinking = ?target.thinking,
        mode = %state.upstream_mode,
        is_stream
    );

    let result = match (state.upstream_mode, is_stream) {
        (UpstreamMode::Native, true) => native_stream(&state, &request, &target, &trace_id).await,
        (UpstreamMode::OpenAi, true) => {
            passthrough_stream(&state, &request, &target, &trace_id).await
        }
        (mode, false) => {
            let call = async {
                match mode {
                    UpstreamMode::Native => native_sync(&state, &request, &target, &trace_id).await,
                    UpstreamMode::OpenAi => {
                        passthrough_sync(&state, &request, &target, &trace_id).await
                    }
                }
            };
            match tokio::time::timeout(SYNC_REQUEST_TIMEOUT, call).await {
                Ok(result) => result,
                Err(_) => Err(ProxyError::openai(
                    StatusCode::GATEWAY_TIMEOUT,
                    "server_error",
                    "upstream request timed out",
                )),
            }
        }
    };

    match result {
        Ok(response) => response,
        Err(err) => {
            warn!(
                event = "chat_completion_failed",
                trace_id = %trace_id,
                status = err.status.as_u16()
            );
            err.into_response()
        }
    }
}

/// The client body as received, plus the fields every path needs. The
/// OpenAI-compatible upstream gets `body` back with only a few keys changed;
/// the native path parses it into the typed request.
#[derive(Debug)]
struct ChatRequest {
    model: String,
    stream: bool,
    body: Map<String, Value>,
}

impl ChatRequest {
    fn typed(&self) -> Result<CreateChatCompletionRequest, ProxyError> {
        serde_json::from_value(Value::Object(self.body.clone()))
            .map_err(|err| TransformError::from(err).into())
    }
}

fn parse_request(body: &[u8]) -> Result<ChatRequest, ProxyError> {
    let body: Map<String, Value> = serde_json::from_slice(body).map_err(TransformError::from)?;
    let model = body
        .get("model")
        .and_then(Value::as_str)
        .filter(|model| !model.trim().is_empty())
        .ok_or(TransformError::MissingField("model"))?
        .to_string();
    let has_messages = body
        .get("messages")
        .and_then(Value::as_array)
        .is_some_and(|messages| !messages.is_empty());
    if !has_messages {
        return Err(TransformError::MissingField("messages").into());
    }
    let stream = body.get("stream").and_then(Value::as_bool).unwrap_or(false);
    Ok(ChatRequest {
        model,
        stream,
        body,
    })
}

fn encode<T: serde::Serialize>(value: &T) -> Result<Bytes, ProxyError> {
    serde_json::to_vec(value)
        .map(Bytes::from)
        .map_err(|err| ProxyError::internal(format!("failed to encode upstream request: {err}")))
}

fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T, UpstreamError> {
    serde_json::from_slice(body).map_err(|err| UpstreamError::Decode(err.to_string()))
}

async fn native_sync(
    state: &CoreState,
    request: &ChatRequest,
    target: &ModelTarget,
    trace_id: &str,
) -> Result<Response, ProxyError> {
    let payload = encode(&native::transform_request(&request.typed()?, target)?)?;
    let client = state.client.as_ref();
    let upstream: GenerateContentResponse = execute(&state.pool, &state.retry, |attempt| {
        let url = vertex::generate_content_url(
            &attempt.project,
            &state.location,
            &target.model,
            attempt.credential.key(),
            false,
        );
        let req = UpstreamHttpRequest::post_json(url, payload.clone());
        async move {
            let response = send_checked(client, req, &attempt, trace_id).await?;
            decode(&response.body.collect().await?)
        }
    })
    .await
    .map_err(ProxyError::from_upstream)?;

    let meta = ChatCompletionMeta::new(request.model.clone());
    Ok(Json(native::transform_response(upstream, &meta)).into_response())
}

async fn passthrough_sync(
    state: &CoreState,
    request: &ChatRequest,
    target: &ModelTarget,
    trace_id: &str,
) -> Result<Response, ProxyError> {
    let payload = encode(&passthrough::transform_request(
        request.body.clone(),
        target,
        false,
    )?)?;
    let client = state.client.as_ref();
    let (status, headers, body) = execute(&state.pool, &state.retry, |attempt| {
        let url = vertex::openai_chat_completions_url(
            &attempt.project,
            &state.location,
            attempt.credential.key(),
        );
        let req = UpstreamHttpRequest::post_json(url, payload.clone());
        async move {
            let response = send_checked(client, req, &attempt, trace_id).await?;
            let body = response.body.collect().await?;
            Ok::<_, UpstreamError>((response.status, response.headers, body))
        }
    })
    .await
    .map_err(ProxyError::from_upstream)?;

    match serde_json::from_slice::<CreateChatCompletionResponse>(&body) {
        Ok(upstream) => Ok(Json(passthrough::transform_response(upstream)).into_response()),
        Err(err) => {
            warn!(
                event = "upstream_body_unparseable",
                trace_id = %trace_id,
                bytes = body.len(),
                error = %err
            );
            Ok(raw_response(status, &headers, body))
        }
    }
}

/// Runs the retry loop up to the first complete upstream event. Failures
/// before that point, including a stream that breaks early, surface as
/// plain errors because nothing has reached the client yet.
async fn open_stream<F>(
    state: &CoreState,
    payload: Bytes,
    trace_id: &str,
    url_for: F,
) -> Result<PrimedStream, ProxyError>
where
    F: Fn(&str, &str) -> String,
{
    let client = state.client.as_ref();
    execute(&state.pool, &state.retry, |attempt| {
        let url = url_for(&attempt.project, attempt.credential.key());
        let req = UpstreamHttpRequest::post_json(url, payload.clone()).streaming();
        async move {
            let response = send_checked(client, req, &attempt, trace_id).await?;
            prime(response.body, has_sse_event).await
        }
    })
    .await
    .map_err(ProxyError::from_upstream)
}

async fn native_stream(
    state: &CoreState,
    request: &ChatRequest,
    target: &ModelTarget,
    trace_id: &str,
) -> Result<Response, ProxyError> {
    let payload = encode(&native::transform_request(&request.typed()?, target)?)?;
    let upstream = open_stream(state, payload, trace_id, |project, key| {
        vertex::generate_content_url(project, &state.location, &target.model, key, true)
    })
    .await?;

    let (tx, rx) = sse_channel();
    let meta = ChatCompletionMeta::new(request.model.clone());
    tokio::spawn(pump(
        upstream,
        tx,
        native::GeminiToOpenAIChatCompletionStreamState::new(meta),
        trace_id.to_string(),
    ));
    Ok(sse_response(rx))
}

async fn passthrough_stream(
    state: &CoreState,
    request: &ChatRequest,
    target: &ModelTarget,
    trace_id: &str,
) -> Result<Response, ProxyError> {
    let payload = encode(&passthrough::transform_request(
        request.body.clone(),
        target,
        true,
    )?)?;
    let upstream = open_stream(state, payload, trace_id, |project, key| {
        vertex::openai_chat_completions_url(project, &state.location, key)
    })
    .await?;

    let (tx, rx) = sse_channel();
    tokio::spawn(pump(
        upstream,
        tx,
        passthrough::OpenAIChatCompletionReasoningStreamState::new(),
        trace_id.to_string(),
    ));
    Ok(sse_response(rx))
}

/// One step of a stream pump: what to do with a parsed SSE event.
trait StreamTranslator {
    /// Returns `None` when the event's JSON did not parse.
    fn translate(&mut self, data: &str) -> Option<Vec<CreateChatCompletionStreamResponse>>;
    fn finish(&mut self) -> Vec<CreateChatCompletionStreamResponse>;
}

impl StreamTranslator for native::GeminiToOpenAIChatCompletionStreamState {
    fn translate(&mut self, data: &str) -> Option<Vec<CreateChatCompletionStreamResponse>> {
        let chunk: GenerateContentResponse = serde_json::from_str(data).ok()?;
        Some(self.transform_response(chunk))
    }

    fn finish(&mut self) -> Vec<CreateChatCompletionStreamResponse> {
        native::GeminiToOpenAIChatCompletionStreamState::finish(self)
    }
}

impl StreamTranslator for passthrough::OpenAIChatCompletionReasoningStreamState {
    fn translate(&mut self, data: &str) -> Option<Vec<CreateChatCompletionStreamResponse>> {
        let chunk: CreateChatCompletionStreamResponse = serde_json::from_str(data).ok()?;
        Some(self.transform_chunk(chunk))
    }

    fn finish(&mut self) -> Vec<CreateChatCompletionStreamResponse> {
        passthrough::OpenAIChatCompletionReasoningStreamState::finish(self)
    }
}

/// Parses upstream SSE, translates each event and forwards it. Upstream
/// `[DONE]` ends the read; the final chunks and a single `[DONE]` always
/// close the downstream stream. Dropping `upstream` on return aborts the
/// upstream read.
async fn pump<T: StreamTranslator>(
    mut upstream: PrimedStream,
    tx: SseSender,
    mut translator: T,
    trace_id: String,
) {
    let trace_id = trace_id.as_str();
    let mut parser = SseParser::new();
    let mut forwarded = 0usize;
    'read: while let Some(item) = upstream.recv().await {
        let chunk = match item {
            Ok(chunk) => chunk,
            Err(err) => {
                let err = UpstreamError::from(err);
                warn!(
                    event = "upstream_stream_failed",
                    trace_id = %trace_id,
                    forwarded,
                    error = %err
                );
                tx.fail(err.to_string()).await;
                return;
            }
        };
        for event in parser.push_bytes(&chunk) {
            match forward_event(&tx, &mut translator, &event, trace_id).await {
                Forwarded::Sent(count) => forwarded += count,
                Forwarded::Done => break 'read,
                Forwarded::Disconnected => return,
            }
        }
    }
    for event in parser.finish() {
        match forward_event(&tx, &mut translator, &event, trace_id).await {
            Forwarded::Sent(count) => forwarded += count,
            Forwarded::Done => break,
            Forwarded::Disconnected => return,
        }
    }

    for chunk in translator.finish() {
        if !tx.send_json(&chunk).await {
            return;
        }
        forwarded += 1;
    }
    if tx.send(sse_done()).await {
        info!(event = "stream_completed", trace_id = %trace_id, forwarded);
    }
}

enum Forwarded {
    Sent(usize),
    Done,
    Disconnected,
}

async fn forward_event<T: StreamTranslator>(
    tx: &SseSender,
    translator: &mut T,
    event: &SseEvent,
    trace_id: &str,
) -> Forwarded {
    if event.is_done() {
        return Forwarded::Done;
    }
    if event.data.trim().is_empty() {
        return Forwarded::Sent(0);
    }
    let Some(chunks) = translator.translate(&event.data) else {
        warn!(
            event = "upstream_chunk_unparseable",
            trace_id = %trace_id,
            bytes = event.data.len()
        );
        return if tx.send(sse_data(event.data.as_bytes())).await {
            Forwarded::Sent(1)
        } else {
            Forwarded::Disconnected
        };
    };
    let mut sent = 0;
    for chunk in &chunks {
        if !tx.send_json(chunk).await {
            return Forwarded::Disconnected;
        }
        sent += 1;
    }
    Forwarded::Sent(sent)
}
