use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use bytes::Bytes;
use http::{HeaderMap, Method, Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use vxproxy_common::{GlobalConfigPatch, UpstreamMode};
use vxproxy_core::{REQUEST_ID_HEADER, bootstrap_with_client};
use vxproxy_provider_core::{
    UpstreamBody, UpstreamClient, UpstreamFailure, UpstreamHttpRequest, UpstreamHttpResponse,
    UpstreamTransportErrorKind, header_get,
};

enum Reply {
    Json(u16, Value),
    Stream(Vec<&'static str>),
    /// Sends the chunks, then breaks the connection.
    BrokenStream(Vec<&'static str>),
    Unreachable,
}

#[derive(Default)]
struct ScriptedClient {
    replies: Mutex<VecDeque<Reply>>,
    seen: Mutex<Vec<UpstreamHttpRequest>>,
}

impl ScriptedClient {
    fn new(replies: Vec<Reply>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            seen: Mutex::new(Vec::new()),
        })
    }

    fn seen(&self) -> Vec<UpstreamHttpRequest> {
        self.seen.lock().unwrap().clone()
    }
}

fn stream_body(chunks: Vec<&'static str>, broken: bool) -> UpstreamBody {
    let (tx, rx) = tokio::sync::mpsc::channel(chunks.len() + 1);
    for chunk in chunks {
        tx.try_send(Ok(Bytes::from_static(chunk.as_bytes()))).unwrap();
    }
    if broken {
        tx.try_send(Err(UpstreamFailure::Transport {
            kind: UpstreamTransportErrorKind::ReadTimeout,
            message: "connection reset".to_string(),
        }))
        .unwrap();
    }
    UpstreamBody::Stream(rx)
}

impl UpstreamClient for ScriptedClient {
    fn send<'a>(
        &'a self,
        req: UpstreamHttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<UpstreamHttpResponse, UpstreamFailure>> + Send + 'a>>
    {
        self.seen.lock().unwrap().push(req);
        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Reply::Unreachable);
        Box::pin(async move {
            let (status, body) = match reply {
                Reply::Json(status, value) => (
                    status,
                    UpstreamBody::Bytes(Bytes::from(serde_json::to_vec(&value).unwrap())),
                ),
                Reply::Stream(chunks) => (200, stream_body(chunks, false)),
                Reply::BrokenStream(chunks) => (200, stream_body(chunks, true)),
                Reply::Unreachable => {
                    return Err(UpstreamFailure::Transport {
                        kind: UpstreamTransportErrorKind::Connect,
                        message: "connection refused".to_string(),
                    });
                }
            };
            Ok(UpstreamHttpResponse {
                status,
                headers: vec![("content-type".to_string(), "application/json".to_string())],
                body,
            })
        })
    }
}

async fn router(client: Arc<ScriptedClient>, mode: UpstreamMode) -> Router {
    let global = GlobalConfigPatch {
        api_key: Some("secret".to_string()),
        vertex_keys: Some(vec!["k1".to_string(), "k2".to_string()]),
        round_robin: Some(true),
        project_id: Some("proj".to_string()),
        retry_max: Some(1),
        retry_interval_ms: Some(1),
        models_file: Some("/nonexistent/vertexModels.json".to_string()),
        upstream_mode: Some(mode),
        ..GlobalConfigPatch::default()
    }
    .into_config()
    .unwrap();
    bootstrap_with_client(global, client)
        .await
        .unwrap()
        .core
        .router()
}

fn authed(method: Method, uri: &str, body: Body) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("authorization", "Bearer secret")
        .header("content-type", "application/json")
        .body(body)
        .unwrap()
}

fn chat_body(model: &str, stream: bool) -> Body {
    Body::from(
        json!({
            "model": model,
            "messages": [{"role": "user", "content": "hi"}],
            "stream": stream
        })
        .to_string(),
    )
}

async fn call(router: Router, request: Request<Body>) -> (StatusCode, HeaderMap, Bytes) {
    let response = tokio::time::timeout(Duration::from_secs(5), router.oneshot(request))
        .await
        .expect("router timed out")
        .unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = tokio::time::timeout(Duration::from_secs(5), response.into_body().collect())
        .await
        .expect("body timed out")
        .unwrap()
        .to_bytes();
    (status, headers, body)
}

/// Payloads of every `data:` frame, in order.
fn sse_payloads(body: &[u8]) -> Vec<String> {
    std::str::from_utf8(body)
        .unwrap()
        .split("\n\n")
        .filter_map(|frame| frame.strip_prefix("data: "))
        .map(str::to_string)
        .collect()
}

fn collect_deltas(payloads: &[String]) -> (String, String) {
    let mut content = String::new();
    let mut reasoning = String::new();
    for payload in payloads.iter().filter(|p| p.as_str() != "[DONE]") {
        let chunk: Value = serde_json::from_str(payload).unwrap();
        let delta = &chunk["choices"][0]["delta"];
        if let Some(text) = delta["content"].as_str() {
            content.push_str(text);
        }
        if let Some(text) = delta["reasoning_content"].as_str() {
            reasoning.push_str(text);
        }
    }
    (content, reasoning)
}

#[tokio::test]
async fn rejects_missing_or_wrong_key() {
    let app = router(ScriptedClient::new(vec![]), UpstreamMode::Native).await;
    let request = Request::builder()
        .uri("/v1/models")
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = call(app.clone(), request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["error"]["code"], "invalid_api_key");

    let request = Request::builder()
        .uri("/v1/models?key=secret")
        .body(Body::empty())
        .unwrap();
    let (status, _, _) = call(app, request).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn health_is_public_and_root_redirects() {
    let app = router(ScriptedClient::new(vec![]), UpstreamMode::Native).await;
    let (status, headers, body) = call(
        app.clone(),
        Request::builder().uri("/health").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(headers.contains_key(REQUEST_ID_HEADER));
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "ok");
    assert!(json["timestamp"].as_str().unwrap().ends_with('Z'));
    assert!(json["uptime"].as_str().unwrap().ends_with('s'));

    let (status, headers, _) = call(
        app,
        Request::builder().uri("/").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::FOUND);
    assert_eq!(headers["location"], "/health");
}

#[tokio::test]
async fn preflight_is_answered_before_auth() {
    let app = router(ScriptedClient::new(vec![]), UpstreamMode::Native).await;
    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/v1/chat/completions")
        .header("origin", "https://chat.example")
        .body(Body::empty())
        .unwrap();
    let (status, headers, _) = call(app, request).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(headers["access-control-allow-origin"], "https://chat.example");
    assert_eq!(headers["access-control-expose-headers"], "Content-Type");
}

#[tokio::test]
async fn lists_models_in_both_shapes() {
    let app = router(ScriptedClient::new(vec![]), UpstreamMode::Native).await;
    let (_, _, body) = call(app.clone(), authed(Method::GET, "/v1/models", Body::empty())).await;
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["object"], "list");
    let data = json["data"].as_array().unwrap();
    assert_eq!(data.len(), 15);
    assert_eq!(data[14]["id"], "gemini-3-pro-preview-low");
    assert_eq!(data[14]["root"], "gemini-3-pro-preview");
    assert_eq!(data[0]["owned_by"], "google");

    let (_, _, body) = call(
        app,
        authed(Method::GET, "/gemini/v1beta/models", Body::empty()),
    )
    .await;
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["models"][0]["name"], "models/gemini-2.0-flash");
    assert_eq!(json["models"][0]["displayName"], "gemini-2.0-flash");
}

#[tokio::test]
async fn native_sync_translates_and_splits_reasoning() {
    let client = ScriptedClient::new(vec![Reply::Json(
        200,
        json!({
            "candidates": [{
                "content": {"role": "model", "parts": [
                    {"text": "<vertex_think_tag>plan</vertex_think_tag>Hello"}
                ]},
                "finishReason": "STOP"
            }],
            "usageMetadata": {"promptTokenCount": 3, "candidatesTokenCount": 2, "totalTokenCount": 5}
        }),
    )]);
    let app = router(client.clone(), UpstreamMode::Native).await;
    let (status, _, body) = call(
        app,
        authed(
            Method::POST,
            "/v1/chat/completions",
            chat_body("gemini-3-pro-preview-high", false),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["model"], "gemini-3-pro-preview-high");
    assert_eq!(json["choices"][0]["message"]["content"], "Hello");
    assert_eq!(json["choices"][0]["message"]["reasoning_content"], "plan");
    assert_eq!(json["choices"][0]["finish_reason"], "stop");

    let seen = client.seen();
    assert_eq!(seen.len(), 1);
    assert!(seen[0].url.contains("/projects/proj/locations/global/"));
    assert!(seen[0].url.contains("models/gemini-3-pro-preview:generateContent?key=k1"));
}

#[tokio::test]
async fn native_sync_retries_with_next_key_then_forwards_error() {
    let error = json!({"error": {"code": 429, "message": "quota", "status": "RESOURCE_EXHAUSTED"}});
    let client = ScriptedClient::new(vec![
        Reply::Json(429, error.clone()),
        Reply::Json(429, error.clone()),
    ]);
    let app = router(client.clone(), UpstreamMode::Native).await;
    let (status, _, body) = call(
        app,
        authed(
            Method::POST,
            "/v1/chat/completions",
            chat_body("gemini-2.5-pro", false),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json, error);

    let seen = client.seen();
    assert_eq!(seen.len(), 2);
    assert!(seen[0].url.ends_with("key=k1"));
    assert!(seen[1].url.ends_with("key=k2"));
}

#[tokio::test]
async fn transport_failure_becomes_bad_gateway() {
    let app = router(ScriptedClient::new(vec![]), UpstreamMode::Native).await;
    let (status, _, body) = call(
        app,
        authed(
            Method::POST,
            "/v1/chat/completions",
            chat_body("gemini-2.5-pro", false),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["error"]["type"], "server_error");
}

#[tokio::test]
async fn malformed_chat_request_is_bad_request_without_upstream_call() {
    let client = ScriptedClient::new(vec![]);
    let app = router(client.clone(), UpstreamMode::Native).await;
    let (status, _, _) = call(
        app,
        authed(Method::POST, "/v1/chat/completions", Body::from("{\"model\":")),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(client.seen().is_empty());
}

#[tokio::test]
async fn native_stream_emits_reasoning_content_and_done() {
    let client = ScriptedClient::new(vec![Reply::Stream(vec![
        "data: {\"candidates\":[{\"content\":{\"role\":\"model\",\"parts\":[{\"text\":\"<vertex_think_tag>step one</vert\"}]}}]}\n\n",
        "data: {\"candidates\":[{\"content\":{\"role\":\"model\",\"parts\":[{\"text\":\"ex_think_tag>Hi\"}]}}]}\n\n",
        "data: {\"candidates\":[{\"content\":{\"role\":\"model\",\"parts\":[{\"text\":\" there\"}]},\"finishReason\":\"STOP\"}]}\n\n",
    ])]);
    let app = router(client.clone(), UpstreamMode::Native).await;
    let (status, headers, body) = call(
        app,
        authed(
            Method::POST,
            "/v1/chat/completions",
            chat_body("gemini-2.5-flash", true),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers["content-type"], "text/event-stream");

    let payloads = sse_payloads(&body);
    assert_eq!(payloads.last().map(String::as_str), Some("[DONE]"));
    assert_eq!(payloads.iter().filter(|p| *p == "[DONE]").count(), 1);

    let (content, reasoning) = collect_deltas(&payloads);
    assert_eq!(content, "Hi there");
    assert_eq!(reasoning, "step one");
    assert!(!content.contains("vertex_think_tag"));

    let first: Value = serde_json::from_str(&payloads[0]).unwrap();
    assert_eq!(first["choices"][0]["delta"]["role"], "assistant");
    let finishes = payloads
        .iter()
        .filter(|p| p.as_str() != "[DONE]")
        .filter(|p| {
            let chunk: Value = serde_json::from_str(p).unwrap();
            !chunk["choices"][0]["finish_reason"].is_null()
        })
        .count();
    assert_eq!(finishes, 1);

    let seen = client.seen();
    assert!(seen[0].is_stream);
    assert!(seen[0].url.contains(":streamGenerateContent?key=k1&alt=sse"));
}

#[tokio::test]
async fn native_stream_reports_mid_stream_failure() {
    let client = ScriptedClient::new(vec![Reply::BrokenStream(vec![
        "data: {\"candidates\":[{\"content\":{\"role\":\"model\",\"parts\":[{\"text\":\"partial\"}]}}]}\n\n",
    ])]);
    let app = router(client, UpstreamMode::Native).await;
    let (status, _, body) = call(
        app,
        authed(
            Method::POST,
            "/v1/chat/completions",
            chat_body("gemini-2.5-flash", true),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let payloads = sse_payloads(&body);
    assert_eq!(payloads.last().map(String::as_str), Some("[DONE]"));
    let error: Value = serde_json::from_str(&payloads[payloads.len() - 2]).unwrap();
    assert_eq!(error["error"]["type"], "server_error");
}

#[tokio::test]
async fn native_stream_retries_when_broken_before_first_event() {
    let client = ScriptedClient::new(vec![
        Reply::BrokenStream(vec![]),
        Reply::Stream(vec![
            "data: {\"candidates\":[{\"content\":{\"role\":\"model\",\"parts\":[{\"text\":\"recovered\"}]},\"finishReason\":\"STOP\"}]}\n\n",
        ]),
    ]);
    let app = router(client.clone(), UpstreamMode::Native).await;
    let (status, _, body) = call(
        app,
        authed(
            Method::POST,
            "/v1/chat/completions",
            chat_body("gemini-2.5-flash", true),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let payloads = sse_payloads(&body);
    assert!(!payloads.iter().any(|p| p.contains("\"error\"")));
    assert_eq!(collect_deltas(&payloads).0, "recovered");

    let seen = client.seen();
    assert_eq!(seen.len(), 2);
    assert!(seen[0].url.contains("key=k1"));
    assert!(seen[1].url.contains("key=k2"));
}

#[tokio::test]
async fn native_stream_forwards_upstream_error_before_first_byte() {
    let error = json!({"error": {"code": 503, "message": "overloaded", "status": "UNAVAILABLE"}});
    let client = ScriptedClient::new(vec![
        Reply::Json(503, error.clone()),
        Reply::Json(503, error.clone()),
    ]);
    let app = router(client.clone(), UpstreamMode::Native).await;
    let (status, headers, body) = call(
        app,
        authed(
            Method::POST,
            "/v1/chat/completions",
            chat_body("gemini-2.5-flash", true),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(headers["content-type"], "application/json");
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json, error);
    assert_eq!(client.seen().len(), 2);
}

#[tokio::test]
async fn passthrough_stream_forwards_upstream_error_before_first_byte() {
    let error = json!([{"error": {"code": 400, "message": "bad schema", "status": "INVALID_ARGUMENT"}}]);
    let client = ScriptedClient::new(vec![
        Reply::Json(400, error.clone()),
        Reply::Json(400, error.clone()),
    ]);
    let app = router(client.clone(), UpstreamMode::OpenAi).await;
    let (status, headers, body) = call(
        app,
        authed(
            Method::POST,
            "/v1/chat/completions",
            chat_body("gemini-2.5-pro", true),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_ne!(headers["content-type"], "text/event-stream");
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json, error);
    assert!(client.seen().iter().all(|req| req.is_stream));
}

#[tokio::test]
async fn passthrough_forwards_unknown_fields_and_unexpected_replies_verbatim() {
    let reply = json!({"object": "chat.completion", "note": "no choices here"});
    let client = ScriptedClient::new(vec![Reply::Json(200, reply.clone())]);
    let app = router(client.clone(), UpstreamMode::OpenAi).await;
    let messages = json!([
        {"role": "user", "content": [
            {"type": "text", "text": "listen"},
            {"type": "input_audio", "input_audio": {"data": "UklGRg==", "format": "wav"}}
        ]},
        {"role": "function", "name": "lookup", "content": "42"}
    ]);
    let tools = json!([{"type": "custom", "custom": {"name": "grep"}}]);
    let request = json!({"model": "gemini-2.5-pro", "messages": messages, "tools": tools});
    let (status, _, body) = call(
        app,
        authed(
            Method::POST,
            "/v1/chat/completions",
            Body::from(request.to_string()),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json, reply);

    let seen = client.seen();
    assert_eq!(seen.len(), 1);
    let sent: Value = serde_json::from_slice(seen[0].body.as_ref().unwrap()).unwrap();
    assert_eq!(sent["messages"], messages);
    assert_eq!(sent["tools"], tools);
    assert_eq!(sent["stream"], false);
    assert_eq!(sent["model"], "google/gemini-2.5-pro");
}

#[tokio::test]
async fn passthrough_sync_splits_message_content() {
    let client = ScriptedClient::new(vec![Reply::Json(
        200,
        json!({
            "id": "chatcmpl-1",
            "object": "chat.completion",
            "created": 1,
            "model": "google/gemini-2.5-pro",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": "<vertex_think_tag>why</vertex_think_tag>Answer"},
                "finish_reason": "stop"
            }]
        }),
    )]);
    let app = router(client.clone(), UpstreamMode::OpenAi).await;
    let (status, _, body) = call(
        app,
        authed(
            Method::POST,
            "/v1/chat/completions",
            chat_body("gemini-2.5-pro", false),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["choices"][0]["message"]["content"], "Answer");
    assert_eq!(json["choices"][0]["message"]["reasoning_content"], "why");

    let seen = client.seen();
    assert!(seen[0].url.contains("/endpoints/openapi/chat/completions?key=k1"));
    let sent: Value = serde_json::from_slice(seen[0].body.as_ref().unwrap()).unwrap();
    assert_eq!(sent["model"], "google/gemini-2.5-pro");
    assert_eq!(sent["google"]["thought_tag_marker"], "vertex_think_tag");
}

#[tokio::test]
async fn passthrough_stream_forwards_unparseable_and_single_done() {
    let client = ScriptedClient::new(vec![Reply::Stream(vec![
        "data: {\"id\":\"c1\",\"object\":\"chat.completion.chunk\",\"created\":1,\"model\":\"m\",\"choices\":[{\"index\":0,\"delta\":{\"content\":\"<vertex_think_tag>hm</vertex_think_tag>ok\"}}]}\n\n",
        "data: not-json\n\n",
        "data: [DONE]\n\n",
    ])]);
    let app = router(client, UpstreamMode::OpenAi).await;
    let (status, _, body) = call(
        app,
        authed(
            Method::POST,
            "/v1/chat/completions",
            chat_body("gemini-2.5-pro", true),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let payloads = sse_payloads(&body);
    assert!(payloads.iter().any(|p| p == "not-json"));
    assert_eq!(payloads.iter().filter(|p| *p == "[DONE]").count(), 1);
    assert_eq!(payloads.last().map(String::as_str), Some("[DONE]"));

    let parsed: Vec<String> = payloads
        .into_iter()
        .filter(|p| p != "not-json")
        .collect();
    let (content, reasoning) = collect_deltas(&parsed);
    assert_eq!(content, "ok");
    assert_eq!(reasoning, "hm");
}

#[tokio::test]
async fn gemini_passthrough_forwards_body_and_forces_global() {
    let client = ScriptedClient::new(vec![Reply::Json(200, json!({"candidates": []}))]);
    let app = router(client.clone(), UpstreamMode::Native).await;
    let (status, _, body) = call(
        app,
        authed(
            Method::POST,
            "/gemini/v1beta/models/gemini-2.5-pro:generateContent",
            Body::from(r#"{"contents":[{"role":"user","parts":[{"text":"hi"}]}]}"#),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(&body[..], br#"{"candidates":[]}"#);

    let seen = client.seen();
    assert_eq!(
        seen[0].url,
        "https://aiplatform.googleapis.com/v1/projects/proj/locations/global/publishers/google/models/gemini-2.5-pro:generateContent?key=k1"
    );
    assert_eq!(
        seen[0].body.as_deref(),
        Some(&br#"{"contents":[{"role":"user","parts":[{"text":"hi"}]}]}"#[..])
    );
    assert_eq!(header_get(&seen[0].headers, "content-type"), Some("application/json"));
}

#[tokio::test]
async fn gemini_passthrough_relays_stream_lines() {
    let client = ScriptedClient::new(vec![Reply::Stream(vec![
        "data: {\"a\":",
        "1}\n\ndata: {\"b\":2}\n\n",
    ])]);
    let app = router(client.clone(), UpstreamMode::Native).await;
    let (status, _, body) = call(
        app,
        authed(
            Method::POST,
            "/gemini/v1beta/models/gemini-2.5-flash:streamGenerateContent",
            Body::from("{}"),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(&body[..], b"data: {\"a\":1}\n\ndata: {\"b\":2}\n\n");
    assert_eq!(
        header_get(&client.seen()[0].headers, "accept"),
        Some("text/event-stream")
    );
}

#[tokio::test]
async fn gemini_stream_retries_when_broken_before_first_line() {
    let client = ScriptedClient::new(vec![
        Reply::BrokenStream(vec!["data: {\"a\""]),
        Reply::Stream(vec!["data: {\"b\":2}\n\n"]),
    ]);
    let app = router(client.clone(), UpstreamMode::Native).await;
    let (status, _, body) = call(
        app,
        authed(
            Method::POST,
            "/gemini/v1beta/models/gemini-2.5-flash:streamGenerateContent",
            Body::from("{}"),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(&body[..], b"data: {\"b\":2}\n\n");
    assert_eq!(client.seen().len(), 2);
}

#[tokio::test]
async fn gemini_passthrough_rejects_malformed_path() {
    let client = ScriptedClient::new(vec![]);
    let app = router(client.clone(), UpstreamMode::Native).await;
    let (status, _, _) = call(
        app,
        authed(
            Method::POST,
            "/gemini/v1beta/models/gemini-2.5-pro",
            Body::from("{}"),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(client.seen().is_empty());
}
