use std::future::Future;
use std::pin::Pin;

use bytes::{Bytes, BytesMut};

pub type Headers = Vec<(String, String)>;
/// Streamed body. An `Err` item means the upstream connection broke after
/// the response started; nothing follows it.
pub type ByteStream = tokio::sync::mpsc::Receiver<Result<Bytes, UpstreamFailure>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
        }
    }
}

#[derive(Debug)]
pub enum UpstreamBody {
    Bytes(Bytes),
    Stream(ByteStream),
}

impl UpstreamBody {
    /// Drains a streamed body into one buffer.
    pub async fn collect(self) -> Result<Bytes, UpstreamFailure> {
        match self {
            UpstreamBody::Bytes(bytes) => Ok(bytes),
            UpstreamBody::Stream(mut rx) => {
                let mut buf = BytesMut::new();
                while let Some(chunk) = rx.recv().await {
                    buf.extend_from_slice(&chunk?);
                }
                Ok(buf.freeze())
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct UpstreamHttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Headers,
    pub body: Option<Bytes>,
    pub is_stream: bool,
}

impl UpstreamHttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            url: url.into(),
            headers: Vec::new(),
            body: None,
            is_stream: false,
        }
    }

    pub fn post_json(url: impl Into<String>, body: impl Into<Bytes>) -> Self {
        let mut headers = Vec::new();
        header_set(&mut headers, "content-type", "application/json");
        Self {
            method: HttpMethod::Post,
            url: url.into(),
            headers,
            body: Some(body.into()),
            is_stream: false,
        }
    }

    /// Marks the request as streaming and asks for an event stream.
    pub fn streaming(mut self) -> Self {
        self.is_stream = true;
        header_set(&mut self.headers, "accept", "text/event-stream");
        self
    }
}

#[derive(Debug)]
pub struct UpstreamHttpResponse {
    pub status: u16,
    pub headers: Headers,
    pub body: UpstreamBody,
}

impl UpstreamHttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamTransportErrorKind {
    Timeout,
    ReadTimeout,
    Connect,
    Dns,
    Tls,
    Other,
}

#[derive(Debug, Clone)]
pub enum UpstreamFailure {
    /// No HTTP response was received.
    Transport {
        kind: UpstreamTransportErrorKind,
        message: String,
    },
    /// Non-2xx response captured as bytes.
    Http {
        status: u16,
        headers: Headers,
        body: Bytes,
    },
}

/// Performs the actual IO. Implementations return `Ok` for every HTTP
/// response, whatever its status; `Err` means no response was received.
pub trait UpstreamClient: Send + Sync {
    fn send<'a>(
        &'a self,
        req: UpstreamHttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<UpstreamHttpResponse, UpstreamFailure>> + Send + 'a>>;
}

pub fn header_set(headers: &mut Headers, name: impl Into<String>, value: impl Into<String>) {
    let name = name.into();
    let value = value.into();
    match headers
        .iter_mut()
        .find(|(k, _)| k.eq_ignore_ascii_case(&name))
    {
        Some((_, v)) => *v = value,
        None => headers.push((name, value)),
    }
}

pub fn header_get<'a>(headers: &'a Headers, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// Masks the `key` query parameter so URLs can be logged.
pub fn redact_key(url: &str) -> String {
    let Some((base, query)) = url.split_once('?') else {
        return url.to_string();
    };
    let query = query
        .split('&')
        .map(|pair| match pair.split_once('=') {
            Some(("key", _)) => "key=***".to_string(),
            _ => pair.to_string(),
        })
        .collect::<Vec<_>>()
        .join("&");
    format!("{base}?{query}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headers_are_case_insensitive() {
        let mut headers = Headers::new();
        header_set(&mut headers, "Content-Type", "text/plain");
        header_set(&mut headers, "content-type", "application/json");
        assert_eq!(headers.len(), 1);
        assert_eq!(header_get(&headers, "CONTENT-TYPE"), Some("application/json"));
    }

    #[test]
    fn redacts_only_the_key_parameter() {
        assert_eq!(
            redact_key("https://h/v1/x:streamGenerateContent?key=secret&alt=sse"),
            "https://h/v1/x:streamGenerateContent?key=***&alt=sse"
        );
        assert_eq!(redact_key("https://h/health"), "https://h/health");
    }

    #[tokio::test]
    async fn collect_drains_stream_body() {
        let (tx, rx) = tokio::sync::mpsc::channel(4);
        tx.send(Ok(Bytes::from_static(b"ab"))).await.unwrap();
        tx.send(Ok(Bytes::from_static(b"cd"))).await.unwrap();
        drop(tx);
        let body = UpstreamBody::Stream(rx).collect().await.unwrap();
        assert_eq!(&body[..], b"abcd");
    }

    #[tokio::test]
    async fn collect_surfaces_mid_stream_failure() {
        let (tx, rx) = tokio::sync::mpsc::channel(4);
        tx.send(Ok(Bytes::from_static(b"ab"))).await.unwrap();
        tx.send(Err(UpstreamFailure::Transport {
            kind: UpstreamTransportErrorKind::ReadTimeout,
            message: "idle".to_string(),
        }))
        .await
        .unwrap();
        drop(tx);
        assert!(UpstreamBody::Stream(rx).collect().await.is_err());
    }
}
