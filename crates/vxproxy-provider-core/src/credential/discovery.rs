use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use regex::Regex;
use tracing::warn;
use vxproxy_protocol::error::ErrorResponse;

use crate::errors::CredentialError;
use crate::upstream::{UpstreamClient, UpstreamFailure, UpstreamHttpRequest, redact_key};
use crate::vertex;

/// Finds the project an API key belongs to.
pub trait ProjectResolver: Send + Sync {
    fn discover<'a>(
        &'a self,
        api_key: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String, CredentialError>> + Send + 'a>>;
}

const MESSAGE_PATTERNS: &[&str] = &[
    r#"projects/([^/\s"]+)"#,
    r#"Project:\s*([^\s"]+)"#,
    r#"project[_\s]+id[:\s]+([^\s"]+)"#,
];

const BODY_PATTERNS: &[&str] = &[r#"projects/([^/\s"]+)"#, r#""project":\s*"([^"]+)""#];

/// Ordered patterns tried against the probe's error. Message patterns run on
/// `error.message`, body patterns on the raw response text. The first capture
/// group of the first match wins.
#[derive(Debug, Clone)]
pub struct ProjectIdPatterns {
    message: Vec<Regex>,
    body: Vec<Regex>,
}

impl ProjectIdPatterns {
    pub fn new(message: &[&str], body: &[&str]) -> Result<Self, regex::Error> {
        let compile = |patterns: &[&str]| {
            patterns
                .iter()
                .map(|pattern| Regex::new(pattern))
                .collect::<Result<Vec<_>, _>>()
        };
        Ok(Self {
            message: compile(message)?,
            body: compile(body)?,
        })
    }

    pub fn standard() -> Result<Self, regex::Error> {
        Self::new(MESSAGE_PATTERNS, BODY_PATTERNS)
    }

    pub fn extract(&self, body: &[u8]) -> Option<String> {
        if let Some(message) = ErrorResponse::message_from_body(body)
            && let Some(project) = first_capture(&self.message, &message)
        {
            return Some(project);
        }
        first_capture(&self.body, &String::from_utf8_lossy(body))
    }
}

fn first_capture(patterns: &[Regex], text: &str) -> Option<String> {
    patterns.iter().find_map(|re| {
        re.captures(text)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
    })
}

/// Sends a deliberately invalid generate request and reads the project id
/// out of the error the backend returns.
pub struct ProbeProjectResolver {
    client: Arc<dyn UpstreamClient>,
    location: String,
    patterns: ProjectIdPatterns,
}

impl ProbeProjectResolver {
    pub fn new(
        client: Arc<dyn UpstreamClient>,
        location: impl Into<String>,
        patterns: ProjectIdPatterns,
    ) -> Self {
        Self {
            client,
            location: location.into(),
            patterns,
        }
    }

    async fn probe(&self, api_key: &str) -> Result<String, CredentialError> {
        let url = vertex::discovery_url(&self.location, api_key);
        let request = UpstreamHttpRequest::post_json(url.clone(), vertex::DISCOVERY_BODY);
        let received = match self.client.send(request).await {
            Ok(response) => {
                let status = response.status;
                response.body.collect().await.map(|body| (status, body))
            }
            Err(failure) => Err(failure),
        };
        let (status, body) = match received {
            Ok(pair) => pair,
            Err(UpstreamFailure::Http { status, body, .. }) => (status, body),
            Err(UpstreamFailure::Transport { message, .. }) => {
                warn!(event = "project_probe_failed", url = %redact_key(&url), error = %message);
                return Err(CredentialError::Probe(message));
            }
        };
        self.patterns
            .extract(&body)
            .ok_or(CredentialError::NoProjectInProbe { status })
    }
}

impl ProjectResolver for ProbeProjectResolver {
    fn discover<'a>(
        &'a self,
        api_key: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String, CredentialError>> + Send + 'a>> {
        Box::pin(self.probe(api_key))
    }
}
