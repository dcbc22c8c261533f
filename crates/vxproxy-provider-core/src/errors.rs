use bytes::Bytes;

use crate::upstream::{Headers, UpstreamFailure, UpstreamTransportErrorKind};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CredentialError {
    #[error("no upstream credentials configured")]
    EmptyPool,
    #[error("project discovery probe failed: {0}")]
    Probe(String),
    #[error("no project id in discovery response (status {status})")]
    NoProjectInProbe { status: u16 },
    #[error("could not resolve project for credential {index}: {reason}")]
    Unresolved { index: usize, reason: String },
}

#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("upstream returned status {status}")]
    Http {
        status: u16,
        headers: Headers,
        body: Bytes,
    },
    #[error("upstream transport error ({kind:?}): {message}")]
    Transport {
        kind: UpstreamTransportErrorKind,
        message: String,
    },
    #[error(transparent)]
    Credential(#[from] CredentialError),
    #[error("undecodable upstream body: {0}")]
    Decode(String),
}

impl From<UpstreamFailure> for UpstreamError {
    fn from(value: UpstreamFailure) -> Self {
        match value {
            UpstreamFailure::Transport { kind, message } => UpstreamError::Transport { kind, message },
            UpstreamFailure::Http {
                status,
                headers,
                body,
            } => UpstreamError::Http {
                status,
                headers,
                body,
            },
        }
    }
}
