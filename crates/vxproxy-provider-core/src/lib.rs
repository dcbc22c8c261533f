//! Upstream plumbing for vxproxy.
//!
//! This crate does **not** depend on axum or any concrete HTTP client. Callers
//! build `UpstreamHttpRequest` values and hand them to an `UpstreamClient`
//! implementation owned by a higher layer.

pub mod credential;
pub mod errors;
pub mod retry;
pub mod upstream;
pub mod vertex;

pub use credential::{
    Credential, CredentialPool, ProbeProjectResolver, ProjectIdPatterns, ProjectResolver,
    SelectionPolicy,
};
pub use errors::{CredentialError, UpstreamError};
pub use retry::{Attempt, RetryPolicy, execute};
pub use upstream::{
    ByteStream, Headers, HttpMethod, UpstreamBody, UpstreamClient, UpstreamFailure,
    UpstreamHttpRequest, UpstreamHttpResponse, UpstreamTransportErrorKind, header_get, header_set,
    redact_key,
};
