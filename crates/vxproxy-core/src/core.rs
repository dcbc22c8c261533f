use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::{get, post};

use vxproxy_common::UpstreamMode;
use vxproxy_provider_core::{CredentialPool, RetryPolicy, UpstreamClient};

use crate::auth::{AuthProvider, require_api_key};
use crate::catalog::ModelCatalog;
use crate::handler::{chat, gemini, health, models};
use crate::middleware::{access_log, cors};

pub struct CoreState {
    pub pool: Arc<CredentialPool>,
    pub client: Arc<dyn UpstreamClient>,
    pub catalog: Arc<ModelCatalog>,
    pub auth: Arc<dyn AuthProvider>,
    pub retry: RetryPolicy,
    /// Configured Vertex location, e.g. `global` or `us-central1`.
    pub location: String,
    pub upstream_mode: UpstreamMode,
    pub started_at: Instant,
}

pub struct Core {
    state: Arc<CoreState>,
}

impl Core {
    pub fn new(state: CoreState) -> Self {
        Self {
            state: Arc::new(state),
        }
    }

    /// Auth runs innermost so preflights and the access log see every request.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/", get(health::root_redirect))
            .route("/health", get(health::health))
            .route("/v1/models", get(models::openai_models))
            .route("/v1/chat/completions", post(chat::chat_completions))
            .route("/gemini/v1beta/models", get(models::gemini_models))
            .route(
                "/gemini/v1beta/models/{model_action}",
                post(gemini::gemini_passthrough),
            )
            .layer(from_fn_with_state(self.state.clone(), require_api_key))
            .layer(from_fn(cors))
            .layer(from_fn(access_log))
            .with_state(self.state.clone())
    }

    pub fn state(&self) -> Arc<CoreState> {
        self.state.clone()
    }
}
