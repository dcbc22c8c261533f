use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use vxproxy_protocol::gemini::list_models as gemini_models;
use vxproxy_protocol::openai::list_models as openai_models;

use crate::core::CoreState;

pub async fn openai_models(
    State(state): State<Arc<CoreState>>,
) -> Json<openai_models::ListModelsResponse> {
    Json(state.catalog.openai_list())
}

pub async fn gemini_models(
    State(state): State<Arc<CoreState>>,
) -> Json<gemini_models::ListModelsResponse> {
    Json(state.catalog.gemini_list())
}
