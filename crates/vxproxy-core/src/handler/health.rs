use std::sync::Arc;
use std::time::Duration;

use axum::Json;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use http::StatusCode;
use http::header::LOCATION;
use serde::Serialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::core::CoreState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: String,
    pub uptime: String,
}

pub async fn health(State(state): State<Arc<CoreState>>) -> Json<HealthResponse> {
    let now = OffsetDateTime::now_utc();
    // Whole seconds, no fractional part.
    let now = now.replace_nanosecond(0).unwrap_or(now);
    Json(HealthResponse {
        status: "ok",
        timestamp: now.format(&Rfc3339).unwrap_or_default(),
        uptime: format_uptime(state.started_at.elapsed()),
    })
}

pub async fn root_redirect() -> Response {
    (StatusCode::FOUND, [(LOCATION, "/health")]).into_response()
}

/// Rounded to whole seconds, leading zero units omitted: `5s`, `1m0s`, `2h3m4s`.
pub fn format_uptime(elapsed: Duration) -> String {
    let total = (elapsed.as_millis() + 500) / 1000;
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;
    if hours > 0 {
        format!("{hours}h{minutes}m{seconds}s")
    } else if minutes > 0 {
        format!("{minutes}m{seconds}s")
    } else {
        format!("{seconds}s")
    }
}
