use axum::{extract::State, http::header, response::IntoResponse};

use crate::api::errors::{ApiError, ApiResult};
use crate::api::types::ApiState;

/// Prometheus text exposition
pub async fn get_metrics(State(state): State<ApiState>) -> ApiResult<impl IntoResponse> {
    state.metrics.set_ca_initialized(state.ca.is_initialized());

    let body = state.metrics.render()
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok(([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body))
}
