use axum::{extract::State, http::header, response::IntoResponse};
use tracing::debug;

use crate::api::errors::ApiResult;
use crate::api::types::ApiState;

/// Download the CA certificate
pub async fn get_ca(State(state): State<ApiState>) -> ApiResult<impl IntoResponse> {
    debug!("CA certificate requested");

    let authority = state.ca.authority().await?;
    Ok((
        [
            (header::CONTENT_TYPE, "application/x-pem-file"),
            (header::CONTENT_DISPOSITION, "attachment; filename=ca.crt"),
        ],
        authority.cert_pem().to_string(),
    ))
}
