use axum::{
    extract::{rejection::StringRejection, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use tracing::error;

use crate::api::types::ApiState;
use crate::ca::legacy::{LegacyParams, LegacyResponse};

/// Legacy semicolon-encoded PKI endpoint
pub async fn legacy_pki(State(state): State<ApiState>, body: Result<String, StringRejection>) -> Response {
    let Ok(body) = body else {
        return plain_error(StatusCode::BAD_REQUEST, "Failed to read request body");
    };

    let params = LegacyParams::parse(&body);
    let intent = params.intent().to_string();

    let (outcome, response) = match state.legacy.handle_params(&params).await {
        Ok(LegacyResponse::Pem(pem)) => (
            "ok",
            ([(header::CONTENT_TYPE, "application/x-pem-file")], pem).into_response(),
        ),
        Ok(LegacyResponse::NotFound(message)) => ("not_found", plain_error(StatusCode::NOT_FOUND, &message)),
        Ok(LegacyResponse::BadRequest(message)) => ("bad_request", plain_error(StatusCode::BAD_REQUEST, &message)),
        Err(e) => {
            error!("Legacy request failed: {}", e);
            ("error", plain_error(StatusCode::INTERNAL_SERVER_ERROR, &format!("Failed to create certificate: {}", e)))
        }
    };

    state.metrics.observe_legacy_request(&intent, outcome);
    response
}

/// Any method other than POST on the legacy endpoint
pub async fn legacy_method_not_allowed() -> Response {
    plain_error(StatusCode::METHOD_NOT_ALLOWED, "Only POST method is supported")
}

fn plain_error(status: StatusCode, message: &str) -> Response {
    (
        status,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        format!("{}\n", message),
    )
        .into_response()
}
