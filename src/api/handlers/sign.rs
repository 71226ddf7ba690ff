use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, State},
    http::{header, HeaderMap},
    Json,
};
use chrono::SecondsFormat;
use tracing::{debug, error, info};
use url::form_urlencoded;

use crate::api::errors::{ApiError, ApiResult};
use crate::api::types::{ApiState, SignRequest, SignResponse};

/// Sign a CSR
///
/// Accepts a JSON `{csr, validity_days}` body, a form field `csr`, or a
/// raw PEM body.
pub async fn sign_certificate(
    State(state): State<ApiState>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> ApiResult<Json<SignResponse>> {
    let result = sign(&state, &headers, body).await;

    match &result {
        Ok(_) => state.metrics.inc_certificates_signed(),
        Err(e) => {
            error!(code = e.code(), "Sign request rejected: {}", e);
            state.metrics.inc_sign_failures(e.code());
        }
    }

    result
}

async fn sign(state: &ApiState, headers: &HeaderMap, body: Result<Bytes, BytesRejection>) -> ApiResult<Json<SignResponse>> {
    let body = body.map_err(|e| ApiError::ReadError(e.to_string()))?;
    let content_type = headers.get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();

    debug!("Certificate signing request received ({} bytes, content type '{}')", body.len(), content_type);

    let request = parse_sign_request(content_type, &body)?;
    if request.csr.trim().is_empty() {
        return Err(ApiError::MissingCsr);
    }

    let issued = state.ca
        .issue_from_csr(request.csr.as_bytes(), request.validity_days.unwrap_or(0))
        .await?;
    let authority = state.ca.authority().await?;

    info!(serial = %issued.serial, subject = %issued.subject, "Certificate signed successfully");

    Ok(Json(SignResponse {
        certificate_chain: format!("{}{}", issued.cert_pem, authority.cert_pem()),
        certificate: issued.cert_pem,
        ca: authority.cert_pem().to_string(),
        serial_number: issued.serial,
        not_before: issued.not_before.to_rfc3339_opts(SecondsFormat::Secs, true),
        not_after: issued.not_after.to_rfc3339_opts(SecondsFormat::Secs, true),
        subject: issued.subject,
    }))
}

/// Decode the body according to its content type
fn parse_sign_request(content_type: &str, body: &[u8]) -> ApiResult<SignRequest> {
    if content_type.contains("application/json") {
        return serde_json::from_slice(body).map_err(|e| ApiError::ParseError(e.to_string()));
    }

    let form_csr = form_urlencoded::parse(body)
        .find(|(key, value)| key == "csr" && !value.is_empty())
        .map(|(_, value)| value.into_owned());

    Ok(SignRequest {
        csr: form_csr.unwrap_or_else(|| String::from_utf8_lossy(body).into_owned()),
        ..Default::default()
    })
}

/// Any method other than POST on a sign endpoint
pub async fn sign_method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}
