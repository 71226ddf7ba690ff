use axum::{extract::State, http::header, response::IntoResponse, Json};
use chrono::SecondsFormat;
use tracing::debug;

use crate::api::errors::ApiResult;
use crate::api::types::{format_uptime, ApiState, HealthResponse};

/// Health check handler
///
/// Served on `/health`, `/healthz` and `/readyz`. Reports the CA subject
/// and expiry, the number of certificates signed and the process uptime.
pub async fn health_check(State(state): State<ApiState>) -> ApiResult<Json<HealthResponse>> {
    debug!("Health check requested");

    let authority = state.ca.authority().await?;

    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        ca_subject: authority.subject().to_string(),
        ca_expires: authority.not_after().to_rfc3339_opts(SecondsFormat::Secs, true),
        certificates_signed: state.ca.signed_count(),
        uptime: format_uptime(state.started_at.elapsed()),
    }))
}

const USAGE: &[&str] = &[
    "Endpoints:",
    "  GET  /health              - Health check",
    "  GET  /ca                  - Get CA certificate (PEM)",
    "  GET  /metrics             - Prometheus metrics",
    "  POST /sign                - Sign a CSR (JSON)",
    "  POST /api/v1/sign         - Sign a CSR (JSON alternate)",
    "  POST /api/v1/certificate/sign - Sign a CSR (JSON alternate)",
    "",
    "Legacy PKI-Compatible Endpoint:",
    "  POST /cgi/pki.cgi         - Legacy PKI API format",
    "",
    "  POST arguments (semicolon-separated):",
    "    getCERT     Return existing certificate",
    "    getKEY      Return existing certificate key",
    "    getCSR      Return existing CSR",
    "    new=1       Create new certificate or return existing",
    "    renew=1     Force recreation of certificate",
    "    subject     Full DN (e.g., /C=US/ST=California/L=San Francisco/O=Example/CN=example.com)",
    "    DNS2-DNS20  Subject Alternative Names",
    "",
    "  Example:",
    "    curl -s -X POST -d 'new=1;subject=/C=US/O=Example/CN=test.com;DNS2=test2.com' http://mockca:8080/cgi/pki.cgi",
];

/// Plain-text usage page
pub async fn usage() -> impl IntoResponse {
    let text = format!("Mock CA Server v{}\n\n{}\n", env!("CARGO_PKG_VERSION"), USAGE.join("\n"));
    ([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], text)
}
