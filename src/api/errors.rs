use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::api::types::ErrorBody;
use crate::error::Error;

/// Errors surfaced by the sign endpoints
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Only POST method is supported")]
    MethodNotAllowed,
    #[error("Failed to read request body")]
    ReadError(String),
    #[error("Failed to parse JSON request")]
    ParseError(String),
    #[error("No CSR provided in request")]
    MissingCsr,
    #[error("Failed to parse CSR")]
    InvalidCsr(String),
    #[error("CSR signature validation failed")]
    InvalidSignature(String),
    #[error("Internal server error")]
    Internal(String),
    #[error("Failed to create certificate")]
    Signing(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    /// Stable code reported in the error body
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::MethodNotAllowed => "METHOD_NOT_ALLOWED",
            ApiError::ReadError(_) => "READ_ERROR",
            ApiError::ParseError(_) => "PARSE_ERROR",
            ApiError::MissingCsr => "MISSING_CSR",
            ApiError::InvalidCsr(_) => "INVALID_CSR",
            ApiError::InvalidSignature(_) => "INVALID_SIGNATURE",
            ApiError::Internal(_) => "INTERNAL_ERROR",
            ApiError::Signing(_) => "SIGNING_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::Internal(_) | ApiError::Signing(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }

    fn details(&self) -> String {
        match self {
            ApiError::ReadError(details)
            | ApiError::ParseError(details)
            | ApiError::InvalidCsr(details)
            | ApiError::InvalidSignature(details)
            | ApiError::Internal(details)
            | ApiError::Signing(details) => details.clone(),
            ApiError::MethodNotAllowed | ApiError::MissingCsr => String::new(),
        }
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match err {
            Error::InvalidCsr(msg) => ApiError::InvalidCsr(msg),
            Error::InvalidSignature(msg) => ApiError::InvalidSignature(msg),
            Error::CaInit(msg) | Error::Internal(msg) => ApiError::Internal(msg),
            other => ApiError::Signing(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.to_string(),
            code: self.code().to_string(),
            details: self.details(),
        };

        (self.status(), Json(body)).into_response()
    }
}
