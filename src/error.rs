use thiserror::Error;
use std::io;

/// Generic error type
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// CSR could not be decoded or parsed
    #[error("Invalid CSR: {0}")]
    InvalidCsr(String),

    /// CSR signature does not verify against its own public key
    #[error("Invalid CSR signature: {0}")]
    InvalidSignature(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Credential material missing or unusable
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Issuer missing or not ready
    #[error("Issuer not found: {0}")]
    IssuerNotFound(String),

    /// Remote CA unreachable or erroring
    #[error("Health check failed: {0}")]
    HealthCheckFailed(String),

    /// Remote CA rejected the request
    #[error("Signing failed: {0}")]
    SigningFailed(String),

    /// Response carried no PEM certificate block
    #[error("No certificate found in response")]
    NoCertificateInResponse,

    /// Declared JSON field absent from the response
    #[error("Field '{0}' not found in response")]
    MissingJsonField(String),

    /// Mock CA initialisation failure
    #[error("CA initialization error: {0}")]
    CaInit(String),

    /// Resource not found
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Write refused because the stored object is already final
    #[error("Conflict: {0}")]
    Conflict(String),

    /// HTTP client error
    #[error("HTTP client error: {0}")]
    HttpClient(String),

    /// Reconciliation deadline elapsed
    #[error("Deadline exceeded after {0:?}")]
    DeadlineExceeded(std::time::Duration),

    /// Metrics registry error
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// URL parse error
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),
}

impl Error {
    /// Whether a retry with unchanged inputs can succeed.
    ///
    /// Malformed CSRs and response-shape mismatches need a new CSR or a
    /// configuration fix; transport-level failures are transient.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::InvalidCsr(_)
            | Error::InvalidSignature(_)
            | Error::NoCertificateInResponse
            | Error::MissingJsonField(_) => false,
            Error::HealthCheckFailed(_)
            | Error::HttpClient(_)
            | Error::DeadlineExceeded(_)
            | Error::Io(_) => true,
            Error::SigningFailed(_) => true,
            _ => false,
        }
    }
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::HttpClient(err.to_string())
    }
}

impl From<rcgen::Error> for Error {
    fn from(err: rcgen::Error) -> Self {
        Error::Internal(format!("Certificate generation error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_classification() {
        assert!(!Error::InvalidSignature("bad".into()).is_retryable());
        assert!(!Error::NoCertificateInResponse.is_retryable());
        assert!(!Error::MissingJsonField("certificate".into()).is_retryable());
        assert!(Error::HealthCheckFailed("503".into()).is_retryable());
        assert!(!Error::Config("missing baseUrl".into()).is_retryable());
    }

    #[test]
    fn test_missing_field_names_field() {
        let err = Error::MissingJsonField("data.cert".into());
        assert_eq!(err.to_string(), "Field 'data.cert' not found in response");
    }
}
