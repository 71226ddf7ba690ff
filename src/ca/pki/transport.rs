use std::io::BufReader;
use std::time::Duration;

use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use tracing::{debug, warn};
use url::Url;

use crate::ca::pki::config::{AuthType, HttpMethod, ParamFormat, PkiConfig};
use crate::error::Error;
use crate::types::Result;

/// Upper bound for every call to a PKI endpoint
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Status and body of a PKI response
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: StatusCode,
    pub body: Bytes,
}

/// HTTP client for one PKI endpoint
#[derive(Debug, Clone)]
pub struct PkiTransport {
    client: Client,
    base_url: Url,
    method: HttpMethod,
    format: ParamFormat,
    auth_headers: HeaderMap,
}

impl PkiTransport {
    /// Create a transport for the given config
    ///
    /// `token` may be absent even when auth is configured; the request then
    /// goes out unauthenticated. `trusted_ca` is a PEM bundle added to the
    /// trust store.
    pub fn new(config: &PkiConfig, token: Option<&str>, trusted_ca: Option<&[u8]>) -> Result<Self> {
        Self::with_timeout(config, token, trusted_ca, REQUEST_TIMEOUT)
    }

    /// Create a transport with an explicit timeout
    pub fn with_timeout(
        config: &PkiConfig,
        token: Option<&str>,
        trusted_ca: Option<&[u8]>,
        timeout: Duration,
    ) -> Result<Self> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| Error::Config(format!("Invalid baseUrl '{}': {}", config.base_url, e)))?;

        let mut builder = Client::builder().timeout(timeout);

        if config.tls.insecure_skip_verify {
            warn!("TLS verification disabled for {}", base_url);
            builder = builder.danger_accept_invalid_certs(true);
        }

        if let Some(bundle) = trusted_ca {
            for der in parse_ca_bundle(bundle)? {
                let cert = reqwest::Certificate::from_der(&der)
                    .map_err(|e| Error::Config(format!("Invalid trusted CA certificate: {}", e)))?;
                builder = builder.add_root_certificate(cert);
            }
        }

        let client = builder.build()
            .map_err(|e| Error::HttpClient(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url,
            method: config.method,
            format: config.parameters.param_format,
            auth_headers: create_auth_headers(config, token)?,
        })
    }

    /// Send a serialized parameter body
    pub async fn send(&self, body: String) -> Result<RawResponse> {
        let request = match self.method {
            HttpMethod::Get => {
                let mut url = self.base_url.clone();
                let query = match url.query() {
                    Some(existing) if !existing.is_empty() => format!("{}&{}", existing, body),
                    _ => body,
                };
                url.set_query(Some(&query));
                debug!("PKI GET {}", url);
                self.client.get(url)
            }
            HttpMethod::Post => {
                debug!("PKI POST {} ({} bytes)", self.base_url, body.len());
                self.client
                    .post(self.base_url.clone())
                    .header(CONTENT_TYPE, content_type(self.format))
                    .body(body)
            }
        };

        let response = request.headers(self.auth_headers.clone()).send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        debug!("PKI responded {} ({} bytes)", status, body.len());
        Ok(RawResponse { status, body })
    }

    /// GET the base URL and report the status
    pub async fn probe(&self) -> Result<StatusCode> {
        let response = self.client
            .get(self.base_url.clone())
            .headers(self.auth_headers.clone())
            .send()
            .await?;

        Ok(response.status())
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }
}

/// Content type for a POST body
pub fn content_type(format: ParamFormat) -> &'static str {
    match format {
        ParamFormat::Semicolon => "text/plain",
        ParamFormat::Ampersand => "application/x-www-form-urlencoded",
    }
}

/// Create authentication headers
fn create_auth_headers(config: &PkiConfig, token: Option<&str>) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();

    let token = match token.filter(|t| !t.is_empty()) {
        Some(token) => token,
        None => {
            if config.auth.auth_type != AuthType::None {
                debug!("No token for {} auth, sending unauthenticated", config.auth.auth_type);
            }
            return Ok(headers);
        }
    };

    let invalid = |e: reqwest::header::InvalidHeaderValue| Error::Auth(format!("Invalid token: {}", e));

    match config.auth.auth_type {
        AuthType::None => {}
        AuthType::Bearer => {
            headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {}", token)).map_err(invalid)?);
        }
        AuthType::Basic => {
            headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Basic {}", token)).map_err(invalid)?);
        }
        AuthType::Header => {
            let name = HeaderName::from_bytes(config.auth.header_name.trim().as_bytes())
                .map_err(|e| Error::Config(format!("Invalid auth header name: {}", e)))?;
            headers.insert(name, HeaderValue::from_str(token).map_err(invalid)?);
        }
    }

    Ok(headers)
}

/// Split a PEM bundle into DER certificates
fn parse_ca_bundle(bundle: &[u8]) -> Result<Vec<Vec<u8>>> {
    let mut reader = BufReader::new(bundle);
    let certs = rustls_pemfile::certs(&mut reader)
        .map_err(|e| Error::Config(format!("Failed to read trusted CA bundle: {}", e)))?;

    if certs.is_empty() {
        return Err(Error::Config("Trusted CA bundle contains no certificates".into()));
    }

    Ok(certs)
}
