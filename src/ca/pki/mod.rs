//! Adapter for external PKI endpoints with arbitrary request encodings.

pub mod config;
pub mod response;
pub mod template;
pub mod transport;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::ca::csr::parse_csr;
use crate::ca::provider::Signer;
use crate::ca::types::SignedCertificate;
use crate::error::Error;
use crate::types::{RequestAction, Result};

pub use config::{PkiConfig, DEFAULT_CONFIG_KEY};
pub use response::{extract_certificates, CertificateBundle, ResponseParser};
pub use template::{build_subject_dn, RequestParameters, RequestTemplate};
pub use transport::PkiTransport;

/// Signer driving an external PKI endpoint
#[derive(Debug, Clone)]
pub struct PkiSigner {
    config: PkiConfig,
    transport: PkiTransport,
    action: Option<RequestAction>,
}

impl PkiSigner {
    /// Create a signer; requests default to the `new` action
    pub fn new(config: PkiConfig, token: Option<&str>, trusted_ca: Option<&[u8]>) -> Result<Self> {
        config.validate()?;
        let transport = PkiTransport::new(&config, token, trusted_ca)?;

        Ok(Self {
            config,
            transport,
            action: Some(RequestAction::New),
        })
    }

    /// Select the action parameters sent with each request
    pub fn with_action(mut self, action: Option<RequestAction>) -> Self {
        self.action = action;
        self
    }

    pub fn config(&self) -> &PkiConfig {
        &self.config
    }

    /// Render the request body for a CSR without sending it
    pub fn render_request(&self, csr_pem: &[u8]) -> Result<String> {
        let subject = parse_csr(csr_pem)?;
        Ok(RequestTemplate::new(&self.config.parameters).render(&subject, self.action))
    }
}

#[async_trait]
impl Signer for PkiSigner {
    async fn check_health(&self) -> Result<()> {
        let status = self.transport.probe().await
            .map_err(|e| Error::HealthCheckFailed(format!("PKI endpoint unreachable: {}", e)))?;

        if status.is_server_error() {
            warn!("PKI endpoint {} unhealthy: {}", self.transport.base_url(), status);
            return Err(Error::HealthCheckFailed(format!("PKI endpoint returned status {}", status)));
        }

        debug!("PKI endpoint {} healthy: {}", self.transport.base_url(), status);
        Ok(())
    }

    async fn sign(&self, csr_pem: &[u8], validity_days: u32) -> Result<SignedCertificate> {
        let body = self.render_request(csr_pem)?;
        debug!("Sending PKI request ({} days requested): {}", validity_days, body);

        let response = self.transport.send(body).await
            .map_err(|e| Error::SigningFailed(format!("PKI request failed: {}", e)))?;

        if !response.status.is_success() {
            let text = String::from_utf8_lossy(&response.body);
            return Err(Error::SigningFailed(format!(
                "PKI endpoint returned status {}: {}",
                response.status,
                text.trim()
            )));
        }

        let bundle = ResponseParser::new(&self.config.response).parse(&response.body)?;

        info!("Certificate issued by {}", self.transport.base_url());
        Ok(SignedCertificate {
            certificate: bundle.leaf,
            ca: bundle.chain,
        })
    }
}
