use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::ca::mock::MockCa;
use crate::ca::pki::PkiSigner;
use crate::ca::types::SignedCertificate;
use crate::controller::issuer::IssuerConfig;
use crate::error::Error;
use crate::types::{RequestAction, Result, SignerKind};

/// Certificate signer capability
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Signer: Send + Sync {
    /// Verify the signer can be reached and is able to sign
    async fn check_health(&self) -> Result<()>;

    /// Sign a PEM CSR, returning the leaf and its CA chain
    async fn sign(&self, csr_pem: &[u8], validity_days: u32) -> Result<SignedCertificate>;
}

/// Builds the signer an issuer asks for
#[cfg_attr(test, mockall::automock)]
pub trait SignerFactory: Send + Sync {
    /// Create a signer for a resolved issuer
    fn create(&self, issuer: &IssuerConfig, action: RequestAction) -> Result<Arc<dyn Signer>>;
}

/// Default factory: shared mock CA, or a PKI signer per call
pub struct DefaultSignerFactory {
    mock_ca: Arc<MockCa>,
}

impl DefaultSignerFactory {
    pub fn new(mock_ca: Arc<MockCa>) -> Self {
        Self { mock_ca }
    }
}

impl SignerFactory for DefaultSignerFactory {
    fn create(&self, issuer: &IssuerConfig, action: RequestAction) -> Result<Arc<dyn Signer>> {
        debug!("Creating {} signer for issuer {}", issuer.kind, issuer.name);

        match issuer.kind {
            SignerKind::MockCa => Ok(self.mock_ca.clone()),
            SignerKind::Pki => {
                let config = issuer.pki.as_ref()
                    .ok_or_else(|| Error::Config(format!("Issuer {} has no PKI configuration", issuer.name)))?;
                let signer = PkiSigner::new(
                    config.clone(),
                    issuer.auth_token.as_deref(),
                    issuer.trusted_ca.as_deref(),
                )?
                .with_action(Some(action));
                Ok(Arc::new(signer))
            }
        }
    }
}
