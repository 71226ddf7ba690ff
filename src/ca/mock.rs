use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Months, Utc};
use rand::RngCore;
use rcgen::{
    BasicConstraints, Certificate, CertificateParams, CertificateSigningRequestParams,
    DistinguishedName, DnType, ExtendedKeyUsagePurpose, IsCa, KeyPair, KeyUsagePurpose,
    PublicKeyData, SerialNumber,
};
use rsa::pkcs8::{EncodePrivateKey, LineEnding};
use rsa::RsaPrivateKey;
use time::OffsetDateTime;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::ca::csr::parse_csr;
use crate::ca::provider::Signer;
use crate::ca::types::{IssuedCertificate, SignedCertificate};
use crate::config::MockCaConfig;
use crate::error::Error;
use crate::types::Result;

/// Key pair and self-signed certificate of the mock CA
pub struct CaAuthority {
    cert: Certificate,
    key: KeyPair,
    cert_pem: String,
    subject: String,
    not_after: DateTime<Utc>,
}

impl CaAuthority {
    /// CA certificate PEM
    pub fn cert_pem(&self) -> &str {
        &self.cert_pem
    }

    /// CA subject DN
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// CA expiry
    pub fn not_after(&self) -> DateTime<Utc> {
        self.not_after
    }
}

/// Self-contained certificate authority
///
/// The CA key is generated on first use and never changes afterwards.
/// Concurrent first callers all wait on the same generation.
pub struct MockCa {
    config: MockCaConfig,
    authority: OnceCell<Arc<CaAuthority>>,
    signed: AtomicU64,
}

impl MockCa {
    /// Create a mock CA; nothing is generated until first use
    pub fn new(config: MockCaConfig) -> Self {
        Self {
            config,
            authority: OnceCell::new(),
            signed: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &MockCaConfig {
        &self.config
    }

    /// Return the CA, generating it on first call
    pub async fn authority(&self) -> Result<Arc<CaAuthority>> {
        let authority = self.authority
            .get_or_try_init(|| async {
                let config = self.config.clone();
                let authority = tokio::task::spawn_blocking(move || generate_authority(&config))
                    .await
                    .map_err(|e| Error::CaInit(format!("CA generation task failed: {}", e)))??;
                Ok::<_, Error>(Arc::new(authority))
            })
            .await?;

        Ok(authority.clone())
    }

    /// Whether the CA has been generated yet
    pub fn is_initialized(&self) -> bool {
        self.authority.initialized()
    }

    /// Number of leaf certificates issued so far
    pub fn signed_count(&self) -> u64 {
        self.signed.load(Ordering::Relaxed)
    }

    /// Issue a leaf for a PEM CSR after verifying its signature
    pub async fn issue_from_csr(&self, csr_pem: &[u8], validity_days: u32) -> Result<IssuedCertificate> {
        let subject = parse_csr(csr_pem)?;
        let authority = self.authority().await?;

        let text = std::str::from_utf8(csr_pem)
            .map_err(|e| Error::InvalidCsr(format!("CSR is not valid UTF-8: {}", e)))?;
        let mut csr = CertificateSigningRequestParams::from_pem(text)
            .map_err(|e| Error::InvalidCsr(format!("Failed to load CSR: {}", e)))?;

        let window = self.apply_leaf_profile(&mut csr.params, validity_days)?;
        let cert = csr.signed_by(&authority.cert, &authority.key)?;

        debug!("Signed CSR for CN={}", subject.common_name);
        self.finish(cert, window)
    }

    /// Issue a leaf for locally generated key material
    pub async fn issue_for_key(
        &self,
        mut params: CertificateParams,
        public_key: &impl PublicKeyData,
        validity_days: u32,
    ) -> Result<IssuedCertificate> {
        let authority = self.authority().await?;

        let window = self.apply_leaf_profile(&mut params, validity_days)?;
        let cert = params.signed_by(public_key, &authority.cert, &authority.key)?;

        self.finish(cert, window)
    }

    fn apply_leaf_profile(&self, params: &mut CertificateParams, validity_days: u32) -> Result<LeafWindow> {
        let days = if validity_days == 0 { self.config.cert_validity_days } else { validity_days };
        let now = Utc::now();
        let window = LeafWindow {
            serial: random_serial(),
            not_before: now - Duration::minutes(1),
            not_after: now + Duration::days(i64::from(days)),
        };

        params.serial_number = Some(SerialNumber::from_slice(&window.serial));
        params.not_before = to_offset(window.not_before)?;
        params.not_after = to_offset(window.not_after)?;
        params.key_usages = vec![KeyUsagePurpose::DigitalSignature, KeyUsagePurpose::KeyEncipherment];
        params.extended_key_usages = vec![ExtendedKeyUsagePurpose::ServerAuth, ExtendedKeyUsagePurpose::ClientAuth];
        params.is_ca = IsCa::ExplicitNoCa;
        params.use_authority_key_identifier_extension = true;

        Ok(window)
    }

    fn finish(&self, cert: Certificate, window: LeafWindow) -> Result<IssuedCertificate> {
        let (_, parsed) = x509_parser::parse_x509_certificate(cert.der())
            .map_err(|e| Error::Internal(format!("Failed to re-read issued certificate: {}", e)))?;
        let subject = parsed.subject().to_string();
        let serial = u128::from_be_bytes(window.serial).to_string();

        let total = self.signed.fetch_add(1, Ordering::Relaxed) + 1;
        info!(serial = %serial, subject = %subject, total_signed = total, "Certificate signed");

        Ok(IssuedCertificate {
            cert_pem: cert.pem(),
            serial,
            not_before: window.not_before,
            not_after: window.not_after,
            subject,
        })
    }
}

#[async_trait]
impl Signer for MockCa {
    async fn check_health(&self) -> Result<()> {
        self.authority().await.map(|_| ())
    }

    async fn sign(&self, csr_pem: &[u8], validity_days: u32) -> Result<SignedCertificate> {
        let issued = self.issue_from_csr(csr_pem, validity_days).await?;
        let authority = self.authority().await?;

        Ok(SignedCertificate {
            certificate: issued.cert_pem.into_bytes(),
            ca: authority.cert_pem.clone().into_bytes(),
        })
    }
}

struct LeafWindow {
    serial: [u8; 16],
    not_before: DateTime<Utc>,
    not_after: DateTime<Utc>,
}

fn random_serial() -> [u8; 16] {
    let mut serial = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut serial);
    serial
}

fn to_offset(at: DateTime<Utc>) -> Result<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp(at.timestamp())
        .map_err(|e| Error::Internal(format!("Timestamp out of range: {}", e)))
}

/// Generate the CA key pair and self-signed certificate
fn generate_authority(config: &MockCaConfig) -> Result<CaAuthority> {
    info!("Generating {}-bit RSA key for mock CA '{}'", config.key_bits, config.common_name);

    let rsa_key = RsaPrivateKey::new(&mut rand::thread_rng(), config.key_bits)
        .map_err(|e| Error::CaInit(format!("Failed to generate CA key: {}", e)))?;
    let pkcs8 = rsa_key.to_pkcs8_pem(LineEnding::LF)
        .map_err(|e| Error::CaInit(format!("Failed to encode CA key: {}", e)))?;
    let key = KeyPair::from_pem(&pkcs8)
        .map_err(|e| Error::CaInit(format!("Failed to load CA key: {}", e)))?;

    let now = Utc::now();
    let not_after = now
        .checked_add_months(Months::new(config.validity_years.saturating_mul(12)))
        .ok_or_else(|| Error::CaInit("CA validity out of range".into()))?;

    let mut dn = DistinguishedName::new();
    dn.push(DnType::CommonName, config.common_name.as_str());
    dn.push(DnType::OrganizationName, config.organization.as_str());

    let mut params = CertificateParams::default();
    params.distinguished_name = dn;
    params.serial_number = Some(SerialNumber::from_slice(&random_serial()));
    params.not_before = to_offset(now - Duration::hours(1))?;
    params.not_after = to_offset(not_after)?;
    params.is_ca = IsCa::Ca(BasicConstraints::Constrained(1));
    params.key_usages = vec![
        KeyUsagePurpose::KeyCertSign,
        KeyUsagePurpose::CrlSign,
        KeyUsagePurpose::DigitalSignature,
    ];

    let cert = params.self_signed(&key)
        .map_err(|e| Error::CaInit(format!("Failed to self-sign CA certificate: {}", e)))?;

    let (_, parsed) = x509_parser::parse_x509_certificate(cert.der())
        .map_err(|e| Error::CaInit(format!("Failed to re-read CA certificate: {}", e)))?;
    let subject = parsed.subject().to_string();

    info!("Mock CA ready: {} (expires {})", subject, not_after.to_rfc3339());

    Ok(CaAuthority {
        cert_pem: cert.pem(),
        cert,
        key,
        subject,
        not_after,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::ca::csr::generate_csr;
    use once_cell::sync::Lazy;
    use x509_parser::prelude::*;

    /// One CA shared by every test in the crate; RSA generation is slow
    pub(crate) static TEST_CA: Lazy<Arc<MockCa>> = Lazy::new(|| Arc::new(MockCa::new(MockCaConfig::default())));

    pub(crate) fn test_csr(cn: &str, dns: &[&str]) -> String {
        let mut dn = DistinguishedName::new();
        dn.push(DnType::OrganizationName, "Example");
        dn.push(DnType::CommonName, cn);
        let names: Vec<String> = dns.iter().map(|s| s.to_string()).collect();
        generate_csr(dn, &names, &KeyPair::generate().unwrap()).unwrap()
    }

    fn der_of(pem: &[u8]) -> Vec<u8> {
        let (_, pem) = parse_x509_pem(pem).unwrap();
        pem.contents
    }

    #[tokio::test]
    async fn test_signed_leaf_verifies_against_ca() {
        let ca = TEST_CA.clone();
        let signed = ca.sign(test_csr("example.com", &["example.com", "www.example.com"]).as_bytes(), 90).await.unwrap();

        let leaf_der = der_of(&signed.certificate);
        let ca_der = der_of(&signed.ca);
        let (_, leaf) = X509Certificate::from_der(&leaf_der).unwrap();
        let (_, ca_cert) = X509Certificate::from_der(&ca_der).unwrap();

        assert!(leaf.verify_signature(Some(ca_cert.public_key())).is_ok());
        assert_eq!(leaf.issuer().to_string(), ca_cert.subject().to_string());
        assert!(!leaf.is_ca());
        assert!(ca_cert.is_ca());

        let validity = leaf.validity();
        let span = validity.not_after.timestamp() - validity.not_before.timestamp();
        let expected = 90 * 24 * 3600 + 60;
        assert!((span - expected).abs() <= 60, "span {} not within a minute of {}", span, expected);

        let san = leaf.subject_alternative_name().unwrap().unwrap();
        let dns: Vec<String> = san.value.general_names.iter().filter_map(|name| match name {
            GeneralName::DNSName(dns) => Some(dns.to_string()),
            _ => None,
        }).collect();
        assert_eq!(dns, vec!["example.com", "www.example.com"]);

        let eku = leaf.extended_key_usage().unwrap().unwrap();
        assert!(eku.value.server_auth && eku.value.client_auth);
        let ku = leaf.key_usage().unwrap().unwrap();
        assert!(ku.value.digital_signature() && ku.value.key_encipherment());
    }

    #[tokio::test]
    async fn test_ca_certificate_profile() {
        let authority = TEST_CA.authority().await.unwrap();
        let der = der_of(authority.cert_pem().as_bytes());
        let (_, cert) = X509Certificate::from_der(&der).unwrap();

        assert!(authority.subject().contains("CN=External Issuer Mock CA"));
        let constraints = cert.basic_constraints().unwrap().unwrap();
        assert!(constraints.value.ca);
        assert_eq!(constraints.value.path_len_constraint, Some(1));
        let ku = cert.key_usage().unwrap().unwrap();
        assert!(ku.value.key_cert_sign() && ku.value.crl_sign() && ku.value.digital_signature());
        assert!(cert.verify_signature(None).is_ok());
    }

    #[tokio::test]
    async fn test_serials_are_distinct() {
        let csr = test_csr("serial.example.com", &[]);
        let first = TEST_CA.issue_from_csr(csr.as_bytes(), 30).await.unwrap();
        let second = TEST_CA.issue_from_csr(csr.as_bytes(), 30).await.unwrap();

        assert_ne!(first.serial, second.serial);
        assert!(first.subject.contains("CN=serial.example.com"));
        assert!(first.subject.contains("O=Example"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_first_use_generates_once() {
        let ca = Arc::new(MockCa::new(MockCaConfig::default()));
        assert!(!ca.is_initialized());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let ca = ca.clone();
                tokio::spawn(async move { ca.authority().await.unwrap().cert_pem().to_string() })
            })
            .collect();

        let mut pems = Vec::new();
        for handle in handles {
            pems.push(handle.await.unwrap());
        }

        assert!(ca.is_initialized());
        assert!(pems.windows(2).all(|pair| pair[0] == pair[1]));
    }

    #[tokio::test]
    async fn test_bad_csr_is_rejected_before_signing() {
        let truncated = b"-----BEGIN CERTIFICATE REQUEST-----\nAAAA\n-----END CERTIFICATE REQUEST-----\n";
        assert!(matches!(TEST_CA.sign(truncated, 30).await, Err(Error::InvalidCsr(_))));
    }
}
