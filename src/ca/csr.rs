use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use rcgen::{CertificateParams, DistinguishedName, KeyPair};
use tracing::debug;
use x509_parser::certification_request::X509CertificationRequest;
use x509_parser::extensions::{GeneralName, ParsedExtension};
use x509_parser::pem::parse_x509_pem;
use x509_parser::prelude::FromDer;
use x509_parser::x509::{AttributeTypeAndValue, X509Name};

use crate::error::Error;
use crate::types::Result;

/// PEM labels accepted for a certificate signing request
const CSR_LABELS: [&str; 2] = ["CERTIFICATE REQUEST", "NEW CERTIFICATE REQUEST"];

/// Subject and SAN fields lifted from a verified CSR
///
/// Lists keep the order in which the CSR carries them. IP, URI and email
/// SANs are passed through untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CsrSubject {
    /// Common Name (may be empty)
    pub common_name: String,
    /// Organization (O)
    pub organizations: Vec<String>,
    /// Organizational unit (OU)
    pub organizational_units: Vec<String>,
    /// Locality (L)
    pub localities: Vec<String>,
    /// State or province (ST)
    pub provinces: Vec<String>,
    /// Country (C)
    pub countries: Vec<String>,
    /// DNS SANs
    pub dns_names: Vec<String>,
    /// IP SANs
    pub ip_addresses: Vec<IpAddr>,
    /// URI SANs
    pub uris: Vec<String>,
    /// Email SANs
    pub emails: Vec<String>,
}

impl CsrSubject {
    /// Common Name to use when building a DN.
    ///
    /// Falls back to the first DNS SAN when the CSR has no CN. The CSR
    /// itself is never changed.
    pub fn dn_common_name(&self) -> Option<&str> {
        if !self.common_name.is_empty() {
            return Some(&self.common_name);
        }
        self.dns_names.first().map(String::as_str).filter(|name| !name.is_empty())
    }
}

/// Decode the first CSR PEM block into DER
pub fn decode_csr_pem(csr_pem: &[u8]) -> Result<Vec<u8>> {
    let (_, pem) = parse_x509_pem(csr_pem)
        .map_err(|e| Error::InvalidCsr(format!("Failed to decode CSR PEM: {}", e)))?;

    if !CSR_LABELS.contains(&pem.label.as_str()) {
        return Err(Error::InvalidCsr(format!("Unexpected PEM block type: {}", pem.label)));
    }

    Ok(pem.contents)
}

/// Parse a PEM CSR, verify its self-signature and extract its subject
pub fn parse_csr(csr_pem: &[u8]) -> Result<CsrSubject> {
    let der = decode_csr_pem(csr_pem)?;
    let (_, csr) = X509CertificationRequest::from_der(&der)
        .map_err(|e| Error::InvalidCsr(format!("Failed to parse CSR: {}", e)))?;

    csr.verify_signature()
        .map_err(|e| Error::InvalidSignature(format!("CSR signature validation failed: {}", e)))?;

    let mut subject = subject_from_name(&csr.certification_request_info.subject);

    if let Some(extensions) = csr.requested_extensions() {
        for extension in extensions {
            if let ParsedExtension::SubjectAlternativeName(san) = extension {
                for name in &san.general_names {
                    match name {
                        GeneralName::DNSName(dns) => subject.dns_names.push(dns.to_string()),
                        GeneralName::IPAddress(raw) => subject.ip_addresses.push(ip_from_bytes(raw)?),
                        GeneralName::URI(uri) => subject.uris.push(uri.to_string()),
                        GeneralName::RFC822Name(email) => subject.emails.push(email.to_string()),
                        _ => {}
                    }
                }
            }
        }
    }

    debug!(
        common_name = %subject.common_name,
        dns_names = ?subject.dns_names,
        "CSR parsed and verified"
    );

    Ok(subject)
}

/// Generate a PEM CSR for the given subject and DNS names
pub fn generate_csr(subject: DistinguishedName, dns_names: &[String], key_pair: &KeyPair) -> Result<String> {
    let mut params = CertificateParams::new(dns_names.to_vec())?;
    params.distinguished_name = subject;

    let csr = params.serialize_request(key_pair)?;
    Ok(csr.pem()?)
}

fn subject_from_name(name: &X509Name<'_>) -> CsrSubject {
    fn collect<'s, 'n: 's>(values: impl Iterator<Item = &'s AttributeTypeAndValue<'n>>) -> Vec<String> {
        values
            .filter_map(|attr| attr.as_str().ok())
            .filter(|value| !value.is_empty())
            .map(str::to_string)
            .collect()
    }

    CsrSubject {
        common_name: collect(name.iter_common_name()).into_iter().next().unwrap_or_default(),
        organizations: collect(name.iter_organization()),
        organizational_units: collect(name.iter_organizational_unit()),
        localities: collect(name.iter_locality()),
        provinces: collect(name.iter_state_or_province()),
        countries: collect(name.iter_country()),
        ..Default::default()
    }
}

fn ip_from_bytes(raw: &[u8]) -> Result<IpAddr> {
    match raw.len() {
        4 => {
            let octets: [u8; 4] = [raw[0], raw[1], raw[2], raw[3]];
            Ok(IpAddr::V4(Ipv4Addr::from(octets)))
        }
        16 => {
            let mut octets = [0u8; 16];
            octets.copy_from_slice(raw);
            Ok(IpAddr::V6(Ipv6Addr::from(octets)))
        }
        len => Err(Error::InvalidCsr(format!("Invalid IP SAN length: {}", len))),
    }
}
