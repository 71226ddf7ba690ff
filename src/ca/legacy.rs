//! Legacy semicolon/slash-DN protocol served by the mock CA.
//!
//! Requests look like `new=1;subject=/C=US/O=Example/CN=host;DNS2=alt`.
//! The Common Name keys an in-memory store of issued material so later
//! `getCERT`, `getKEY` and `getCSR` calls can retrieve it.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use rcgen::{CertificateParams, DistinguishedName, DnType, KeyPair};
use tracing::{debug, info};

use crate::ca::csr::generate_csr;
use crate::ca::mock::MockCa;
use crate::error::Error;
use crate::types::Result;

/// Highest DNS parameter index honoured
pub const MAX_DNS_INDEX: u32 = 20;

/// Parsed legacy parameters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LegacyParams {
    values: HashMap<String, String>,
}

impl LegacyParams {
    /// Parse `key=value;key;...`; later duplicates win
    pub fn parse(body: &str) -> Self {
        let mut values = HashMap::new();

        for part in body.split(';').map(str::trim).filter(|part| !part.is_empty()) {
            match part.find('=') {
                Some(idx) if idx > 0 => {
                    values.insert(part[..idx].trim().to_string(), part[idx + 1..].trim().to_string());
                }
                _ => {
                    values.insert(part.to_string(), String::new());
                }
            }
        }

        Self { values }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    fn flag(&self, key: &str) -> bool {
        self.get(key) == Some("1")
    }

    /// What the caller asked for
    pub fn intent(&self) -> LegacyIntent {
        if self.contains("getCERT") {
            LegacyIntent::GetCert
        } else if self.contains("getKEY") {
            LegacyIntent::GetKey
        } else if self.contains("getCSR") {
            LegacyIntent::GetCsr
        } else if self.flag("new") && !self.flag("renew") {
            LegacyIntent::Create
        } else {
            LegacyIntent::Renew
        }
    }

    /// DNS names for a fresh certificate: the CN, then DNS2..DNS20
    pub fn dns_names(&self, common_name: &str) -> Vec<String> {
        let mut names = vec![common_name.to_string()];
        names.extend(
            (2..=MAX_DNS_INDEX)
                .filter_map(|i| self.get(&format!("DNS{}", i)))
                .filter(|name| !name.is_empty())
                .map(str::to_string),
        );
        names
    }
}

/// Legacy request intent, in precedence order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegacyIntent {
    GetCert,
    GetKey,
    GetCsr,
    /// Return the prior issuance for the CN, or issue one
    Create,
    /// Always issue fresh
    Renew,
}

impl fmt::Display for LegacyIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LegacyIntent::GetCert => "get_cert",
            LegacyIntent::GetKey => "get_key",
            LegacyIntent::GetCsr => "get_csr",
            LegacyIntent::Create => "create",
            LegacyIntent::Renew => "renew",
        };
        f.write_str(name)
    }
}

/// Subject parsed from a slash-ordered DN
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlashSubject {
    pub common_name: String,
    pub organizations: Vec<String>,
    pub organizational_units: Vec<String>,
    pub localities: Vec<String>,
    pub provinces: Vec<String>,
    pub countries: Vec<String>,
}

impl SlashSubject {
    /// Parse `/C=US/ST=CA/L=City/O=Org/OU=Unit/CN=name`; unknown keys are skipped
    pub fn parse(dn: &str) -> Self {
        let mut subject = Self::default();

        for part in dn.split('/').map(str::trim).filter(|part| !part.is_empty()) {
            let Some(idx) = part.find('=').filter(|idx| *idx > 0) else {
                continue;
            };
            let value = part[idx + 1..].trim().to_string();

            match part[..idx].trim().to_uppercase().as_str() {
                "CN" => subject.common_name = value,
                "O" => subject.organizations.push(value),
                "OU" => subject.organizational_units.push(value),
                "L" => subject.localities.push(value),
                "ST" => subject.provinces.push(value),
                "C" => subject.countries.push(value),
                _ => {}
            }
        }

        subject
    }

    /// Convert to an rcgen name, most general component first
    pub fn to_distinguished_name(&self) -> DistinguishedName {
        let mut dn = DistinguishedName::new();
        let groups = [
            (DnType::CountryName, &self.countries),
            (DnType::StateOrProvinceName, &self.provinces),
            (DnType::LocalityName, &self.localities),
            (DnType::OrganizationName, &self.organizations),
            (DnType::OrganizationalUnitName, &self.organizational_units),
        ];
        // rcgen keeps one value per attribute type
        for (kind, values) in groups {
            if let Some(value) = values.iter().find(|v| !v.is_empty()) {
                dn.push(kind, value.as_str());
            }
        }
        if !self.common_name.is_empty() {
            dn.push(DnType::CommonName, self.common_name.as_str());
        }
        dn
    }
}

/// Material retained per Common Name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredCertificate {
    pub cert_pem: String,
    pub key_pem: String,
    pub csr_pem: String,
    pub subject: String,
    pub serial: String,
}

/// Outcome of a legacy request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LegacyResponse {
    /// PEM body
    Pem(String),
    /// Retrieval target absent
    NotFound(String),
    /// Malformed request
    BadRequest(String),
}

/// Legacy protocol front-end over a shared mock CA
pub struct LegacyFrontEnd {
    ca: Arc<MockCa>,
    store: RwLock<HashMap<String, StoredCertificate>>,
}

impl LegacyFrontEnd {
    pub fn new(ca: Arc<MockCa>) -> Self {
        Self {
            ca,
            store: RwLock::new(HashMap::new()),
        }
    }

    /// Look up stored material by Common Name
    pub fn stored(&self, common_name: &str) -> Result<Option<StoredCertificate>> {
        let store = self.store.read()
            .map_err(|_| Error::Internal("Legacy store lock poisoned".into()))?;
        Ok(store.get(common_name).cloned())
    }

    /// Handle one semicolon-encoded request body
    pub async fn handle(&self, body: &str) -> Result<LegacyResponse> {
        self.handle_params(&LegacyParams::parse(body)).await
    }

    /// Handle already parsed parameters
    pub async fn handle_params(&self, params: &LegacyParams) -> Result<LegacyResponse> {
        debug!("Legacy request parameters: {:?}", params);

        let Some(subject_dn) = params.get("subject").filter(|s| !s.is_empty()) else {
            return Ok(LegacyResponse::BadRequest("subject parameter is required".into()));
        };

        let subject = SlashSubject::parse(subject_dn);
        if subject.common_name.is_empty() {
            return Ok(LegacyResponse::BadRequest("subject must contain CN".into()));
        }
        let cn = subject.common_name.clone();

        let intent = params.intent();
        match intent {
            LegacyIntent::GetCert => self.retrieve(&cn, "Certificate", |s| s.cert_pem.clone()),
            LegacyIntent::GetKey => self.retrieve(&cn, "Key", |s| s.key_pem.clone()),
            LegacyIntent::GetCsr => self.retrieve(&cn, "CSR", |s| s.csr_pem.clone()),
            LegacyIntent::Create => {
                if let Some(existing) = self.stored(&cn)? {
                    info!("Returning existing certificate for CN {}", cn);
                    return Ok(LegacyResponse::Pem(self.with_ca(&existing.cert_pem).await?));
                }
                self.issue(params, subject, subject_dn, false).await
            }
            LegacyIntent::Renew => self.issue(params, subject, subject_dn, true).await,
        }
    }

    fn retrieve(
        &self,
        cn: &str,
        what: &str,
        pick: impl Fn(&StoredCertificate) -> String,
    ) -> Result<LegacyResponse> {
        Ok(match self.stored(cn)? {
            Some(stored) => LegacyResponse::Pem(pick(&stored)),
            None => LegacyResponse::NotFound(format!("{} not found", what)),
        })
    }

    async fn issue(
        &self,
        params: &LegacyParams,
        subject: SlashSubject,
        subject_dn: &str,
        replace: bool,
    ) -> Result<LegacyResponse> {
        let cn = subject.common_name.clone();
        let dns_names = params.dns_names(&cn);
        info!("Generating new certificate for CN {} (dns_names={:?}, renew={})", cn, dns_names, replace);

        let key = KeyPair::generate()?;
        let dn = subject.to_distinguished_name();
        let csr_pem = generate_csr(dn.clone(), &dns_names, &key)?;

        let mut cert_params = CertificateParams::new(dns_names)?;
        cert_params.distinguished_name = dn;
        let issued = self.ca.issue_for_key(cert_params, &key, self.ca.config().cert_validity_days).await?;

        let fresh = StoredCertificate {
            cert_pem: issued.cert_pem,
            key_pem: key.serialize_pem(),
            csr_pem,
            subject: subject_dn.to_string(),
            serial: issued.serial,
        };

        let cert_pem = {
            let mut store = self.store.write()
                .map_err(|_| Error::Internal("Legacy store lock poisoned".into()))?;
            if replace {
                store.insert(cn, fresh.clone());
                fresh.cert_pem
            } else {
                // A concurrent create for the same CN may have won the race
                store.entry(cn).or_insert(fresh).cert_pem.clone()
            }
        };

        Ok(LegacyResponse::Pem(self.with_ca(&cert_pem).await?))
    }

    async fn with_ca(&self, cert_pem: &str) -> Result<String> {
        let authority = self.ca.authority().await?;
        Ok(format!("{}{}", cert_pem, authority.cert_pem()))
    }
}
