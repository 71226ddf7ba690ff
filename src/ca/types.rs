use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};

/// Result of a successful signing call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedCertificate {
    /// Leaf certificate PEM
    pub certificate: Vec<u8>,
    /// CA chain PEM
    pub ca: Vec<u8>,
}

/// Leaf issued by the mock CA, with the details its HTTP surface reports
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuedCertificate {
    /// Leaf certificate PEM
    pub cert_pem: String,
    /// Serial number, decimal
    pub serial: String,
    /// Start of validity
    pub not_before: DateTime<Utc>,
    /// End of validity
    pub not_after: DateTime<Utc>,
    /// Subject DN of the leaf
    pub subject: String,
}
