use std::fmt;
use std::str::FromStr;
use serde::{Serialize, Deserialize};

use crate::error::Error;

/// Project-wide Result type
pub type Result<T> = std::result::Result<T, crate::error::Error>;

/// Signer implementation selected by an issuer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignerKind {
    /// Built-in mock CA
    #[default]
    MockCa,
    /// External PKI endpoint driven by a protocol document
    Pki,
}

impl fmt::Display for SignerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignerKind::MockCa => write!(f, "mockca"),
            SignerKind::Pki => write!(f, "pki"),
        }
    }
}

impl FromStr for SignerKind {
    type Err = Error;

    /// Empty input selects the mock CA for backward compatibility.
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "" | "mockca" => Ok(SignerKind::MockCa),
            "pki" => Ok(SignerKind::Pki),
            other => Err(Error::Config(format!("Unsupported signer type: {}", other))),
        }
    }
}

/// Action requested from a remote PKI endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestAction {
    /// Create a certificate, or return the existing one
    New,
    /// Force a fresh certificate
    Renew,
}

impl fmt::Display for RequestAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestAction::New => write!(f, "new"),
            RequestAction::Renew => write!(f, "renew"),
        }
    }
}
