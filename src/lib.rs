//! External Issuer - certificate request issuance through pluggable CAs
//!
//! Adapts CSRs to the wire formats of external PKI endpoints, drives
//! certificate requests through approval and issuance, and ships a mock CA
//! to test against.

// Foundational layer
pub mod error;
pub mod types;
pub mod utils;
pub mod config;
pub mod telemetry;

// Core layer
pub mod ca;

// Application layer
pub mod controller;

// Interface layer
pub mod api;

// Public key types
pub use crate::error::Error;
pub use crate::types::{RequestAction, Result, SignerKind};
pub use crate::ca::{MockCa, PkiSigner, Signer, SignerFactory};
pub use crate::controller::{CertificateRequestController, IssuerCatalog, IssuerHealthReconciler};
pub use crate::telemetry::metrics::MetricsCollector;
