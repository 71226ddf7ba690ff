use prometheus::{
    Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

use crate::error::Error;
use crate::types::Result;

/// Prometheus metrics for the mock CA server
pub struct MetricsCollector {
    /// Registry
    registry: Registry,
    /// Certificates signed through the sign endpoints
    certificates_signed: IntCounter,
    /// Sign requests rejected, by error code
    sign_failures: IntCounterVec,
    /// Legacy requests, by intent and outcome
    legacy_requests: IntCounterVec,
    /// Whether the CA has been generated
    ca_initialized: IntGauge,
}

impl MetricsCollector {
    /// Create a new metrics collector
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let certificates_signed = IntCounter::with_opts(
            Opts::new("mockca_certificates_signed_total", "Number of certificates signed"),
        )?;
        let sign_failures = IntCounterVec::new(
            Opts::new("mockca_sign_failures_total", "Number of rejected sign requests"),
            &["code"],
        )?;
        let legacy_requests = IntCounterVec::new(
            Opts::new("mockca_legacy_requests_total", "Number of legacy protocol requests"),
            &["intent", "outcome"],
        )?;
        let ca_initialized = IntGauge::with_opts(
            Opts::new("mockca_ca_initialized", "Whether the CA key pair has been generated"),
        )?;

        registry.register(Box::new(certificates_signed.clone()))?;
        registry.register(Box::new(sign_failures.clone()))?;
        registry.register(Box::new(legacy_requests.clone()))?;
        registry.register(Box::new(ca_initialized.clone()))?;

        Ok(Self {
            registry,
            certificates_signed,
            sign_failures,
            legacy_requests,
            ca_initialized,
        })
    }

    /// Increment signed certificates
    pub fn inc_certificates_signed(&self) {
        self.certificates_signed.inc();
    }

    /// Increment rejected sign requests
    pub fn inc_sign_failures(&self, code: &str) {
        self.sign_failures.with_label_values(&[code]).inc();
    }

    /// Count one legacy request
    pub fn observe_legacy_request(&self, intent: &str, outcome: &str) {
        self.legacy_requests.with_label_values(&[intent, outcome]).inc();
    }

    pub fn set_ca_initialized(&self, initialized: bool) {
        self.ca_initialized.set(i64::from(initialized));
    }

    /// Render all metrics in the text exposition format
    pub fn render(&self) -> Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer)
            .map_err(|e| Error::Internal(format!("Metrics output is not UTF-8: {}", e)))
    }
}
