use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::ca::{LegacyFrontEnd, MockCa};
use crate::telemetry::MetricsCollector;

/// API state shared between handlers
#[derive(Clone)]
pub struct ApiState {
    /// Certificate authority
    pub ca: Arc<MockCa>,
    /// Legacy protocol front-end sharing the same CA
    pub legacy: Arc<LegacyFrontEnd>,
    /// Metrics collector
    pub metrics: Arc<MetricsCollector>,
    /// Process start, for uptime reporting
    pub started_at: Instant,
}

impl ApiState {
    /// Build state around one CA
    pub fn new(ca: Arc<MockCa>, metrics: Arc<MetricsCollector>) -> Self {
        Self {
            legacy: Arc::new(LegacyFrontEnd::new(ca.clone())),
            ca,
            metrics,
            started_at: Instant::now(),
        }
    }
}

/// Sign request payload
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct SignRequest {
    /// PEM CSR
    #[serde(default)]
    pub csr: String,
    /// Requested validity; the CA default when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validity_days: Option<u32>,
    /// Accepted for compatibility; the CSR subject is authoritative
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub common_name: Option<String>,
}

/// Sign response
#[derive(Debug, Serialize, Deserialize)]
pub struct SignResponse {
    /// Leaf certificate PEM
    pub certificate: String,
    /// Leaf followed by the CA
    pub certificate_chain: String,
    /// CA certificate PEM
    pub ca: String,
    /// Decimal serial number
    pub serial_number: String,
    /// RFC 3339
    pub not_before: String,
    /// RFC 3339
    pub not_after: String,
    /// Leaf subject DN
    pub subject: String,
}

/// Error body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Human readable message
    pub error: String,
    /// Stable error code
    pub code: String,
    /// Underlying cause
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub details: String,
}

/// Health response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Status
    pub status: String,
    /// Version
    pub version: String,
    /// CA subject DN
    pub ca_subject: String,
    /// CA expiry, RFC 3339
    pub ca_expires: String,
    /// Certificates signed since start
    pub certificates_signed: u64,
    /// Uptime, e.g. `1h2m3s`
    pub uptime: String,
}

/// Render a duration as `1h2m3s`, dropping leading zero units
pub fn format_uptime(uptime: Duration) -> String {
    let total = uptime.as_secs();
    let (hours, minutes, seconds) = (total / 3600, (total % 3600) / 60, total % 60);

    if hours > 0 {
        format!("{}h{}m{}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m{}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_uptime() {
        assert_eq!(format_uptime(Duration::from_secs(42)), "42s");
        assert_eq!(format_uptime(Duration::from_secs(125)), "2m5s");
        assert_eq!(format_uptime(Duration::from_secs(3600 + 60 + 1)), "1h1m1s");
    }
}
