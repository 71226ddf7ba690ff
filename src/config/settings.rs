use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::Error;
use crate::types::Result;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Mock CA configuration
    #[serde(default)]
    pub ca: MockCaConfig,

    /// Issuer controller configuration
    #[serde(default)]
    pub issuer: IssuerSettings,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address
    pub listen_addr: String,

    /// Per-request timeout (seconds)
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            request_timeout_secs: 30,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Output format (text, json)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

/// Mock CA configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MockCaConfig {
    /// CA subject common name
    pub common_name: String,

    /// CA subject organization
    pub organization: String,

    /// CA certificate validity (years)
    pub validity_years: u32,

    /// RSA modulus size for the CA key
    pub key_bits: usize,

    /// Default leaf validity (days)
    pub cert_validity_days: u32,
}

impl Default for MockCaConfig {
    fn default() -> Self {
        Self {
            common_name: "External Issuer Mock CA".to_string(),
            organization: "cert-manager-external-issuer".to_string(),
            validity_years: 10,
            key_bits: 2048,
            cert_validity_days: 365,
        }
    }
}

/// Issuer controller configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuerSettings {
    /// Namespace used when a reference carries none
    pub default_namespace: String,

    /// Config bundle key holding the PKI document
    pub default_config_key: String,

    /// Leaf validity when a request asks for no duration (days)
    pub default_validity_days: u32,

    /// Deadline for one reconciliation (seconds)
    pub reconcile_timeout_secs: u64,

    /// Optional YAML issuer catalog
    #[serde(skip_serializing_if = "Option::is_none")]
    pub catalog_path: Option<PathBuf>,
}

impl Default for IssuerSettings {
    fn default() -> Self {
        Self {
            default_namespace: "external-issuer-system".to_string(),
            default_config_key: crate::ca::pki::DEFAULT_CONFIG_KEY.to_string(),
            default_validity_days: 365,
            reconcile_timeout_secs: 120,
            catalog_path: None,
        }
    }
}

impl IssuerSettings {
    /// Reconciliation deadline
    pub fn reconcile_timeout(&self) -> Duration {
        Duration::from_secs(self.reconcile_timeout_secs)
    }
}

impl Settings {
    /// Load configuration from environment variables and configuration files
    pub fn load() -> Result<Self> {
        use config::{Config, Environment, File};
        use std::env;

        let mut builder = Config::builder();

        // Add default values
        builder = builder.add_source(Config::try_from(&Self::default())?);

        // Add configuration from files
        if let Ok(config_path) = env::var("CONFIG_FILE") {
            builder = builder.add_source(File::with_name(&config_path));
        } else {
            builder = builder.add_source(File::with_name("config/default").required(false));

            let env = env::var("APP_ENV").unwrap_or_else(|_| "development".into());
            builder = builder.add_source(File::with_name(&format!("config/{}", env)).required(false));
        }

        // Add environment variables
        builder = builder.add_source(Environment::with_prefix("MOCKCA").separator("__"));

        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;

        Ok(settings)
    }

    /// Parsed listen address
    pub fn listen_addr(&self) -> Result<SocketAddr> {
        self.server.listen_addr.parse::<SocketAddr>()
            .map_err(|e| Error::Config(format!("Invalid listen address '{}': {}", self.server.listen_addr, e)))
    }

    /// Check if configuration is valid
    pub fn validate(&self) -> Result<()> {
        self.listen_addr()?;

        if !matches!(self.logging.format.to_lowercase().as_str(), "text" | "json") {
            return Err(Error::Config(format!("Unknown log format: {}", self.logging.format)));
        }

        if self.ca.key_bits < 2048 {
            return Err(Error::Config("CA key must be at least 2048 bits".into()));
        }

        if self.ca.validity_years == 0 || self.ca.cert_validity_days == 0 || self.issuer.default_validity_days == 0 {
            return Err(Error::Config("Validity periods must be greater than zero".into()));
        }

        if self.server.request_timeout_secs == 0 {
            return Err(Error::Config("Request timeout must be greater than zero".into()));
        }

        Ok(())
    }
}
