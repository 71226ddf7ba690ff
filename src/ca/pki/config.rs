use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::Error;
use crate::types::Result;

/// Default key holding the PKI document inside a config bundle
pub const DEFAULT_CONFIG_KEY: &str = "pki-config.json";

/// First index used for SAN parameters when unset
pub const DEFAULT_DNS_START_INDEX: u32 = 2;

/// Maximum number of SAN parameters when unset
pub const DEFAULT_DNS_MAX_COUNT: u32 = 20;

/// JSON field holding the certificate when unset
pub const DEFAULT_CERTIFICATE_FIELD: &str = "certificate";

/// Declares a string-backed config enum.
///
/// Matching is case-insensitive and an empty string selects the default,
/// so documents written with `"paramFormat": ""` keep loading.
macro_rules! config_enum {
    (
        $(#[$meta:meta])*
        $name:ident, default = $default:ident, { $($variant:ident => $text:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "&'static str")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            /// Wire spelling
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::$default
            }
        }

        impl std::str::FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self> {
                let value = s.trim();
                if value.is_empty() {
                    return Ok(Self::default());
                }
                $(
                    if value.eq_ignore_ascii_case($text) {
                        return Ok(Self::$variant);
                    }
                )+
                Err(Error::Config(format!(concat!("Unsupported ", stringify!($name), ": {}"), value)))
            }
        }

        impl TryFrom<String> for $name {
            type Error = Error;

            fn try_from(value: String) -> Result<Self> {
                value.parse()
            }
        }

        impl From<$name> for &'static str {
            fn from(value: $name) -> Self {
                value.as_str()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

config_enum! {
    /// HTTP method used to reach the PKI endpoint
    HttpMethod, default = Post, { Get => "GET", Post => "POST" }
}

config_enum! {
    /// Parameter joining style
    ParamFormat, default = Ampersand, { Ampersand => "ampersand", Semicolon => "semicolon" }
}

config_enum! {
    /// Subject DN ordering
    DnFormat, default = Comma, { Comma => "comma", Slash => "slash" }
}

config_enum! {
    /// Encoding of the signing response
    ResponseFormat, default = Pem, { Pem => "pem", Json => "json", Base64 => "base64" }
}

config_enum! {
    /// How the credential is attached to requests
    AuthType, default = None, { None => "none", Bearer => "bearer", Basic => "basic", Header => "header" }
}

/// Wire-format description of an external PKI endpoint
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PkiConfig {
    /// Endpoint URL
    pub base_url: String,

    /// HTTP method
    #[serde(default)]
    pub method: HttpMethod,

    /// Request parameter layout
    #[serde(default)]
    pub parameters: ParameterConfig,

    /// Response decoding
    #[serde(default)]
    pub response: ResponseConfig,

    /// Authentication descriptor
    #[serde(default)]
    pub auth: AuthConfig,

    /// TLS trust descriptor
    #[serde(default)]
    pub tls: TlsConfig,
}

/// Request parameter layout
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ParameterConfig {
    pub param_format: ParamFormat,
    #[serde(rename = "subjectDNFormat")]
    pub subject_dn_format: DnFormat,
    pub new_cert_param: String,
    pub new_cert_value: String,
    pub renew_cert_param: String,
    pub renew_cert_value: String,
    pub subject_param: String,
    pub dns_prefix: String,
    /// Zero means unset
    pub dns_start_index: u32,
    /// Zero means unset
    pub dns_max_count: u32,
    pub get_cert_param: String,
}

impl ParameterConfig {
    /// Effective SAN start index
    pub fn dns_start(&self) -> u32 {
        if self.dns_start_index == 0 { DEFAULT_DNS_START_INDEX } else { self.dns_start_index }
    }

    /// Effective SAN cap
    pub fn dns_cap(&self) -> u32 {
        if self.dns_max_count == 0 { DEFAULT_DNS_MAX_COUNT } else { self.dns_max_count }
    }
}

/// Response decoding
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResponseConfig {
    pub format: ResponseFormat,
    /// Dotted path to the certificate inside a JSON response
    pub certificate_field: String,
    /// Dotted path to the CA chain inside a JSON response
    pub chain_field: String,
}

impl ResponseConfig {
    /// Certificate field, defaulted
    pub fn certificate_field(&self) -> &str {
        if self.certificate_field.is_empty() { DEFAULT_CERTIFICATE_FIELD } else { &self.certificate_field }
    }
}

/// Authentication descriptor
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AuthConfig {
    #[serde(rename = "type")]
    pub auth_type: AuthType,
    /// Header carrying the raw token for `header` auth
    pub header_name: String,
    /// Secret bundle holding the token
    pub secret_ref: String,
}

/// TLS trust descriptor
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TlsConfig {
    pub insecure_skip_verify: bool,
    /// Secret bundle holding a trusted CA under `ca.crt`
    pub ca_secret_ref: String,
}

impl PkiConfig {
    /// Parse a JSON PKI document and validate it
    pub fn from_json(document: &str) -> Result<Self> {
        let config: PkiConfig = serde_json::from_str(document)
            .map_err(|e| Error::Config(format!("Failed to parse PKI config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Check the document is usable
    pub fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            return Err(Error::Config("PKI config requires a non-empty baseUrl".into()));
        }

        let url = Url::parse(&self.base_url)
            .map_err(|e| Error::Config(format!("Invalid baseUrl '{}': {}", self.base_url, e)))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(Error::Config(format!("Unsupported baseUrl scheme: {}", url.scheme())));
        }

        if self.auth.auth_type == AuthType::Header && self.auth.header_name.trim().is_empty() {
            return Err(Error::Config("Header authentication requires auth.headerName".into()));
        }

        let params = &self.parameters;
        if params.dns_start().checked_add(params.dns_cap() - 1).is_none() {
            return Err(Error::Config(format!(
                "dnsStartIndex {} with dnsMaxCount {} exceeds the SAN index range",
                params.dns_start(),
                params.dns_cap()
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_document() {
        let document = r#"{
            "baseUrl": "https://pki.example.com/cgi/pki.cgi",
            "method": "post",
            "parameters": {
                "paramFormat": "semicolon",
                "subjectDNFormat": "SLASH",
                "newCertParam": "new",
                "newCertValue": "1",
                "renewCertParam": "renew",
                "renewCertValue": "1",
                "subjectParam": "subject",
                "dnsPrefix": "DNS",
                "dnsStartIndex": 2,
                "dnsMaxCount": 19,
                "getCertParam": "getCERT",
                "getKeyParam": "getKEY",
                "getCSRParam": "getCSR"
            },
            "response": { "format": "pem" },
            "auth": { "type": "bearer", "secretRef": "pki-token" },
            "tls": { "insecureSkipVerify": false, "caSecretRef": "pki-ca" }
        }"#;

        let config = PkiConfig::from_json(document).unwrap();

        assert_eq!(config.method, HttpMethod::Post);
        assert_eq!(config.parameters.param_format, ParamFormat::Semicolon);
        assert_eq!(config.parameters.subject_dn_format, DnFormat::Slash);
        assert_eq!(config.parameters.dns_cap(), 19);
        assert_eq!(config.auth.auth_type, AuthType::Bearer);
        assert_eq!(config.tls.ca_secret_ref, "pki-ca");
    }

    #[test]
    fn test_empty_enums_and_zero_counts_use_defaults() {
        let config = PkiConfig::from_json(
            r#"{"baseUrl": "http://ca.local", "method": "", "parameters": {"paramFormat": "", "dnsStartIndex": 0}}"#,
        ).unwrap();

        assert_eq!(config.method, HttpMethod::Post);
        assert_eq!(config.parameters.param_format, ParamFormat::Ampersand);
        assert_eq!(config.parameters.dns_start(), DEFAULT_DNS_START_INDEX);
        assert_eq!(config.parameters.dns_cap(), DEFAULT_DNS_MAX_COUNT);
        assert_eq!(config.response.certificate_field(), "certificate");
    }

    #[test]
    fn test_rejects_missing_base_url_and_unknown_enum() {
        assert!(matches!(PkiConfig::from_json(r#"{"baseUrl": ""}"#), Err(Error::Config(_))));
        assert!(matches!(PkiConfig::from_json(r#"{"method": "GET"}"#), Err(Error::Config(_))));
        assert!(matches!(
            PkiConfig::from_json(r#"{"baseUrl": "http://ca.local", "method": "PUT"}"#),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            PkiConfig::from_json(r#"{"baseUrl": "http://ca.local", "auth": {"type": "header"}}"#),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_rejects_san_index_overflow() {
        let document = r#"{"baseUrl": "http://ca.local", "parameters": {"dnsStartIndex": 4294967295, "dnsMaxCount": 2}}"#;
        assert!(matches!(PkiConfig::from_json(document), Err(Error::Config(_))));

        let document = r#"{"baseUrl": "http://ca.local", "parameters": {"dnsStartIndex": 4294967295, "dnsMaxCount": 1}}"#;
        assert!(PkiConfig::from_json(document).is_ok());
    }
}
