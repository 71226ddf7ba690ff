use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::Value;
use tracing::debug;

use crate::ca::pki::config::{ResponseConfig, ResponseFormat};
use crate::error::Error;
use crate::types::Result;
use crate::utils::encode_pem;

const BEGIN_CERTIFICATE: &[u8] = b"-----BEGIN CERTIFICATE-----";
const END_CERTIFICATE: &[u8] = b"-----END CERTIFICATE-----";

/// Leaf certificate and CA chain, both PEM
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateBundle {
    pub leaf: Vec<u8>,
    pub chain: Vec<u8>,
}

/// Decodes a signing response into a certificate bundle
#[derive(Debug, Clone)]
pub struct ResponseParser<'a> {
    config: &'a ResponseConfig,
}

impl<'a> ResponseParser<'a> {
    pub fn new(config: &'a ResponseConfig) -> Self {
        Self { config }
    }

    /// Decode per the declared format, then split leaf from chain
    pub fn parse(&self, body: &[u8]) -> Result<CertificateBundle> {
        let stream = match self.config.format {
            ResponseFormat::Pem => body.to_vec(),
            ResponseFormat::Json => self.unwrap_json(body)?,
            ResponseFormat::Base64 => decode_base64(body)?,
        };

        extract_certificates(&stream)
    }

    fn unwrap_json(&self, body: &[u8]) -> Result<Vec<u8>> {
        let document: Value = serde_json::from_slice(body)
            .map_err(|e| Error::SigningFailed(format!("Failed to parse JSON response: {}", e)))?;

        let mut stream = json_field(&document, self.config.certificate_field())?.as_bytes().to_vec();

        if !self.config.chain_field.is_empty() {
            let chain = json_field(&document, &self.config.chain_field)?;
            if !stream.ends_with(b"\n") {
                stream.push(b'\n');
            }
            stream.extend_from_slice(chain.as_bytes());
        }

        Ok(stream)
    }
}

/// Resolve a dotted path to a string value
fn json_field<'v>(document: &'v Value, field: &str) -> Result<&'v str> {
    let mut current = document;
    for segment in field.split('.') {
        current = match current {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        }
        .ok_or_else(|| Error::MissingJsonField(field.to_string()))?;
    }

    current
        .as_str()
        .ok_or_else(|| Error::SigningFailed(format!("Field '{}' is not a string", field)))
}

/// Decode a base64 body; DER without armour is wrapped as one certificate
fn decode_base64(body: &[u8]) -> Result<Vec<u8>> {
    let compact: Vec<u8> = body.iter().copied().filter(|b| !b.is_ascii_whitespace()).collect();
    let decoded = STANDARD
        .decode(compact)
        .map_err(|e| Error::SigningFailed(format!("Failed to decode base64 response: {}", e)))?;

    if find(&decoded, BEGIN_CERTIFICATE, 0).is_some() {
        Ok(decoded)
    } else {
        debug!("Base64 response carries raw DER, armouring it");
        Ok(encode_pem("CERTIFICATE", &decoded).into_bytes())
    }
}

/// Split a PEM stream into leaf and chain.
///
/// The first certificate block is the leaf; later blocks form the chain in
/// the order they appear. Anything between blocks is ignored.
pub fn extract_certificates(stream: &[u8]) -> Result<CertificateBundle> {
    let mut blocks = Vec::new();
    let mut cursor = 0;

    while let Some(begin) = find(stream, BEGIN_CERTIFICATE, cursor) {
        let Some(end) = find(stream, END_CERTIFICATE, begin) else {
            break;
        };
        let stop = end + END_CERTIFICATE.len();
        blocks.push(&stream[begin..stop]);
        cursor = stop;
    }

    let (first, rest) = blocks.split_first().ok_or(Error::NoCertificateInResponse)?;

    let mut leaf = first.to_vec();
    leaf.push(b'\n');

    let mut chain = Vec::new();
    for block in rest {
        chain.extend_from_slice(block);
        chain.push(b'\n');
    }

    debug!("Extracted leaf and {} chain certificate(s)", rest.len());
    Ok(CertificateBundle { leaf, chain })
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if from >= haystack.len() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|pos| pos + from)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(tag: &str) -> String {
        format!("-----BEGIN CERTIFICATE-----\n{}\n-----END CERTIFICATE-----", tag)
    }

    #[test]
    fn test_three_blocks_split_leaf_and_chain() {
        let stream = format!("{}\n{}\n{}\n", block("AAAA"), block("BBBB"), block("CCCC"));

        let bundle = extract_certificates(stream.as_bytes()).unwrap();

        assert_eq!(bundle.leaf, format!("{}\n", block("AAAA")).into_bytes());
        assert_eq!(bundle.chain, format!("{}\n{}\n", block("BBBB"), block("CCCC")).into_bytes());
    }

    #[test]
    fn test_noise_between_blocks_is_ignored() {
        let stream = format!("Status: OK\r\n{}garbage\n\n{}\ntrailer", block("LEAF"), block("CA"));

        let bundle = extract_certificates(stream.as_bytes()).unwrap();

        assert_eq!(bundle.leaf, format!("{}\n", block("LEAF")).into_bytes());
        assert_eq!(bundle.chain, format!("{}\n", block("CA")).into_bytes());
    }

    #[test]
    fn test_no_certificate_is_error() {
        assert!(matches!(extract_certificates(b"<html>error</html>"), Err(Error::NoCertificateInResponse)));
        assert!(matches!(
            extract_certificates(b"-----BEGIN CERTIFICATE-----\nAAAA"),
            Err(Error::NoCertificateInResponse)
        ));
    }

    #[test]
    fn test_json_fields_are_unwrapped() {
        let config = ResponseConfig {
            format: ResponseFormat::Json,
            certificate_field: "data.cert".into(),
            chain_field: "data.chain".into(),
        };
        let body = serde_json::json!({
            "data": { "cert": block("LEAF"), "chain": block("CA") }
        });

        let bundle = ResponseParser::new(&config).parse(body.to_string().as_bytes()).unwrap();

        assert_eq!(bundle.leaf, format!("{}\n", block("LEAF")).into_bytes());
        assert_eq!(bundle.chain, format!("{}\n", block("CA")).into_bytes());
    }

    #[test]
    fn test_missing_json_field_is_named() {
        let config = ResponseConfig { format: ResponseFormat::Json, ..Default::default() };

        match ResponseParser::new(&config).parse(br#"{"crt": "x"}"#) {
            Err(Error::MissingJsonField(field)) => assert_eq!(field, "certificate"),
            other => panic!("expected MissingJsonField, got {:?}", other),
        }
    }

    #[test]
    fn test_base64_pem_and_raw_der() {
        let config = ResponseConfig { format: ResponseFormat::Base64, ..Default::default() };
        let parser = ResponseParser::new(&config);

        let wrapped = STANDARD.encode(format!("{}\n{}\n", block("LEAF"), block("CA")));
        let bundle = parser.parse(wrapped.as_bytes()).unwrap();
        assert_eq!(bundle.chain, format!("{}\n", block("CA")).into_bytes());

        let der = STANDARD.encode([0x30u8, 0x03, 0x02, 0x01, 0x01]);
        let bundle = parser.parse(der.as_bytes()).unwrap();
        assert_eq!(bundle.leaf, encode_pem("CERTIFICATE", &[0x30, 0x03, 0x02, 0x01, 0x01]).into_bytes());
        assert!(bundle.chain.is_empty());
    }
}
