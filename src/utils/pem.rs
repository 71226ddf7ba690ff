use base64::{engine::general_purpose::STANDARD, Engine as _};

/// Width of a base64 line inside PEM armour
const PEM_LINE_WIDTH: usize = 64;

/// Armour DER bytes as a PEM block with LF line endings
pub fn encode_pem(label: &str, der: &[u8]) -> String {
    let encoded = STANDARD.encode(der);
    let mut out = String::with_capacity(encoded.len() + encoded.len() / PEM_LINE_WIDTH + label.len() * 2 + 40);

    out.push_str(&format!("-----BEGIN {}-----\n", label));
    for chunk in encoded.as_bytes().chunks(PEM_LINE_WIDTH) {
        // base64 output is ASCII, so every chunk is valid UTF-8
        out.push_str(&String::from_utf8_lossy(chunk));
        out.push('\n');
    }
    out.push_str(&format!("-----END {}-----\n", label));

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_wraps_lines() {
        let der = vec![0xABu8; 100];
        let pem = encode_pem("CERTIFICATE", &der);

        assert!(pem.starts_with("-----BEGIN CERTIFICATE-----\n"));
        assert!(pem.ends_with("-----END CERTIFICATE-----\n"));
        assert!(pem.lines().all(|line| line.len() <= PEM_LINE_WIDTH || line.starts_with("-----")));

        let (_, parsed) = x509_parser::pem::parse_x509_pem(pem.as_bytes()).unwrap();
        assert_eq!(parsed.label, "CERTIFICATE");
        assert_eq!(parsed.contents, der);
    }
}
