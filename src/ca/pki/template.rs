use tracing::debug;
use url::form_urlencoded;

use crate::ca::csr::CsrSubject;
use crate::ca::pki::config::{DnFormat, ParamFormat, ParameterConfig};
use crate::types::RequestAction;

/// Ordered request parameters
///
/// An empty value is emitted as a bare key in semicolon format.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestParameters {
    pairs: Vec<(String, String)>,
}

impl RequestParameters {
    /// Create an empty parameter set
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a parameter, keeping insertion order
    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.pairs.push((key.into(), value.into()));
    }

    /// Look up the first value for a key
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    /// Iterate in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Serialize per the joining style.
    ///
    /// Semicolon output is not escaped: values must not contain `;` or `=`.
    pub fn serialize(&self, format: ParamFormat) -> String {
        match format {
            ParamFormat::Ampersand => {
                let mut serializer = form_urlencoded::Serializer::new(String::new());
                for (key, value) in &self.pairs {
                    serializer.append_pair(key, value);
                }
                serializer.finish()
            }
            ParamFormat::Semicolon => self
                .pairs
                .iter()
                .map(|(key, value)| {
                    if value.is_empty() {
                        key.clone()
                    } else {
                        format!("{}={}", key, value)
                    }
                })
                .collect::<Vec<_>>()
                .join(";"),
        }
    }
}

/// Build the subject DN string for a subject
///
/// Empty components are skipped. The CN falls back to the first DNS SAN.
pub fn build_subject_dn(subject: &CsrSubject, format: DnFormat) -> String {
    let cn = subject.dn_common_name();

    match format {
        DnFormat::Comma => {
            let mut parts = Vec::new();
            if let Some(cn) = cn {
                parts.push(format!("CN={}", cn));
            }
            push_components(&mut parts, "OU", &subject.organizational_units);
            push_components(&mut parts, "O", &subject.organizations);
            push_components(&mut parts, "L", &subject.localities);
            push_components(&mut parts, "ST", &subject.provinces);
            push_components(&mut parts, "C", &subject.countries);
            parts.join(",")
        }
        DnFormat::Slash => {
            let mut parts = Vec::new();
            push_components(&mut parts, "C", &subject.countries);
            push_components(&mut parts, "ST", &subject.provinces);
            push_components(&mut parts, "L", &subject.localities);
            push_components(&mut parts, "O", &subject.organizations);
            push_components(&mut parts, "OU", &subject.organizational_units);
            if let Some(cn) = cn {
                parts.push(format!("CN={}", cn));
            }
            parts.iter().map(|part| format!("/{}", part)).collect()
        }
    }
}

fn push_components(parts: &mut Vec<String>, key: &str, values: &[String]) {
    parts.extend(
        values
            .iter()
            .filter(|value| !value.is_empty())
            .map(|value| format!("{}={}", key, value)),
    );
}

/// Turns an encoded subject into the parameter set of one request
#[derive(Debug, Clone)]
pub struct RequestTemplate<'a> {
    params: &'a ParameterConfig,
}

impl<'a> RequestTemplate<'a> {
    pub fn new(params: &'a ParameterConfig) -> Self {
        Self { params }
    }

    /// Build the ordered parameter set: action, subject, SANs, retrieval key
    pub fn build(&self, subject: &CsrSubject, action: Option<RequestAction>) -> RequestParameters {
        let p = self.params;
        let mut out = RequestParameters::new();

        match action {
            Some(RequestAction::New) if !p.new_cert_param.is_empty() => {
                out.push(&p.new_cert_param, &p.new_cert_value);
            }
            Some(RequestAction::Renew) if !p.renew_cert_param.is_empty() => {
                out.push(&p.renew_cert_param, &p.renew_cert_value);
            }
            _ => {}
        }

        let dn = build_subject_dn(subject, p.subject_dn_format);
        if !p.subject_param.is_empty() && !dn.is_empty() {
            out.push(&p.subject_param, dn);
        }

        if !p.dns_prefix.is_empty() {
            let start = p.dns_start();
            let indexes = (0..p.dns_cap()).map_while(|offset| start.checked_add(offset));
            for (index, name) in indexes.zip(&subject.dns_names) {
                out.push(format!("{}{}", p.dns_prefix, index), name);
            }
        }

        if !p.get_cert_param.is_empty() {
            out.push(&p.get_cert_param, "");
        }

        debug!("Built {} request parameters", out.len());
        out
    }

    /// Build and serialize in one step
    pub fn render(&self, subject: &CsrSubject, action: Option<RequestAction>) -> String {
        self.build(subject, action).serialize(self.params.param_format)
    }
}
