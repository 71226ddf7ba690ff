use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::RequestAction;

/// Condition type set by an external approver
pub const CONDITION_APPROVED: &str = "Approved";
/// Condition type set by an external approver
pub const CONDITION_DENIED: &str = "Denied";
/// Condition type owned by the controllers
pub const CONDITION_READY: &str = "Ready";

/// Terminal failure reason written by other controllers
pub const REASON_FAILED: &str = "Failed";
/// Terminal denial reason written by other controllers
pub const REASON_DENIED: &str = "Denied";
/// Success reason for certificate requests
pub const REASON_ISSUED: &str = "Issued";

/// Tri-state condition status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

impl fmt::Display for ConditionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConditionStatus::True => write!(f, "True"),
            ConditionStatus::False => write!(f, "False"),
            ConditionStatus::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Named condition on a request or issuer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(rename = "type")]
    pub condition_type: String,
    pub status: ConditionStatus,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<DateTime<Utc>>,
}

impl Condition {
    /// Build a condition stamped with the current time
    pub fn new(
        condition_type: impl Into<String>,
        status: ConditionStatus,
        reason: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            condition_type: condition_type.into(),
            status,
            reason: reason.into(),
            message: message.into(),
            last_transition_time: Some(Utc::now()),
        }
    }

    pub fn is_true(&self) -> bool {
        self.status == ConditionStatus::True
    }
}

/// Replace the condition of the same type, or append it
pub fn set_condition(conditions: &mut Vec<Condition>, condition: Condition) {
    match conditions.iter_mut().find(|c| c.condition_type == condition.condition_type) {
        Some(existing) => *existing = condition,
        None => conditions.push(condition),
    }
}

/// Find a condition by type
pub fn find_condition<'a>(conditions: &'a [Condition], condition_type: &str) -> Option<&'a Condition> {
    conditions.iter().find(|c| c.condition_type == condition_type)
}

/// Whether a condition of this type is present and true
pub fn is_condition_true(conditions: &[Condition], condition_type: &str) -> bool {
    find_condition(conditions, condition_type).map_or(false, Condition::is_true)
}

/// Reference from a request to the issuer that should sign it
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuerRef {
    pub name: String,
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub group: String,
}

/// Observed state of a certificate request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateRequestStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,
    /// Signed leaf PEM
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate: Option<Vec<u8>>,
    /// CA chain PEM
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca: Option<Vec<u8>>,
}

/// A request for a signed certificate
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateRequest {
    pub name: String,
    pub namespace: String,
    /// PEM CSR
    pub request: Vec<u8>,
    pub issuer_ref: IssuerRef,
    /// Requested certificate lifetime
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<u64>,
    /// Issuance revision of the owning certificate; 1 for the first issuance
    #[serde(default)]
    pub revision: u32,
    #[serde(default)]
    pub status: CertificateRequestStatus,
}

impl CertificateRequest {
    /// `namespace/name`
    pub fn key(&self) -> String {
        request_key(&self.namespace, &self.name)
    }

    pub fn has_certificate(&self) -> bool {
        self.status.certificate.as_ref().map_or(false, |cert| !cert.is_empty())
    }

    pub fn is_approved(&self) -> bool {
        is_condition_true(&self.status.conditions, CONDITION_APPROVED)
    }

    pub fn is_denied(&self) -> bool {
        is_condition_true(&self.status.conditions, CONDITION_DENIED)
    }

    /// Ready is true, or already failed or denied for good
    pub fn is_terminal(&self) -> bool {
        find_condition(&self.status.conditions, CONDITION_READY).map_or(false, |c| {
            c.is_true() || c.reason == REASON_FAILED || c.reason == REASON_DENIED
        })
    }

    /// Requested validity in whole days, rounded up
    pub fn validity_days(&self, default_days: u32) -> u32 {
        match self.duration_seconds {
            Some(seconds) if seconds > 0 => {
                let days = (seconds + 86_399) / 86_400;
                u32::try_from(days).unwrap_or(u32::MAX)
            }
            _ => default_days,
        }
    }

    /// Renewals ask the CA for the renew action
    pub fn action(&self) -> RequestAction {
        if self.revision > 1 {
            RequestAction::Renew
        } else {
            RequestAction::New
        }
    }

    /// Record the controller's Ready outcome
    pub fn set_ready(&mut self, status: ConditionStatus, reason: &str, message: impl Into<String>) {
        set_condition(
            &mut self.status.conditions,
            Condition::new(CONDITION_READY, status, reason, message),
        );
    }
}

/// Store key for a namespaced object
pub fn request_key(namespace: &str, name: &str) -> String {
    format!("{}/{}", namespace, name)
}
