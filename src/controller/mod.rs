pub mod certificate_request;
pub mod issuer;
pub mod issuer_health;
pub mod request;
pub mod store;

pub use certificate_request::{CertificateRequestController, ReconcileOutcome};
pub use issuer::{ExternalIssuer, IssuerCatalog, IssuerConfig, IssuerResolver, IssuerScope};
pub use issuer_health::IssuerHealthReconciler;
pub use request::{CertificateRequest, Condition, ConditionStatus, IssuerRef};
pub use store::{MemoryRequestStore, RequestStore};
