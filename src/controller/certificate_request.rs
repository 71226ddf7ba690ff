use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::ca::provider::SignerFactory;
use crate::ca::types::SignedCertificate;
use crate::config::IssuerSettings;
use crate::controller::issuer::{IssuerResolver, IssuerScope, ISSUER_GROUP};
use crate::controller::request::{CertificateRequest, ConditionStatus, REASON_ISSUED};
use crate::controller::store::RequestStore;
use crate::error::Error;
use crate::types::Result;

pub const REASON_ISSUER_NOT_FOUND: &str = "IssuerNotFound";
pub const REASON_CONFIG_ERROR: &str = "ConfigError";
pub const REASON_AUTH_ERROR: &str = "AuthError";
pub const REASON_HEALTH_CHECK_FAILED: &str = "HealthCheckFailed";
pub const REASON_SIGNING_FAILED: &str = "SigningFailed";

/// Message recorded on successful issuance
pub const ISSUED_MESSAGE: &str = "Certificate issued successfully";

/// What one reconciliation did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The request no longer exists
    NotFound,
    /// Addressed to another issuer group or kind
    Ignored,
    /// Already carries a certificate or a terminal Ready condition
    AlreadyComplete,
    /// Denied by an external approver
    Denied,
    /// Not yet approved
    AwaitingApproval,
    /// Certificate written back
    Issued,
    /// Another reconciliation of the same request is running
    InProgress,
    /// Failure recorded as Ready=False; `retryable` tells whether a retry
    /// with unchanged inputs can succeed
    Failed { reason: String, message: String, retryable: bool },
}

enum Verdict {
    Issued(SignedCertificate),
    Failed { reason: &'static str, message: String, retryable: bool },
}

impl Verdict {
    fn failed(reason: &'static str, err: &Error) -> Self {
        Verdict::Failed { reason, message: err.to_string(), retryable: err.is_retryable() }
    }
}

/// Claim on one request key, released on drop
struct InFlight<'a> {
    keys: &'a Mutex<HashSet<String>>,
    key: String,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if let Ok(mut keys) = self.keys.lock() {
            keys.remove(&self.key);
        }
    }
}

/// Drives certificate requests from approval to issuance
pub struct CertificateRequestController {
    store: Arc<dyn RequestStore>,
    resolver: Arc<dyn IssuerResolver>,
    signers: Arc<dyn SignerFactory>,
    settings: IssuerSettings,
    in_flight: Mutex<HashSet<String>>,
}

impl CertificateRequestController {
    pub fn new(
        store: Arc<dyn RequestStore>,
        resolver: Arc<dyn IssuerResolver>,
        signers: Arc<dyn SignerFactory>,
        settings: IssuerSettings,
    ) -> Self {
        Self {
            store,
            resolver,
            signers,
            settings,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    /// Reconcile one request under the configured deadline; zero disables it
    pub async fn reconcile(&self, namespace: &str, name: &str) -> Result<ReconcileOutcome> {
        let deadline = Some(self.settings.reconcile_timeout()).filter(|d| !d.is_zero());
        self.run(namespace, name, deadline).await
    }

    /// Reconcile one request, abandoning it if `deadline` elapses first.
    ///
    /// Nothing is written back when the deadline fires.
    pub async fn reconcile_with_deadline(&self, namespace: &str, name: &str, deadline: Duration) -> Result<ReconcileOutcome> {
        self.run(namespace, name, Some(deadline)).await
    }

    async fn run(&self, namespace: &str, name: &str, deadline: Option<Duration>) -> Result<ReconcileOutcome> {
        let Some(mut request) = self.store.get(namespace, name).await? else {
            debug!("CertificateRequest {}/{} not found", namespace, name);
            return Ok(ReconcileOutcome::NotFound);
        };

        if let Some(outcome) = self.precheck(&request) {
            return Ok(outcome);
        }

        let Some(_claim) = self.claim(&request.key())? else {
            debug!("CertificateRequest {} is already being processed", request.key());
            return Ok(ReconcileOutcome::InProgress);
        };

        info!(request = %request.key(), issuer = %request.issuer_ref.name, "Processing CertificateRequest");

        let verdict = match deadline {
            Some(deadline) => tokio::time::timeout(deadline, self.process(&request))
                .await
                .map_err(|_| {
                    warn!("Reconciliation of {} abandoned after {:?}", request.key(), deadline);
                    Error::DeadlineExceeded(deadline)
                })?,
            None => self.process(&request).await,
        };

        self.write_back(&mut request, verdict).await
    }

    fn claim(&self, key: &str) -> Result<Option<InFlight<'_>>> {
        let mut keys = self.in_flight.lock()
            .map_err(|_| Error::Internal("In-flight set lock poisoned".into()))?;
        if !keys.insert(key.to_string()) {
            return Ok(None);
        }
        Ok(Some(InFlight { keys: &self.in_flight, key: key.to_string() }))
    }

    /// Decide whether the request needs work at all
    fn precheck(&self, request: &CertificateRequest) -> Option<ReconcileOutcome> {
        let issuer_ref = &request.issuer_ref;
        if issuer_ref.group != ISSUER_GROUP || IssuerScope::from_kind(&issuer_ref.kind).is_none() {
            return Some(ReconcileOutcome::Ignored);
        }

        if request.has_certificate() || request.is_terminal() {
            return Some(ReconcileOutcome::AlreadyComplete);
        }

        if request.is_denied() {
            info!("CertificateRequest {} has been denied, skipping", request.key());
            return Some(ReconcileOutcome::Denied);
        }

        if !request.is_approved() {
            info!("CertificateRequest {} not yet approved, waiting for approval", request.key());
            return Some(ReconcileOutcome::AwaitingApproval);
        }

        None
    }

    /// Resolve, health-check and sign; no side effects on the request
    async fn process(&self, request: &CertificateRequest) -> Verdict {
        let issuer = match self.resolver.resolve(&request.issuer_ref, &request.namespace).await {
            Ok(issuer) => issuer,
            Err(e) => {
                error!("Failed to resolve issuer for {}: {}", request.key(), e);
                return Verdict::failed(resolution_reason(&e), &e);
            }
        };

        if !issuer.ready {
            return Verdict::Failed {
                reason: REASON_ISSUER_NOT_FOUND,
                message: format!("issuer {} is not ready", issuer.name),
                retryable: true,
            };
        }

        let signer = match self.signers.create(&issuer, request.action()) {
            Ok(signer) => signer,
            Err(e) => {
                error!("Failed to create {} signer for {}: {}", issuer.kind, issuer.name, e);
                return Verdict::failed(resolution_reason(&e), &e);
            }
        };

        if let Err(e) = signer.check_health().await {
            error!("CA health check failed for issuer {}: {}", issuer.name, e);
            return Verdict::failed(REASON_HEALTH_CHECK_FAILED, &e);
        }

        let validity_days = request.validity_days(self.settings.default_validity_days);
        match signer.sign(&request.request, validity_days).await {
            Ok(signed) => Verdict::Issued(signed),
            Err(e) => {
                if e.is_retryable() {
                    warn!("Failed to sign certificate for {}: {}", request.key(), e);
                } else {
                    error!("Failed to sign certificate for {}: {}", request.key(), e);
                }
                Verdict::failed(REASON_SIGNING_FAILED, &e)
            }
        }
    }

    async fn write_back(&self, request: &mut CertificateRequest, verdict: Verdict) -> Result<ReconcileOutcome> {
        let outcome = match verdict {
            Verdict::Issued(signed) => {
                request.status.certificate = Some(signed.certificate);
                request.status.ca = Some(signed.ca);
                request.set_ready(ConditionStatus::True, REASON_ISSUED, ISSUED_MESSAGE);
                info!("Successfully signed certificate for {}", request.key());
                ReconcileOutcome::Issued
            }
            Verdict::Failed { reason, message, retryable } => {
                request.set_ready(ConditionStatus::False, reason, message.clone());
                ReconcileOutcome::Failed { reason: reason.to_string(), message, retryable }
            }
        };

        match self.store.update_status(request).await {
            Ok(()) => Ok(outcome),
            Err(Error::Conflict(message)) => {
                warn!("Dropping status write for {}: {}", request.key(), message);
                Ok(ReconcileOutcome::AlreadyComplete)
            }
            Err(e) => Err(e),
        }
    }
}

/// Condition reason for an issuer resolution or signer construction failure
fn resolution_reason(err: &Error) -> &'static str {
    match err {
        Error::IssuerNotFound(_) | Error::NotFound(_) => REASON_ISSUER_NOT_FOUND,
        Error::Auth(_) => REASON_AUTH_ERROR,
        _ => REASON_CONFIG_ERROR,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ca::provider::{DefaultSignerFactory, MockSigner, MockSignerFactory, Signer};
    use crate::controller::issuer::{
        ExternalIssuer, IssuerCatalog, IssuerConfig, IssuerStatus, MockIssuerResolver, CLUSTER_ISSUER_KIND, ISSUER_KIND,
    };
    use crate::controller::request::{
        find_condition, Condition, IssuerRef, CONDITION_APPROVED, CONDITION_DENIED, CONDITION_READY,
    };
    use crate::controller::store::MemoryRequestStore;
    use crate::types::{RequestAction, SignerKind};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn approved_request(kind: &str) -> CertificateRequest {
        let mut request = CertificateRequest {
            name: "web".into(),
            namespace: "apps".into(),
            request: b"-----BEGIN CERTIFICATE REQUEST-----".to_vec(),
            issuer_ref: IssuerRef { name: "corp".into(), kind: kind.into(), group: ISSUER_GROUP.into() },
            revision: 1,
            ..Default::default()
        };
        request.status.conditions.push(Condition::new(CONDITION_APPROVED, ConditionStatus::True, "Approved", ""));
        request
    }

    fn ready_issuer(kind: SignerKind) -> IssuerConfig {
        IssuerConfig { name: "apps/corp".into(), kind, ready: true, ..Default::default() }
    }

    fn signed() -> SignedCertificate {
        SignedCertificate { certificate: b"LEAF".to_vec(), ca: b"CA".to_vec() }
    }

    fn controller(
        store: Arc<MemoryRequestStore>,
        resolver: MockIssuerResolver,
        factory: MockSignerFactory,
    ) -> CertificateRequestController {
        CertificateRequestController::new(store, Arc::new(resolver), Arc::new(factory), IssuerSettings::default())
    }

    fn store_with(request: CertificateRequest) -> Arc<MemoryRequestStore> {
        let store = Arc::new(MemoryRequestStore::new());
        store.insert(request).unwrap();
        store
    }

    async fn ready_condition(store: &MemoryRequestStore) -> Condition {
        let request = store.get("apps", "web").await.unwrap().unwrap();
        find_condition(&request.status.conditions, CONDITION_READY).cloned().unwrap()
    }

    fn untouched_resolver() -> MockIssuerResolver {
        let mut resolver = MockIssuerResolver::new();
        resolver.expect_resolve().times(0);
        resolver
    }

    #[tokio::test]
    async fn test_foreign_and_finished_requests_are_no_ops() {
        let mut foreign = approved_request(ISSUER_KIND);
        foreign.issuer_ref.group = "cert-manager.io".into();
        let store = store_with(foreign);
        let ctrl = controller(store.clone(), untouched_resolver(), MockSignerFactory::new());
        assert_eq!(ctrl.reconcile("apps", "web").await.unwrap(), ReconcileOutcome::Ignored);

        store.insert(approved_request("Issuer")).unwrap();
        assert_eq!(ctrl.reconcile("apps", "web").await.unwrap(), ReconcileOutcome::Ignored);

        let mut issued = approved_request(ISSUER_KIND);
        issued.status.certificate = Some(b"LEAF".to_vec());
        store.insert(issued).unwrap();
        assert_eq!(ctrl.reconcile("apps", "web").await.unwrap(), ReconcileOutcome::AlreadyComplete);

        let mut failed = approved_request(ISSUER_KIND);
        failed.set_ready(ConditionStatus::False, "Failed", "gave up");
        store.insert(failed).unwrap();
        assert_eq!(ctrl.reconcile("apps", "web").await.unwrap(), ReconcileOutcome::AlreadyComplete);

        assert_eq!(ctrl.reconcile("apps", "missing").await.unwrap(), ReconcileOutcome::NotFound);
    }

    #[tokio::test]
    async fn test_denied_and_unapproved_are_not_processed() {
        let mut denied = approved_request(ISSUER_KIND);
        denied.status.conditions.push(Condition::new(CONDITION_DENIED, ConditionStatus::True, "Denied", ""));
        let store = store_with(denied.clone());
        let ctrl = controller(store.clone(), untouched_resolver(), MockSignerFactory::new());

        assert_eq!(ctrl.reconcile("apps", "web").await.unwrap(), ReconcileOutcome::Denied);
        assert_eq!(store.get("apps", "web").await.unwrap().unwrap(), denied);

        let mut pending = approved_request(ISSUER_KIND);
        pending.status.conditions.clear();
        store.insert(pending).unwrap();
        assert_eq!(ctrl.reconcile("apps", "web").await.unwrap(), ReconcileOutcome::AwaitingApproval);
    }

    #[tokio::test]
    async fn test_successful_issuance_writes_certificate() {
        let mut request = approved_request(CLUSTER_ISSUER_KIND);
        request.duration_seconds = Some(90 * 86_400);
        request.revision = 2;
        let store = store_with(request);

        let mut resolver = MockIssuerResolver::new();
        resolver.expect_resolve()
            .withf(|issuer_ref, namespace| issuer_ref.name == "corp" && namespace == "apps")
            .times(1)
            .returning(|_, _| Ok(ready_issuer(SignerKind::Pki)));

        let mut signer = MockSigner::new();
        signer.expect_check_health().times(1).returning(|| Ok(()));
        signer.expect_sign()
            .withf(|_, days| *days == 90)
            .times(1)
            .returning(|_, _| Ok(signed()));
        let signer: Arc<dyn Signer> = Arc::new(signer);

        let mut factory = MockSignerFactory::new();
        factory.expect_create()
            .withf(|_, action| *action == RequestAction::Renew)
            .times(1)
            .returning(move |_, _| Ok(signer.clone()));

        let ctrl = controller(store.clone(), resolver, factory);
        assert_eq!(ctrl.reconcile("apps", "web").await.unwrap(), ReconcileOutcome::Issued);

        let stored = store.get("apps", "web").await.unwrap().unwrap();
        assert_eq!(stored.status.certificate.as_deref(), Some(&b"LEAF"[..]));
        assert_eq!(stored.status.ca.as_deref(), Some(&b"CA"[..]));

        let ready = ready_condition(&store).await;
        assert_eq!(ready.status, ConditionStatus::True);
        assert_eq!(ready.reason, REASON_ISSUED);
        assert_eq!(ready.message, ISSUED_MESSAGE);

        // A second notification must not sign again
        assert_eq!(ctrl.reconcile("apps", "web").await.unwrap(), ReconcileOutcome::AlreadyComplete);
    }

    #[tokio::test]
    async fn test_resolution_failures_map_to_reasons() {
        let cases: Vec<(Error, &str)> = vec![
            (Error::IssuerNotFound("failed to get Issuer apps/corp".into()), REASON_ISSUER_NOT_FOUND),
            (Error::Config("failed to parse PKI config".into()), REASON_CONFIG_ERROR),
            (Error::Auth("no token found".into()), REASON_AUTH_ERROR),
        ];

        for (err, expected) in cases {
            let store = store_with(approved_request(ISSUER_KIND));
            let mut resolver = MockIssuerResolver::new();
            let message = err.to_string();
            let mut err = Some(err);
            resolver.expect_resolve().times(1).returning(move |_, _| Err(err.take().unwrap()));
            let mut factory = MockSignerFactory::new();
            factory.expect_create().times(0);

            let ctrl = controller(store.clone(), resolver, factory);
            let outcome = ctrl.reconcile("apps", "web").await.unwrap();
            assert_eq!(outcome, ReconcileOutcome::Failed { reason: expected.into(), message: message.clone(), retryable: false });

            let ready = ready_condition(&store).await;
            assert_eq!(ready.status, ConditionStatus::False);
            assert_eq!(ready.reason, expected);
            assert_eq!(ready.message, message);
        }
    }

    #[tokio::test]
    async fn test_unready_issuer_is_not_trusted() {
        let store = store_with(approved_request(ISSUER_KIND));
        let mut resolver = MockIssuerResolver::new();
        resolver.expect_resolve().returning(|_, _| {
            Ok(IssuerConfig { ready: false, ..ready_issuer(SignerKind::MockCa) })
        });
        let mut factory = MockSignerFactory::new();
        factory.expect_create().times(0);

        let ctrl = controller(store.clone(), resolver, factory);
        ctrl.reconcile("apps", "web").await.unwrap();

        let ready = ready_condition(&store).await;
        assert_eq!(ready.reason, REASON_ISSUER_NOT_FOUND);
        assert!(ready.message.contains("not ready"));
    }

    #[tokio::test]
    async fn test_health_failure_skips_signing_and_allows_retry() {
        let store = store_with(approved_request(ISSUER_KIND));
        let mut resolver = MockIssuerResolver::new();
        resolver.expect_resolve().times(2).returning(|_, _| Ok(ready_issuer(SignerKind::Pki)));

        let mut unhealthy = MockSigner::new();
        unhealthy.expect_check_health().returning(|| Err(Error::HealthCheckFailed("status 500".into())));
        unhealthy.expect_sign().times(0);
        let unhealthy: Arc<dyn Signer> = Arc::new(unhealthy);

        let mut failing = MockSigner::new();
        failing.expect_check_health().returning(|| Ok(()));
        failing.expect_sign().returning(|_, _| Err(Error::SigningFailed("status 403: forbidden".into())));
        let failing: Arc<dyn Signer> = Arc::new(failing);

        let mut factory = MockSignerFactory::new();
        let mut sequence = mockall::Sequence::new();
        factory.expect_create().times(1).in_sequence(&mut sequence).returning(move |_, _| Ok(unhealthy.clone()));
        factory.expect_create().times(1).in_sequence(&mut sequence).returning(move |_, _| Ok(failing.clone()));

        let ctrl = controller(store.clone(), resolver, factory);

        let outcome = ctrl.reconcile("apps", "web").await.unwrap();
        assert!(matches!(outcome, ReconcileOutcome::Failed { retryable: true, .. }));
        assert_eq!(ready_condition(&store).await.reason, REASON_HEALTH_CHECK_FAILED);

        // Stage failures are not terminal, so the next notification runs again
        ctrl.reconcile("apps", "web").await.unwrap();
        let ready = ready_condition(&store).await;
        assert_eq!(ready.reason, REASON_SIGNING_FAILED);
        assert!(ready.message.contains("forbidden"));
        assert!(store.get("apps", "web").await.unwrap().unwrap().status.certificate.is_none());
    }

    struct StalledSigner;

    #[async_trait]
    impl Signer for StalledSigner {
        async fn check_health(&self) -> Result<()> {
            Ok(())
        }

        async fn sign(&self, _csr_pem: &[u8], _validity_days: u32) -> Result<SignedCertificate> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(signed())
        }
    }

    struct CountingSigner {
        signed: AtomicUsize,
    }

    #[async_trait]
    impl Signer for CountingSigner {
        async fn check_health(&self) -> Result<()> {
            Ok(())
        }

        async fn sign(&self, _csr_pem: &[u8], _validity_days: u32) -> Result<SignedCertificate> {
            self.signed.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok(signed())
        }
    }

    #[tokio::test]
    async fn test_overlapping_reconciles_sign_once() {
        let store = store_with(approved_request(ISSUER_KIND));
        let mut resolver = MockIssuerResolver::new();
        resolver.expect_resolve().returning(|_, _| Ok(ready_issuer(SignerKind::Pki)));

        let signer = Arc::new(CountingSigner { signed: AtomicUsize::new(0) });
        let shared = signer.clone();
        let mut factory = MockSignerFactory::new();
        factory.expect_create().returning(move |_, _| Ok(shared.clone() as Arc<dyn Signer>));

        let ctrl = controller(store.clone(), resolver, factory);
        let (first, second) = tokio::join!(ctrl.reconcile("apps", "web"), ctrl.reconcile("apps", "web"));

        let mut outcomes = vec![first.unwrap(), second.unwrap()];
        outcomes.sort_by_key(|outcome| outcome == &ReconcileOutcome::Issued);
        assert_eq!(outcomes, vec![ReconcileOutcome::InProgress, ReconcileOutcome::Issued]);

        // Later notifications see the stored certificate
        assert_eq!(ctrl.reconcile("apps", "web").await.unwrap(), ReconcileOutcome::AlreadyComplete);
        assert_eq!(signer.signed.load(Ordering::SeqCst), 1);

        let stored = store.get("apps", "web").await.unwrap().unwrap();
        assert_eq!(stored.status.certificate.as_deref(), Some(&b"LEAF"[..]));
    }

    #[tokio::test]
    async fn test_write_back_after_completion_keeps_certificate() {
        let request = approved_request(ISSUER_KIND);
        let store = store_with(request.clone());

        // Another worker completes the request while this one is signing
        let mut issued = request;
        issued.status.certificate = Some(b"LEAF".to_vec());
        issued.set_ready(ConditionStatus::True, REASON_ISSUED, ISSUED_MESSAGE);
        let mut pending = Some(issued);
        let racing = store.clone();
        let mut resolver = MockIssuerResolver::new();
        resolver.expect_resolve().returning(move |_, _| {
            if let Some(issued) = pending.take() {
                racing.insert(issued).unwrap();
            }
            Ok(ready_issuer(SignerKind::Pki))
        });

        let mut signer = MockSigner::new();
        signer.expect_check_health().returning(|| Ok(()));
        signer.expect_sign().times(1).returning(|_, _| Err(Error::SigningFailed("status 500".into())));
        let signer: Arc<dyn Signer> = Arc::new(signer);
        let mut factory = MockSignerFactory::new();
        factory.expect_create().returning(move |_, _| Ok(signer.clone()));

        let ctrl = controller(store.clone(), resolver, factory);
        assert_eq!(ctrl.reconcile("apps", "web").await.unwrap(), ReconcileOutcome::AlreadyComplete);

        let stored = store.get("apps", "web").await.unwrap().unwrap();
        assert_eq!(stored.status.certificate.as_deref(), Some(&b"LEAF"[..]));
        assert_eq!(ready_condition(&store).await.reason, REASON_ISSUED);
    }

    #[tokio::test]
    async fn test_signer_construction_failure_keeps_auth_reason() {
        let store = store_with(approved_request(ISSUER_KIND));
        let mut resolver = MockIssuerResolver::new();
        resolver.expect_resolve().returning(|_, _| Ok(ready_issuer(SignerKind::Pki)));
        let mut factory = MockSignerFactory::new();
        factory.expect_create()
            .times(1)
            .returning(|_, _| Err(Error::Auth("Invalid token: failed to parse header value".into())));

        let ctrl = controller(store.clone(), resolver, factory);
        let outcome = ctrl.reconcile("apps", "web").await.unwrap();

        assert!(matches!(outcome, ReconcileOutcome::Failed { ref reason, retryable: false, .. } if reason == REASON_AUTH_ERROR));
        assert_eq!(ready_condition(&store).await.reason, REASON_AUTH_ERROR);
    }

    #[tokio::test]
    async fn test_invalid_csr_is_not_retryable() {
        let store = store_with(approved_request(ISSUER_KIND));
        let mut resolver = MockIssuerResolver::new();
        resolver.expect_resolve().returning(|_, _| Ok(ready_issuer(SignerKind::Pki)));
        let mut signer = MockSigner::new();
        signer.expect_check_health().returning(|| Ok(()));
        signer.expect_sign().returning(|_, _| Err(Error::InvalidCsr("not a CSR".into())));
        let signer: Arc<dyn Signer> = Arc::new(signer);
        let mut factory = MockSignerFactory::new();
        factory.expect_create().returning(move |_, _| Ok(signer.clone()));

        let ctrl = controller(store.clone(), resolver, factory);
        let outcome = ctrl.reconcile("apps", "web").await.unwrap();

        assert!(matches!(outcome, ReconcileOutcome::Failed { ref reason, retryable: false, .. } if reason == REASON_SIGNING_FAILED));
    }

    #[tokio::test]
    async fn test_deadline_abandons_without_write_back() {
        let request = approved_request(ISSUER_KIND);
        let store = store_with(request.clone());
        let mut resolver = MockIssuerResolver::new();
        resolver.expect_resolve().returning(|_, _| Ok(ready_issuer(SignerKind::Pki)));
        let mut factory = MockSignerFactory::new();
        factory.expect_create().returning(|_, _| Ok(Arc::new(StalledSigner) as Arc<dyn Signer>));

        let ctrl = controller(store.clone(), resolver, factory);
        let result = ctrl.reconcile_with_deadline("apps", "web", Duration::from_millis(50)).await;

        assert!(matches!(result, Err(Error::DeadlineExceeded(_))));
        assert_eq!(store.get("apps", "web").await.unwrap().unwrap(), request);
    }

    #[tokio::test]
    async fn test_mock_ca_issuance_through_catalog() {
        let catalog = IssuerCatalog::new(IssuerSettings::default());
        catalog.upsert_issuer(IssuerScope::Namespaced, ExternalIssuer {
            name: "corp".into(),
            namespace: "apps".into(),
            status: IssuerStatus {
                conditions: vec![Condition::new(CONDITION_READY, ConditionStatus::True, "Success", "")],
            },
            ..Default::default()
        }).unwrap();

        let mut request = approved_request(ISSUER_KIND);
        request.request = crate::ca::mock::tests::test_csr("web.apps.svc", &["web.apps.svc"]).into_bytes();
        let store = store_with(request);

        let factory = DefaultSignerFactory::new(crate::ca::mock::tests::TEST_CA.clone());
        let ctrl = CertificateRequestController::new(
            store.clone(),
            Arc::new(catalog),
            Arc::new(factory),
            IssuerSettings::default(),
        );

        assert_eq!(ctrl.reconcile("apps", "web").await.unwrap(), ReconcileOutcome::Issued);
        let stored = store.get("apps", "web").await.unwrap().unwrap();
        let ca_pem = crate::ca::mock::tests::TEST_CA.authority().await.unwrap().cert_pem().to_string();
        assert_eq!(stored.status.ca, Some(ca_pem.into_bytes()));
        assert!(String::from_utf8(stored.status.certificate.unwrap()).unwrap().starts_with("-----BEGIN CERTIFICATE-----"));
    }
}
