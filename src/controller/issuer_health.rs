use std::sync::Arc;

use tracing::{debug, error, info};

use crate::ca::provider::SignerFactory;
use crate::controller::issuer::{ExternalIssuer, IssuerCatalog, IssuerScope};
use crate::controller::request::{Condition, ConditionStatus, CONDITION_READY};
use crate::error::Error;
use crate::types::{RequestAction, Result, SignerKind};

pub const REASON_SUCCESS: &str = "Success";
pub const REASON_HEALTH_CHECK_FAILED: &str = "HealthCheckFailed";

/// Keeps the Ready condition of issuers in line with their signer's health
pub struct IssuerHealthReconciler {
    catalog: Arc<IssuerCatalog>,
    signers: Arc<dyn SignerFactory>,
}

impl IssuerHealthReconciler {
    pub fn new(catalog: Arc<IssuerCatalog>, signers: Arc<dyn SignerFactory>) -> Self {
        Self { catalog, signers }
    }

    /// Check one issuer and record the result; `None` if it does not exist
    pub async fn reconcile(&self, scope: IssuerScope, namespace: &str, name: &str) -> Result<Option<Condition>> {
        let issuer = match self.catalog.get_issuer(scope, namespace, name) {
            Ok(issuer) => issuer,
            Err(Error::IssuerNotFound(_)) => {
                debug!("{} {} not found", scope.kind(), name);
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        info!("Reconciling {} {}", scope.kind(), name);

        let kind: SignerKind = issuer.spec.signer_type.parse().unwrap_or_default();

        let condition = match self.check(scope, &issuer).await {
            Ok(()) => Condition::new(
                CONDITION_READY,
                ConditionStatus::True,
                REASON_SUCCESS,
                format!("{} CA is healthy and ready", kind),
            ),
            Err(e) => {
                error!("CA health check failed for {} {}: {}", scope.kind(), name, e);
                Condition::new(CONDITION_READY, ConditionStatus::False, REASON_HEALTH_CHECK_FAILED, e.to_string())
            }
        };

        self.catalog.set_issuer_condition(scope, namespace, name, condition.clone())?;
        Ok(Some(condition))
    }

    async fn check(&self, scope: IssuerScope, issuer: &ExternalIssuer) -> Result<()> {
        let config = self.catalog.issuer_config(scope, issuer)?;
        let signer = self.signers.create(&config, RequestAction::New)?;
        signer.check_health().await
    }

    /// Check every issuer in the catalog
    pub async fn reconcile_all(&self) -> Result<usize> {
        let issuers = self.catalog.list_issuers()?;
        let mut ready = 0;

        for (scope, issuer) in issuers {
            if let Some(condition) = self.reconcile(scope, &issuer.namespace, &issuer.name).await? {
                if condition.is_true() {
                    ready += 1;
                }
            }
        }

        Ok(ready)
    }
}
