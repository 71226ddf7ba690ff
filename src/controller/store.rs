use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::controller::request::{request_key, CertificateRequest};
use crate::error::Error;
use crate::types::Result;

/// Source of certificate requests and sink for their status
#[async_trait]
pub trait RequestStore: Send + Sync {
    /// Fetch a request; `None` when it no longer exists
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<CertificateRequest>>;

    /// Persist the status of a request.
    ///
    /// Fails with `Error::Conflict` once the stored request is complete.
    async fn update_status(&self, request: &CertificateRequest) -> Result<()>;
}

/// Request store backed by a map
#[derive(Default)]
pub struct MemoryRequestStore {
    requests: RwLock<HashMap<String, CertificateRequest>>,
}

impl MemoryRequestStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a whole request
    pub fn insert(&self, request: CertificateRequest) -> Result<()> {
        let mut requests = self.requests.write()
            .map_err(|_| Error::Internal("Request store lock poisoned".into()))?;
        requests.insert(request.key(), request);
        Ok(())
    }

    /// Remove a request
    pub fn remove(&self, namespace: &str, name: &str) -> Result<Option<CertificateRequest>> {
        let mut requests = self.requests.write()
            .map_err(|_| Error::Internal("Request store lock poisoned".into()))?;
        Ok(requests.remove(&request_key(namespace, name)))
    }
}

#[async_trait]
impl RequestStore for MemoryRequestStore {
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<CertificateRequest>> {
        let requests = self.requests.read()
            .map_err(|_| Error::Internal("Request store lock poisoned".into()))?;
        Ok(requests.get(&request_key(namespace, name)).cloned())
    }

    async fn update_status(&self, request: &CertificateRequest) -> Result<()> {
        let mut requests = self.requests.write()
            .map_err(|_| Error::Internal("Request store lock poisoned".into()))?;
        let stored = requests.get_mut(&request.key())
            .ok_or_else(|| Error::NotFound(format!("CertificateRequest {} not found", request.key())))?;
        // A request holding a certificate or a terminal condition is final
        if stored.has_certificate() || stored.is_terminal() {
            return Err(Error::Conflict(format!("CertificateRequest {} is already complete", request.key())));
        }
        stored.status = request.status.clone();
        Ok(())
    }
}
