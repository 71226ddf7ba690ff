use std::collections::HashMap;
use std::path::Path;
use std::sync::RwLock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::ca::pki::PkiConfig;
use crate::config::IssuerSettings;
use crate::controller::request::{is_condition_true, set_condition, Condition, IssuerRef, CONDITION_READY};
use crate::error::Error;
use crate::types::{Result, SignerKind};
use crate::utils::fs::read_file_string;

/// API group served by these controllers
pub const ISSUER_GROUP: &str = "external-issuer.io";
/// Namespaced issuer kind
pub const ISSUER_KIND: &str = "ExternalIssuer";
/// Cluster-scoped issuer kind
pub const CLUSTER_ISSUER_KIND: &str = "ExternalClusterIssuer";

/// Secret keys tried, in order, for an auth token
pub const TOKEN_KEYS: [&str; 4] = ["token", "api-key", "password", "apiKey"];
/// Secret key holding a trusted CA
pub const TRUSTED_CA_KEY: &str = "ca.crt";

/// Scope of an issuer object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IssuerScope {
    Namespaced,
    Cluster,
}

impl IssuerScope {
    /// Scope for an issuer reference kind; `None` when the kind is not ours
    pub fn from_kind(kind: &str) -> Option<Self> {
        match kind {
            ISSUER_KIND => Some(IssuerScope::Namespaced),
            CLUSTER_ISSUER_KIND => Some(IssuerScope::Cluster),
            _ => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            IssuerScope::Namespaced => ISSUER_KIND,
            IssuerScope::Cluster => CLUSTER_ISSUER_KIND,
        }
    }
}

/// Location of a PKI document inside a config bundle
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigMapReference {
    pub name: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub key: String,
}

/// Desired state of an issuer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExternalIssuerSpec {
    /// Base URL of a remote mock CA; informational for the in-process signer
    pub url: String,
    pub config_map_ref: Option<ConfigMapReference>,
    pub auth_secret_name: String,
    /// `mockca` or `pki`; empty means `mockca`
    pub signer_type: String,
}

/// Observed state of an issuer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuerStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

/// An issuer or cluster issuer object
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalIssuer {
    pub name: String,
    /// Empty for cluster issuers
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub spec: ExternalIssuerSpec,
    #[serde(default)]
    pub status: IssuerStatus,
}

impl ExternalIssuer {
    pub fn is_ready(&self) -> bool {
        is_condition_true(&self.status.conditions, CONDITION_READY)
    }
}

/// Everything needed to build a signer for one issuer
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IssuerConfig {
    /// `namespace/name` or bare name for cluster issuers
    pub name: String,
    pub kind: SignerKind,
    pub pki: Option<PkiConfig>,
    pub auth_token: Option<String>,
    pub trusted_ca: Option<Vec<u8>>,
    pub ready: bool,
}

/// Resolves an issuer reference to signer configuration
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IssuerResolver: Send + Sync {
    /// Resolve the issuer a request in `namespace` points at.
    ///
    /// Lookup failures are `IssuerNotFound`, bad documents are `Config`
    /// and missing credentials are `Auth`.
    async fn resolve(&self, issuer_ref: &IssuerRef, namespace: &str) -> Result<IssuerConfig>;
}

/// Named bundle of string data, the shape config and secret stores share
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataBundle {
    pub name: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub data: HashMap<String, String>,
}

/// On-disk catalog layout
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CatalogDocument {
    pub issuers: Vec<ExternalIssuer>,
    pub cluster_issuers: Vec<ExternalIssuer>,
    pub config_bundles: Vec<DataBundle>,
    pub secret_bundles: Vec<DataBundle>,
}

type ObjectKey = (String, String);

#[derive(Default)]
struct CatalogState {
    issuers: HashMap<ObjectKey, ExternalIssuer>,
    cluster_issuers: HashMap<String, ExternalIssuer>,
    configs: HashMap<ObjectKey, HashMap<String, String>>,
    secrets: HashMap<ObjectKey, HashMap<String, String>>,
}

/// In-memory issuer catalog with config and secret bundles
pub struct IssuerCatalog {
    settings: IssuerSettings,
    state: RwLock<CatalogState>,
}

impl IssuerCatalog {
    pub fn new(settings: IssuerSettings) -> Self {
        Self {
            settings,
            state: RwLock::new(CatalogState::default()),
        }
    }

    /// Build a catalog from a parsed document
    pub fn from_document(settings: IssuerSettings, document: CatalogDocument) -> Result<Self> {
        let catalog = Self::new(settings);

        for issuer in document.issuers {
            catalog.upsert_issuer(IssuerScope::Namespaced, issuer)?;
        }
        for issuer in document.cluster_issuers {
            catalog.upsert_issuer(IssuerScope::Cluster, issuer)?;
        }
        for bundle in document.config_bundles {
            catalog.put_config_bundle(&bundle.namespace, &bundle.name, bundle.data)?;
        }
        for bundle in document.secret_bundles {
            catalog.put_secret_bundle(&bundle.namespace, &bundle.name, bundle.data)?;
        }

        Ok(catalog)
    }

    /// Load the catalog named by `catalog_path`, or start empty
    pub async fn load(settings: IssuerSettings) -> Result<Self> {
        match settings.catalog_path.clone() {
            Some(path) => Self::from_yaml_file(settings, path).await,
            None => Ok(Self::new(settings)),
        }
    }

    /// Load a YAML catalog file
    pub async fn from_yaml_file(settings: IssuerSettings, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = read_file_string(path).await?;
        let document: CatalogDocument = serde_yaml::from_str(&content)?;

        info!(
            "Loaded issuer catalog from {} ({} issuers, {} cluster issuers)",
            path.display(),
            document.issuers.len(),
            document.cluster_issuers.len()
        );
        Self::from_document(settings, document)
    }

    pub fn settings(&self) -> &IssuerSettings {
        &self.settings
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, CatalogState>> {
        self.state.read().map_err(|_| Error::Internal("Issuer catalog lock poisoned".into()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, CatalogState>> {
        self.state.write().map_err(|_| Error::Internal("Issuer catalog lock poisoned".into()))
    }

    /// Insert or replace an issuer
    pub fn upsert_issuer(&self, scope: IssuerScope, issuer: ExternalIssuer) -> Result<()> {
        let mut state = self.write()?;
        match scope {
            IssuerScope::Namespaced => {
                if issuer.namespace.is_empty() {
                    return Err(Error::Config(format!("{} {} has no namespace", ISSUER_KIND, issuer.name)));
                }
                state.issuers.insert((issuer.namespace.clone(), issuer.name.clone()), issuer);
            }
            IssuerScope::Cluster => {
                state.cluster_issuers.insert(issuer.name.clone(), issuer);
            }
        }
        Ok(())
    }

    pub fn put_config_bundle(&self, namespace: &str, name: &str, data: HashMap<String, String>) -> Result<()> {
        let namespace = self.bundle_namespace(namespace);
        self.write()?.configs.insert((namespace, name.to_string()), data);
        Ok(())
    }

    pub fn put_secret_bundle(&self, namespace: &str, name: &str, data: HashMap<String, String>) -> Result<()> {
        let namespace = self.bundle_namespace(namespace);
        self.write()?.secrets.insert((namespace, name.to_string()), data);
        Ok(())
    }

    fn bundle_namespace(&self, namespace: &str) -> String {
        if namespace.is_empty() {
            self.settings.default_namespace.clone()
        } else {
            namespace.to_string()
        }
    }

    /// Fetch an issuer; `namespace` is ignored for cluster issuers
    pub fn get_issuer(&self, scope: IssuerScope, namespace: &str, name: &str) -> Result<ExternalIssuer> {
        let state = self.read()?;
        let found = match scope {
            IssuerScope::Namespaced => state.issuers.get(&(namespace.to_string(), name.to_string())),
            IssuerScope::Cluster => state.cluster_issuers.get(name),
        };

        found.cloned().ok_or_else(|| match scope {
            IssuerScope::Namespaced => Error::IssuerNotFound(format!("failed to get Issuer {}/{}", namespace, name)),
            IssuerScope::Cluster => Error::IssuerNotFound(format!("failed to get ClusterIssuer {}", name)),
        })
    }

    /// All issuers, namespaced first
    pub fn list_issuers(&self) -> Result<Vec<(IssuerScope, ExternalIssuer)>> {
        let state = self.read()?;
        let mut issuers: Vec<_> = state.issuers.values()
            .map(|issuer| (IssuerScope::Namespaced, issuer.clone()))
            .collect();
        issuers.extend(state.cluster_issuers.values().map(|issuer| (IssuerScope::Cluster, issuer.clone())));
        Ok(issuers)
    }

    /// Record a status condition on an issuer
    pub fn set_issuer_condition(&self, scope: IssuerScope, namespace: &str, name: &str, condition: Condition) -> Result<()> {
        let mut state = self.write()?;
        let issuer = match scope {
            IssuerScope::Namespaced => state.issuers.get_mut(&(namespace.to_string(), name.to_string())),
            IssuerScope::Cluster => state.cluster_issuers.get_mut(name),
        };

        let issuer = issuer.ok_or_else(|| Error::NotFound(format!("{} {} no longer exists", scope.kind(), name)))?;
        set_condition(&mut issuer.status.conditions, condition);
        Ok(())
    }

    /// Build signer configuration for an issuer object
    pub fn issuer_config(&self, scope: IssuerScope, issuer: &ExternalIssuer) -> Result<IssuerConfig> {
        let kind: SignerKind = issuer.spec.signer_type.parse()?;
        let name = match scope {
            IssuerScope::Namespaced => format!("{}/{}", issuer.namespace, issuer.name),
            IssuerScope::Cluster => issuer.name.clone(),
        };

        let mut config = IssuerConfig {
            name,
            kind,
            ready: issuer.is_ready(),
            ..Default::default()
        };

        if kind == SignerKind::MockCa {
            return Ok(config);
        }

        // Namespaced issuers read bundles from their own namespace
        let home = match scope {
            IssuerScope::Namespaced => issuer.namespace.as_str(),
            IssuerScope::Cluster => self.settings.default_namespace.as_str(),
        };

        let reference = issuer.spec.config_map_ref.as_ref()
            .ok_or_else(|| Error::Config(format!("Issuer {} uses the pki signer without a configMapRef", config.name)))?;
        let pki = self.load_pki_config(reference, home)?;

        let secret_name = if issuer.spec.auth_secret_name.is_empty() {
            pki.auth.secret_ref.as_str()
        } else {
            issuer.spec.auth_secret_name.as_str()
        };
        if !secret_name.is_empty() {
            config.auth_token = Some(self.load_auth_token(secret_name, home)?);
        }

        if !pki.tls.ca_secret_ref.is_empty() {
            config.trusted_ca = Some(self.load_trusted_ca(&pki.tls.ca_secret_ref, home)?);
        }

        config.pki = Some(pki);
        Ok(config)
    }

    fn load_pki_config(&self, reference: &ConfigMapReference, home: &str) -> Result<PkiConfig> {
        let namespace = if reference.namespace.is_empty() { home } else { reference.namespace.as_str() };
        let key = if reference.key.is_empty() { self.settings.default_config_key.as_str() } else { reference.key.as_str() };

        let state = self.read()?;
        let bundle = state.configs.get(&(namespace.to_string(), reference.name.clone()))
            .ok_or_else(|| Error::Config(format!("failed to get config bundle {}/{}", namespace, reference.name)))?;
        let document = bundle.get(key)
            .ok_or_else(|| Error::Config(format!("key {} not found in config bundle {}/{}", key, namespace, reference.name)))?;

        debug!("Loaded PKI config from {}/{} key {}", namespace, reference.name, key);
        PkiConfig::from_json(document)
    }

    fn load_auth_token(&self, secret_name: &str, namespace: &str) -> Result<String> {
        let state = self.read()?;
        let secret = state.secrets.get(&(namespace.to_string(), secret_name.to_string()))
            .ok_or_else(|| Error::Auth(format!("failed to get secret {}/{}", namespace, secret_name)))?;

        TOKEN_KEYS.iter()
            .find_map(|key| secret.get(*key))
            .cloned()
            .ok_or_else(|| Error::Auth(format!(
                "no token found in secret {}/{} (tried: {})",
                namespace,
                secret_name,
                TOKEN_KEYS.join(", ")
            )))
    }

    fn load_trusted_ca(&self, secret_name: &str, namespace: &str) -> Result<Vec<u8>> {
        let state = self.read()?;
        state.secrets.get(&(namespace.to_string(), secret_name.to_string()))
            .and_then(|secret| secret.get(TRUSTED_CA_KEY))
            .map(|pem| pem.clone().into_bytes())
            .ok_or_else(|| Error::Config(format!("{} not found in secret {}/{}", TRUSTED_CA_KEY, namespace, secret_name)))
    }
}

#[async_trait]
impl IssuerResolver for IssuerCatalog {
    async fn resolve(&self, issuer_ref: &IssuerRef, namespace: &str) -> Result<IssuerConfig> {
        let scope = IssuerScope::from_kind(&issuer_ref.kind)
            .ok_or_else(|| Error::IssuerNotFound(format!("unsupported issuer kind {}", issuer_ref.kind)))?;

        let issuer = self.get_issuer(scope, namespace, &issuer_ref.name)?;
        self.issuer_config(scope, &issuer)
    }
}
