//! Forge credential lookup.
//!
//! In-cluster the bot authenticates with the basic-auth secret that Tekton
//! annotates for the forge host (`tekton.dev/git-0: https://github.com`).
//! Outside a cluster a static username/token pair can be supplied instead.

use std::fmt;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use kube::api::ListParams;
use kube::{Api, Client};
use tracing::{debug, info, instrument};

use crate::error::CredentialError;

/// Service account namespace file mounted into every pod.
pub const NAMESPACE_FILE: &str = "/var/run/secrets/kubernetes.io/serviceaccount/namespace";

const BASIC_AUTH_TYPE: &str = "kubernetes.io/basic-auth";
const HOST_ANNOTATION_PREFIX: &str = "tekton.dev/git-";

/// Username and token used for both git pushes and API calls.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub token: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            token: token.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("token", &"[REDACTED]")
            .finish()
    }
}

/// Source of forge credentials keyed by host URL.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Credentials for `host`, e.g. `https://github.com`.
    async fn get_credentials(&self, host: &str) -> Result<Credentials, CredentialError>;
}

/// Looks up basic-auth secrets in the pod's own namespace.
#[derive(Clone)]
pub struct KubeCredentialStore {
    client: Client,
    namespace: String,
}

impl KubeCredentialStore {
    #[must_use]
    pub fn new(client: Client, namespace: impl Into<String>) -> Self {
        Self {
            client,
            namespace: namespace.into(),
        }
    }

    /// Build from the in-cluster config and the service account namespace.
    pub async fn try_default() -> Result<Self, CredentialError> {
        let namespace = read_namespace(NAMESPACE_FILE)?;
        let client = Client::try_default().await?;
        Ok(Self::new(client, namespace))
    }
}

#[async_trait]
impl CredentialStore for KubeCredentialStore {
    #[instrument(skip(self), fields(namespace = %self.namespace))]
    async fn get_credentials(&self, host: &str) -> Result<Credentials, CredentialError> {
        let secrets: Api<Secret> = Api::namespaced(self.client.clone(), &self.namespace);
        let list = secrets.list(&ListParams::default()).await?;

        info!(count = list.items.len(), "Checking secrets for forge credentials");

        find_basic_auth(&list.items, host).ok_or_else(|| CredentialError::NotFound(host.to_string()))
    }
}

/// Fixed credentials, typically from `GIT_USERNAME` / `GIT_TOKEN`.
#[derive(Debug, Clone)]
pub struct StaticCredentialStore {
    credentials: Credentials,
}

impl StaticCredentialStore {
    #[must_use]
    pub fn new(credentials: Credentials) -> Self {
        Self { credentials }
    }

    /// Read `GIT_USERNAME` and `GIT_TOKEN`; `None` unless both are set.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let username = std::env::var("GIT_USERNAME").ok().filter(|s| !s.is_empty())?;
        let token = std::env::var("GIT_TOKEN").ok().filter(|s| !s.is_empty())?;
        Some(Self::new(Credentials::new(username, token)))
    }
}

#[async_trait]
impl CredentialStore for StaticCredentialStore {
    async fn get_credentials(&self, _host: &str) -> Result<Credentials, CredentialError> {
        Ok(self.credentials.clone())
    }
}

/// First basic-auth secret annotated for `host`.
#[must_use]
pub fn find_basic_auth(secrets: &[Secret], host: &str) -> Option<Credentials> {
    secrets
        .iter()
        .filter(|secret| secret.type_.as_deref() == Some(BASIC_AUTH_TYPE))
        .find(|secret| {
            secret.metadata.annotations.as_ref().is_some_and(|annotations| {
                annotations
                    .iter()
                    .any(|(k, v)| k.starts_with(HOST_ANNOTATION_PREFIX) && v == host)
            })
        })
        .map(|secret| {
            debug!(secret = ?secret.metadata.name, "Found credentials secret");
            let field = |key: &str| {
                secret
                    .data
                    .as_ref()
                    .and_then(|data| data.get(key))
                    .map(|bytes| String::from_utf8_lossy(&bytes.0).into_owned())
                    .unwrap_or_default()
            };
            Credentials::new(field("username"), field("password"))
        })
}

fn read_namespace(path: &str) -> Result<String, CredentialError> {
    std::fs::read_to_string(path)
        .map(|ns| ns.trim().to_string())
        .map_err(|source| CredentialError::Namespace {
            path: path.to_string(),
            source,
        })
}
