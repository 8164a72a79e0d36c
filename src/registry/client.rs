//! Registry client for the Docker Registry HTTP API v2
//!
//! A [`RegistryClient`] talks to exactly one registry with one set of credentials. Its operation
//! groups share a single [`TokenManager`], so a token obtained for a repository scope during tag
//! listing is reused for the manifest and blob requests that follow.

use crate::error::{RegistryError, Result};
use crate::logging::Logger;
use crate::registry::auth::Auth;
use crate::registry::operations::{
    BlobOperations, ManifestData, ManifestOperations, RepositoryOperations,
};
use crate::registry::reference::api_host;
use crate::registry::token_manager::TokenManager;
use crate::transfer::AuthContext;
use reqwest::Client;
use std::time::Duration;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

pub struct RegistryClientBuilder {
    registry: String,
    auth: AuthContext,
    plain_http: bool,
    output: Logger,
}

impl RegistryClientBuilder {
    pub fn new(registry: impl Into<String>) -> Self {
        Self {
            registry: registry.into(),
            auth: AuthContext::Anonymous,
            plain_http: false,
            output: Logger::default(),
        }
    }

    pub fn with_auth(mut self, auth: AuthContext) -> Self {
        self.auth = auth;
        self
    }

    /// Talk `http://` instead of `https://` (local or test registries)
    pub fn with_plain_http(mut self, plain_http: bool) -> Self {
        self.plain_http = plain_http;
        self
    }

    pub fn with_logger(mut self, output: Logger) -> Self {
        self.output = output;
        self
    }

    pub fn build(self) -> Result<RegistryClient> {
        if self.registry.trim().is_empty() {
            return Err(RegistryError::Validation(
                "Registry address cannot be empty".to_string(),
            ));
        }

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| RegistryError::Network(format!("Failed to build HTTP client: {}", e)))?;

        let scheme = if self.plain_http { "http" } else { "https" };
        let address = format!("{}://{}", scheme, api_host(&self.registry));

        let auth = Auth::new(client.clone(), self.auth, self.output.clone());
        let token_manager = TokenManager::new(auth);

        Ok(RegistryClient {
            repository_ops: RepositoryOperations::new(
                client.clone(),
                address.clone(),
                self.output.clone(),
                token_manager.clone(),
            ),
            manifest_ops: ManifestOperations::new(
                client.clone(),
                address.clone(),
                self.output.clone(),
                token_manager.clone(),
            ),
            blob_ops: BlobOperations::new(client, address.clone(), self.output, token_manager),
            address,
        })
    }
}

#[derive(Clone)]
pub struct RegistryClient {
    address: String,
    repository_ops: RepositoryOperations,
    manifest_ops: ManifestOperations,
    blob_ops: BlobOperations,
}

impl RegistryClient {
    pub fn builder(registry: impl Into<String>) -> RegistryClientBuilder {
        RegistryClientBuilder::new(registry)
    }

    /// Base URL requests are sent to, e.g. `https://registry-1.docker.io`
    pub fn address(&self) -> &str {
        &self.address
    }

    pub async fn list_tags(&self, repository: &str) -> Result<Vec<String>> {
        self.repository_ops.list_tags(repository).await
    }

    pub async fn pull_manifest(&self, repository: &str, reference: &str) -> Result<ManifestData> {
        self.manifest_ops.pull_manifest(repository, reference).await
    }

    pub async fn push_manifest(
        &self,
        repository: &str,
        reference: &str,
        manifest: &ManifestData,
    ) -> Result<()> {
        self.manifest_ops
            .push_manifest(repository, reference, manifest)
            .await
    }

    pub async fn blob_exists(&self, repository: &str, digest: &str) -> Result<bool> {
        self.blob_ops.blob_exists(repository, digest).await
    }

    pub async fn pull_blob(&self, repository: &str, digest: &str) -> Result<Vec<u8>> {
        self.blob_ops.pull_blob(repository, digest).await
    }

    pub async fn push_blob(&self, repository: &str, digest: &str, data: Vec<u8>) -> Result<()> {
        self.blob_ops.push_blob(repository, digest, data).await
    }
}
