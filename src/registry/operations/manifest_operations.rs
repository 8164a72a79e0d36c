//! Manifest operations for registry client
//!
//! Implements manifest download (GET /v2/{name}/manifests/{reference}) with Accept headers for
//! Docker v2 and OCI manifests and indexes, and manifest upload
//! (PUT /v2/{name}/manifests/{reference}) preserving the original bytes and media type.

use crate::digest::DigestUtils;
use crate::error::handlers::{HttpErrorHandler, NetworkErrorHandler};
use crate::error::{RegistryError, Result};
use crate::logging::Logger;
use crate::registry::auth::RequestAuth;
use crate::registry::manifest::{ACCEPTED_MANIFEST_TYPES, effective_media_type};
use crate::registry::operations::{error_text, unauthorized};
use crate::registry::token_manager::{TokenManager, pull_scope, push_scope};
use reqwest::Client;
use reqwest::header::{ACCEPT, CONTENT_TYPE};

const DOCKER_CONTENT_DIGEST: &str = "Docker-Content-Digest";

/// Raw manifest as served by the registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestData {
    pub media_type: String,
    pub digest: String,
    pub bytes: Vec<u8>,
}

#[derive(Clone)]
pub struct ManifestOperations {
    client: Client,
    address: String,
    output: Logger,
    token_manager: TokenManager,
}

impl ManifestOperations {
    pub fn new(
        client: Client,
        address: String,
        output: Logger,
        token_manager: TokenManager,
    ) -> Self {
        Self {
            client,
            address,
            output,
            token_manager,
        }
    }

    /// Download a manifest by tag or digest
    pub async fn pull_manifest(&self, repository: &str, reference: &str) -> Result<ManifestData> {
        self.output.verbose(&format!(
            "Pulling manifest for {}:{}",
            repository, reference
        ));

        let url = format!("{}/v2/{}/manifests/{}", self.address, repository, reference);
        let client = self.client.clone();
        let context = format!("manifest pull for {}:{}", repository, reference);

        let manifest = self
            .token_manager
            .execute_with_auth(&pull_scope(repository), move |auth| {
                let client = client.clone();
                let url = url.clone();
                let context = context.clone();
                Box::pin(async move {
                    Self::pull_manifest_internal(&client, &url, &context, &auth).await
                })
            })
            .await?;

        self.output.detail(&format!(
            "Manifest type: {} ({})",
            manifest.media_type,
            DigestUtils::format_digest_short(&manifest.digest)
        ));

        Ok(manifest)
    }

    async fn pull_manifest_internal(
        client: &Client,
        url: &str,
        context: &str,
        auth: &RequestAuth,
    ) -> Result<ManifestData> {
        let request = client
            .get(url)
            .header(ACCEPT, ACCEPTED_MANIFEST_TYPES.join(", "));

        let response = auth
            .apply(request)
            .send()
            .await
            .map_err(|e| NetworkErrorHandler::handle_network_error(&e, context))?;

        let status = response.status();
        if status == 401 {
            return Err(unauthorized(&response, context));
        }
        if !status.is_success() {
            let text = error_text(response).await;
            return Err(HttpErrorHandler::handle_registry_error(status, &text, context));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.split(';').next().unwrap_or(value).trim().to_string())
            .unwrap_or_default();

        let header_digest = response
            .headers()
            .get(DOCKER_CONTENT_DIGEST)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());

        let bytes = response
            .bytes()
            .await
            .map_err(|e| {
                RegistryError::Network(format!("Failed to read manifest response: {}", e))
            })?
            .to_vec();

        let media_type = effective_media_type(&bytes, &content_type);
        let digest = DigestUtils::compute_docker_digest(&bytes);
        if let Some(header_digest) = header_digest {
            if header_digest.starts_with("sha256:") && header_digest != digest {
                return Err(RegistryError::Validation(format!(
                    "Manifest digest mismatch for {}: registry reported {}, computed {}",
                    context, header_digest, digest
                )));
            }
        }

        Ok(ManifestData {
            media_type,
            digest,
            bytes,
        })
    }

    /// Upload manifest bytes under `reference` (tag or digest)
    pub async fn push_manifest(
        &self,
        repository: &str,
        reference: &str,
        manifest: &ManifestData,
    ) -> Result<()> {
        let url = format!("{}/v2/{}/manifests/{}", self.address, repository, reference);
        let client = self.client.clone();
        let context = format!("manifest upload for {}:{}", repository, reference);
        let manifest_copy = manifest.clone();

        self.output.verbose(&format!(
            "Uploading manifest with content-type: {}",
            manifest.media_type
        ));

        self.token_manager
            .execute_with_auth(&push_scope(repository), move |auth| {
                let client = client.clone();
                let url = url.clone();
                let context = context.clone();
                let manifest = manifest_copy.clone();
                Box::pin(async move {
                    let request = client
                        .put(&url)
                        .header(CONTENT_TYPE, manifest.media_type.as_str())
                        .body(manifest.bytes);

                    let response = auth
                        .apply(request)
                        .send()
                        .await
                        .map_err(|e| NetworkErrorHandler::handle_network_error(&e, &context))?;

                    let status = response.status();
                    if status == 401 {
                        return Err(unauthorized(&response, &context));
                    }
                    if !status.is_success() {
                        let text = error_text(response).await;
                        return Err(HttpErrorHandler::handle_upload_error(status, &text, &context));
                    }
                    Ok(())
                })
            })
            .await?;

        self.output.detail(&format!(
            "Manifest uploaded successfully for {}:{}",
            repository, reference
        ));
        Ok(())
    }
}
