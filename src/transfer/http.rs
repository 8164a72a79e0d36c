//! Registry-to-registry copy over the HTTP API v2
//!
//! A copy pulls the source manifest, moves every referenced blob the destination does not
//! already have, and finally pushes the manifest bytes unchanged under the destination tag so
//! the destination digest equals the source digest. Manifest lists and OCI indexes are copied
//! child by child before the index itself.

use crate::digest::DigestUtils;
use crate::error::{RegistryError, Result};
use crate::logging::Logger;
use crate::registry::manifest::ParsedManifest;
use crate::registry::reference::api_repository;
use crate::registry::{ImageReference, ManifestData, RegistryClient};
use crate::transfer::{AuthContext, CopySummary, TransferBackend, TrustPolicy};
use async_trait::async_trait;

#[derive(Debug, Clone)]
pub struct HttpTransferBackend {
    output: Logger,
    insecure_registries: Vec<String>,
}

impl HttpTransferBackend {
    pub fn new(output: Logger) -> Self {
        Self {
            output,
            insecure_registries: Vec::new(),
        }
    }

    /// Registries reached over plain `http://`
    pub fn with_insecure_registries(mut self, registries: Vec<String>) -> Self {
        self.insecure_registries = registries;
        self
    }

    fn client_for(&self, registry: &str, auth: &AuthContext) -> Result<RegistryClient> {
        let plain_http = self.insecure_registries.iter().any(|r| r == registry);
        RegistryClient::builder(registry)
            .with_auth(auth.clone())
            .with_plain_http(plain_http)
            .with_logger(self.output.clone())
            .build()
    }

    async fn copy_blobs(
        &self,
        source: &RegistryClient,
        source_repository: &str,
        destination: &RegistryClient,
        destination_repository: &str,
        manifest: &ParsedManifest,
        summary: &mut CopySummary,
    ) -> Result<()> {
        for blob in manifest.blobs() {
            require_digest(&blob.digest)?;
            if destination
                .blob_exists(destination_repository, &blob.digest)
                .await?
            {
                summary.blobs_skipped += 1;
                continue;
            }

            let data = source.pull_blob(source_repository, &blob.digest).await?;
            let size = data.len() as u64;
            destination
                .push_blob(destination_repository, &blob.digest, data)
                .await?;

            summary.blobs_copied += 1;
            summary.bytes_copied += size;
        }
        Ok(())
    }

    async fn copy_index_child(
        &self,
        source: &RegistryClient,
        source_repository: &str,
        destination: &RegistryClient,
        destination_repository: &str,
        child_digest: &str,
        summary: &mut CopySummary,
    ) -> Result<()> {
        require_digest(child_digest)?;
        let child = source.pull_manifest(source_repository, child_digest).await?;
        if child.digest != child_digest {
            return Err(RegistryError::Validation(format!(
                "Child manifest digest mismatch: expected {}, got {}",
                child_digest, child.digest
            )));
        }

        let parsed = ParsedManifest::parse(&child.bytes, &child.media_type)?;
        if matches!(parsed, ParsedManifest::Index { .. }) {
            return Err(RegistryError::Parse(format!(
                "Nested manifest index {} is not supported",
                child_digest
            )));
        }

        self.copy_blobs(
            source,
            source_repository,
            destination,
            destination_repository,
            &parsed,
            summary,
        )
        .await?;

        destination
            .push_manifest(destination_repository, child_digest, &child)
            .await
    }
}

/// Descriptor digests end up in request paths, so only well-formed sha256 digests are accepted
fn require_digest(digest: &str) -> Result<()> {
    if DigestUtils::is_valid_docker_digest(digest) {
        Ok(())
    } else {
        Err(RegistryError::Validation(format!(
            "Malformed descriptor digest: {}",
            digest
        )))
    }
}

#[async_trait]
impl TransferBackend for HttpTransferBackend {
    async fn list_tags(
        &self,
        registry: &str,
        repository: &str,
        auth: &AuthContext,
    ) -> Result<Vec<String>> {
        let client = self.client_for(registry, auth)?;
        client.list_tags(&api_repository(registry, repository)).await
    }

    async fn copy_image(
        &self,
        source: &ImageReference,
        destination: &ImageReference,
        source_auth: &AuthContext,
        destination_auth: &AuthContext,
        policy: TrustPolicy,
    ) -> Result<CopySummary> {
        policy.admit(source)?;

        let source_client = self.client_for(&source.registry, source_auth)?;
        let destination_client = self.client_for(&destination.registry, destination_auth)?;
        let source_repository = source.api_repository();
        let destination_repository = destination.api_repository();

        let manifest: ManifestData = source_client
            .pull_manifest(&source_repository, &source.tag)
            .await?;
        let parsed = ParsedManifest::parse(&manifest.bytes, &manifest.media_type)?;

        let mut summary = CopySummary::default();
        match &parsed {
            ParsedManifest::Index { manifests } => {
                self.output.detail(&format!(
                    "{} is a manifest index with {} entries",
                    source,
                    manifests.len()
                ));
                for child in manifests {
                    self.copy_index_child(
                        &source_client,
                        &source_repository,
                        &destination_client,
                        &destination_repository,
                        &child.digest,
                        &mut summary,
                    )
                    .await?;
                }
            }
            ParsedManifest::Image { .. } => {
                self.copy_blobs(
                    &source_client,
                    &source_repository,
                    &destination_client,
                    &destination_repository,
                    &parsed,
                    &mut summary,
                )
                .await?;
            }
        }

        destination_client
            .push_manifest(&destination_repository, &destination.tag, &manifest)
            .await?;

        self.output.detail(&format!(
            "Copied {} -> {} ({}, {} blobs copied, {} already present)",
            source,
            destination,
            DigestUtils::format_digest_short(&manifest.digest),
            summary.blobs_copied,
            summary.blobs_skipped
        ));

        summary.manifest_digest = manifest.digest;
        Ok(summary)
    }
}
