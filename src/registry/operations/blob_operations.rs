//! Blob operations for registry client
//!
//! Implements:
//! - Blob existence checks (HEAD /v2/{name}/blobs/{digest})
//! - Blob download (GET /v2/{name}/blobs/{digest}), redirects followed by the HTTP client
//! - Monolithic blob upload (POST /v2/{name}/blobs/uploads/ then PUT {location}?digest=)

use crate::digest::DigestUtils;
use crate::error::handlers::{HttpErrorHandler, NetworkErrorHandler};
use crate::error::{RegistryError, Result};
use crate::logging::Logger;
use crate::registry::operations::{error_text, unauthorized};
use crate::registry::token_manager::{TokenManager, pull_scope, push_scope};
use reqwest::Client;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE, LOCATION};

#[derive(Clone)]
pub struct BlobOperations {
    client: Client,
    address: String,
    output: Logger,
    token_manager: TokenManager,
}

impl BlobOperations {
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

    /// Check if blob exists using a HEAD request
    pub async fn blob_exists(&self, repository: &str, digest: &str) -> Result<bool> {
        let url = format!("{}/v2/{}/blobs/{}", self.address, repository, digest);
        let client = self.client.clone();

        // Push scope: the answer is only used right before an upload to the same repository
        let exists = self
            .token_manager
            .execute_with_auth(&push_scope(repository), move |auth| {
                let client = client.clone();
                let url = url.clone();
                Box::pin(async move {
                    let response = auth
                        .apply(client.head(&url))
                        .send()
                        .await
                        .map_err(|e| {
                            NetworkErrorHandler::handle_network_error(&e, "blob existence check")
                        })?;

                    match response.status().as_u16() {
                        200 => Ok(true),
                        404 => Ok(false),
                        401 => Err(unauthorized(&response, "blob existence check")),
                        _ => {
                            let status = response.status();
                            Err(HttpErrorHandler::handle_registry_error(
                                status,
                                "",
                                "blob existence check",
                            ))
                        }
                    }
                })
            })
            .await?;

        self.output.detail(&format!(
            "Blob {} {} in {}",
            DigestUtils::format_digest_short(digest),
            if exists { "exists" } else { "does not exist" },
            repository
        ));
        Ok(exists)
    }

    /// Download a blob and verify it against its digest
    pub async fn pull_blob(&self, repository: &str, digest: &str) -> Result<Vec<u8>> {
        let url = format!("{}/v2/{}/blobs/{}", self.address, repository, digest);
        let client = self.client.clone();

        self.output.detail(&format!(
            "Downloading blob {} from {}",
            DigestUtils::format_digest_short(digest),
            repository
        ));

        let data = self
            .token_manager
            .execute_with_auth(&pull_scope(repository), move |auth| {
                let client = client.clone();
                let url = url.clone();
                Box::pin(async move {
                    let response = auth
                        .apply(client.get(&url))
                        .send()
                        .await
                        .map_err(|e| {
                            NetworkErrorHandler::handle_network_error(&e, "blob download")
                        })?;

                    let status = response.status();
                    if status == 401 {
                        return Err(unauthorized(&response, "blob download"));
                    }
                    if !status.is_success() {
                        let text = error_text(response).await;
                        return Err(HttpErrorHandler::handle_registry_error(
                            status,
                            &text,
                            "blob download",
                        ));
                    }

                    let bytes = response.bytes().await.map_err(|e| {
                        RegistryError::Network(format!("Failed to read blob response: {}", e))
                    })?;
                    Ok(bytes.to_vec())
                })
            })
            .await?;

        DigestUtils::verify_data_integrity(&data, digest)?;
        Ok(data)
    }

    /// Upload blob using the monolithic upload pattern
    pub async fn push_blob(&self, repository: &str, digest: &str, data: Vec<u8>) -> Result<()> {
        let scope = push_scope(repository);
        let upload_url = format!("{}/v2/{}/blobs/uploads/", self.address, repository);
        let client = self.client.clone();

        self.output.detail(&format!(
            "Uploading blob {} ({}) to {}",
            DigestUtils::format_digest_short(digest),
            self.output.format_size(data.len() as u64),
            repository
        ));

        let location = self
            .token_manager
            .execute_with_auth(&scope, move |auth| {
                let client = client.clone();
                let upload_url = upload_url.clone();
                Box::pin(async move {
                    let response = auth
                        .apply(client.post(&upload_url).header(CONTENT_LENGTH, "0"))
                        .send()
                        .await
                        .map_err(|e| {
                            NetworkErrorHandler::handle_network_error(&e, "upload session start")
                        })?;

                    let status = response.status();
                    if status == 401 {
                        return Err(unauthorized(&response, "upload session start"));
                    }
                    if !status.is_success() {
                        let text = error_text(response).await;
                        return Err(HttpErrorHandler::handle_upload_error(
                            status,
                            &text,
                            "upload session start",
                        ));
                    }

                    response
                        .headers()
                        .get(LOCATION)
                        .and_then(|value| value.to_str().ok())
                        .map(|value| value.to_string())
                        .ok_or_else(|| {
                            RegistryError::Transfer(
                                "Missing Location header in upload response".to_string(),
                            )
                        })
                })
            })
            .await?;

        let final_url = upload_target(&self.address, &location, digest)?;
        self.output
            .detail(&format!("Upload session started, location: {}", location));

        let client = self.client.clone();
        self.token_manager
            .execute_with_auth(&scope, move |auth| {
                let client = client.clone();
                let final_url = final_url.clone();
                let data = data.clone();
                Box::pin(async move {
                    let request = client
                        .put(&final_url)
                        .header(CONTENT_TYPE, "application/octet-stream")
                        .header(CONTENT_LENGTH, data.len().to_string())
                        .body(data);

                    let response = auth
                        .apply(request)
                        .send()
                        .await
                        .map_err(|e| NetworkErrorHandler::handle_network_error(&e, "blob upload"))?;

                    let status = response.status();
                    if status == 401 {
                        return Err(unauthorized(&response, "blob upload"));
                    }
                    if !status.is_success() {
                        let text = error_text(response).await;
                        return Err(HttpErrorHandler::handle_upload_error(
                            status,
                            &text,
                            "blob upload",
                        ));
                    }
                    Ok(())
                })
            })
            .await
    }
}

/// Upload location plus the `digest` query parameter. Relative locations resolve against the
/// registry address.
fn upload_target(address: &str, location: &str, digest: &str) -> Result<String> {
    let base = url::Url::parse(address)?;
    let mut target = base.join(location)?;
    target.query_pairs_mut().append_pair("digest", digest);
    Ok(target.to_string())
}
