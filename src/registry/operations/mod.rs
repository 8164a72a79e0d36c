//! Registry operations module
//!
//! Each operation group holds a clone of the HTTP client and the shared [`TokenManager`], and
//! reports `401` responses as [`RegistryError::Unauthorized`] so the token manager can answer
//! the challenge.
//!
//! [`TokenManager`]: crate::registry::token_manager::TokenManager

pub mod blob_operations;
pub mod manifest_operations;
pub mod repository_operations;

pub use blob_operations::BlobOperations;
pub use manifest_operations::{ManifestData, ManifestOperations};
pub use repository_operations::RepositoryOperations;

use crate::error::RegistryError;
use reqwest::Response;
use reqwest::header::WWW_AUTHENTICATE;

/// Build the `Unauthorized` error for a 401 response, keeping its challenge
pub(crate) fn unauthorized(response: &Response, context: &str) -> RegistryError {
    let challenge = response
        .headers()
        .get(WWW_AUTHENTICATE)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_string());

    RegistryError::Unauthorized {
        message: format!("{} returned 401", context),
        challenge,
    }
}

pub(crate) async fn error_text(response: Response) -> String {
    response
        .text()
        .await
        .unwrap_or_else(|_| "Failed to read error response".to_string())
}
