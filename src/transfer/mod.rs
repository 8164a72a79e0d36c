//! Transfer backend abstraction
//!
//! The sync engine only needs two capabilities from a backend: list the tags of a repository and
//! copy one tagged image between two registries. [`HttpTransferBackend`] implements them against
//! the registry HTTP API v2.

pub mod http;

pub use http::HttpTransferBackend;

use crate::error::{RegistryError, Result};
use crate::registry::ImageReference;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Authentication presented to a registry
#[derive(Clone, PartialEq, Eq)]
pub enum AuthContext {
    Anonymous,
    Basic { username: String, password: String },
}

impl std::fmt::Debug for AuthContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthContext::Anonymous => write!(f, "Anonymous"),
            AuthContext::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
        }
    }
}

impl AuthContext {
    pub fn is_anonymous(&self) -> bool {
        matches!(self, AuthContext::Anonymous)
    }
}

/// Signature stance applied to a source image before it is copied
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrustPolicy {
    /// Accept any image, signed or not
    #[default]
    InsecureAcceptAnything,
    /// Refuse every image
    Reject,
}

impl TrustPolicy {
    pub fn admit(&self, source: &ImageReference) -> Result<()> {
        match self {
            TrustPolicy::InsecureAcceptAnything => Ok(()),
            TrustPolicy::Reject => Err(RegistryError::Transfer(format!(
                "Trust policy rejects {}",
                source
            ))),
        }
    }
}

/// What a single image copy moved
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CopySummary {
    pub manifest_digest: String,
    pub blobs_copied: usize,
    pub blobs_skipped: usize,
    pub bytes_copied: u64,
}

#[async_trait]
pub trait TransferBackend: Send + Sync {
    /// All tags of `registry/repository`
    async fn list_tags(
        &self,
        registry: &str,
        repository: &str,
        auth: &AuthContext,
    ) -> Result<Vec<String>>;

    /// Copy the image `source` points at to `destination`
    async fn copy_image(
        &self,
        source: &ImageReference,
        destination: &ImageReference,
        source_auth: &AuthContext,
        destination_auth: &AuthContext,
        policy: TrustPolicy,
    ) -> Result<CopySummary>;
}
