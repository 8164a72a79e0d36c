//! SHA256 digest utilities for content-addressed registry objects
//!
//! Blobs and manifests are addressed as `sha256:<hex>`. Everything the transfer backend copies is
//! checked against its digest before it is pushed to the destination.

use crate::error::{RegistryError, Result};
use sha2::Digest;

/// Utilities for working with SHA256 digests
pub struct DigestUtils;

impl DigestUtils {
    /// Compute SHA256 digest from byte data
    pub fn compute_sha256(data: &[u8]) -> String {
        let mut hasher = sha2::Sha256::new();
        hasher.update(data);
        hex::encode(hasher.finalize())
    }

    /// Compute full digest (with sha256: prefix) from byte data
    pub fn compute_docker_digest(data: &[u8]) -> String {
        format!("sha256:{}", Self::compute_sha256(data))
    }

    /// Validate SHA256 hex string (64 characters, all hex)
    pub fn is_valid_sha256_hex(digest: &str) -> bool {
        digest.len() == 64 && digest.chars().all(|c| c.is_ascii_hexdigit())
    }

    /// Validate full digest format (sha256:xxxxx)
    pub fn is_valid_docker_digest(digest: &str) -> bool {
        digest
            .strip_prefix("sha256:")
            .is_some_and(Self::is_valid_sha256_hex)
    }

    /// Extract SHA256 hex part from full digest
    pub fn extract_hex_part(digest: &str) -> Result<&str> {
        match digest.strip_prefix("sha256:") {
            Some(hex_part) if Self::is_valid_sha256_hex(hex_part) => Ok(hex_part),
            Some(_) => Err(RegistryError::Validation(format!(
                "Invalid SHA256 hex part in digest: {}",
                digest
            ))),
            None => Err(RegistryError::Validation(format!(
                "Unsupported digest algorithm (expected sha256): {}",
                digest
            ))),
        }
    }

    /// Verify data matches expected digest
    pub fn verify_data_integrity(data: &[u8], expected_digest: &str) -> Result<()> {
        let expected_hex = Self::extract_hex_part(expected_digest)?;
        let computed = Self::compute_sha256(data);

        if !computed.eq_ignore_ascii_case(expected_hex) {
            return Err(RegistryError::Validation(format!(
                "Data integrity check failed: expected {}, computed sha256:{}",
                expected_digest, computed
            )));
        }

        Ok(())
    }

    /// Format digest for display (truncated for readability)
    pub fn format_digest_short(digest: &str) -> String {
        if digest.len() > 23 {
            format!("{}...", &digest[..23])
        } else {
            digest.to_string()
        }
    }
}
