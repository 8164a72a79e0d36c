//! Registry module for Docker Registry HTTP API v2 interactions
//!
//! Provides image references, challenge-driven authentication with a per-scope token cache,
//! manifest parsing and the operation groups (tags, manifests, blobs) used by [`RegistryClient`].

pub mod auth;
pub mod client;
pub mod manifest;
pub mod operations;
pub mod reference;
pub mod token_manager;

pub use auth::Auth;
pub use client::{RegistryClient, RegistryClientBuilder};
pub use manifest::{Descriptor, ManifestKind, ParsedManifest};
pub use operations::ManifestData;
pub use reference::ImageReference;
pub use token_manager::TokenManager;
