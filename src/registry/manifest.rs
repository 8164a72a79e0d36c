//! Manifest parsing for Docker v2 and OCI image manifests and indexes

use crate::error::{RegistryError, Result};
use serde::Deserialize;

pub const DOCKER_MANIFEST_V2: &str = "application/vnd.docker.distribution.manifest.v2+json";
pub const DOCKER_MANIFEST_LIST: &str = "application/vnd.docker.distribution.manifest.list.v2+json";
pub const OCI_MANIFEST: &str = "application/vnd.oci.image.manifest.v1+json";
pub const OCI_INDEX: &str = "application/vnd.oci.image.index.v1+json";

pub const ACCEPTED_MANIFEST_TYPES: [&str; 4] =
    [DOCKER_MANIFEST_V2, DOCKER_MANIFEST_LIST, OCI_MANIFEST, OCI_INDEX];

const FOREIGN_LAYER_MARKERS: [&str; 2] = ["foreign", "nondistributable"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestKind {
    Image,
    Index,
}

impl ManifestKind {
    pub fn from_media_type(media_type: &str) -> Option<Self> {
        match media_type {
            DOCKER_MANIFEST_V2 | OCI_MANIFEST => Some(ManifestKind::Image),
            DOCKER_MANIFEST_LIST | OCI_INDEX => Some(ManifestKind::Index),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Descriptor {
    #[serde(default)]
    pub media_type: String,
    pub digest: String,
    #[serde(default)]
    pub size: u64,
}

impl Descriptor {
    /// Layers that registries are not allowed to redistribute
    pub fn is_foreign(&self) -> bool {
        FOREIGN_LAYER_MARKERS
            .iter()
            .any(|marker| self.media_type.contains(marker))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawManifest {
    #[serde(default)]
    schema_version: Option<u32>,
    #[serde(default)]
    media_type: Option<String>,
    #[serde(default)]
    config: Option<Descriptor>,
    #[serde(default)]
    layers: Vec<Descriptor>,
    #[serde(default)]
    manifests: Option<Vec<Descriptor>>,
}

/// Parsed manifest content
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedManifest {
    Image {
        config: Descriptor,
        layers: Vec<Descriptor>,
    },
    Index {
        manifests: Vec<Descriptor>,
    },
}

impl ParsedManifest {
    /// Parse manifest bytes. `content_type` is the media type the registry served them with and
    /// takes precedence over the document's own `mediaType`.
    pub fn parse(bytes: &[u8], content_type: &str) -> Result<Self> {
        let raw: RawManifest = serde_json::from_slice(bytes)
            .map_err(|e| RegistryError::Parse(format!("Failed to parse manifest: {}", e)))?;

        if raw.schema_version == Some(1) {
            return Err(RegistryError::Parse(
                "Schema 1 manifests are not supported".to_string(),
            ));
        }

        let kind = ManifestKind::from_media_type(content_type)
            .or_else(|| raw.media_type.as_deref().and_then(ManifestKind::from_media_type))
            .unwrap_or(if raw.manifests.is_some() {
                ManifestKind::Index
            } else {
                ManifestKind::Image
            });

        match kind {
            ManifestKind::Index => Ok(ParsedManifest::Index {
                manifests: raw.manifests.unwrap_or_default(),
            }),
            ManifestKind::Image => {
                let config = raw.config.ok_or_else(|| {
                    RegistryError::Parse("Image manifest has no config descriptor".to_string())
                })?;
                Ok(ParsedManifest::Image {
                    config,
                    layers: raw.layers,
                })
            }
        }
    }

    /// Blobs to copy for an image manifest: config first, then distributable layers
    pub fn blobs(&self) -> Vec<&Descriptor> {
        match self {
            ParsedManifest::Image { config, layers } => std::iter::once(config)
                .chain(layers.iter().filter(|layer| !layer.is_foreign()))
                .collect(),
            ParsedManifest::Index { .. } => Vec::new(),
        }
    }
}

/// Media type to send when pushing; falls back to the document's own field
pub fn effective_media_type(bytes: &[u8], content_type: &str) -> String {
    if !content_type.is_empty() && content_type != "application/json" {
        return content_type.to_string();
    }
    serde_json::from_slice::<RawManifest>(bytes)
        .ok()
        .and_then(|raw| raw.media_type)
        .unwrap_or_else(|| DOCKER_MANIFEST_V2.to_string())
}
