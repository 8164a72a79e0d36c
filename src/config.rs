//! Configuration management module
//!
//! Mirror rules, secrets and the tag report input are read once from YAML files at start-up and
//! never reloaded. Every loader fails with [`RegistryError::Config`], which aborts the run.

use crate::error::{RegistryError, Result};
use crate::selector::TagOrdering;
use crate::transfer::TrustPolicy;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_CONFIG_FILE: &str = "registries.yaml";
pub const DEFAULT_SECRETS_FILE: &str = "secrets.yaml";
pub const DEFAULT_TAG_REPORT_FILE: &str = "config.yaml";
pub const DEFAULT_TAG_REPORT_MAX: usize = 3;

/// One configured mirroring rule (source repository -> destination repository)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryPairSpec {
    pub source_registry: String,
    pub source_repository: String,
    pub dest_registry: String,
    pub dest_repository: String,
    #[serde(default)]
    pub tag_limit: usize,
    #[serde(default)]
    pub exclude_patterns: Vec<String>,
    #[serde(default)]
    pub tag_ordering: TagOrdering,
}

impl RegistryPairSpec {
    /// `registry/repository` of the source side
    pub fn source_name(&self) -> String {
        format!("{}/{}", self.source_registry, self.source_repository)
    }

    /// `registry/repository` of the destination side
    pub fn dest_name(&self) -> String {
        format!("{}/{}", self.dest_registry, self.dest_repository)
    }

    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("source_registry", &self.source_registry),
            ("source_repository", &self.source_repository),
            ("dest_registry", &self.dest_registry),
            ("dest_repository", &self.dest_repository),
        ];
        for (name, value) in fields {
            if value.trim().is_empty() {
                return Err(RegistryError::Config(format!(
                    "{} cannot be empty (rule {} -> {})",
                    name,
                    self.source_name(),
                    self.dest_name()
                )));
            }
        }

        for repository in [&self.source_repository, &self.dest_repository] {
            if repository.contains("..") || repository.starts_with('/') || repository.ends_with('/')
            {
                return Err(RegistryError::Config(format!(
                    "Invalid repository format: {}",
                    repository
                )));
            }
        }

        Ok(())
    }
}

/// Top-level mirror configuration (`registries.yaml`)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MirrorConfig {
    #[serde(default)]
    pub registries: Vec<RegistryPairSpec>,
    #[serde(default)]
    pub trust_policy: TrustPolicy,
    /// Registry hosts reached over plain HTTP
    #[serde(default)]
    pub insecure_registries: Vec<String>,
}

impl MirrorConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let config: Self = load_yaml(path, "configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content)
            .map_err(|e| RegistryError::Config(format!("Failed to parse configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.registries.iter().try_for_each(RegistryPairSpec::validate)
    }
}

/// How the stored credential for a destination registry is used
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SecretKind {
    /// Long-lived service account key traded for a short-lived bearer token
    #[serde(rename = "gcr", alias = "cloud-token-exchange")]
    TokenExchange,
    /// Username and password used as they are
    #[default]
    #[serde(other)]
    Generic,
}

impl SecretKind {
    pub fn requires_token_exchange(&self) -> bool {
        matches!(self, SecretKind::TokenExchange)
    }
}

/// Credentials for one destination registry
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretEntry {
    pub dest_registry: String,
    #[serde(rename = "type", default)]
    pub kind: SecretKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Path to the long-lived credential file used for token exchange
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_account_key: Option<String>,
}

impl std::fmt::Debug for SecretEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretEntry")
            .field("dest_registry", &self.dest_registry)
            .field("kind", &self.kind)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("service_account_key", &self.service_account_key)
            .finish()
    }
}

/// Secret file (`secrets.yaml`)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Secrets {
    #[serde(default)]
    pub secrets: Vec<SecretEntry>,
}

impl Secrets {
    pub fn load(path: &Path) -> Result<Self> {
        load_yaml(path, "secrets")
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content)
            .map_err(|e| RegistryError::Config(format!("Failed to parse secrets: {}", e)))
    }

    /// First entry for `dest_registry`; later duplicates are ignored
    pub fn find(&self, dest_registry: &str) -> Option<&SecretEntry> {
        self.secrets
            .iter()
            .find(|secret| secret.dest_registry == dest_registry)
    }
}

/// One registry in the tag report input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagReportRegistry {
    pub registry: String,
    #[serde(default)]
    pub images: Vec<String>,
}

/// Input of the `list-tags` report (`config.yaml`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagReportConfig {
    #[serde(default = "default_tag_report_max")]
    pub max: usize,
    #[serde(default)]
    pub registries: Vec<TagReportRegistry>,
}

fn default_tag_report_max() -> usize {
    DEFAULT_TAG_REPORT_MAX
}

impl TagReportConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let config: Self = load_yaml(path, "tag report configuration")?;
        if let Some(registry) = config
            .registries
            .iter()
            .find(|r| r.registry.trim().is_empty())
        {
            return Err(RegistryError::Config(format!(
                "registry cannot be empty (images: {:?})",
                registry.images
            )));
        }
        Ok(config)
    }
}

fn load_yaml<T: serde::de::DeserializeOwned>(path: &Path, what: &str) -> Result<T> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        RegistryError::Config(format!(
            "Failed to read {} file {}: {}",
            what,
            path.display(),
            e
        ))
    })?;

    serde_yaml::from_str(&content).map_err(|e| {
        RegistryError::Config(format!(
            "Failed to parse {} file {}: {}",
            what,
            path.display(),
            e
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const REGISTRIES: &str = r#"
registries:
  - source_registry: docker.io
    source_repository: library/nginx
    dest_registry: gcr.io
    dest_repository: my-project/nginx
    tag_limit: 3
    exclude_patterns:
      - "alpine"
      - "^1\\."
  - source_registry: quay.io
    source_repository: prometheus/node-exporter
    dest_registry: registry.example.com
    dest_repository: mirror/node-exporter
    tag_ordering: natural
insecure_registries:
  - localhost:5000
"#;

    #[test]
    fn test_parse_registries() {
        let config = MirrorConfig::from_yaml(REGISTRIES).unwrap();
        assert_eq!(config.registries.len(), 2);

        let first = &config.registries[0];
        assert_eq!(first.source_name(), "docker.io/library/nginx");
        assert_eq!(first.dest_name(), "gcr.io/my-project/nginx");
        assert_eq!(first.tag_limit, 3);
        assert_eq!(first.exclude_patterns, vec!["alpine", "^1\\."]);
        assert_eq!(first.tag_ordering, TagOrdering::Lexicographic);

        let second = &config.registries[1];
        assert_eq!(second.tag_limit, 0);
        assert!(second.exclude_patterns.is_empty());
        assert_eq!(second.tag_ordering, TagOrdering::Natural);

        assert_eq!(config.trust_policy, TrustPolicy::InsecureAcceptAnything);
        assert_eq!(config.insecure_registries, vec!["localhost:5000"]);
    }

    #[test]
    fn test_negative_tag_limit_is_rejected() {
        let yaml = r#"
registries:
  - source_registry: a
    source_repository: b
    dest_registry: c
    dest_repository: d
    tag_limit: -1
"#;
        let err = MirrorConfig::from_yaml(yaml).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_empty_repository_is_rejected() {
        let yaml = r#"
registries:
  - source_registry: a
    source_repository: ""
    dest_registry: c
    dest_repository: d
"#;
        assert!(matches!(
            MirrorConfig::from_yaml(yaml),
            Err(RegistryError::Config(_))
        ));
    }

    #[test]
    fn test_parse_secret_kinds() {
        let yaml = r#"
secrets:
  - dest_registry: gcr.io
    type: gcr
    service_account_key: /etc/keys/sa.json
  - dest_registry: exchange.example.com
    type: cloud-token-exchange
  - dest_registry: acr.example.com
    type: acr
    username: user
    password: pass
  - dest_registry: plain.example.com
    username: u
    password: p
"#;
        let secrets = Secrets::from_yaml(yaml).unwrap();
        assert_eq!(secrets.secrets[0].kind, SecretKind::TokenExchange);
        assert_eq!(
            secrets.secrets[0].service_account_key.as_deref(),
            Some("/etc/keys/sa.json")
        );
        assert_eq!(secrets.secrets[1].kind, SecretKind::TokenExchange);
        assert_eq!(secrets.secrets[2].kind, SecretKind::Generic);
        assert_eq!(secrets.secrets[3].kind, SecretKind::Generic);
    }

    #[test]
    fn test_find_first_match_wins() {
        let secrets = Secrets {
            secrets: vec![
                SecretEntry {
                    dest_registry: "a".to_string(),
                    username: Some("first".to_string()),
                    ..Default::default()
                },
                SecretEntry {
                    dest_registry: "a".to_string(),
                    username: Some("second".to_string()),
                    ..Default::default()
                },
            ],
        };
        let found = secrets.find("a").unwrap();
        assert_eq!(found.username.as_deref(), Some("first"));
        assert!(secrets.find("A").is_none());
    }

    #[test]
    fn test_secret_debug_redacts_password() {
        let entry = SecretEntry {
            dest_registry: "a".to_string(),
            username: Some("u".to_string()),
            password: Some("hunter2".to_string()),
            ..Default::default()
        };
        let rendered = format!("{:?}", entry);
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_load_missing_file_is_config_error() {
        let err = MirrorConfig::load(Path::new("/nonexistent/registries.yaml")).unwrap_err();
        assert!(matches!(err, RegistryError::Config(_)));
    }

    #[test]
    fn test_load_tag_report_defaults_max() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "registries:\n  - registry: quay.io\n    images:\n      - coreos/etcd"
        )
        .unwrap();

        let config = TagReportConfig::load(file.path()).unwrap();
        assert_eq!(config.max, DEFAULT_TAG_REPORT_MAX);
        assert_eq!(config.registries[0].images, vec!["coreos/etcd"]);
    }
}
