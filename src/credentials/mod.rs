//! Destination credential resolution
//!
//! Maps a destination registry to the username/password pair handed to the transfer backend.
//! Entries marked for token exchange are traded for a short-lived bearer token through an
//! [`IdentityExchanger`]; any failure there is fatal for the whole run.

pub mod exchange;

pub use exchange::{IdentityExchanger, ServiceAccountExchanger, ServiceAccountKey};

use crate::config::Secrets;
use crate::error::{RegistryError, Result};
use crate::logging::Logger;
use crate::transfer::AuthContext;
use std::sync::Arc;

/// Username paired with an exchanged bearer token
pub const TOKEN_EXCHANGE_USERNAME: &str = "oauth2accesstoken";

/// Capability scope requested for every token exchange (read/write storage)
pub const STORAGE_READ_WRITE_SCOPE: &str = "https://www.googleapis.com/auth/devstorage.read_write";

/// Usable credentials for one destination registry. Empty means anonymous.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ResolvedCredential {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for ResolvedCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedCredential")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl ResolvedCredential {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn is_anonymous(&self) -> bool {
        self.username.is_empty()
    }

    /// Auth context for the transfer backend; no username means anonymous access
    pub fn auth_context(&self) -> AuthContext {
        if self.is_anonymous() {
            AuthContext::Anonymous
        } else {
            AuthContext::Basic {
                username: self.username.clone(),
                password: self.password.clone(),
            }
        }
    }
}

pub struct CredentialResolver {
    exchanger: Arc<dyn IdentityExchanger>,
    output: Logger,
}

impl CredentialResolver {
    pub fn new(exchanger: Arc<dyn IdentityExchanger>, output: Logger) -> Self {
        Self { exchanger, output }
    }

    /// Resolve credentials for `dest_registry`. Only a fatal `Auth` error can come back.
    pub async fn resolve(
        &self,
        dest_registry: &str,
        secrets: &Secrets,
    ) -> Result<ResolvedCredential> {
        let Some(secret) = secrets.find(dest_registry) else {
            self.output.detail(&format!(
                "No credentials configured for {}, using anonymous access",
                dest_registry
            ));
            return Ok(ResolvedCredential::anonymous());
        };

        match (&secret.service_account_key, secret.kind.requires_token_exchange()) {
            (Some(key_path), true) => {
                self.output.step(&format!(
                    "Exchanging service account key for {} access token",
                    dest_registry
                ));

                let material = tokio::fs::read_to_string(key_path).await.map_err(|e| {
                    RegistryError::Auth(format!(
                        "Failed to read service account key file {}: {}",
                        key_path, e
                    ))
                })?;

                let token = self
                    .exchanger
                    .exchange(&material, STORAGE_READ_WRITE_SCOPE)
                    .await
                    .map_err(|e| {
                        let reason = match e {
                            RegistryError::Auth(msg) => msg,
                            other => other.to_string(),
                        };
                        RegistryError::Auth(format!(
                            "Token exchange for {} failed: {}",
                            dest_registry, reason
                        ))
                    })?;

                Ok(ResolvedCredential::new(TOKEN_EXCHANGE_USERNAME, token))
            }
            _ => Ok(ResolvedCredential::new(
                secret.username.clone().unwrap_or_default(),
                secret.password.clone().unwrap_or_default(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SecretEntry, SecretKind};
    use async_trait::async_trait;
    use std::io::Write;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingExchanger {
        calls: Mutex<Vec<(String, String)>>,
        fail: bool,
    }

    #[async_trait]
    impl IdentityExchanger for RecordingExchanger {
        async fn exchange(&self, credential_material: &str, scope: &str) -> Result<String> {
            self.calls
                .lock()
                .unwrap()
                .push((credential_material.to_string(), scope.to_string()));
            if self.fail {
                Err(RegistryError::Network("identity provider unreachable".to_string()))
            } else {
                Ok("bearer-token".to_string())
            }
        }
    }

    fn generic(dest: &str, username: &str, password: &str) -> SecretEntry {
        SecretEntry {
            dest_registry: dest.to_string(),
            kind: SecretKind::Generic,
            username: Some(username.to_string()),
            password: Some(password.to_string()),
            service_account_key: None,
        }
    }

    fn resolver(exchanger: Arc<RecordingExchanger>) -> CredentialResolver {
        CredentialResolver::new(exchanger, Logger::new_quiet())
    }

    #[tokio::test]
    async fn test_generic_credentials_verbatim() {
        let secrets = Secrets {
            secrets: vec![generic("a", "u", "p")],
        };
        let resolver = resolver(Arc::new(RecordingExchanger::default()));

        let credential = resolver.resolve("a", &secrets).await.unwrap();
        assert_eq!(credential, ResolvedCredential::new("u", "p"));

        let credential = resolver.resolve("b", &secrets).await.unwrap();
        assert_eq!(credential, ResolvedCredential::new("", ""));
        assert_eq!(credential.auth_context(), AuthContext::Anonymous);
    }

    #[tokio::test]
    async fn test_first_match_wins() {
        let secrets = Secrets {
            secrets: vec![generic("a", "first", "1"), generic("a", "second", "2")],
        };
        let resolver = resolver(Arc::new(RecordingExchanger::default()));
        let credential = resolver.resolve("a", &secrets).await.unwrap();
        assert_eq!(credential.username, "first");
    }

    #[tokio::test]
    async fn test_token_exchange_uses_key_material_and_fixed_scope() {
        let mut key_file = tempfile::NamedTempFile::new().unwrap();
        write!(key_file, r#"{{"client_email":"sa@example.com"}}"#).unwrap();

        let secrets = Secrets {
            secrets: vec![SecretEntry {
                dest_registry: "gcr.io".to_string(),
                kind: SecretKind::TokenExchange,
                service_account_key: Some(key_file.path().display().to_string()),
                ..Default::default()
            }],
        };
        let exchanger = Arc::new(RecordingExchanger::default());
        let credential = resolver(exchanger.clone())
            .resolve("gcr.io", &secrets)
            .await
            .unwrap();

        assert_eq!(
            credential,
            ResolvedCredential::new(TOKEN_EXCHANGE_USERNAME, "bearer-token")
        );
        let calls = exchanger.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, r#"{"client_email":"sa@example.com"}"#);
        assert_eq!(calls[0].1, STORAGE_READ_WRITE_SCOPE);
    }

    #[tokio::test]
    async fn test_unreadable_key_is_fatal() {
        let secrets = Secrets {
            secrets: vec![SecretEntry {
                dest_registry: "gcr.io".to_string(),
                kind: SecretKind::TokenExchange,
                service_account_key: Some("/nonexistent/key.json".to_string()),
                ..Default::default()
            }],
        };
        let exchanger = Arc::new(RecordingExchanger::default());
        let err = resolver(exchanger.clone())
            .resolve("gcr.io", &secrets)
            .await
            .unwrap_err();

        assert!(err.is_fatal());
        assert!(exchanger.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_exchange_failure_is_fatal() {
        let key_file = tempfile::NamedTempFile::new().unwrap();
        let secrets = Secrets {
            secrets: vec![SecretEntry {
                dest_registry: "gcr.io".to_string(),
                kind: SecretKind::TokenExchange,
                service_account_key: Some(key_file.path().display().to_string()),
                ..Default::default()
            }],
        };
        let exchanger = Arc::new(RecordingExchanger {
            fail: true,
            ..Default::default()
        });
        let err = resolver(exchanger).resolve("gcr.io", &secrets).await.unwrap_err();
        assert!(matches!(err, RegistryError::Auth(_)));
        assert!(err.to_string().contains("gcr.io"));
    }

    #[tokio::test]
    async fn test_exchange_kind_without_key_falls_back_to_stored_credentials() {
        let secrets = Secrets {
            secrets: vec![SecretEntry {
                dest_registry: "gcr.io".to_string(),
                kind: SecretKind::TokenExchange,
                username: Some("_json_key".to_string()),
                password: Some("secret".to_string()),
                service_account_key: None,
            }],
        };
        let exchanger = Arc::new(RecordingExchanger::default());
        let credential = resolver(exchanger.clone())
            .resolve("gcr.io", &secrets)
            .await
            .unwrap();
        assert_eq!(credential, ResolvedCredential::new("_json_key", "secret"));
        assert!(exchanger.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_debug_never_prints_password() {
        let rendered = format!("{:?}", ResolvedCredential::new("u", "s3cr3t"));
        assert!(!rendered.contains("s3cr3t"));
    }
}
