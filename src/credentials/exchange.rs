//! Token exchange for registries that only accept short-lived bearer credentials
//!
//! A service account key (JSON with `client_email`, `private_key` and `token_uri`) is turned into
//! an RS256-signed JWT assertion and traded at the token endpoint using the
//! `urn:ietf:params:oauth:grant-type:jwt-bearer` grant.

use crate::error::handlers::{HttpErrorHandler, NetworkErrorHandler};
use crate::error::{RegistryError, Result};
use crate::logging::Logger;
use async_trait::async_trait;
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
pub const JWT_BEARER_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: u64 = 3600;

/// Trades long-lived credential material for a short-lived bearer token
#[async_trait]
pub trait IdentityExchanger: Send + Sync {
    async fn exchange(&self, credential_material: &str, scope: &str) -> Result<String>;
}

/// Fields of a service account key file that the exchange needs
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default)]
    pub token_uri: Option<String>,
}

impl ServiceAccountKey {
    pub fn from_json(material: &str) -> Result<Self> {
        serde_json::from_str(material)
            .map_err(|e| RegistryError::Auth(format!("Malformed service account key: {}", e)))
    }

    pub fn token_uri(&self) -> &str {
        self.token_uri.as_deref().unwrap_or(DEFAULT_TOKEN_URI)
    }
}

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: u64,
    exp: u64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
}

pub struct ServiceAccountExchanger {
    client: Client,
    output: Logger,
}

impl ServiceAccountExchanger {
    pub fn new(output: Logger) -> Result<Self> {
        let client = Client::builder().build().map_err(|e| {
            RegistryError::Auth(format!("Failed to create token exchange client: {}", e))
        })?;

        Ok(Self { client, output })
    }

    /// Build the signed JWT assertion for `scope`, issued at `issued_at` (unix seconds)
    pub fn sign_assertion(key: &ServiceAccountKey, scope: &str, issued_at: u64) -> Result<String> {
        let claims = AssertionClaims {
            iss: &key.client_email,
            scope,
            aud: key.token_uri(),
            iat: issued_at,
            exp: issued_at + ASSERTION_LIFETIME_SECS,
        };

        let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes()).map_err(|e| {
            RegistryError::Auth(format!("Invalid service account private key: {}", e))
        })?;

        let mut header = Header::new(Algorithm::RS256);
        header.kid = key.private_key_id.clone();

        Ok(encode(&header, &claims, &encoding_key)?)
    }

    /// Exchange a signed assertion for an access token at `token_uri`
    pub async fn request_token(&self, token_uri: &str, assertion: &str) -> Result<String> {
        self.output
            .detail(&format!("Requesting access token from: {}", token_uri));

        let response = self
            .client
            .post(token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT_TYPE), ("assertion", assertion)])
            .send()
            .await
            .map_err(|e| {
                let err = NetworkErrorHandler::handle_network_error(&e, "token exchange");
                RegistryError::Auth(err.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error response".to_string());
            return Err(HttpErrorHandler::handle_auth_error(status, &error_text));
        }

        let token_response: TokenResponse = response
            .json()
            .await
            .map_err(|e| RegistryError::Auth(format!("Failed to parse token response: {}", e)))?;

        if let Some(expires_in) = token_response.expires_in {
            self.output
                .detail(&format!("Access token expires in {} seconds", expires_in));
        }

        token_response
            .access_token
            .filter(|token| !token.is_empty())
            .ok_or_else(|| {
                RegistryError::Auth("Token response carried no access_token".to_string())
            })
    }
}

#[async_trait]
impl IdentityExchanger for ServiceAccountExchanger {
    async fn exchange(&self, credential_material: &str, scope: &str) -> Result<String> {
        let key = ServiceAccountKey::from_json(credential_material)?;
        let issued_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| RegistryError::Auth(format!("System clock before unix epoch: {}", e)))?
            .as_secs();

        self.output
            .verbose(&format!("Signing token assertion for {}", key.client_email));
        let assertion = Self::sign_assertion(&key, scope, issued_at)?;

        self.request_token(key.token_uri(), &assertion).await
    }
}
