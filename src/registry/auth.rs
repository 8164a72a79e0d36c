//! Authentication module for registry access
//!
//! Registries answer unauthenticated requests with `401` and a `WWW-Authenticate` challenge.
//! A `Bearer` challenge names a token realm that issues a token for a repository scope; a
//! `Basic` challenge wants the credentials on every request.

use crate::error::handlers::{HttpErrorHandler, NetworkErrorHandler};
use crate::error::{RegistryError, Result};
use crate::logging::Logger;
use crate::transfer::AuthContext;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use std::collections::HashMap;

/// Parsed `WWW-Authenticate` header
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthChallenge {
    Bearer {
        realm: String,
        service: Option<String>,
        scope: Option<String>,
    },
    Basic,
}

/// Authorization attached to a single request
#[derive(Clone, PartialEq, Eq, Default)]
pub enum RequestAuth {
    #[default]
    None,
    Bearer(String),
    Basic { username: String, password: String },
}

impl std::fmt::Debug for RequestAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestAuth::None => write!(f, "None"),
            RequestAuth::Bearer(_) => write!(f, "Bearer(<redacted>)"),
            RequestAuth::Basic { username, .. } => write!(f, "Basic({})", username),
        }
    }
}

impl RequestAuth {
    pub fn apply(&self, request: RequestBuilder) -> RequestBuilder {
        match self {
            RequestAuth::None => request,
            RequestAuth::Bearer(token) => request.bearer_auth(token),
            RequestAuth::Basic { username, password } => {
                request.basic_auth(username, Some(password))
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: Option<String>,
    access_token: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
}

/// Parse a `WWW-Authenticate` header value
pub fn parse_auth_challenge(header: &str) -> Option<AuthChallenge> {
    let header = header.trim();
    let (scheme, params_str) = header.split_once(' ').unwrap_or((header, ""));

    if scheme.eq_ignore_ascii_case("basic") {
        return Some(AuthChallenge::Basic);
    }
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }

    let params = parse_challenge_params(params_str);
    let realm = params.get("realm")?.to_string();

    Some(AuthChallenge::Bearer {
        realm,
        service: params.get("service").map(|s| s.to_string()),
        scope: params.get("scope").map(|s| s.to_string()),
    })
}

/// `key="value",key2="a,b"` with commas allowed inside quotes
fn parse_challenge_params(params_str: &str) -> HashMap<String, String> {
    let mut params = HashMap::new();
    let mut rest = params_str.trim();

    while !rest.is_empty() {
        let Some(eq_pos) = rest.find('=') else {
            break;
        };
        let key = rest[..eq_pos].trim().trim_start_matches(',').trim().to_lowercase();
        let after = rest[eq_pos + 1..].trim_start();

        let (value, remainder) = if let Some(quoted) = after.strip_prefix('"') {
            match quoted.find('"') {
                Some(end) => (&quoted[..end], &quoted[end + 1..]),
                None => (quoted, ""),
            }
        } else {
            match after.find(',') {
                Some(end) => (after[..end].trim(), &after[end..]),
                None => (after.trim(), ""),
            }
        };

        params.insert(key, value.to_string());
        rest = remainder.trim_start().trim_start_matches(',').trim_start();
    }

    params
}

#[derive(Clone)]
pub struct Auth {
    client: Client,
    credentials: AuthContext,
    output: Logger,
}

impl Auth {
    pub fn new(client: Client, credentials: AuthContext, output: Logger) -> Self {
        Self {
            client,
            credentials,
            output,
        }
    }

    /// Turn a challenge into request authorization for `scope`
    pub async fn authorize(&self, challenge: &AuthChallenge, scope: &str) -> Result<RequestAuth> {
        match challenge {
            AuthChallenge::Basic => match &self.credentials {
                AuthContext::Basic { username, password } => Ok(RequestAuth::Basic {
                    username: username.clone(),
                    password: password.clone(),
                }),
                AuthContext::Anonymous => Err(RegistryError::Unauthorized {
                    message: "Registry requires basic authentication but no credentials are configured"
                        .to_string(),
                    challenge: None,
                }),
            },
            AuthChallenge::Bearer {
                realm,
                service,
                scope: challenge_scope,
            } => {
                let scope = if scope.is_empty() {
                    challenge_scope.as_deref()
                } else {
                    Some(scope)
                };
                let token = self.get_token(realm, service.as_deref(), scope).await?;
                Ok(RequestAuth::Bearer(token))
            }
        }
    }

    async fn get_token(
        &self,
        realm: &str,
        service: Option<&str>,
        scope: Option<&str>,
    ) -> Result<String> {
        let mut url = url::Url::parse(realm)?;
        {
            let mut query = url.query_pairs_mut();
            if let Some(service) = service {
                query.append_pair("service", service);
            }
            if let Some(scope) = scope {
                query.append_pair("scope", scope);
            }
        }

        self.output.detail(&format!("Requesting token from: {}", url));

        let mut request = self.client.get(url.as_str());
        if let AuthContext::Basic { username, password } = &self.credentials {
            request = request.basic_auth(username, Some(password));
        }

        let response = request
            .send()
            .await
            .map_err(|e| NetworkErrorHandler::handle_network_error(&e, "token request"))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error response".to_string());
            // Registry token failures are scoped to the request that needed them, not the run
            return Err(match HttpErrorHandler::handle_auth_error(status, &error_text) {
                RegistryError::Auth(msg) => RegistryError::Unauthorized {
                    message: msg,
                    challenge: None,
                },
                other => other,
            });
        }

        let token_response: TokenResponse = response
            .json()
            .await
            .map_err(|e| RegistryError::Parse(format!("Failed to parse token response: {}", e)))?;

        if let Some(expires_in) = token_response.expires_in {
            self.output
                .detail(&format!("Token expires in {} seconds", expires_in));
        }

        token_response
            .token
            .or(token_response.access_token)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| RegistryError::Registry("Token response carried no token".to_string()))
    }
}
