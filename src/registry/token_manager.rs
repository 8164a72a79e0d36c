//! Per-scope token cache with challenge handling
//!
//! Requests are first sent with whatever authorization is cached for their scope. When the
//! registry answers with a `401` challenge the token manager obtains fresh authorization for the
//! scope and reissues the request exactly once.

use crate::error::{RegistryError, Result};
use crate::registry::auth::{Auth, RequestAuth, parse_auth_challenge};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, RwLock};

pub type AuthFuture<T> = Pin<Box<dyn Future<Output = Result<T>> + Send>>;

pub fn pull_scope(repository: &str) -> String {
    format!("repository:{}:pull", repository)
}

pub fn push_scope(repository: &str) -> String {
    format!("repository:{}:pull,push", repository)
}

/// Thread-safe token manager shared by all operations of one registry client
#[derive(Clone)]
pub struct TokenManager {
    auth: Auth,
    tokens: Arc<RwLock<HashMap<String, RequestAuth>>>,
}

impl TokenManager {
    pub fn new(auth: Auth) -> Self {
        Self {
            auth,
            tokens: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Cached authorization for `scope`, or none
    pub fn cached(&self, scope: &str) -> Result<RequestAuth> {
        let guard = self.tokens.read().map_err(|_| {
            RegistryError::Registry("Failed to acquire token read lock".to_string())
        })?;
        Ok(guard.get(scope).cloned().unwrap_or_default())
    }

    fn store(&self, scope: &str, auth: RequestAuth) -> Result<()> {
        let mut guard = self.tokens.write().map_err(|_| {
            RegistryError::Registry("Failed to acquire token write lock".to_string())
        })?;
        guard.insert(scope.to_string(), auth);
        Ok(())
    }

    /// Run `operation`, answering a single `401` challenge for `scope` before giving up
    pub async fn execute_with_auth<F, T>(&self, scope: &str, operation: F) -> Result<T>
    where
        F: Fn(RequestAuth) -> AuthFuture<T>,
        T: Send,
    {
        let current = self.cached(scope)?;

        match operation(current).await {
            Err(RegistryError::Unauthorized {
                message,
                challenge: Some(header),
            }) => {
                let challenge = parse_auth_challenge(&header).ok_or_else(|| {
                    RegistryError::Unauthorized {
                        message: format!("{} (unsupported challenge: {})", message, header),
                        challenge: None,
                    }
                })?;

                let authorization = self.auth.authorize(&challenge, scope).await?;
                self.store(scope, authorization.clone())?;

                match operation(authorization).await {
                    Err(RegistryError::Unauthorized { message, .. }) => {
                        Err(RegistryError::Unauthorized {
                            message: format!("Access denied after authentication: {}", message),
                            challenge: None,
                        })
                    }
                    other => other,
                }
            }
            other => other,
        }
    }
}
