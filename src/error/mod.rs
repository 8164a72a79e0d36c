//! Error types and handlers for mirror operations

pub mod handlers;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, RegistryError>;

#[derive(Debug, Clone, Error)]
pub enum RegistryError {
    /// Configuration or secret input unreadable or invalid
    #[error("Configuration error: {0}")]
    Config(String),
    /// Credential resolution or token exchange failures
    #[error("Authentication error: {0}")]
    Auth(String),
    /// A registry answered 401; carries the raw WWW-Authenticate header if one was sent
    #[error("Unauthorized: {message}")]
    Unauthorized {
        message: String,
        challenge: Option<String>,
    },
    /// Network related errors
    #[error("Network error: {0}")]
    Network(String),
    /// Registry related errors
    #[error("Registry error: {0}")]
    Registry(String),
    /// Image copy failures
    #[error("Transfer error: {0}")]
    Transfer(String),
    /// File IO errors
    #[error("IO error: {0}")]
    Io(String),
    /// Parse errors
    #[error("Parse error: {0}")]
    Parse(String),
    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),
    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),
}

impl RegistryError {
    /// Errors that must stop the whole run rather than a single pair or tag
    pub fn is_fatal(&self) -> bool {
        matches!(self, RegistryError::Config(_) | RegistryError::Auth(_))
    }

    /// Prefix the message with the operation that produced it, keeping the variant
    pub fn context(self, context: &str) -> Self {
        match self {
            RegistryError::Config(msg) => RegistryError::Config(format!("{}: {}", context, msg)),
            RegistryError::Auth(msg) => RegistryError::Auth(format!("{}: {}", context, msg)),
            RegistryError::Unauthorized { message, challenge } => RegistryError::Unauthorized {
                message: format!("{}: {}", context, message),
                challenge,
            },
            RegistryError::Network(msg) => RegistryError::Network(format!("{}: {}", context, msg)),
            RegistryError::Registry(msg) => {
                RegistryError::Registry(format!("{}: {}", context, msg))
            }
            RegistryError::Transfer(msg) => {
                RegistryError::Transfer(format!("{}: {}", context, msg))
            }
            RegistryError::Io(msg) => RegistryError::Io(format!("{}: {}", context, msg)),
            RegistryError::Parse(msg) => RegistryError::Parse(format!("{}: {}", context, msg)),
            RegistryError::Validation(msg) => {
                RegistryError::Validation(format!("{}: {}", context, msg))
            }
            RegistryError::NotFound(msg) => {
                RegistryError::NotFound(format!("{}: {}", context, msg))
            }
        }
    }
}

impl From<std::io::Error> for RegistryError {
    fn from(err: std::io::Error) -> Self {
        RegistryError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for RegistryError {
    fn from(err: serde_json::Error) -> Self {
        RegistryError::Parse(err.to_string())
    }
}

impl From<serde_yaml::Error> for RegistryError {
    fn from(err: serde_yaml::Error) -> Self {
        RegistryError::Parse(format!("YAML error: {}", err))
    }
}

impl From<reqwest::Error> for RegistryError {
    fn from(err: reqwest::Error) -> Self {
        RegistryError::Network(err.to_string())
    }
}

impl From<url::ParseError> for RegistryError {
    fn from(err: url::ParseError) -> Self {
        RegistryError::Validation(err.to_string())
    }
}

impl From<jsonwebtoken::errors::Error> for RegistryError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        RegistryError::Auth(format!("JWT error: {}", err))
    }
}
