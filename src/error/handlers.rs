//! Standardized mapping of HTTP and transport failures to registry errors

use crate::error::RegistryError;
use reqwest::StatusCode;

/// Standard error handler for HTTP responses
pub struct HttpErrorHandler;

impl HttpErrorHandler {
    /// Handle registry-related HTTP errors
    pub fn handle_registry_error(
        status: StatusCode,
        error_text: &str,
        operation: &str,
    ) -> RegistryError {
        let error_msg = match status.as_u16() {
            401 => format!(
                "Unauthorized to perform {} operation: {}",
                operation, error_text
            ),
            403 => format!(
                "Forbidden: insufficient permissions for {}: {}",
                operation, error_text
            ),
            404 => {
                return RegistryError::NotFound(format!(
                    "Resource not found for {}: {}",
                    operation, error_text
                ));
            }
            429 => format!("Rate limited during {}: {}", operation, error_text),
            500 => format!("Registry server error during {}: {}", operation, error_text),
            502 | 503 => format!("Registry unavailable for {}: {}", operation, error_text),
            _ => format!("{} failed (status {}): {}", operation, status, error_text),
        };

        RegistryError::Registry(error_msg)
    }

    /// Handle token endpoint errors
    pub fn handle_auth_error(status: StatusCode, error_text: &str) -> RegistryError {
        let error_msg = match status.as_u16() {
            400 => format!("Invalid token request parameters: {}", error_text),
            401 => "Invalid credentials provided".to_string(),
            403 => "Access denied - insufficient permissions".to_string(),
            404 => "Authentication endpoint not found".to_string(),
            _ => format!("Authentication failed (status {}): {}", status, error_text),
        };

        RegistryError::Auth(error_msg)
    }

    /// Handle upload-related HTTP errors
    pub fn handle_upload_error(
        status: StatusCode,
        error_text: &str,
        context: &str,
    ) -> RegistryError {
        let error_msg = match status.as_u16() {
            400 => format!("Bad request during {}: {}", context, error_text),
            401 => format!("Authentication failed during {}: {}", context, error_text),
            403 => format!("Permission denied for {}: {}", context, error_text),
            404 => format!(
                "Repository not found or {} session expired: {}",
                context, error_text
            ),
            413 => format!("Content too large for {}: {}", context, error_text),
            500 => format!("Registry server error during {}: {}", context, error_text),
            502 | 503 => format!("Registry unavailable during {}: {}", context, error_text),
            507 => format!("Registry out of storage during {}: {}", context, error_text),
            _ => format!("{} failed (status {}): {}", context, status, error_text),
        };

        RegistryError::Transfer(error_msg)
    }
}

/// Network error categorization and handling
pub struct NetworkErrorHandler;

impl NetworkErrorHandler {
    /// Categorize and format network errors with helpful context
    pub fn handle_network_error(error: &reqwest::Error, context: &str) -> RegistryError {
        if error.is_timeout() {
            RegistryError::Network(format!("{} timeout: {}", context, error))
        } else if error.is_connect() {
            RegistryError::Network(format!("Connection error during {}: {}", context, error))
        } else if error.to_string().contains("dns") {
            RegistryError::Network(format!("DNS resolution error for {}: {}", context, error))
        } else if error.to_string().contains("certificate") {
            RegistryError::Network(format!(
                "TLS certificate error during {}: {}",
                context, error
            ))
        } else {
            RegistryError::Network(format!("{} network error: {}", context, error))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_maps_to_not_found() {
        let err = HttpErrorHandler::handle_registry_error(
            StatusCode::NOT_FOUND,
            "NAME_UNKNOWN",
            "tag listing",
        );
        assert!(matches!(err, RegistryError::NotFound(_)));
    }

    #[test]
    fn test_auth_errors_are_fatal() {
        let err = HttpErrorHandler::handle_auth_error(StatusCode::BAD_REQUEST, "invalid_grant");
        assert!(err.is_fatal());
        assert!(err.to_string().contains("invalid_grant"));
    }

    #[test]
    fn test_upload_error_is_transfer() {
        let err = HttpErrorHandler::handle_upload_error(
            StatusCode::INSUFFICIENT_STORAGE,
            "disk full",
            "blob upload",
        );
        assert!(matches!(err, RegistryError::Transfer(_)));
        assert!(err.to_string().contains("out of storage"));
    }
}
