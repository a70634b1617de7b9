//! Error types for the authorization core

use thiserror::Error;

/// Failure of a permission load
///
/// `Clone` because a single outcome is shared between every caller that
/// attached to the same in-flight load.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    /// Transport failure, non-success status, or caller-imposed timeout
    #[error("Network error: {0}")]
    Network(String),

    /// The actor's credentials were rejected by the permission service
    #[error("Authentication expired: {0}")]
    AuthExpired(String),

    /// The service answered with something that is not a permission set
    #[error("Malformed permission response: {0}")]
    MalformedResponse(String),
}

impl LoadError {
    /// Create a network error
    pub fn network(msg: impl Into<String>) -> Self {
        LoadError::Network(msg.into())
    }

    /// Create an auth-expired error
    pub fn auth_expired(msg: impl Into<String>) -> Self {
        LoadError::AuthExpired(msg.into())
    }

    /// Create a malformed-response error
    pub fn malformed(msg: impl Into<String>) -> Self {
        LoadError::MalformedResponse(msg.into())
    }

    /// Short machine-readable kind, used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            LoadError::Network(_) => "network",
            LoadError::AuthExpired(_) => "auth_expired",
            LoadError::MalformedResponse(_) => "malformed_response",
        }
    }
}

/// Errors surfaced by the crate's public API
#[derive(Error, Debug)]
pub enum AuthzError {
    /// Loading permissions failed
    #[error(transparent)]
    Load(#[from] LoadError),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AuthzError {
    /// Create an invalid-config error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        AuthzError::InvalidConfig(msg.into())
    }
}

/// Result type alias for authorization operations
pub type AuthzResult<T> = Result<T, AuthzError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = LoadError::network("connection refused");
        assert_eq!(err.to_string(), "Network error: connection refused");

        let err = AuthzError::from(LoadError::auth_expired("401"));
        assert_eq!(err.to_string(), "Authentication expired: 401");
    }

    #[test]
    fn test_error_kind() {
        assert_eq!(LoadError::network("x").kind(), "network");
        assert_eq!(LoadError::auth_expired("x").kind(), "auth_expired");
        assert_eq!(LoadError::malformed("x").kind(), "malformed_response");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: AuthzError = io_err.into();
        assert!(matches!(err, AuthzError::Io(_)));
    }
}
