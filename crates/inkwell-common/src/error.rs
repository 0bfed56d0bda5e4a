//! Common error types for Inkwell components.

use thiserror::Error;

/// Common errors across Inkwell components
#[derive(Debug, Error)]
pub enum InkwellError {
    /// Database operation error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Requested record does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Session cookie could not be loaded or saved
    #[error("Session error: {0}")]
    Session(String),

    /// Authentication failure
    #[error("Auth error: {0}")]
    Auth(String),

    /// Caller lacks admin rights
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Invalid input/request
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl InkwellError {
    /// Returns the HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Storage(_) => 500,
            Self::NotFound(_) => 404,
            Self::Session(_) => 500,
            Self::Auth(_) => 401,
            Self::Forbidden(_) => 403,
            Self::InvalidInput(_) => 400,
            Self::Internal(_) => 500,
        }
    }

    /// Returns true if the error is the client's fault
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(InkwellError::NotFound("post".into()).status_code(), 404);
        assert_eq!(InkwellError::Session("bad cookie".into()).status_code(), 500);
        assert!(InkwellError::Forbidden("admin".into()).is_client_error());
        assert!(!InkwellError::Storage("locked".into()).is_client_error());
    }
}
