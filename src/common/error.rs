//! Error types for linkstore

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    // === I/O Errors ===
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // === Store Errors ===
    #[error("Code not found: {0}")]
    NotFound(String),

    #[error("Corrupted log record: {0}")]
    Corrupted(String),

    #[error("Durable log unavailable: {0}")]
    PersistenceUnavailable(String),

    #[error("Bounded cache cannot assign new codes")]
    CacheOnly,

    // === Remote Errors ===
    #[error("Master unreachable: {0}")]
    RemoteUnavailable(String),

    #[error("{method} failed on master: {message}")]
    Remote { method: String, message: String },

    // === Input Errors ===
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }

    /// Convert to HTTP status code
    pub fn to_http_status(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::InvalidTarget(_) | Error::InvalidConfig(_) => StatusCode::BAD_REQUEST,
            Error::RemoteUnavailable(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::RemoteUnavailable(e.to_string())
    }
}

impl From<config::ConfigError> for Error {
    fn from(e: config::ConfigError) -> Self {
        Error::InvalidConfig(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn test_http_status_mapping() {
        assert_eq!(
            Error::NotFound("abc".into()).to_http_status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            Error::InvalidTarget("ftp://x".into()).to_http_status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            Error::RemoteUnavailable("refused".into()).to_http_status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            Error::PersistenceUnavailable("disk".into()).to_http_status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
