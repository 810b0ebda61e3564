//! Error types for isoserve

use http::StatusCode;
use thiserror::Error;

/// Result type for isoserve operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for isoserve
#[derive(Error, Debug)]
pub enum Error {
    /// The listener could not be bound (port in use, permission denied, ...)
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: std::net::SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// Requested file or directory does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Requested path resolves outside the document root
    #[error("Forbidden path: {0}")]
    ForbiddenPath(String),

    /// Request target could not be interpreted
    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    /// Request method is not supported
    #[error("Unsupported method: {0}")]
    MethodNotAllowed(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// HTTP status reported to the client for this error.
    ///
    /// Traversal attempts are reported as 404 so the response does not
    /// reveal anything about the filesystem outside the root.
    pub fn status(&self) -> StatusCode {
        match self {
            Error::NotFound(_) | Error::ForbiddenPath(_) => StatusCode::NOT_FOUND,
            Error::MalformedRequest(_) => StatusCode::BAD_REQUEST,
            Error::MethodNotAllowed(_) => StatusCode::NOT_IMPLEMENTED,
            Error::Bind { .. } | Error::Config(_) | Error::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether the error ends the process rather than a single request.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Bind { .. } | Error::Config(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_errors_map_to_status() {
        assert_eq!(Error::NotFound("/x".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(Error::ForbiddenPath("/../x".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(Error::MalformedRequest("*".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            Error::MethodNotAllowed("POST".into()).status(),
            StatusCode::NOT_IMPLEMENTED
        );
        let io = Error::from(std::io::Error::from(std::io::ErrorKind::PermissionDenied));
        assert_eq!(io.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!io.is_fatal());
    }

    #[test]
    fn test_only_startup_errors_are_fatal() {
        let bind = Error::Bind {
            addr: "0.0.0.0:2561".parse().unwrap(),
            source: std::io::Error::from(std::io::ErrorKind::AddrInUse),
        };
        assert!(bind.is_fatal());
        assert!(Error::Config("bad".into()).is_fatal());
        assert!(!Error::NotFound("/x".into()).is_fatal());
        assert!(!Error::MalformedRequest("*".into()).is_fatal());
    }
}
