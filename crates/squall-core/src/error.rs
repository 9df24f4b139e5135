//! Error types for squall-core

use crate::status::StatusCode;
use thiserror::Error;

/// Result type alias for squall operations
pub type Result<T> = std::result::Result<T, Error>;

/// Boxed error type carried across the handler boundary
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Error types for the squall HTTP stack
#[derive(Debug, Error)]
pub enum Error {
    /// Request line did not tokenize into method, target, protocol
    #[error("Invalid request line: {0}")]
    InvalidRequestLine(String),

    /// Response status line had fewer than three fields
    #[error("Invalid status line: {0}")]
    InvalidStatusLine(String),

    /// Response status code not in the known-status table
    #[error("Unknown status code: {0}")]
    UnknownStatusCode(String),

    /// First-line protocol name was not HTTP
    #[error("Unsupported protocol: {0}")]
    UnsupportedProtocol(String),

    /// Protocol version other than 1.0 or 1.1
    #[error("HTTP version not supported: {0}")]
    VersionNotSupported(String),

    /// HTTP/1.1 request without a Host header
    #[error("The HTTP PDU does not have a Host header")]
    MissingHostHeader,

    /// Host header with a malformed port or too many colons
    #[error("Invalid Host header: {0}")]
    InvalidHostHeader(String),

    /// Malformed header field line
    #[error("Invalid header line: {0}")]
    InvalidHeaderLine(String),

    /// Hostname text that is not `name`, `name:port` or `name:*`
    #[error("Invalid hostname: {0}")]
    InvalidHostname(String),

    /// URI template failed to compile
    #[error("Invalid URI template: {0}")]
    InvalidTemplate(#[from] squall_router::TemplateError),

    /// The same (host, template, method, content type) is already bound
    #[error("Route already registered: {method} {template} ({content_type}) on {host}")]
    RouteConflict {
        host: String,
        method: String,
        template: String,
        content_type: String,
    },
}

impl Error {
    /// Whether this error is fatal to the message that produced it
    /// (as opposed to a registration-time error).
    pub fn is_structural(&self) -> bool {
        !matches!(
            self,
            Error::InvalidTemplate(_) | Error::RouteConflict { .. } | Error::InvalidHostname(_)
        )
    }

    /// The status code a server should answer with when parsing fails
    /// with this error.
    pub fn response_status(&self) -> StatusCode {
        match self {
            Error::VersionNotSupported(_) => StatusCode::HTTP_VERSION_NOT_SUPPORTED,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}
