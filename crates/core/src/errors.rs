use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Result type alias for storegate operations
pub type Result<T> = std::result::Result<T, Error>;

/// A single rejected field reported by the server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Core error type for storegate operations
///
/// The type is `Clone` so one settlement can be handed to every caller that
/// joined the same in-flight request.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// No response was received at all
    #[error("network failure for '{endpoint}': {message}")]
    NetworkFailure { endpoint: String, message: String },

    /// A single network attempt exceeded its deadline
    #[error("request '{operation}' timed out after {duration:?}")]
    Timeout {
        operation: String,
        duration: Duration,
    },

    /// The server answered 429
    #[error("{}", format_rate_limited(.endpoint, .retry_after, .message))]
    RateLimited {
        endpoint: String,
        retry_after: Option<Duration>,
        message: String,
    },

    /// The server answered with a 5xx status
    #[error("server error {status} from '{endpoint}': {message}")]
    ServerError {
        endpoint: String,
        status: u16,
        message: String,
    },

    /// The credential was rejected and could not be renewed
    #[error("session expired: {message}")]
    AuthExpired { message: String },

    /// The server rejected the request payload
    #[error("{}", format_validation(.message, .fields))]
    ValidationError {
        message: String,
        fields: Vec<FieldError>,
    },

    /// The requested resource does not exist
    #[error("'{resource}' not found: {message}")]
    NotFound { resource: String, message: String },

    /// Any other 4xx answer
    #[error("request to '{endpoint}' rejected with status {status}: {message}")]
    Rejected {
        endpoint: String,
        status: u16,
        message: String,
    },

    /// An authenticated operation was attempted without a credential
    #[error("'{operation}' requires a signed-in session")]
    NotAuthenticated { operation: String },

    /// Invalid configuration or arguments
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// Durable key-value storage failures
    #[error("storage {operation} failed for '{key}': {message}")]
    Storage {
        key: String,
        operation: String,
        message: String,
        #[source]
        source: Option<Arc<std::io::Error>>,
    },

    /// A payload or token could not be decoded
    #[error("failed to decode {what}: {message}")]
    Decode { what: String, message: String },
}

fn format_rate_limited(endpoint: &str, retry_after: &Option<Duration>, message: &str) -> String {
    match retry_after {
        Some(wait) => format!("rate limited by '{endpoint}' (retry after {wait:?}): {message}"),
        None => format!("rate limited by '{endpoint}': {message}"),
    }
}

fn format_validation(message: &str, fields: &[FieldError]) -> String {
    if fields.is_empty() {
        return format!("validation failed: {message}");
    }
    let details = fields
        .iter()
        .map(|f| format!("{}: {}", f.field, f.message))
        .collect::<Vec<_>>()
        .join("; ");
    format!("validation failed: {message} ({details})")
}

/// Fallback message used when the server did not supply one
#[must_use]
pub fn generic_message(status: u16) -> &'static str {
    match status {
        400 => "the request was invalid",
        401 => "authentication is required",
        403 => "access to this resource is forbidden",
        404 => "the requested resource does not exist",
        409 => "the request conflicts with existing data",
        429 => "too many requests, please wait and try again",
        500..=599 => "the service is temporarily unavailable",
        _ => "the request could not be completed",
    }
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Error::Decode {
            what: "JSON payload".to_string(),
            message: error.to_string(),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Error::Storage {
            key: String::new(),
            operation: "io".to_string(),
            message: error.to_string(),
            source: Some(Arc::new(error)),
        }
    }
}

// Helper methods for creating errors with context
impl Error {
    /// Create a network failure error
    #[must_use]
    pub fn network(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Error::NetworkFailure {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }

    /// Create a timeout error
    #[must_use]
    pub fn timeout(operation: impl Into<String>, duration: Duration) -> Self {
        Error::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    /// Create a rate-limited error
    #[must_use]
    pub fn rate_limited(
        endpoint: impl Into<String>,
        retry_after: Option<Duration>,
        message: impl Into<String>,
    ) -> Self {
        Error::RateLimited {
            endpoint: endpoint.into(),
            retry_after,
            message: message.into(),
        }
    }

    /// Create a server error
    #[must_use]
    pub fn server(endpoint: impl Into<String>, status: u16, message: impl Into<String>) -> Self {
        Error::ServerError {
            endpoint: endpoint.into(),
            status,
            message: message.into(),
        }
    }

    /// Create an expired-session error
    #[must_use]
    pub fn auth_expired(message: impl Into<String>) -> Self {
        Error::AuthExpired {
            message: message.into(),
        }
    }

    /// Create a validation error
    #[must_use]
    pub fn validation(message: impl Into<String>, fields: Vec<FieldError>) -> Self {
        Error::ValidationError {
            message: message.into(),
            fields,
        }
    }

    /// Create a not-found error
    #[must_use]
    pub fn not_found(resource: impl Into<String>, message: impl Into<String>) -> Self {
        Error::NotFound {
            resource: resource.into(),
            message: message.into(),
        }
    }

    /// Create a rejected-request error
    #[must_use]
    pub fn rejected(endpoint: impl Into<String>, status: u16, message: impl Into<String>) -> Self {
        Error::Rejected {
            endpoint: endpoint.into(),
            status,
            message: message.into(),
        }
    }

    /// Create a not-authenticated error
    #[must_use]
    pub fn not_authenticated(operation: impl Into<String>) -> Self {
        Error::NotAuthenticated {
            operation: operation.into(),
        }
    }

    /// Create a configuration error
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Error::Configuration {
            message: message.into(),
        }
    }

    /// Create a storage error with an underlying I/O cause
    #[must_use]
    pub fn storage(
        key: impl Into<String>,
        operation: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        Error::Storage {
            key: key.into(),
            operation: operation.into(),
            message: source.to_string(),
            source: Some(Arc::new(source)),
        }
    }

    /// Create a storage error without an I/O cause
    #[must_use]
    pub fn storage_message(
        key: impl Into<String>,
        operation: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Error::Storage {
            key: key.into(),
            operation: operation.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Create a decode error
    #[must_use]
    pub fn decode(what: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Decode {
            what: what.into(),
            message: message.into(),
        }
    }

    /// HTTP status carried by this error, if it came from a response
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::RateLimited { .. } => Some(429),
            Error::ServerError { status, .. } | Error::Rejected { status, .. } => Some(*status),
            Error::AuthExpired { .. } => Some(401),
            Error::ValidationError { .. } => Some(400),
            Error::NotFound { .. } => Some(404),
            _ => None,
        }
    }

    /// Server-provided retry hint for rate-limited responses
    #[must_use]
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Error::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    /// Whether this error came from a 429 answer
    #[must_use]
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Error::RateLimited { .. })
    }

    /// Whether this error came from a 401 answer
    #[must_use]
    pub fn is_auth_expired(&self) -> bool {
        matches!(self, Error::AuthExpired { .. })
    }
}

// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to a Result
    fn context(self, message: impl Into<String>) -> Result<T>;

    /// Add context with a lazy message
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: Into<Error>,
{
    fn context(self, message: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let base_error = e.into();
            Error::Configuration {
                message: format!("{}: {}", message.into(), base_error),
            }
        })
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| {
            let base_error = e.into();
            Error::Configuration {
                message: format!("{}: {}", f(), base_error),
            }
        })
    }
}
