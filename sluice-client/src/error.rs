//! Error types for the Sluice client

use thiserror::Error;

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

/// Service error codes that mean "slow down and try again"
const THROTTLING_CODES: &[&str] = &[
    "Throttling",
    "ThrottlingException",
    "RequestThrottled",
    "RequestLimitExceeded",
    "ProvisionedThroughputExceededException",
    "LimitExceededException",
];

/// Errors that can occur when using the Sluice client
#[derive(Debug, Error)]
pub enum ClientError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// Service returned an error status code
    #[error("API error (status {status}, code {code}): {message}")]
    ApiError {
        /// HTTP status code
        status: u16,
        /// Service error code, e.g. `ExpiredIteratorException`
        code: String,
        /// Error message from the service
        message: String,
    },

    /// Failed to parse response
    #[error("Failed to parse response: {0}")]
    ParseError(String),

    /// Record payload was not valid base64
    #[error("Failed to decode record data: {0}")]
    DecodeError(#[from] base64::DecodeError),

    /// Invalid request
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ClientError {
    /// Create an API error from status code, service code and message
    pub fn api_error(status: u16, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ApiError {
            status,
            code: code.into(),
            message: message.into(),
        }
    }

    /// Service error code, if the service returned one
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::ApiError { code, .. } => Some(code),
            _ => None,
        }
    }

    /// Check if this error is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(
            self.code(),
            Some(
                "QueueDoesNotExist"
                    | "AWS.SimpleQueueService.NonExistentQueue"
                    | "ResourceNotFoundException"
            )
        ) || matches!(self, Self::ApiError { status: 404, .. })
    }

    /// Check if the service asked the caller to back off
    pub fn is_throttling(&self) -> bool {
        self.code()
            .map(|code| THROTTLING_CODES.contains(&code))
            .unwrap_or(false)
    }

    /// Check if this error is a server error (5xx status)
    pub fn is_server_error(&self) -> bool {
        matches!(self, Self::ApiError { status, .. } if *status >= 500)
    }

    /// Check if repeating the same request may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RequestFailed(e) => {
                e.is_timeout() || e.is_connect() || e.is_request() || e.is_body()
            }
            Self::ApiError { .. } => self.is_throttling() || self.is_server_error(),
            _ => false,
        }
    }
}
