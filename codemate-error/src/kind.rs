//! Error kinds for codemate operations

use std::fmt;

/// The kind of error that occurred.
///
/// This enum categorizes errors to help users write clear error handling logic.
/// Users can match on ErrorKind to decide how to handle specific error cases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    // =========================================================================
    // General errors
    // =========================================================================
    /// An unexpected error occurred - catch-all for unhandled cases
    Unexpected,

    // =========================================================================
    // Configuration errors
    // =========================================================================
    /// No API credential available (neither explicit nor from the environment)
    MissingApiKey,

    // =========================================================================
    // Endpoint errors
    // =========================================================================
    /// Network-level failure reaching the completion endpoint
    NetworkFailed,

    /// The endpoint rejected the request
    ApiRejected,

    /// Rate limit exceeded
    RateLimited,

    /// Authentication with the endpoint failed
    AuthFailed,

    /// The endpoint returned a response with no usable content
    EmptyResponse,

    /// Failed to decode the endpoint's response
    ParseFailed,
}

impl ErrorKind {
    /// Returns the error kind as a static string
    pub fn as_str(&self) -> &'static str {
        match self {
            // General
            ErrorKind::Unexpected => "Unexpected",

            // Configuration
            ErrorKind::MissingApiKey => "MissingApiKey",

            // Endpoint
            ErrorKind::NetworkFailed => "NetworkFailed",
            ErrorKind::ApiRejected => "ApiRejected",
            ErrorKind::RateLimited => "RateLimited",
            ErrorKind::AuthFailed => "AuthFailed",
            ErrorKind::EmptyResponse => "EmptyResponse",
            ErrorKind::ParseFailed => "ParseFailed",
        }
    }

    /// Check if this error kind is retryable by default
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorKind::NetworkFailed | ErrorKind::RateLimited | ErrorKind::EmptyResponse
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
