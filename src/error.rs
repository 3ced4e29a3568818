// Error handling module
// Defines the error taxonomy surfaced to callers of the secure client

use thiserror::Error;

/// Why a token refresh did not produce a new access token.
///
/// Cloneable: one refresh outcome is handed to every request that queued
/// behind it.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RefreshError {
    /// No refresh token in the credential store
    #[error("No refresh token available")]
    MissingRefreshToken,

    /// Refresh endpoint answered with a non-2xx status
    #[error("Refresh rejected: {status} - {message}")]
    Rejected { status: u16, message: String },

    /// Refresh request never got a response
    #[error("Refresh request failed: {0}")]
    Network(String),

    /// 2xx response without `data.accessToken`
    #[error("Malformed refresh response: {0}")]
    MalformedResponse(String),

    /// Credential store read/write failed during refresh
    #[error("Credential store failed during refresh: {0}")]
    Store(String),

    /// The refreshing caller went away before the refresh settled
    #[error("Token refresh abandoned before it settled")]
    Abandoned,

    /// A queued request gave up waiting
    #[error("Timed out waiting for token refresh")]
    TimedOut,
}

/// Errors returned by the secure client and the typed API layer
#[derive(Error, Debug)]
pub enum ClientError {
    /// Terminal auth failure: the refresh could not recover the session
    #[error("Session expired: {0}")]
    Refresh(#[from] RefreshError),

    /// A request replayed with fresh credentials was rejected again
    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },

    /// Non-2xx response from a resource endpoint
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Transport-level failure
    #[error("HTTP request failed: {0}")]
    Network(#[from] reqwest::Error),

    /// Response body did not have the expected shape
    #[error("Failed to decode response: {0}")]
    Decode(String),

    /// Credential store failure
    #[error("Credential store error: {0}")]
    Store(String),

    /// Caller input rejected before any request was sent
    #[error("Validation error: {0}")]
    Validation(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ClientError {
    /// HTTP status associated with the error, when there is one
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Unauthorized { .. } => Some(401),
            ClientError::Api { status, .. } => Some(*status),
            ClientError::Refresh(RefreshError::Rejected { status, .. }) => Some(*status),
            ClientError::Network(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// True when the session can no longer be used without logging in again
    pub fn is_auth_failure(&self) -> bool {
        matches!(
            self,
            ClientError::Refresh(_) | ClientError::Unauthorized { .. }
        )
    }
}

impl From<rusqlite::Error> for ClientError {
    fn from(err: rusqlite::Error) -> Self {
        ClientError::Store(err.to_string())
    }
}

/// Extract the backend's `message` field from an error body.
/// Falls back to the raw body text.
pub fn extract_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
        .unwrap_or_else(|| body.to_string())
}

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ClientError>;
