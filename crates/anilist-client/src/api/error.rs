//! Error type shared by the transport, the rate limiter and the client.

use reqwest::StatusCode;
use thiserror::Error;

/// Errors produced while talking to the AniList API
#[derive(Debug, Error)]
pub enum ClientError {
    /// The limiter was configured with a zero budget
    #[error("requests per minute must be greater than zero")]
    InvalidRateLimit,

    /// The response carried a GraphQL `errors` array
    #[error("GraphQL Error: {}", .messages.join(", "))]
    GraphQl {
        messages: Vec<String>,
        /// HTTP status of the reply, or the status reported inside the
        /// `errors` array when the reply itself was a success
        status: StatusCode,
    },

    /// The request never produced a response
    #[error("Network Error: {0}")]
    Network(#[from] reqwest::Error),

    /// Non-success status without GraphQL errors in the body
    #[error("Request failed with status {status}: {body}")]
    Http { status: StatusCode, body: String },

    #[error("Failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Response contained no data")]
    MissingData,

    #[error("Invalid client configuration: {0}")]
    InvalidConfig(String),
}

impl ClientError {
    /// Whether repeating the same request may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Network(_) => true,
            ClientError::Http { status, .. } | ClientError::GraphQl { status, .. } => {
                retryable_status(*status)
            }
            _ => false,
        }
    }
}

fn retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}
