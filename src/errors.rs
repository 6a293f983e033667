use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for Alert Notification Service operations
pub type Result<T> = std::result::Result<T, AnsError>;

/// Errors that can occur when talking to the Alert Notification Service
#[derive(Debug, Error)]
pub enum AnsError {
    /// The service key JSON could not be parsed
    #[error("Failed to parse ANS service key: {0}")]
    ParseServiceKey(#[source] serde_json::Error),

    /// An event JSON payload could not be parsed
    #[error("Failed to parse ANS event from JSON {payload:?}: {source}")]
    ParseEvent {
        /// The offending payload
        payload: String,
        #[source]
        source: serde_json::Error,
    },

    /// The configuration JSON could not be parsed
    #[error("Failed to parse ANS configuration: {0}")]
    ParseConfiguration(#[source] serde_json::Error),

    /// Failed to serialize the event
    #[error("Failed to serialize event: {0}")]
    Serialize(#[source] serde_json::Error),

    /// The auth header provider failed
    #[error("Failed to authorize ANS request: {0}")]
    Auth(#[source] AuthError),

    /// Failed to build HTTP client
    #[error("Failed to build HTTP client: {0}")]
    BuildHttpClient(#[source] reqwest::Error),

    /// A configured URL is unusable
    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl {
        /// The URL as configured
        url: String,
        /// Why it was rejected
        reason: String,
    },

    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Request(#[source] reqwest_middleware::Error),

    /// ANS answered with something other than the expected status
    #[error(
        "ANS request to '{url}' failed: expected status {expected}, got {actual}; response body: {body}"
    )]
    UnexpectedStatus {
        /// Request URL
        url: String,
        /// Expected HTTP status code
        expected: u16,
        /// Actual HTTP status code
        actual: u16,
        /// Response body returned by ANS
        body: String,
    },

    /// ANS answered with an unexpected status and its body could not be read
    #[error(
        "ANS request to '{url}' failed: expected status {expected}, got {actual}; reading response body failed: {source}"
    )]
    UnreadableResponseBody {
        /// Request URL
        url: String,
        /// Expected HTTP status code
        expected: u16,
        /// Actual HTTP status code
        actual: u16,
        #[source]
        source: reqwest::Error,
    },

    /// No service key was configured
    #[error("No ANS service key configured")]
    MissingServiceKey,

    /// The event template file could not be read
    #[error("Failed to read event template file '{}': {source}", .path.display())]
    ReadTemplate {
        /// Template path
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl AnsError {
    /// Check if the error is retryable
    ///
    /// Returns `true` for:
    /// - Network/connection errors
    /// - Timeout errors
    /// - Server errors (5xx status codes)
    ///
    /// The client never retries on its own; this is a hint for callers.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Request(reqwest_middleware::Error::Reqwest(err)) => {
                err.is_connect() || err.is_timeout()
            }
            Self::UnexpectedStatus { actual, .. } | Self::UnreadableResponseBody { actual, .. } => {
                *actual >= 500
            }
            Self::Auth(err) => err.is_retryable(),
            _ => false,
        }
    }
}

/// Errors raised while obtaining an `Authorization` header
#[derive(Debug, Error)]
pub enum AuthError {
    /// The token request could not be sent
    #[error("Token request failed: {0}")]
    Request(#[source] reqwest_middleware::Error),

    /// The token endpoint returned a non-success status
    #[error("Token request to '{url}' failed with HTTP {status}: {body}")]
    TokenStatus {
        /// Token endpoint URL
        url: String,
        /// HTTP status code
        status: u16,
        /// Response body
        body: String,
    },

    /// The token response could not be decoded
    #[error("Invalid token response: {0}")]
    InvalidToken(#[source] reqwest::Error),

    /// The token cannot be used as a header value
    #[error("Token is not a valid header value: {0}")]
    InvalidHeader(#[source] reqwest::header::InvalidHeaderValue),

    /// Any other provider-specific failure
    #[error("{0}")]
    Other(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl AuthError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Request(reqwest_middleware::Error::Reqwest(err)) => {
                err.is_connect() || err.is_timeout()
            }
            Self::TokenStatus { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unexpected(actual: u16) -> AnsError {
        AnsError::UnexpectedStatus {
            url: "https://ans.example.com/cf/producer/v1/resource-events".to_string(),
            expected: 202,
            actual,
            body: "oops".to_string(),
        }
    }

    #[test]
    fn test_unexpected_status_retryable_5xx() {
        assert!(unexpected(500).is_retryable());
        assert!(unexpected(502).is_retryable());
        assert!(unexpected(503).is_retryable());
    }

    #[test]
    fn test_unexpected_status_not_retryable_4xx() {
        assert!(!unexpected(200).is_retryable());
        assert!(!unexpected(400).is_retryable());
        assert!(!unexpected(401).is_retryable());
        assert!(!unexpected(404).is_retryable());
    }

    #[test]
    fn test_error_display() {
        let error = AnsError::UnexpectedStatus {
            url: "https://ans.example.com/cf/producer/v1/resource-events".to_string(),
            expected: 202,
            actual: 500,
            body: "server error".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "ANS request to 'https://ans.example.com/cf/producer/v1/resource-events' failed: \
             expected status 202, got 500; response body: server error"
        );
    }

    #[test]
    fn test_auth_token_status_retryable() {
        let error = AnsError::Auth(AuthError::TokenStatus {
            url: "https://auth.example.com/oauth/token".to_string(),
            status: 503,
            body: String::new(),
        });
        assert!(error.is_retryable());

        let error = AnsError::Auth(AuthError::TokenStatus {
            url: "https://auth.example.com/oauth/token".to_string(),
            status: 401,
            body: String::new(),
        });
        assert!(!error.is_retryable());
    }

    #[test]
    fn test_parse_errors_not_retryable() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid").unwrap_err();
        let error = AnsError::ParseServiceKey(json_err);
        assert!(!error.is_retryable());
        assert!(!AnsError::MissingServiceKey.is_retryable());
    }
}
