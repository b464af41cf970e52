//! Model endpoint errors and their retry classification.

use thiserror::Error;

/// Coarse classification used by the retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Request timed out
    Timeout,
    /// HTTP 429
    RateLimited,
    /// Any other endpoint or transport failure
    Api,
    /// Credential missing or unusable
    Configuration,
    /// Endpoint answered with something we cannot read
    InvalidResponse,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Timeout => write!(f, "timeout"),
            Self::RateLimited => write!(f, "rate_limited"),
            Self::Api => write!(f, "api_error"),
            Self::Configuration => write!(f, "configuration"),
            Self::InvalidResponse => write!(f, "invalid_response"),
        }
    }
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("OPENROUTER_API_KEY is not set; configure an API key before calling the model")]
    MissingApiKey,

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("rate limited by provider: {0}")]
    RateLimited(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("invalid response from provider: {0}")]
    InvalidResponse(String),
}

impl LlmError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingApiKey => ErrorKind::Configuration,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::RateLimited(_) => ErrorKind::RateLimited,
            Self::Api { .. } => ErrorKind::Api,
            Self::InvalidResponse(_) => ErrorKind::InvalidResponse,
        }
    }

    /// Whether a retry may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Timeout | ErrorKind::RateLimited | ErrorKind::Api
        )
    }

    /// Map an HTTP status and body to an error.
    pub fn from_status(status: u16, body: &str) -> Self {
        let message = truncate(body, 500);
        match status {
            429 => Self::RateLimited(message),
            408 | 504 => Self::Timeout(message),
            _ => Self::Api { status, message },
        }
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return Self::Timeout(err.to_string());
        }
        if err.is_decode() {
            return Self::InvalidResponse(err.to_string());
        }
        match err.status() {
            Some(status) => Self::from_status(status.as_u16(), &err.to_string()),
            None => Self::Api {
                status: 0,
                message: err.to_string(),
            },
        }
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_chars).collect();
        format!("{}... [truncated]", head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(LlmError::from_status(429, "slow down").kind(), ErrorKind::RateLimited);
        assert_eq!(LlmError::from_status(504, "").kind(), ErrorKind::Timeout);
        assert_eq!(LlmError::from_status(500, "boom").kind(), ErrorKind::Api);
        assert_eq!(LlmError::from_status(401, "bad key").kind(), ErrorKind::Api);
    }

    #[test]
    fn transient_classification() {
        assert!(LlmError::Timeout("t".into()).is_transient());
        assert!(LlmError::RateLimited("r".into()).is_transient());
        assert!(LlmError::Api {
            status: 502,
            message: "bad gateway".into()
        }
        .is_transient());
        assert!(!LlmError::MissingApiKey.is_transient());
        assert!(!LlmError::InvalidResponse("x".into()).is_transient());
    }

    #[test]
    fn long_bodies_are_truncated() {
        let body = "x".repeat(2000);
        match LlmError::from_status(500, &body) {
            LlmError::Api { message, .. } => assert!(message.ends_with("[truncated]")),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
