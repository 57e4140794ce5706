//! Error types for the check engine.
//!
//! Only [`ConfigError`] ever escapes a run as a hard failure. Everything an
//! endpoint can do wrong at runtime (refuse the connection, time out, answer
//! with a non-2xx status, return an error body or garbage) is an
//! [`AdapterError`] and is absorbed into the failing check item's result.

use std::time::Duration;

use thiserror::Error;

/// A problem with the caller-supplied configuration, detected before any
/// network activity.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown protocol {0:?} (expected openai, anthropic or gemini)")]
    UnknownProtocol(String),

    #[error("invalid base URL {url:?}: {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("unknown provider {0:?} and no base URL given")]
    UnknownProvider(String),
}

/// A failed adapter operation.
///
/// Each variant maps onto a `(message, detail)` pair for the check result:
/// the `Display` impl is the short human-readable summary, [`detail`] the raw
/// diagnostic.
///
/// [`detail`]: AdapterError::detail
#[derive(Debug, Error)]
pub enum AdapterError {
    /// DNS, TLS, connection refused: the request never got an answer.
    #[error("request failed")]
    Network(String),

    /// The per-operation deadline elapsed.
    #[error("timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    /// Non-2xx status without a parseable provider error body.
    #[error("HTTP {status}")]
    Http { status: u16, body: String },

    /// The provider reported an error in its own envelope.
    #[error("{message}")]
    Api {
        status: u16,
        message: String,
        body: String,
    },

    /// 2xx answer whose body does not match the expected schema.
    #[error("response decode failed: {message}")]
    Decode { message: String, body: String },
}

impl AdapterError {
    /// Classify a `reqwest` error, folding its timeout flavor into
    /// [`AdapterError::Timeout`] so the result message names the deadline.
    pub fn from_reqwest(err: reqwest::Error, deadline: Duration) -> Self {
        if err.is_timeout() {
            Self::Timeout(deadline)
        } else {
            Self::Network(err.to_string())
        }
    }

    /// Short summary for the check result's `message` field.
    pub fn summary(&self) -> String {
        self.to_string()
    }

    /// Raw diagnostic for the check result's `detail` field.
    pub fn detail(&self) -> String {
        match self {
            Self::Network(cause) => cause.clone(),
            Self::Timeout(deadline) => format!("no response within {}s", deadline.as_secs()),
            Self::Http { body, .. } => body.clone(),
            Self::Api { status, body, .. } => format!("HTTP {status}: {body}"),
            Self::Decode { body, .. } => body.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_summary_is_provider_message() {
        let err = AdapterError::Api {
            status: 401,
            message: "invalid api key".into(),
            body: "{\"error\":{\"message\":\"invalid api key\"}}".into(),
        };
        assert_eq!(err.summary(), "invalid api key");
        assert!(err.detail().starts_with("HTTP 401"));
    }

    #[test]
    fn test_timeout_summary_names_deadline() {
        let err = AdapterError::Timeout(Duration::from_secs(30));
        assert_eq!(err.summary(), "timed out after 30s");
    }
}
