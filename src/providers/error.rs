//! Classified provider failures

use thiserror::Error;

/// How the orchestrator should react to a failed fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Never retry this input line
    Fatal,
    /// Retry with another credential
    Quota,
    /// Retry with the same credential after backoff
    Transient,
}

/// Error returned by a provider fetch
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("fatal provider error: {0}")]
    Fatal(String),

    #[error("quota exceeded: {0}")]
    Quota(String),

    #[error("transient provider error: {0}")]
    Transient(String),
}

impl ProviderError {
    pub fn fatal(message: impl Into<String>) -> Self {
        Self::Fatal(message.into())
    }

    pub fn quota(message: impl Into<String>) -> Self {
        Self::Quota(message.into())
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient(message.into())
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Fatal(_) => FailureKind::Fatal,
            Self::Quota(_) => FailureKind::Quota,
            Self::Transient(_) => FailureKind::Transient,
        }
    }

    /// Default classification of a non-success HTTP status.
    ///
    /// 429 is a quota failure, request timeouts and server errors are
    /// transient, and every other client error is permanent.
    pub fn from_status(status: u16, context: &str) -> Self {
        let message = format!("{context}: HTTP {status}");
        match status {
            429 => Self::Quota(message),
            408 => Self::Transient(message),
            400..=499 => Self::Fatal(message),
            _ => Self::Transient(message),
        }
    }

    /// The key sub-fields did not match what the provider expects
    pub fn bad_key(format: &str) -> Self {
        Self::Fatal(format!("key must be of the form: {format}"))
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transient(format!("request failed: {err}"))
    }
}

impl From<serde_json::Error> for ProviderError {
    fn from(err: serde_json::Error) -> Self {
        Self::Transient(format!("malformed response: {err}"))
    }
}
