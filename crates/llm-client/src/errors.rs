use std::time::Duration;

/// Errors raised while issuing or reading a completion call, before the
/// retry controller turns them into a terminal `Error` event.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    /// Missing or invalid client configuration (credential, endpoint).
    /// Fatal; surfaced to the caller directly, never retried.
    #[error("config error: {0}")]
    Config(String),
    /// Upstream signalled quota or throughput exhaustion. Retryable.
    #[error("rate limited: {message}")]
    RateLimited {
        message: String,
        /// Server-provided wait hint (`Retry-After`), when present.
        retry_after: Option<Duration>,
    },
    /// Network or connection failure reaching upstream. Retryable.
    #[error("transient connectivity error: {0}")]
    Transient(String),
    /// Any other upstream-reported failure (malformed request, server error,
    /// auth rejection). Fatal, never retried.
    #[error("upstream error: {message}")]
    Upstream {
        message: String,
        status_code: Option<u16>,
    },
}

impl ClientError {
    /// Creates a rate-limit error without a wait hint.
    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::RateLimited {
            message: message.into(),
            retry_after: None,
        }
    }

    /// Creates a transient-connectivity error.
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient(message.into())
    }

    /// Creates an upstream protocol/application error.
    pub fn upstream(message: impl Into<String>, status_code: Option<u16>) -> Self {
        Self::Upstream {
            message: message.into(),
            status_code,
        }
    }

    /// True for failure kinds the retry controller may re-attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited { .. } | Self::Transient(_))
    }
}

/// Classifies a failed HTTP response by status code.
pub(crate) fn classify_status(status: u16, body: &str) -> ClientError {
    if status == 429 {
        ClientError::rate_limited(format!("upstream returned 429: {body}"))
    } else {
        ClientError::upstream(
            format!("upstream request failed with status {status}: {body}"),
            Some(status),
        )
    }
}

/// Classifies a `reqwest` failure. Anything that never reached the upstream
/// application (connect, timeout, mid-stream read) counts as transient.
pub(crate) fn classify_reqwest(err: &reqwest::Error) -> ClientError {
    ClientError::transient(err.to_string())
}
