/// Shared error type used across all Aventura crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("network: {0}")]
    Network(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("provider HTTP {status}: {body}")]
    ProviderHttp { status: u16, body: String },

    #[error("provider {provider}: {message}")]
    Provider { provider: String, message: String },

    #[error("stream aborted")]
    Abort,

    #[error("schema: {0}")]
    Schema(String),

    #[error("unknown entry reference: {0}")]
    InvalidReference(String),

    #[error("config: {0}")]
    Config(String),

    #[error("cancelled")]
    Cancelled,

    #[error("a turn is already in progress")]
    Busy,
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Whether a provider call that failed with this error may be retried.
    ///
    /// Network failures, timeouts, and 5xx responses are transient.
    /// 4xx responses and everything else are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Network(_) | Error::Timeout(_) => true,
            Error::ProviderHttp { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_are_retryable() {
        let err = Error::ProviderHttp {
            status: 503,
            body: "overloaded".into(),
        };
        assert!(err.is_retryable());
    }

    #[test]
    fn client_errors_are_not_retryable() {
        let err = Error::ProviderHttp {
            status: 401,
            body: "bad key".into(),
        };
        assert!(!err.is_retryable());
    }

    #[test]
    fn network_and_timeout_are_retryable() {
        assert!(Error::Network("connection reset".into()).is_retryable());
        assert!(Error::Timeout("deadline exceeded".into()).is_retryable());
    }

    #[test]
    fn schema_and_cancel_are_not_retryable() {
        assert!(!Error::Schema("missing entryUpdates".into()).is_retryable());
        assert!(!Error::Cancelled.is_retryable());
        assert!(!Error::Busy.is_retryable());
    }
}
