use thiserror::Error;

/// Whether a failed fetch is worth another attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Retryable,
    Fatal,
}

/// Failure of a single outbound request.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} timed out")]
    Timeout { url: String },

    #[error("network error for {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} answered with transient status {status}")]
    TransientStatus { url: String, status: u16 },

    #[error("failed to read response body from {url}: {source}")]
    Body {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("invalid request for {url}: {reason}")]
    InvalidRequest { url: String, reason: String },

    #[error("scan aborted before the request was sent")]
    Aborted,
}

impl FetchError {
    pub(crate) fn from_reqwest(url: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout { url: url.to_string() }
        } else if err.is_builder() {
            FetchError::InvalidRequest {
                url: url.to_string(),
                reason: err.to_string(),
            }
        } else {
            FetchError::Network {
                url: url.to_string(),
                source: err,
            }
        }
    }

    pub fn disposition(&self) -> Disposition {
        match self {
            FetchError::Timeout { .. }
            | FetchError::Network { .. }
            | FetchError::TransientStatus { .. } => Disposition::Retryable,
            FetchError::Body { .. } | FetchError::InvalidRequest { .. } | FetchError::Aborted => {
                Disposition::Fatal
            }
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.disposition() == Disposition::Retryable
    }
}

/// Scan-level failures. Only these abort a whole scan.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("invalid target URL '{url}': {source}")]
    InvalidTarget {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("unsupported scheme '{scheme}' in target '{url}' (expected http or https)")]
    UnsupportedScheme { url: String, scheme: String },

    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    #[error("failed to load payloads from '{path}': {source}")]
    Payloads {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_errors_are_retryable() {
        let err = FetchError::TransientStatus {
            url: "http://example.com".to_string(),
            status: 503,
        };
        assert!(err.is_retryable());
        assert!(FetchError::Timeout { url: "http://example.com".to_string() }.is_retryable());
    }

    #[test]
    fn test_aborted_and_invalid_are_fatal() {
        assert_eq!(FetchError::Aborted.disposition(), Disposition::Fatal);
        let err = FetchError::InvalidRequest {
            url: "x".to_string(),
            reason: "bad".to_string(),
        };
        assert_eq!(err.disposition(), Disposition::Fatal);
    }
}
