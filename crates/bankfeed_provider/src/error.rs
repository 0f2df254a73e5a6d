//! Errors surfaced by the aggregator client.

use std::collections::BTreeMap;
use thiserror::Error;

/// Result type for provider operations.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Header carrying the provider's suggested retry delay on HTTP 429.
pub const RETRY_AFTER_HEADER: &str = "Retry-After";

/// Errors from the aggregator, vendor-neutral.
///
/// The sync engine only ever inspects the shape of these errors (kind,
/// status, headers); vendor error bodies travel in `message` for operator
/// diagnostics and are never logged wholesale.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// The aggregator answered with a non-success HTTP status.
    #[error("http error: status {status}: {message}")]
    Http {
        /// Response status code.
        status: u16,
        /// Response headers, as received.
        headers: BTreeMap<String, String>,
        /// Vendor error detail.
        message: String,
    },

    /// The request never produced an HTTP response.
    #[error("transport error: {message}")]
    Transport {
        /// What failed.
        message: String,
    },

    /// The aggregator answered with something the client could not make
    /// sense of.
    #[error("unexpected response: {message}")]
    Unexpected {
        /// What was wrong with the response.
        message: String,
    },
}

impl ProviderError {
    /// Creates an HTTP error without headers.
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self::Http {
            status,
            headers: BTreeMap::new(),
            message: message.into(),
        }
    }

    /// Creates an HTTP error with response headers.
    pub fn http_with_headers(
        status: u16,
        headers: BTreeMap<String, String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Http {
            status,
            headers,
            message: message.into(),
        }
    }

    /// Creates a transport error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Creates an unexpected-response error.
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected {
            message: message.into(),
        }
    }

    /// Stable tag naming the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Http { .. } => "http",
            Self::Transport { .. } => "transport",
            Self::Unexpected { .. } => "unexpected",
        }
    }

    /// True for HTTP 429 responses.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::Http { status: 429, .. })
    }

    /// The provider's suggested retry delay in seconds, parsed from the
    /// `Retry-After` header when present. Header names are matched
    /// case-insensitively; non-numeric values (the HTTP-date form) are
    /// ignored.
    pub fn retry_after(&self) -> Option<u64> {
        let Self::Http { headers, .. } = self else {
            return None;
        };
        headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(RETRY_AFTER_HEADER))
            .and_then(|(_, value)| value.trim().parse().ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rate_limited(headers: &[(&str, &str)]) -> ProviderError {
        ProviderError::http_with_headers(
            429,
            headers
                .iter()
                .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
                .collect(),
            "rate limit exceeded",
        )
    }

    #[test]
    fn kind_tags() {
        assert_eq!(ProviderError::http(500, "boom").kind(), "http");
        assert_eq!(ProviderError::transport("reset").kind(), "transport");
        assert_eq!(ProviderError::unexpected("not json").kind(), "unexpected");
    }

    #[test]
    fn rate_limit_detection() {
        assert!(rate_limited(&[]).is_rate_limited());
        assert!(!ProviderError::http(503, "unavailable").is_rate_limited());
        assert!(!ProviderError::transport("reset").is_rate_limited());
    }

    #[test]
    fn retry_after_parsing() {
        assert_eq!(rate_limited(&[("Retry-After", "30")]).retry_after(), Some(30));
        assert_eq!(rate_limited(&[("retry-after", " 15 ")]).retry_after(), Some(15));
        // HTTP-date form is not a number of seconds.
        assert_eq!(
            rate_limited(&[("Retry-After", "Wed, 21 Oct 2015 07:28:00 GMT")]).retry_after(),
            None
        );
        assert_eq!(rate_limited(&[]).retry_after(), None);
        assert_eq!(ProviderError::transport("reset").retry_after(), None);
    }
}
