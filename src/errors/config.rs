//! Error types for configuration.

/// Errors building or validating a [`FeedConfig`](crate::FeedConfig).
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A URL did not parse.
    #[error("Invalid URL for {field}: {value}")]
    InvalidUrl {
        /// Configuration field
        field: &'static str,
        /// Rejected input
        value: String,
        /// The underlying parse error
        #[source]
        source: url::ParseError,
    },

    /// A value is out of range or inconsistent with another.
    #[error("Invalid {field}: {reason}")]
    Invalid {
        /// Configuration field
        field: &'static str,
        /// Why it was rejected
        reason: String,
    },
}

impl ConfigError {
    /// Create an `InvalidUrl` error.
    pub fn invalid_url(field: &'static str, value: impl Into<String>, source: url::ParseError) -> Self {
        ConfigError::InvalidUrl {
            field,
            value: value.into(),
            source,
        }
    }

    /// Create an `Invalid` error.
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field,
            reason: reason.into(),
        }
    }
}
