//! Error types for peer geolocation.

/// Errors from a geolocation batch lookup.
///
/// A failed lookup never blocks a peer update: the unenriched list has
/// already been published by the time enrichment runs.
#[derive(Debug, thiserror::Error)]
pub enum EnrichmentError {
    /// The HTTP request failed or timed out.
    #[error("Geolocation request failed")]
    Request {
        /// The underlying HTTP error
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The service answered with a non-success status.
    #[error("Geolocation service returned HTTP {status}")]
    Status {
        /// HTTP status code
        status: u16,
    },

    /// The response body was not the expected batch array.
    #[error("Unexpected geolocation response: {details}")]
    InvalidResponse {
        /// What was wrong with the body
        details: String,
    },
}

impl EnrichmentError {
    /// Create a `Request` error from any error type.
    pub fn request(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        EnrichmentError::Request {
            source: Box::new(source),
        }
    }

    /// Create an `InvalidResponse` error.
    pub fn invalid_response(details: impl Into<String>) -> Self {
        EnrichmentError::InvalidResponse {
            details: details.into(),
        }
    }
}
