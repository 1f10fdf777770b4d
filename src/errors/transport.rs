//! Error types for the WebSocket subscription transport.

/// Errors raised by the streaming connection.
///
/// None of these are surfaced to subscribers; the supervisor logs them and
/// schedules a reconnect.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The WebSocket handshake failed.
    #[error("Failed to connect to {url}")]
    ConnectFailed {
        /// Endpoint being dialed
        url: String,
        /// The underlying WebSocket error
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Sending a frame failed on an open connection.
    #[error("Failed to send {what}")]
    SendFailed {
        /// What was being sent (e.g. `eth_subscribe newHeads`)
        what: String,
        /// The underlying WebSocket error
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The connection failed while reading.
    #[error("Connection error")]
    Connection {
        /// The underlying WebSocket error
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The peer closed the connection.
    #[error("Connection closed{}", reason.as_deref().map(|r| format!(": {r}")).unwrap_or_default())]
    Closed {
        /// Close reason sent by the peer, if any
        reason: Option<String>,
    },

    /// All reconnection attempts were used up.
    #[error("Gave up reconnecting after {attempts} attempts")]
    RetriesExhausted {
        /// Number of attempts made
        attempts: u32,
    },
}

impl TransportError {
    /// Helper to create a `ConnectFailed` error from any error type.
    pub fn connect_failed(
        url: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        TransportError::ConnectFailed {
            url: url.into(),
            source: Box::new(source),
        }
    }

    /// Helper to create a `SendFailed` error from any error type.
    pub fn send_failed(
        what: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        TransportError::SendFailed {
            what: what.into(),
            source: Box::new(source),
        }
    }

    /// Helper to create a `Connection` error from any error type.
    pub fn connection(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        TransportError::Connection {
            source: Box::new(source),
        }
    }
}
