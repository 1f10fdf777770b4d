// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Tower logging layer for the node's HTTP JSON-RPC client.
//!
//! Every call is wrapped in a `blockfeed.rpc_call` span carrying the method
//! name and, once the call completes, its duration. Calls slower than the
//! configured threshold are logged at `warn` so a sluggish node shows up in
//! the default log level while regular 2-second polls stay at `trace`.

use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
    time::{Duration, Instant},
};

use alloy_json_rpc::{RequestPacket, ResponsePacket};
use alloy_transport::TransportError;
use tower::Layer;
use tracing::{trace, warn, Instrument};

/// Calls slower than this are logged at `warn` by default.
const DEFAULT_SLOW_CALL: Duration = Duration::from_secs(2);

/// A Tower layer that adds tracing to RPC requests.
///
/// # Example
///
/// ```rust,ignore
/// use blockfeed::transport::LoggingLayer;
/// use alloy_rpc_client::ClientBuilder;
///
/// let client = ClientBuilder::default()
///     .layer(LoggingLayer::new())
///     .http(rpc_url);
/// ```
#[derive(Clone, Debug)]
pub struct LoggingLayer {
    /// Threshold above which a call is reported as slow
    slow_call: Duration,
    /// Whether to log request and response payloads at `trace`
    log_payloads: bool,
}

impl Default for LoggingLayer {
    fn default() -> Self {
        Self {
            slow_call: DEFAULT_SLOW_CALL,
            log_payloads: false,
        }
    }
}

impl LoggingLayer {
    /// Creates a layer logging method, duration and errors.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the slow-call threshold.
    pub fn with_slow_call_threshold(mut self, threshold: Duration) -> Self {
        self.slow_call = threshold;
        self
    }

    /// Also logs request and response payloads at `trace`.
    ///
    /// Block bodies make this verbose.
    pub fn with_payloads(mut self) -> Self {
        self.log_payloads = true;
        self
    }
}

impl<S> Layer<S> for LoggingLayer {
    type Service = LoggingService<S>;

    fn layer(&self, service: S) -> Self::Service {
        LoggingService {
            service,
            slow_call: self.slow_call,
            log_payloads: self.log_payloads,
        }
    }
}

/// A Tower service that traces RPC requests and responses.
#[derive(Clone, Debug)]
pub struct LoggingService<S> {
    service: S,
    slow_call: Duration,
    log_payloads: bool,
}

impl<S> tower::Service<RequestPacket> for LoggingService<S>
where
    S: tower::Service<RequestPacket, Response = ResponsePacket, Error = TransportError>
        + Clone
        + Send
        + 'static,
    S::Future: Send,
{
    type Response = ResponsePacket;
    type Error = TransportError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&mut self, request: RequestPacket) -> Self::Future {
        let slow_call = self.slow_call;
        let log_payloads = self.log_payloads;
        let mut service = self.service.clone();
        let method = method_name(&request);

        let span = tracing::debug_span!(
            "blockfeed.rpc_call",
            method = %method,
            duration_ms = tracing::field::Empty,
        );

        Box::pin(
            async move {
                if log_payloads {
                    trace!(request = ?request, "RPC request");
                }

                let start = Instant::now();
                let result = service.call(request).await;
                let elapsed = start.elapsed();
                tracing::Span::current().record("duration_ms", elapsed.as_millis() as u64);

                match &result {
                    Ok(response) if log_payloads => trace!(response = ?response, "RPC response"),
                    Ok(_) if elapsed > slow_call => warn!(
                        method = %method,
                        duration_ms = elapsed.as_millis() as u64,
                        "Slow RPC call"
                    ),
                    Ok(_) => trace!("RPC ok"),
                    Err(e) => warn!(method = %method, error = %e, "RPC call failed"),
                }

                result
            }
            .instrument(span),
        )
    }
}

/// Method name of a request packet, summarizing batches.
fn method_name(request: &RequestPacket) -> String {
    match request {
        RequestPacket::Single(req) => req.method().to_string(),
        RequestPacket::Batch(reqs) => match reqs.as_slice() {
            [] => "batch(empty)".to_string(),
            [only] => only.method().to_string(),
            many => format!("batch({} calls)", many.len()),
        },
    }
}
