// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Supervised WebSocket subscription to `newHeads` and `newPendingTransactions`
//!
//! A single supervisor task owns the connection, so at most one connection
//! attempt is ever in flight. Each open connection gets a fresh id used in
//! every log line it produces. Failures never escape the supervisor: they are
//! logged, reported as a [`ConnectionState`] change and followed by a backoff
//! delay, until the attempt budget runs out.

use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::TxHash;
use futures::{SinkExt, StreamExt};
use serde_json::json;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn, Instrument};
use url::Url;

use super::backoff::{Backoff, ConnectionState, ReconnectPolicy};
use super::frame::{classify, InboundFrame};
use crate::errors::TransportError;
use crate::spans;
use crate::types::Block;

/// JSON-RPC ids of the two `eth_subscribe` requests
const NEW_HEADS_REQUEST_ID: u64 = 1;
const PENDING_TXS_REQUEST_ID: u64 = 2;

/// Receives what the subscription produces
///
/// Callbacks run on the supervisor task and must not block.
pub trait FeedHandler: Send + Sync + 'static {
    /// A connection opened and its subscriptions were requested
    fn on_connected(&self, connection_id: &str);

    /// A `newHeads` notification arrived
    fn on_head(&self, block: Block);

    /// A `newPendingTransactions` notification arrived
    fn on_pending_transaction(&self, hash: TxHash);

    /// The connection state changed; `attempts` counts reconnects since the
    /// last successful open
    fn on_state_change(&self, state: ConnectionState, attempts: u32);
}

/// Generates an id such as `ws-1f3a9c07`
pub fn new_connection_id() -> String {
    format!("ws-{:08x}", rand::random::<u32>())
}

fn subscribe_request(id: u64, kind: &str) -> Message {
    Message::Text(
        json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": "eth_subscribe",
            "params": [kind],
        })
        .to_string()
        .into(),
    )
}

/// The WebSocket side of the feed
#[derive(Debug, Clone)]
pub struct SubscriptionTransport {
    url: Url,
    policy: ReconnectPolicy,
    connect_timeout: Duration,
}

impl SubscriptionTransport {
    pub fn new(url: Url, policy: ReconnectPolicy, connect_timeout: Duration) -> Self {
        Self {
            url,
            policy,
            connect_timeout,
        }
    }

    /// Spawns the supervisor; it stops when `cancel` fires or retries run out
    pub fn spawn<H: FeedHandler>(self, handler: Arc<H>, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move { self.supervise(handler, cancel).await })
    }

    async fn supervise<H: FeedHandler>(self, handler: Arc<H>, cancel: CancellationToken) {
        let mut backoff = Backoff::new(self.policy);

        loop {
            handler.on_state_change(ConnectionState::Connecting, backoff.attempts());

            let connection_id = new_connection_id();
            let span = spans::websocket_connection(&connection_id, self.url.as_str(), backoff.attempts());
            let result = self
                .run_connection(&connection_id, handler.as_ref(), &mut backoff, &cancel)
                .instrument(span)
                .await;

            handler.on_state_change(ConnectionState::Disconnected, backoff.attempts());
            if cancel.is_cancelled() {
                info!(connection_id = %connection_id, "WebSocket supervisor stopped");
                return;
            }

            match result {
                Ok(()) => info!(connection_id = %connection_id, "WebSocket stream ended"),
                Err(e) => warn!(connection_id = %connection_id, error = %e, "WebSocket connection lost"),
            }

            let Some(delay) = backoff.next_delay() else {
                let error = TransportError::RetriesExhausted {
                    attempts: backoff.attempts(),
                };
                warn!(error = %error, "Falling back to polling only");
                handler.on_state_change(ConnectionState::Exhausted, backoff.attempts());
                return;
            };

            info!(
                attempt = backoff.attempts(),
                max_attempts = self.policy.max_attempts,
                delay_ms = delay.as_millis() as u64,
                "Scheduling WebSocket reconnect"
            );

            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    async fn run_connection<H: FeedHandler>(
        &self,
        connection_id: &str,
        handler: &H,
        backoff: &mut Backoff,
        cancel: &CancellationToken,
    ) -> Result<(), TransportError> {
        debug!(url = %self.url, "Connecting");
        let connect = tokio_tungstenite::connect_async(self.url.as_str());
        let (stream, response) = tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            result = tokio::time::timeout(self.connect_timeout, connect) => match result {
                Ok(Ok(connected)) => connected,
                Ok(Err(e)) => return Err(TransportError::connect_failed(self.url.as_str(), e)),
                Err(elapsed) => return Err(TransportError::connect_failed(self.url.as_str(), elapsed)),
            },
        };

        info!(status = response.status().as_u16(), "WebSocket connected");
        backoff.reset();
        handler.on_state_change(ConnectionState::Connected, 0);

        let (mut write, mut read) = stream.split();
        for (id, kind) in [
            (NEW_HEADS_REQUEST_ID, "newHeads"),
            (PENDING_TXS_REQUEST_ID, "newPendingTransactions"),
        ] {
            write
                .send(subscribe_request(id, kind))
                .await
                .map_err(|e| TransportError::send_failed(format!("eth_subscribe {kind}"), e))?;
        }
        handler.on_connected(connection_id);

        loop {
            let message = tokio::select! {
                _ = cancel.cancelled() => {
                    let _ = write.send(Message::Close(None)).await;
                    return Ok(());
                }
                message = read.next() => message,
            };

            match message {
                Some(Ok(Message::Text(text))) => dispatch(connection_id, text.as_str(), handler),
                Some(Ok(Message::Close(frame))) => {
                    return Err(TransportError::Closed {
                        reason: frame
                            .map(|f| f.reason.to_string())
                            .filter(|r| !r.is_empty()),
                    })
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(TransportError::connection(e)),
                None => return Err(TransportError::Closed { reason: None }),
            }
        }
    }
}

/// Classifies a text frame and forwards heads and pending hashes
pub(crate) fn dispatch<H: FeedHandler + ?Sized>(connection_id: &str, text: &str, handler: &H) {
    let frame = classify(text);
    frame.log(connection_id);
    match frame {
        InboundFrame::NewHead(block) => handler.on_head(block),
        InboundFrame::PendingTransaction(hash) => handler.on_pending_transaction(hash),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use tokio::net::TcpListener;

    #[derive(Default)]
    struct Recorder {
        heads: Mutex<Vec<Block>>,
        pending: Mutex<Vec<TxHash>>,
        states: Mutex<Vec<(ConnectionState, u32)>>,
    }

    impl Recorder {
        fn count(&self, state: ConnectionState) -> usize {
            self.states.lock().unwrap().iter().filter(|(s, _)| *s == state).count()
        }
    }

    impl FeedHandler for Recorder {
        fn on_connected(&self, _connection_id: &str) {}

        fn on_head(&self, block: Block) {
            self.heads.lock().unwrap().push(block);
        }

        fn on_pending_transaction(&self, hash: TxHash) {
            self.pending.lock().unwrap().push(hash);
        }

        fn on_state_change(&self, state: ConnectionState, attempts: u32) {
            self.states.lock().unwrap().push((state, attempts));
        }
    }

    #[test]
    fn test_connection_id_format() {
        let id = new_connection_id();
        assert!(id.starts_with("ws-"));
        assert_eq!(id.len(), 11);
    }

    #[test]
    fn test_subscribe_request_shape() {
        let Message::Text(text) = subscribe_request(2, "newPendingTransactions") else {
            panic!("expected text frame");
        };
        let value: serde_json::Value = serde_json::from_str(text.as_str()).unwrap();
        assert_eq!(value["id"], 2);
        assert_eq!(value["method"], "eth_subscribe");
        assert_eq!(value["params"][0], "newPendingTransactions");
    }

    #[test]
    fn test_dispatch_routes_frames() {
        let recorder = Recorder::default();
        let hash = TxHash::repeat_byte(0xcd);

        dispatch(
            "ws-test",
            &json!({"method": "eth_subscription", "params": {"subscription": "0x1", "result": {"number": "0x10"}}})
                .to_string(),
            &recorder,
        );
        dispatch(
            "ws-test",
            &json!({"method": "eth_subscription", "params": {"subscription": "0x2", "result": hash}})
                .to_string(),
            &recorder,
        );
        dispatch("ws-test", r#"{"id":1,"result":"0x1"}"#, &recorder);
        dispatch("ws-test", "garbage", &recorder);

        assert_eq!(recorder.heads.lock().unwrap().len(), 1);
        assert_eq!(recorder.pending.lock().unwrap().as_slice(), &[hash]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_attempts() {
        let recorder = Arc::new(Recorder::default());
        // nothing listens on port 1
        let transport = SubscriptionTransport::new(
            "ws://127.0.0.1:1".parse().unwrap(),
            ReconnectPolicy::default()
                .with_max_attempts(2)
                .without_jitter(),
            Duration::from_secs(1),
        );

        transport
            .spawn(Arc::clone(&recorder), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(
            recorder.states.lock().unwrap().last().map(|(state, _)| *state),
            Some(ConnectionState::Exhausted)
        );
        assert_eq!(recorder.count(ConnectionState::Connecting), 3);
    }

    /// Local node: every session reads the two subscribe requests, then
    /// either pushes one head and closes or, once `heads` runs out, stays open
    async fn serve(listener: TcpListener, heads: Vec<u64>, requests: Arc<Mutex<Vec<serde_json::Value>>>) {
        let mut heads = heads.into_iter();
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                return;
            };
            let Ok(socket) = tokio_tungstenite::accept_async(stream).await else {
                continue;
            };
            let (mut write, mut read) = socket.split();
            for _ in 0..2 {
                if let Some(Ok(Message::Text(text))) = read.next().await {
                    requests
                        .lock()
                        .unwrap()
                        .push(serde_json::from_str(text.as_str()).unwrap());
                }
            }

            let Some(number) = heads.next() else {
                // held open until the client closes
                while let Some(Ok(_)) = read.next().await {}
                return;
            };
            let frame = json!({
                "jsonrpc": "2.0",
                "method": "eth_subscription",
                "params": {"subscription": "0xabc", "result": {"number": format!("{number:#x}")}},
            });
            let _ = write.send(Message::Text(frame.to_string().into())).await;
            let _ = write.send(Message::Close(None)).await;
        }
    }

    #[tokio::test]
    async fn test_streams_heads_and_resets_backoff_after_each_connection() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}", listener.local_addr().unwrap());
        let requests = Arc::new(Mutex::new(Vec::new()));
        tokio::spawn(serve(listener, vec![0x10, 0x11], Arc::clone(&requests)));

        let recorder = Arc::new(Recorder::default());
        let cancel = CancellationToken::new();
        let transport = SubscriptionTransport::new(
            url.parse().unwrap(),
            ReconnectPolicy::default()
                .with_delays(Duration::from_millis(10), Duration::from_millis(50))
                .with_max_attempts(3)
                .without_jitter(),
            Duration::from_secs(2),
        );
        let handle = transport.spawn(Arc::clone(&recorder), cancel.clone());

        tokio::time::timeout(Duration::from_secs(5), async {
            while recorder.count(ConnectionState::Connected) < 3 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
        cancel.cancel();
        handle.await.unwrap();

        let requests = requests.lock().unwrap();
        assert_eq!(requests.len(), 6);
        for pair in requests.chunks(2) {
            assert_eq!(pair[0]["id"], 1);
            assert_eq!(pair[0]["params"][0], "newHeads");
            assert_eq!(pair[1]["id"], 2);
            assert_eq!(pair[1]["params"][0], "newPendingTransactions");
        }

        let heads: Vec<_> = recorder.heads.lock().unwrap().iter().filter_map(Block::number).collect();
        assert_eq!(heads, vec![0x10, 0x11]);

        // each reconnect counts from one again because the previous open succeeded
        let connecting: Vec<_> = recorder
            .states
            .lock()
            .unwrap()
            .iter()
            .filter(|(state, _)| *state == ConnectionState::Connecting)
            .map(|(_, attempts)| *attempts)
            .collect();
        assert_eq!(connecting, vec![0, 1, 1]);
    }
}
