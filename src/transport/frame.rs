// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Classification of inbound WebSocket frames

use alloy_primitives::TxHash;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::types::Block;

/// Marker the node uses when it lacks a subscription type
const NOT_SUPPORTED: &str = "not supported";

/// What an inbound text frame turned out to be
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    /// Not valid JSON
    Malformed {
        /// The raw text mentions "not supported", an expected node response
        capability_notice: bool,
    },
    /// The node does not support a requested subscription
    Unsupported { message: String },
    /// Any other JSON-RPC error
    RpcError { code: Option<i64>, message: String },
    /// A `newHeads` notification
    NewHead(Block),
    /// A `newPendingTransactions` notification
    PendingTransaction(TxHash),
    /// Answer to one of our `eth_subscribe` requests
    SubscriptionConfirmed { id: Value, subscription: String },
    /// Valid JSON the feed has no use for
    Unhandled { reason: &'static str },
}

fn error_parts(error: &Value) -> (Option<i64>, String) {
    match error {
        Value::String(message) => (None, message.clone()),
        Value::Object(obj) => (
            obj.get("code").and_then(Value::as_i64),
            obj.get("message")
                .and_then(Value::as_str)
                .map(str::to_owned)
                .unwrap_or_else(|| error.to_string()),
        ),
        other => (None, other.to_string()),
    }
}

fn classify_error(error: &Value) -> InboundFrame {
    let (code, message) = error_parts(error);
    if message.to_lowercase().contains(NOT_SUPPORTED) {
        InboundFrame::Unsupported { message }
    } else {
        InboundFrame::RpcError { code, message }
    }
}

fn classify_notification(params: &Value) -> InboundFrame {
    if params.get("subscription").is_none_or(Value::is_null) {
        return InboundFrame::Unhandled {
            reason: "notification without subscription id",
        };
    }

    match params.get("result") {
        Some(Value::Object(result)) if Block::looks_like_header(result) => {
            InboundFrame::NewHead(Block::from(result.clone()))
        }
        Some(Value::String(hash)) if hash.starts_with("0x") => match hash.parse() {
            Ok(hash) => InboundFrame::PendingTransaction(hash),
            Err(_) => InboundFrame::Unhandled {
                reason: "pending transaction with invalid hash",
            },
        },
        _ => InboundFrame::Unhandled {
            reason: "unrecognized subscription result",
        },
    }
}

/// Classifies one text frame
///
/// Checks run in order: JSON validity, errors (subscription-level and
/// top-level), subscription notifications, subscription confirmations.
pub fn classify(text: &str) -> InboundFrame {
    let message: Value = match serde_json::from_str(text) {
        Ok(message) => message,
        Err(_) => {
            return InboundFrame::Malformed {
                capability_notice: text.to_lowercase().contains(NOT_SUPPORTED),
            }
        }
    };

    let is_notification = message.get("method").and_then(Value::as_str) == Some("eth_subscription");
    let params = message.get("params");

    if is_notification {
        if let Some(error) = params.and_then(|p| p.get("error")) {
            return classify_error(error);
        }
    }
    if let Some(error) = message.get("error").filter(|e| !e.is_null()) {
        return classify_error(error);
    }

    if is_notification {
        return match params {
            Some(params) => classify_notification(params),
            None => InboundFrame::Unhandled {
                reason: "notification without params",
            },
        };
    }

    if let (Some(id), Some(result)) = (message.get("id"), message.get("result")) {
        let subscription = match result {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        return InboundFrame::SubscriptionConfirmed {
            id: id.clone(),
            subscription,
        };
    }

    InboundFrame::Unhandled {
        reason: "unknown message shape",
    }
}

impl InboundFrame {
    /// Logs the frame at the level its class calls for
    ///
    /// Head and pending-transaction frames are logged by the ingestion path
    /// instead.
    pub fn log(&self, connection_id: &str) {
        match self {
            InboundFrame::Malformed {
                capability_notice: true,
            } => debug!(connection_id, "Node reported an unsupported capability"),
            InboundFrame::Malformed {
                capability_notice: false,
            } => warn!(connection_id, "Dropping malformed frame"),
            InboundFrame::Unsupported { message } => {
                debug!(connection_id, %message, "Subscription not supported by node")
            }
            InboundFrame::RpcError { code, message } => {
                warn!(connection_id, ?code, %message, "Subscription error")
            }
            InboundFrame::SubscriptionConfirmed { id, subscription } => {
                info!(connection_id, %id, %subscription, "Subscription confirmed")
            }
            InboundFrame::Unhandled { reason } => {
                debug!(connection_id, reason, "Ignoring frame")
            }
            InboundFrame::NewHead(_) | InboundFrame::PendingTransaction(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const TX: &str = "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";

    fn frame(value: Value) -> InboundFrame {
        classify(&value.to_string())
    }

    fn notification(result: Value) -> Value {
        json!({
            "jsonrpc": "2.0",
            "method": "eth_subscription",
            "params": {"subscription": "0x9", "result": result}
        })
    }

    #[test]
    fn test_malformed() {
        assert_eq!(
            classify("{oops"),
            InboundFrame::Malformed {
                capability_notice: false
            }
        );
        assert_eq!(
            classify("method not supported"),
            InboundFrame::Malformed {
                capability_notice: true
            }
        );
    }

    #[test]
    fn test_errors() {
        let unsupported = frame(json!({
            "method": "eth_subscription",
            "params": {"error": {"message": "newPendingTransactions not supported"}}
        }));
        assert!(matches!(unsupported, InboundFrame::Unsupported { .. }));

        let top_level = frame(json!({"id": 2, "error": {"code": -32000, "message": "boom"}}));
        assert_eq!(
            top_level,
            InboundFrame::RpcError {
                code: Some(-32000),
                message: "boom".into()
            }
        );

        let top_level_unsupported =
            frame(json!({"id": 2, "error": {"code": -32601, "message": "Method Not Supported"}}));
        assert!(matches!(top_level_unsupported, InboundFrame::Unsupported { .. }));
    }

    #[test]
    fn test_new_head() {
        let InboundFrame::NewHead(block) = frame(notification(json!({
            "number": "0x64",
            "parentHash": TX,
        }))) else {
            panic!("expected head");
        };
        assert_eq!(block.number(), Some(100));

        assert!(matches!(
            frame(notification(json!({"difficulty": "0x0"}))),
            InboundFrame::NewHead(_)
        ));
    }

    #[test]
    fn test_pending_transaction() {
        assert_eq!(
            frame(notification(json!(TX))),
            InboundFrame::PendingTransaction(TX.parse().unwrap())
        );
        assert!(matches!(
            frame(notification(json!("0x12"))),
            InboundFrame::Unhandled { .. }
        ));
    }

    #[test]
    fn test_unhandled_notifications() {
        let no_sub = frame(json!({"method": "eth_subscription", "params": {"result": TX}}));
        assert!(matches!(no_sub, InboundFrame::Unhandled { .. }));

        assert!(matches!(
            frame(notification(json!({"foo": 1}))),
            InboundFrame::Unhandled { .. }
        ));
        assert!(matches!(frame(notification(json!(5))), InboundFrame::Unhandled { .. }));
    }

    #[test]
    fn test_subscription_confirmed() {
        assert_eq!(
            frame(json!({"jsonrpc": "2.0", "id": 1, "result": "0xabc"})),
            InboundFrame::SubscriptionConfirmed {
                id: json!(1),
                subscription: "0xabc".into()
            }
        );
    }

    #[test]
    fn test_other_shapes_unhandled() {
        assert!(matches!(frame(json!({"hello": "world"})), InboundFrame::Unhandled { .. }));
        assert!(matches!(frame(json!([1, 2])), InboundFrame::Unhandled { .. }));
    }
}
