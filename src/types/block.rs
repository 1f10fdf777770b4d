// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Block records as delivered by the node
//!
//! Blocks are kept as open JSON objects so fields this crate does not know
//! about survive caching and persistence untouched. Typed accessors parse the
//! handful of fields the cache relies on.

use alloy_primitives::{BlockHash, BlockNumber, TxHash};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::constants::MILLIS_TIMESTAMP_THRESHOLD;
use crate::types::TimestampMillis;

/// Fields whose presence marks a subscription result as a block header.
const HEADER_MARKERS: [&str; 5] = ["number", "blockNumber", "hash", "parentHash", "miner"];

/// A block header or full block as returned by `eth_subscribe("newHeads")`,
/// `eth_getBlockByNumber` or `eth_getBlockByHash`
///
/// # Examples
///
/// ```
/// use blockfeed::Block;
/// use serde_json::json;
///
/// let block = Block::from_value(json!({
///     "number": "0x64",
///     "hash": "0x1111111111111111111111111111111111111111111111111111111111111111",
///     "timestamp": "0x65f0c2a0",
/// }))
/// .unwrap();
///
/// assert_eq!(block.number(), Some(100));
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Block(Map<String, Value>);

impl Block {
    /// Wraps a JSON value, returning `None` unless it is an object
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    /// Whether a JSON object carries any block-identifying field
    pub fn looks_like_header(object: &Map<String, Value>) -> bool {
        HEADER_MARKERS
            .iter()
            .any(|key| object.get(*key).is_some_and(|v| !v.is_null()))
            || object.contains_key("difficulty")
    }

    /// Block number, read from `number` or the `blockNumber` alias
    pub fn number(&self) -> Option<BlockNumber> {
        self.0
            .get("number")
            .filter(|v| !v.is_null())
            .or_else(|| self.0.get("blockNumber"))
            .and_then(parse_quantity)
    }

    /// Block hash, read from `hash` or the `blockHash` alias
    pub fn hash(&self) -> Option<BlockHash> {
        self.0
            .get("hash")
            .or_else(|| self.0.get("blockHash"))
            .and_then(Value::as_str)
            .and_then(|s| s.parse().ok())
    }

    /// Miner / proposer address as delivered
    pub fn miner(&self) -> Option<&str> {
        self.0.get("miner").and_then(Value::as_str)
    }

    /// Raw timestamp value, in whatever unit the node used
    pub fn raw_timestamp(&self) -> Option<u64> {
        self.0.get("timestamp").and_then(parse_quantity)
    }

    /// Block timestamp in seconds
    ///
    /// Values above [`MILLIS_TIMESTAMP_THRESHOLD`] are taken to be
    /// milliseconds; the true unit is decided by the node.
    pub fn timestamp_secs(&self) -> Option<u64> {
        self.raw_timestamp().map(|ts| {
            if ts > MILLIS_TIMESTAMP_THRESHOLD {
                ts / 1000
            } else {
                ts
            }
        })
    }

    /// Base fee per gas in wei
    pub fn base_fee_per_gas(&self) -> Option<u128> {
        let value = self.0.get("baseFeePerGas")?;
        match value {
            Value::String(s) => {
                let digits = s.strip_prefix("0x").unwrap_or(s);
                u128::from_str_radix(digits, 16).ok()
            }
            Value::Number(n) => n.as_u64().map(u128::from),
            _ => None,
        }
    }

    /// Base fee expressed in gwei
    pub fn gas_price_gwei(&self) -> Option<f64> {
        self.base_fee_per_gas().map(|wei| wei as f64 / 1e9)
    }

    /// Transaction hashes contained in the block body
    ///
    /// Accepts both hash-only lists and full transaction objects.
    pub fn transaction_hashes(&self) -> Vec<TxHash> {
        let Some(Value::Array(txs)) = self.0.get("transactions") else {
            return Vec::new();
        };

        txs.iter()
            .filter_map(|tx| match tx {
                Value::String(s) => s.parse().ok(),
                Value::Object(obj) => obj.get("hash")?.as_str()?.parse().ok(),
                _ => None,
            })
            .collect()
    }

    /// Looks up an arbitrary field
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Borrows the underlying JSON object
    pub fn as_object(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Consumes the block, returning the underlying JSON object
    pub fn into_object(self) -> Map<String, Value> {
        self.0
    }

    /// Canonical form stored in the cache
    ///
    /// Rewrites `number` as hex, adds `gasPrice` (gwei or `null`) and fills a
    /// missing `timestamp` with `now` in hex seconds.
    pub(crate) fn normalized(mut self, number: BlockNumber, now: TimestampMillis) -> Self {
        let gas_price = self.gas_price_gwei();
        self.0
            .insert("number".to_string(), Value::String(format!("{number:#x}")));
        self.0.insert(
            "gasPrice".to_string(),
            gas_price
                .and_then(serde_json::Number::from_f64)
                .map_or(Value::Null, Value::Number),
        );
        if self.0.get("timestamp").is_none_or(Value::is_null) {
            self.0.insert(
                "timestamp".to_string(),
                Value::String(format!("{:#x}", now.as_secs())),
            );
        }
        self
    }
}

impl From<Map<String, Value>> for Block {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Parses a JSON-RPC quantity: a `0x` hex string, a decimal string or a number.
pub(crate) fn parse_quantity(value: &Value) -> Option<u64> {
    match value {
        Value::String(s) => match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            Some(hex) => u64::from_str_radix(hex, 16).ok(),
            None => s.parse().ok(),
        },
        Value::Number(n) => n.as_u64(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const HASH: &str = "0x1111111111111111111111111111111111111111111111111111111111111111";
    const TX_A: &str = "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
    const TX_B: &str = "0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";

    fn block(value: Value) -> Block {
        Block::from_value(value).unwrap()
    }

    #[test]
    fn test_number_from_hex_and_alias() {
        assert_eq!(block(json!({"number": "0x65"})).number(), Some(101));
        assert_eq!(block(json!({"blockNumber": "0x10"})).number(), Some(16));
        assert_eq!(block(json!({"number": 42})).number(), Some(42));
        assert_eq!(block(json!({"number": "zz"})).number(), None);
        assert_eq!(block(json!({"hash": HASH})).number(), None);
    }

    #[test]
    fn test_from_value_rejects_non_objects() {
        assert!(Block::from_value(json!("0x1")).is_none());
        assert!(Block::from_value(json!([1, 2])).is_none());
    }

    #[test]
    fn test_looks_like_header() {
        let header = json!({"parentHash": HASH});
        assert!(Block::looks_like_header(header.as_object().unwrap()));

        let difficulty_only = json!({"difficulty": "0x0"});
        assert!(Block::looks_like_header(difficulty_only.as_object().unwrap()));

        let other = json!({"foo": 1});
        assert!(!Block::looks_like_header(other.as_object().unwrap()));
    }

    #[test]
    fn test_timestamp_unit_heuristic() {
        assert_eq!(
            block(json!({"timestamp": "0x65f0c2a0"})).timestamp_secs(),
            Some(0x65f0c2a0)
        );
        // 1_710_000_000_000 ms
        assert_eq!(
            block(json!({"timestamp": 1_710_000_000_000u64})).timestamp_secs(),
            Some(1_710_000_000)
        );
    }

    #[test]
    fn test_gas_price_gwei() {
        let b = block(json!({"baseFeePerGas": "0x3b9aca00"}));
        assert_eq!(b.base_fee_per_gas(), Some(1_000_000_000));
        assert_eq!(b.gas_price_gwei(), Some(1.0));
        assert_eq!(block(json!({})).gas_price_gwei(), None);
    }

    #[test]
    fn test_transaction_hashes_accepts_both_shapes() {
        let b = block(json!({
            "transactions": [TX_A, {"hash": TX_B}, 7]
        }));
        let hashes = b.transaction_hashes();
        assert_eq!(hashes.len(), 2);
        assert_eq!(hashes[0], TX_A.parse::<TxHash>().unwrap());
        assert_eq!(hashes[1], TX_B.parse::<TxHash>().unwrap());
    }

    #[test]
    fn test_normalized_fills_fields() {
        let now = TimestampMillis::from_millis(1_700_000_000_000);
        let b = block(json!({"blockNumber": "0x64", "baseFeePerGas": "0x77359400"}))
            .normalized(100, now);

        assert_eq!(b.get("number"), Some(&json!("0x64")));
        assert_eq!(b.get("gasPrice"), Some(&json!(2.0)));
        assert_eq!(b.get("timestamp"), Some(&json!("0x6553f100")));
    }

    #[test]
    fn test_normalized_keeps_timestamp_and_nulls_gas_price() {
        let now = TimestampMillis::from_millis(1_700_000_000_000);
        let b = block(json!({"number": 5, "timestamp": "0x10"})).normalized(5, now);

        assert_eq!(b.get("timestamp"), Some(&json!("0x10")));
        assert_eq!(b.get("gasPrice"), Some(&Value::Null));
    }

    #[test]
    fn test_serializes_transparently() {
        let b = block(json!({"number": "0x1", "extra": {"nested": true}}));
        let text = serde_json::to_string(&b).unwrap();
        let back: Block = serde_json::from_str(&text).unwrap();
        assert_eq!(back, b);
    }
}
