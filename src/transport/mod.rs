// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Streaming transport and RPC middleware.
//!
//! - [`SubscriptionTransport`] keeps one supervised WebSocket connection open
//!   and hands heads and pending transaction hashes to a [`FeedHandler`]
//! - [`frame::classify`] decides what every inbound frame is
//! - [`Backoff`] and [`ReconnectPolicy`] drive reconnection
//! - [`LoggingLayer`] traces the HTTP JSON-RPC client used by
//!   [`HttpNodeClient`](crate::node::HttpNodeClient)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use blockfeed::transport::{ReconnectPolicy, SubscriptionTransport};
//! use std::time::Duration;
//!
//! let transport = SubscriptionTransport::new(
//!     "ws://localhost:8546".parse()?,
//!     ReconnectPolicy::default(),
//!     Duration::from_secs(8),
//! );
//! let handle = transport.spawn(handler, cancel.clone());
//! ```

mod backoff;
pub mod frame;
mod logging;
mod subscription;

pub use backoff::{Backoff, ConnectionState, ReconnectPolicy};
pub use frame::InboundFrame;
pub use logging::{LoggingLayer, LoggingService};
pub use subscription::{new_connection_id, FeedHandler, SubscriptionTransport};
