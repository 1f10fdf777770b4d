// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Geolocation enrichment of validator peers
//!
//! Enrichment is best-effort. The raw peer list is published first; a single
//! batched lookup then resolves every peer IP and the results are merged back
//! by position. A failed lookup leaves the peers unenriched until the next
//! peer-list change.

use std::fmt;

use async_trait::async_trait;

use crate::errors::EnrichmentError;
use crate::types::{GeoLocation, ValidatorPeer};

mod ip_api;

pub use ip_api::IpApiLocator;

/// Resolves IP addresses to locations
#[async_trait]
pub trait GeoLocator: Send + Sync + fmt::Debug {
    /// Looks up every IP in `ips`
    ///
    /// The result is parallel to the input: entry `i` is the location of
    /// `ips[i]`, or `None` when that single lookup failed.
    async fn locate(&self, ips: &[String]) -> Result<Vec<Option<GeoLocation>>, EnrichmentError>;
}

/// Returns a copy of `peers` with `locations` merged in by position
///
/// Peers without a matching location stay unenriched.
pub fn merge_locations(
    peers: &[ValidatorPeer],
    locations: Vec<Option<GeoLocation>>,
) -> Vec<ValidatorPeer> {
    let mut locations = locations.into_iter();
    peers
        .iter()
        .map(|peer| {
            let mut peer = peer.clone();
            if let Some(Some(location)) = locations.next() {
                peer.enrich(location);
            }
            peer
        })
        .collect()
}

/// IPs to query for `peers`, in order
pub fn peer_ips(peers: &[ValidatorPeer]) -> Vec<String> {
    peers.iter().map(|p| p.ip().to_string()).collect()
}
