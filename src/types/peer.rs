// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Validator peer records and their geolocation enrichment

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Geolocation attached to a peer by the enrichment pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoLocation {
    /// Latitude in degrees
    pub lat: f64,
    /// Longitude in degrees
    pub lon: f64,
    /// City name, when the lookup service knows it
    pub city: Option<String>,
    /// Country name, when the lookup service knows it
    pub country: Option<String>,
}

/// A validator peer as reported by the node's peer list
///
/// Peers start out unenriched (`is_real == false`). Geolocation fields are
/// filled in asynchronously and `is_real` flips to `true` only when the
/// lookup for this peer succeeded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatorPeer {
    /// Validator address or public key
    pub address: String,
    /// Network endpoint, `IP:port`
    pub endpoint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lon: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    /// Whether geolocation enrichment succeeded for this peer
    #[serde(default)]
    pub is_real: bool,
}

impl ValidatorPeer {
    /// Creates an unenriched peer
    pub fn new(address: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            endpoint: endpoint.into(),
            lat: None,
            lon: None,
            city: None,
            country: None,
            is_real: false,
        }
    }

    /// Parses one entry of the node's peer list
    ///
    /// The peer-list endpoint is not consistent about field names, so the
    /// address is read from `address`, `validator` or `public_key` and the
    /// endpoint from `ip`, `endpoint` or `socket_addr`. An `address` that is
    /// itself a socket address is taken as the endpoint. A bare string entry is
    /// taken as the endpoint with an empty address.
    pub fn from_raw(value: &Value) -> Option<Self> {
        match value {
            Value::String(endpoint) => Some(Self::new("", endpoint.as_str())),
            Value::Object(obj) => {
                let pick = |keys: &[&str]| {
                    keys.iter()
                        .find_map(|k| obj.get(*k).and_then(Value::as_str))
                        .map(str::to_owned)
                };
                let socket_in_address = obj
                    .get("address")
                    .and_then(Value::as_str)
                    .is_some_and(|a| a.parse::<std::net::SocketAddr>().is_ok());

                if socket_in_address {
                    // {"address": "IP:port", "public_key": ...}
                    let endpoint = pick(&["address"])?;
                    let address = pick(&["validator", "public_key"]).unwrap_or_default();
                    return Some(Self::new(address, endpoint));
                }

                let endpoint = pick(&["ip", "endpoint", "socket_addr"])?;
                let address = pick(&["address", "validator", "public_key"]).unwrap_or_default();
                Some(Self::new(address, endpoint))
            }
            _ => None,
        }
    }

    /// Host part of the endpoint, used as the geolocation query
    pub fn ip(&self) -> &str {
        let endpoint = self.endpoint.as_str();
        if let Some(rest) = endpoint.strip_prefix('[') {
            // [v6]:port
            return rest.split(']').next().unwrap_or(rest);
        }
        match endpoint.rsplit_once(':') {
            Some((host, port)) if !host.contains(':') && port.parse::<u16>().is_ok() => host,
            _ => endpoint,
        }
    }

    /// Attaches a successful lookup result
    pub fn enrich(&mut self, location: GeoLocation) {
        self.lat = Some(location.lat);
        self.lon = Some(location.lon);
        self.city = location.city;
        self.country = location.country;
        self.is_real = true;
    }

    /// The enrichment currently attached, if any
    pub fn location(&self) -> Option<GeoLocation> {
        match (self.lat, self.lon) {
            (Some(lat), Some(lon)) if self.is_real => Some(GeoLocation {
                lat,
                lon,
                city: self.city.clone(),
                country: self.country.clone(),
            }),
            _ => None,
        }
    }

    fn identity(&self) -> (&str, &str) {
        (&self.address, &self.endpoint)
    }
}

/// Compares two peer lists by identity, ignoring order and enrichment
pub(crate) fn same_peer_set(a: &[ValidatorPeer], b: &[ValidatorPeer]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    fn sorted(peers: &[ValidatorPeer]) -> Vec<(&str, &str)> {
        let mut keys: Vec<_> = peers.iter().map(ValidatorPeer::identity).collect();
        keys.sort_unstable();
        keys
    }
    sorted(a) == sorted(b)
}
