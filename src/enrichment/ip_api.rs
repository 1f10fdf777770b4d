// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! [`GeoLocator`] backed by the ip-api.com batch endpoint

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use super::GeoLocator;
use crate::config::constants::endpoints::GEO_FIELDS;
use crate::errors::EnrichmentError;
use crate::types::GeoLocation;

/// Largest batch the service accepts per request
const MAX_BATCH: usize = 100;

#[derive(Debug, Serialize)]
struct BatchQuery<'a> {
    query: &'a str,
    fields: &'static str,
}

#[derive(Debug, Deserialize)]
struct BatchEntry {
    status: String,
    #[serde(default)]
    country: Option<String>,
    #[serde(default)]
    city: Option<String>,
    #[serde(default)]
    lat: Option<f64>,
    #[serde(default)]
    lon: Option<f64>,
}

impl BatchEntry {
    fn into_location(self) -> Option<GeoLocation> {
        if self.status != "success" {
            return None;
        }
        Some(GeoLocation {
            lat: self.lat?,
            lon: self.lon?,
            city: self.city,
            country: self.country,
        })
    }
}

/// Posts `[{query, fields}, ...]` to the batch endpoint
///
/// Inputs longer than the service's batch limit are split into several
/// requests; the results are concatenated in order.
#[derive(Debug, Clone)]
pub struct IpApiLocator {
    client: reqwest::Client,
    url: Url,
    timeout: Duration,
}

impl IpApiLocator {
    pub fn new(url: Url, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            url,
            timeout,
        }
    }

    async fn locate_batch(
        &self,
        ips: &[String],
    ) -> Result<Vec<Option<GeoLocation>>, EnrichmentError> {
        let body: Vec<BatchQuery<'_>> = ips
            .iter()
            .map(|ip| BatchQuery {
                query: ip,
                fields: GEO_FIELDS,
            })
            .collect();

        let response = self
            .client
            .post(self.url.clone())
            .json(&body)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(EnrichmentError::request)?;

        let status = response.status();
        if !status.is_success() {
            return Err(EnrichmentError::Status {
                status: status.as_u16(),
            });
        }

        let entries: Vec<BatchEntry> = response.json().await.map_err(EnrichmentError::request)?;
        parse_batch(ips.len(), entries)
    }
}

fn parse_batch(
    expected: usize,
    entries: Vec<BatchEntry>,
) -> Result<Vec<Option<GeoLocation>>, EnrichmentError> {
    if entries.len() != expected {
        return Err(EnrichmentError::invalid_response(format!(
            "{} results for {expected} queries",
            entries.len()
        )));
    }
    Ok(entries.into_iter().map(BatchEntry::into_location).collect())
}

#[async_trait]
impl GeoLocator for IpApiLocator {
    async fn locate(&self, ips: &[String]) -> Result<Vec<Option<GeoLocation>>, EnrichmentError> {
        let mut locations = Vec::with_capacity(ips.len());
        for chunk in ips.chunks(MAX_BATCH) {
            locations.extend(self.locate_batch(chunk).await?);
        }

        debug!(
            queried = ips.len(),
            resolved = locations.iter().filter(|l| l.is_some()).count(),
            "Geolocation batch complete"
        );
        Ok(locations)
    }
}
