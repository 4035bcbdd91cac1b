//! Geocoding enrichment
//!
//! Resolves a synthesized location string to coordinates and address
//! components. Strictly best-effort: any failure is logged and the record is
//! persisted without coordinates.

use crate::config::GeocodeConfig;
use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddressComponent {
    pub long_name: String,
    pub short_name: String,
    #[serde(default)]
    pub types: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, Deserialize)]
struct Geometry {
    location: LatLng,
}

#[derive(Debug, Clone, Deserialize)]
struct GeocodeResult {
    geometry: Geometry,
    #[serde(default)]
    address_components: Vec<AddressComponent>,
    #[serde(default)]
    formatted_address: String,
    #[serde(default)]
    place_id: String,
}

#[derive(Debug, Deserialize)]
struct GeocodeWire {
    #[serde(default)]
    status: String,
    #[serde(default)]
    results: Vec<GeocodeResult>,
}

/// A resolved place
#[derive(Debug, Clone, Serialize)]
pub struct GeocodedPlace {
    pub location: LatLng,
    pub address_components: Vec<AddressComponent>,
    pub formatted_address: String,
    pub place_id: String,
}

/// Client for the geocoding service
pub struct GeocodeClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl GeocodeClient {
    pub fn new(config: &GeocodeConfig) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| AppError::Config(format!("geocode HTTP client build failed: {e}")))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    /// Resolve an address; `None` on any failure
    pub async fn lookup(&self, address: &str) -> Option<GeocodedPlace> {
        let mut query: Vec<(&str, &str)> = vec![("address", address)];
        if let Some(ref key) = self.api_key {
            query.push(("key", key));
        }

        let response = self
            .http
            .get(format!("{}/geocode/json", self.base_url))
            .query(&query)
            .send()
            .await;

        let response = match response {
            Ok(r) if r.status().is_success() => r,
            Ok(r) => {
                tracing::warn!(address = %address, status = %r.status(), "Geocode lookup failed");
                return None;
            }
            Err(e) => {
                tracing::warn!(address = %address, error = %e, "Geocode request failed");
                return None;
            }
        };

        let wire: GeocodeWire = match response.json().await {
            Ok(w) => w,
            Err(e) => {
                tracing::warn!(address = %address, error = %e, "Geocode response unparseable");
                return None;
            }
        };

        if wire.status != "OK" {
            tracing::warn!(address = %address, status = %wire.status, "Geocode returned non-OK status");
            return None;
        }

        wire.results.into_iter().next().map(|r| GeocodedPlace {
            location: r.geometry.location,
            address_components: r.address_components,
            formatted_address: r.formatted_address,
            place_id: r.place_id,
        })
    }
}
