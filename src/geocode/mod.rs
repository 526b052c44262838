//! Best-effort reverse geocoding for bookmark records

use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::geodesy::Coordinate;

#[derive(Debug, Deserialize)]
struct ReverseResponse {
    #[serde(default)]
    display_name: String,
}

/// Reverse geocoder against a Nominatim-style endpoint. Failures of any kind
/// yield an empty string; a missing address must never block a recording.
#[derive(Clone)]
pub struct Geocoder {
    client: Client,
    base_url: String,
}

impl Geocoder {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Look up a formatted address for `coord`, or empty string
    pub async fn reverse(&self, coord: Coordinate) -> String {
        let result = self
            .client
            .get(&self.base_url)
            .header("User-Agent", "georecorder/0.1")
            .query(&[
                ("format", "jsonv2".to_string()),
                ("lat", coord.lat.to_string()),
                ("lon", coord.lng.to_string()),
            ])
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => response
                .json::<ReverseResponse>()
                .await
                .map(|r| r.display_name)
                .unwrap_or_default(),
            Ok(response) => {
                debug!(status = %response.status(), "Reverse geocode non-success");
                String::new()
            }
            Err(e) => {
                debug!(error = %e, "Reverse geocode failed");
                String::new()
            }
        }
    }
}
