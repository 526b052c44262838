//! Simulated-movement feature: distance ladder and teleportation

use std::future::Future;

use serde::Deserialize;
use tracing::debug;

use crate::geodesy::{destination_point, Coordinate};
use crate::watcher::Pose;

/// Preset teleport distances in meters, ascending
pub const DISTANCE_LADDER: [f64; 9] = [25.0, 50.0, 75.0, 100.0, 150.0, 200.0, 250.0, 500.0, 1000.0];

/// Capability for snapping an arbitrary coordinate to the nearest real,
/// navigable street-level imagery point.
pub trait PanoramaLocator: Send + Sync {
    fn nearest_panorama(
        &self,
        target: Coordinate,
        radius_m: f64,
    ) -> impl Future<Output = Result<Option<Coordinate>, LocatorError>> + Send;
}

#[derive(Debug, thiserror::Error)]
pub enum LocatorError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),
}

/// Computes teleport destinations and asks the panorama lookup to land on
/// real imagery. Pitch is never altered by movement; the original heading is
/// restored on the resulting pose.
pub struct Navigator<L> {
    locator: L,
    search_radius_m: f64,
    ladder_index: usize,
}

impl<L: PanoramaLocator> Navigator<L> {
    pub fn new(locator: L, search_radius_m: f64) -> Self {
        Self {
            locator,
            search_radius_m,
            // Start mid-ladder at 100 m
            ladder_index: 3,
        }
    }

    /// Currently selected teleport distance in meters
    pub fn distance(&self) -> f64 {
        DISTANCE_LADDER[self.ladder_index]
    }

    /// Step up the ladder, clamping at the top. Returns the new distance.
    pub fn increase_distance(&mut self) -> f64 {
        if self.ladder_index + 1 < DISTANCE_LADDER.len() {
            self.ladder_index += 1;
        }
        self.distance()
    }

    /// Step down the ladder, clamping at the bottom. Returns the new distance.
    pub fn decrease_distance(&mut self) -> f64 {
        self.ladder_index = self.ladder_index.saturating_sub(1);
        self.distance()
    }

    /// Project a destination `distance_m` meters ahead of (or behind) the
    /// current pose and snap it to the nearest panorama. Returns the new pose
    /// with the original heading and pitch, or `None` when no panorama is
    /// near the destination — an accepted quiet miss, not an error.
    pub async fn teleport(
        &self,
        pose: Pose,
        distance_m: f64,
        backwards: bool,
    ) -> Result<Option<Pose>, LocatorError> {
        let heading = if backwards {
            (pose.heading + 180.0) % 360.0
        } else {
            pose.heading
        };
        let target = destination_point(pose.coordinate(), distance_m, heading);

        match self
            .locator
            .nearest_panorama(target, self.search_radius_m)
            .await?
        {
            Some(found) => Ok(Some(Pose {
                lat: found.lat,
                lng: found.lng,
                heading: pose.heading,
                pitch: pose.pitch,
            })),
            None => {
                debug!(lat = target.lat, lng = target.lng, "No panorama near destination");
                Ok(None)
            }
        }
    }
}

/// Panorama lookup against the street-view metadata endpoint. Without an API
/// key every lookup is a miss, which disables teleport but nothing else.
#[derive(Clone)]
pub struct StreetViewLocator {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MetadataResponse {
    status: String,
    location: Option<MetadataLocation>,
}

#[derive(Debug, Deserialize)]
struct MetadataLocation {
    lat: f64,
    lng: f64,
}

impl StreetViewLocator {
    pub fn new(base_url: &str, api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }
}

impl PanoramaLocator for StreetViewLocator {
    async fn nearest_panorama(
        &self,
        target: Coordinate,
        radius_m: f64,
    ) -> Result<Option<Coordinate>, LocatorError> {
        let Some(key) = &self.api_key else {
            return Ok(None);
        };

        let response: MetadataResponse = self
            .client
            .get(&self.base_url)
            .query(&[
                ("location", format!("{},{}", target.lat, target.lng)),
                ("radius", format!("{}", radius_m as u32)),
                ("source", "outdoor".to_string()),
                ("key", key.clone()),
            ])
            .send()
            .await?
            .json()
            .await?;

        if response.status != "OK" {
            return Ok(None);
        }

        Ok(response
            .location
            .map(|loc| Coordinate::new(loc.lat, loc.lng)))
    }
}
