//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Base URL of the recording API
    pub recorder_api_url: String,
    /// Opaque user credential; absent disables all recording calls
    pub recorder_api_token: Option<String>,

    /// Reverse-geocoding endpoint
    pub geocoder_url: String,

    /// Street-view metadata endpoint for panorama lookups
    pub streetview_metadata_url: String,
    /// API key for panorama lookups; absent disables teleport
    pub streetview_api_key: Option<String>,

    /// Geofence radius for the travel trail, in meters
    pub travel_radius_m: f64,
    /// Geofence radius for bookmark duplicate suppression, in meters
    pub bookmark_radius_m: f64,
    /// Search radius handed to the panorama lookup, in meters
    pub pano_search_radius_m: f64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Hosted deployments provide PORT, fall back to SERVER_ADDR or default
        let server_addr = if let Ok(port) = env::var("PORT") {
            format!("0.0.0.0:{}", port)
        } else {
            env::var("SERVER_ADDR").unwrap_or_else(|_| "127.0.0.1:8787".to_string())
        };

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,

            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),

            recorder_api_url: env::var("RECORDER_API_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:8788/api".to_string()),
            recorder_api_token: env::var("RECORDER_API_TOKEN").ok(),

            geocoder_url: env::var("GEOCODER_URL")
                .unwrap_or_else(|_| "https://nominatim.openstreetmap.org/reverse".to_string()),

            streetview_metadata_url: env::var("STREETVIEW_METADATA_URL").unwrap_or_else(|_| {
                "https://maps.googleapis.com/maps/api/streetview/metadata".to_string()
            }),
            streetview_api_key: env::var("STREETVIEW_API_KEY").ok(),

            travel_radius_m: parse_radius("TRAVEL_RADIUS_M", 50.0)?,
            bookmark_radius_m: parse_radius("BOOKMARK_RADIUS_M", 10.0)?,
            pano_search_radius_m: parse_radius("PANO_SEARCH_RADIUS_M", 1000.0)?,
        })
    }

    #[cfg(test)]
    pub fn for_tests() -> Self {
        Self {
            server_addr: "127.0.0.1:0".parse().unwrap(),
            log_level: "debug".to_string(),
            recorder_api_url: "http://127.0.0.1:9/api".to_string(),
            recorder_api_token: Some("test-token".to_string()),
            geocoder_url: "http://127.0.0.1:9/reverse".to_string(),
            streetview_metadata_url: "http://127.0.0.1:9/metadata".to_string(),
            streetview_api_key: None,
            travel_radius_m: 50.0,
            bookmark_radius_m: 10.0,
            pano_search_radius_m: 1000.0,
        }
    }
}

fn parse_radius(key: &'static str, default: f64) -> Result<f64, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw.parse().map_err(|_| ConfigError::InvalidNumber(key)),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid server address format")]
    InvalidAddress,

    #[error("Invalid numeric value for {0}")]
    InvalidNumber(&'static str),
}
