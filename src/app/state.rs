//! Application state shared across connections

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::config::Config;
use crate::geocode::Geocoder;
use crate::record::RecorderClient;

/// Shared application state. Per-page engines are built from this on each
/// WebSocket connection; only the HTTP collaborators are shared.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    /// Present only when a user token is configured
    pub recorder_client: Option<RecorderClient>,
    pub geocoder: Geocoder,
    connections: Arc<AtomicUsize>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let config = Arc::new(config);

        let recorder_client = config
            .recorder_api_token
            .as_deref()
            .map(|token| RecorderClient::new(&config.recorder_api_url, token));

        let geocoder = Geocoder::new(&config.geocoder_url);

        Self {
            config,
            recorder_client,
            geocoder,
            connections: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn connection_opened(&self) {
        self.connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn active_connections(&self) -> usize {
        self.connections.load(Ordering::Relaxed)
    }
}
