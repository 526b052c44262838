//! WebSocket protocol between the page bridge and this service
//!
//! The bridge userscript is a dumb pipe: it forwards raw browser signals
//! inbound and applies view commands outbound. All derivation happens here.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::session::reconciler::DomMarker;

/// Raw signals forwarded by the page bridge
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// An intercepted outbound network call, observed post-response.
    /// The response delivered to the page itself is never altered.
    NetworkCapture {
        url: String,
        method: String,
        #[serde(default)]
        body: Value,
    },

    /// A watched marker element appeared in the page DOM
    DomMarker {
        marker: DomMarker,
        /// Inline `__NEXT_DATA__` payload, captured alongside the
        /// panorama-controls marker for post-refresh recovery
        #[serde(default)]
        next_data: Option<String>,
    },

    /// The map widget notified a pose change
    PoseNotify {
        lat: f64,
        lng: f64,
        heading: f64,
        pitch: f64,
    },

    /// The page navigated to a new path
    RouteChange {
        path: String,
    },

    /// A bound hotkey was pressed
    Hotkey {
        action: HotkeyAction,
    },

    /// Ping for liveness
    Ping {
        t: u64,
    },
}

/// Hotkey actions the bridge forwards
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HotkeyAction {
    TeleportForward,
    TeleportBackward,
    IncreaseDistance,
    DecreaseDistance,
    Bookmark,
}

/// Commands and status messages sent back to the page bridge
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Sent once after connect
    Welcome {
        connection_id: Uuid,
        server_time: u64,
    },

    /// A derived semantic event, mirrored for the status overlay
    Event {
        name: String,
        payload: Value,
    },

    /// Move the live view to this pose
    SetView {
        lat: f64,
        lng: f64,
        heading: f64,
        pitch: f64,
    },

    /// Update the teleport-distance indicator
    DistanceIndicator {
        meters: f64,
    },

    /// Flash the bookmark confirmation
    BookmarkSaved {
        lat: f64,
        lng: f64,
    },

    /// Pong response
    Pong {
        t: u64,
    },
}
