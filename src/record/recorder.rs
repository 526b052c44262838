//! Maps bus events to best-effort persistence calls
//!
//! Every outbound call is a detached task: a slow or failed call is
//! abandoned without retry and never blocks signal processing. The geofence
//! append happens synchronously before the task is spawned, so overlapping
//! in-flight calls still record at most once per region.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::bus::{events, EventBus};
use crate::geocode::Geocoder;
use crate::geofence::Geofence;
use crate::record::client::{GameSummary, PositionRecord, RecordKind, RecorderClient};
use crate::session::GameSession;
use crate::watcher::Pose;

#[derive(Deserialize)]
struct PositionEventPayload {
    pose: Pose,
    session: Option<GameSession>,
}

/// Consumes reconciled events and geofenced positions, issuing recording
/// calls. Without a user token there is no client and every recording
/// function short-circuits; tracking and teleport are unaffected.
pub struct Recorder {
    client: Option<RecorderClient>,
    geocoder: Geocoder,
    travel_radius_m: f64,
    bookmark_radius_m: f64,
    travel_fence: Mutex<Geofence>,
    bookmark_fence: Mutex<Geofence>,
}

impl Recorder {
    pub fn new(
        client: Option<RecorderClient>,
        geocoder: Geocoder,
        travel_radius_m: f64,
        bookmark_radius_m: f64,
    ) -> Self {
        Self {
            client,
            geocoder,
            travel_radius_m,
            bookmark_radius_m,
            travel_fence: Mutex::new(Geofence::new()),
            bookmark_fence: Mutex::new(Geofence::new()),
        }
    }

    /// Subscribe to the events this recorder persists
    pub fn register(self: &Arc<Self>, bus: &EventBus) {
        let recorder = Arc::clone(self);
        bus.on(events::POSITION_CHANGED, move |env| {
            recorder.on_position(&env.payload);
        });

        let recorder = Arc::clone(self);
        bus.on(events::GAME_END, move |env| {
            recorder.on_game_end(&env.payload);
        });
    }

    fn on_position(&self, payload: &Value) {
        let Some(client) = &self.client else {
            return;
        };

        let event: PositionEventPayload = match serde_json::from_value(payload.clone()) {
            Ok(event) => event,
            Err(e) => {
                warn!(error = %e, "Malformed position event payload");
                return;
            }
        };
        let Some(session) = event.session else {
            debug!("Position change outside a session, not recording");
            return;
        };

        // Synchronous append-or-reject before anything asynchronous runs
        if !self
            .travel_fence
            .lock()
            .should_record(event.pose.coordinate(), self.travel_radius_m)
        {
            return;
        }

        let record = position_record(client.token(), RecordKind::Travel, &event.pose, &session, None);
        let client = client.clone();
        tokio::spawn(async move {
            if let Err(e) = client.record_position(&record).await {
                warn!(error = %e, "Travel record dropped");
            }
        });
    }

    fn on_game_end(&self, payload: &Value) {
        let Some(client) = &self.client else {
            return;
        };

        let session: GameSession = match serde_json::from_value(payload.clone()) {
            Ok(session) => session,
            Err(e) => {
                warn!(error = %e, "Malformed game-end payload");
                return;
            }
        };

        let summary = GameSummary::from_session(client.token(), &session);
        let client = client.clone();
        tokio::spawn(async move {
            if let Err(e) = client.record_game(&summary).await {
                warn!(error = %e, "Game summary dropped");
            }
        });
    }

    /// Record an explicit bookmark at `pose`. Returns whether a record was
    /// queued, which drives the confirmation flash.
    pub fn bookmark(&self, pose: Pose, session: Option<&GameSession>) -> bool {
        let Some(client) = &self.client else {
            return false;
        };
        let Some(session) = session else {
            debug!("Bookmark outside a session, not recording");
            return false;
        };

        if !self
            .bookmark_fence
            .lock()
            .should_record(pose.coordinate(), self.bookmark_radius_m)
        {
            return false;
        }

        let mut record =
            position_record(client.token(), RecordKind::Bookmark, &pose, session, None);
        let client = client.clone();
        let geocoder = self.geocoder.clone();
        tokio::spawn(async move {
            let address = geocoder.reverse(record_coordinate(&record)).await;
            if !address.is_empty() {
                record.location = Some(address);
            }
            if let Err(e) = client.record_position(&record).await {
                warn!(error = %e, "Bookmark record dropped");
            }
        });

        true
    }
}

fn position_record(
    token: &str,
    kind: RecordKind,
    pose: &Pose,
    session: &GameSession,
    location: Option<String>,
) -> PositionRecord {
    PositionRecord {
        token: token.to_string(),
        kind,
        game: session.token.clone(),
        round: session.round,
        map: session.map.clone(),
        nick: session.player.nick.clone(),
        lat: pose.lat,
        lng: pose.lng,
        heading: pose.heading,
        pitch: pose.pitch,
        location,
    }
}

fn record_coordinate(record: &PositionRecord) -> crate::geodesy::Coordinate {
    crate::geodesy::Coordinate::new(record.lat, record.lng)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn recorder(with_client: bool) -> Recorder {
        let client =
            with_client.then(|| RecorderClient::new("http://127.0.0.1:9/api", "secret"));
        Recorder::new(client, Geocoder::new("http://127.0.0.1:9/reverse"), 50.0, 10.0)
    }

    fn pose(lat: f64, lng: f64) -> Pose {
        Pose { lat, lng, heading: 0.0, pitch: 0.0 }
    }

    fn session() -> GameSession {
        serde_json::from_value(json!({
            "token": "abc", "round": 1, "map": "world",
            "player": {"id": "u1", "nick": "theyak"}
        }))
        .unwrap()
    }

    fn position_payload(lat: f64, lng: f64) -> Value {
        json!({"pose": pose(lat, lng), "session": session()})
    }

    #[tokio::test]
    async fn positions_are_geofenced_before_dispatch() {
        let rec = recorder(true);

        rec.on_position(&position_payload(40.0, -74.0));
        assert_eq!(rec.travel_fence.lock().len(), 1);

        // ~13 m away, inside the travel radius: no new region
        rec.on_position(&position_payload(40.0001, -74.0001));
        assert_eq!(rec.travel_fence.lock().len(), 1);

        // ~10 km away: new region
        rec.on_position(&position_payload(40.09, -74.0));
        assert_eq!(rec.travel_fence.lock().len(), 2);
    }

    #[tokio::test]
    async fn missing_token_disables_recording() {
        let rec = recorder(false);

        rec.on_position(&position_payload(40.0, -74.0));
        assert!(rec.travel_fence.lock().is_empty());

        assert!(!rec.bookmark(pose(40.0, -74.0), Some(&session())));
        assert!(rec.bookmark_fence.lock().is_empty());
    }

    #[tokio::test]
    async fn position_without_session_is_not_recorded() {
        let rec = recorder(true);
        rec.on_position(&json!({"pose": pose(40.0, -74.0), "session": null}));
        assert!(rec.travel_fence.lock().is_empty());
    }

    #[tokio::test]
    async fn duplicate_bookmark_is_suppressed() {
        let rec = recorder(true);
        let s = session();

        assert!(rec.bookmark(pose(40.0, -74.0), Some(&s)));
        assert!(!rec.bookmark(pose(40.0, -74.0), Some(&s)));
        assert_eq!(rec.bookmark_fence.lock().len(), 1);

        // Bookmarks use their own tighter fence, independent of travel
        assert!(rec.travel_fence.lock().is_empty());
    }

    #[tokio::test]
    async fn bookmark_without_session_is_refused() {
        let rec = recorder(true);
        assert!(!rec.bookmark(pose(40.0, -74.0), None));
    }
}
