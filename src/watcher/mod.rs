//! Live pose ownership and change detection
//!
//! The page bridge forwards every pose-change notification from the map
//! widget. The watcher owns the live pose, compares componentwise against
//! the previous one and publishes `position-changed` / `pov-changed`
//! events. Consumers only ever see copies.

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::bus::{events, EventBus};
use crate::geodesy::Coordinate;
use crate::session::GameSession;

/// A coordinate plus viewing heading and pitch, all in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub lat: f64,
    pub lng: f64,
    pub heading: f64,
    pub pitch: f64,
}

impl Pose {
    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.lat, self.lng)
    }
}

/// Watches raw pose notifications and emits change events
pub struct PositionWatcher {
    bus: EventBus,
    live: Option<Pose>,
}

impl PositionWatcher {
    pub fn new(bus: EventBus) -> Self {
        Self { bus, live: None }
    }

    /// Snapshot of the current live pose
    pub fn pose(&self) -> Option<Pose> {
        self.live
    }

    /// Process one raw pose notification.
    ///
    /// Comparison is exact: the widget only notifies on real changes, so an
    /// epsilon would be redundant. The first notification emits both events.
    pub fn observe(&mut self, raw: Pose, session: Option<&GameSession>) {
        let previous = self.live;
        self.live = Some(raw);

        let position_changed =
            previous.map_or(true, |prev| prev.lat != raw.lat || prev.lng != raw.lng);
        let pov_changed =
            previous.map_or(true, |prev| prev.heading != raw.heading || prev.pitch != raw.pitch);

        if position_changed {
            self.bus
                .emit(events::POSITION_CHANGED, pose_payload(&raw, session));
        }
        if pov_changed {
            self.bus.emit(events::POV_CHANGED, pose_payload(&raw, session));
        }
    }
}

fn pose_payload(pose: &Pose, session: Option<&GameSession>) -> serde_json::Value {
    json!({
        "pose": pose,
        "session": session,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    fn collect(bus: &EventBus, name: &'static str) -> Arc<Mutex<Vec<serde_json::Value>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        bus.on(name, move |env| sink.lock().push(env.payload.clone()));
        seen
    }

    fn pose(lat: f64, lng: f64, heading: f64, pitch: f64) -> Pose {
        Pose { lat, lng, heading, pitch }
    }

    #[test]
    fn first_notification_emits_both_events() {
        let bus = EventBus::new();
        let positions = collect(&bus, events::POSITION_CHANGED);
        let povs = collect(&bus, events::POV_CHANGED);
        let mut watcher = PositionWatcher::new(bus);

        watcher.observe(pose(10.0, 20.0, 90.0, 0.0), None);

        assert_eq!(positions.lock().len(), 1);
        assert_eq!(povs.lock().len(), 1);
    }

    #[test]
    fn pure_rotation_only_emits_pov_changed() {
        let bus = EventBus::new();
        let positions = collect(&bus, events::POSITION_CHANGED);
        let povs = collect(&bus, events::POV_CHANGED);
        let mut watcher = PositionWatcher::new(bus);

        watcher.observe(pose(10.0, 20.0, 90.0, 0.0), None);
        watcher.observe(pose(10.0, 20.0, 135.0, -5.0), None);

        assert_eq!(positions.lock().len(), 1);
        assert_eq!(povs.lock().len(), 2);
    }

    #[test]
    fn pure_movement_only_emits_position_changed() {
        let bus = EventBus::new();
        let positions = collect(&bus, events::POSITION_CHANGED);
        let povs = collect(&bus, events::POV_CHANGED);
        let mut watcher = PositionWatcher::new(bus);

        watcher.observe(pose(10.0, 20.0, 90.0, 0.0), None);
        watcher.observe(pose(10.001, 20.0, 90.0, 0.0), None);

        assert_eq!(positions.lock().len(), 2);
        assert_eq!(povs.lock().len(), 1);
    }

    #[test]
    fn identical_notification_emits_nothing() {
        let bus = EventBus::new();
        let positions = collect(&bus, events::POSITION_CHANGED);
        let povs = collect(&bus, events::POV_CHANGED);
        let mut watcher = PositionWatcher::new(bus);

        watcher.observe(pose(10.0, 20.0, 90.0, 0.0), None);
        watcher.observe(pose(10.0, 20.0, 90.0, 0.0), None);

        assert_eq!(positions.lock().len(), 1);
        assert_eq!(povs.lock().len(), 1);
        assert_eq!(watcher.pose(), Some(pose(10.0, 20.0, 90.0, 0.0)));
    }

    #[test]
    fn payload_carries_pose_and_session() {
        let bus = EventBus::new();
        let positions = collect(&bus, events::POSITION_CHANGED);
        let mut watcher = PositionWatcher::new(bus);

        let session: GameSession = serde_json::from_value(serde_json::json!({
            "token": "abc", "player": {"nick": "theyak"}
        }))
        .unwrap();
        watcher.observe(pose(10.0, 20.0, 90.0, 0.0), Some(&session));

        let positions = positions.lock();
        assert_eq!(positions[0]["pose"]["lat"], 10.0);
        assert_eq!(positions[0]["session"]["token"], "abc");
    }
}
