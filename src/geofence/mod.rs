//! Radius-based "already visited nearby" suppression

use crate::geodesy::{bounding_box_contains, Coordinate};

/// Append-only history of visited coordinates with a radius test deciding
/// whether a new position is worth reporting.
///
/// History lives for one page-load session and is never pruned. With the
/// default 50 m travel radius a multi-hour session stays small, so unbounded
/// growth is an accepted tradeoff.
#[derive(Debug, Default)]
pub struct Geofence {
    history: Vec<Coordinate>,
}

impl Geofence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decide whether `point` should be recorded. Returns `false` and leaves
    /// history untouched when the point is within `radius_m` of any entry;
    /// otherwise appends it and returns `true`.
    ///
    /// The append is synchronous: callers must consult this before
    /// dispatching any asynchronous recording call so that overlapping
    /// in-flight calls still record at most once per region.
    pub fn should_record(&mut self, point: Coordinate, radius_m: f64) -> bool {
        if bounding_box_contains(&self.history, point, radius_m) {
            return false;
        }
        self.history.push(point);
        true
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }
}
