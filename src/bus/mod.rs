//! Minimal synchronous publish/subscribe bus
//!
//! Every other component talks through this: the reconciler and watcher
//! publish semantic events, the recorder and the status overlay forwarder
//! subscribe. Dispatch is synchronous and re-entrant; envelopes are
//! fire-and-forget.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tracing::warn;

/// Event names published by the core components
pub mod events {
    pub const ROUND_START: &str = "round-start";
    pub const ROUND_END: &str = "round-end";
    pub const GAME_END: &str = "game-end";
    pub const POSITION_CHANGED: &str = "position-changed";
    pub const POV_CHANGED: &str = "pov-changed";
}

/// Reserved name receiving events that had no listener of their own
pub const UNHANDLED: &str = "unhandled";
/// Reserved wildcard name receiving every event in addition to its own listeners
pub const ANY: &str = "any";

/// A named event with its JSON payload
#[derive(Debug, Clone)]
pub struct EventEnvelope {
    pub name: String,
    pub payload: Value,
}

/// Token identifying a registered listener, used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerId(u64);

type Listener = Arc<dyn Fn(&EventEnvelope) + Send + Sync>;

/// Publish/subscribe bus with registration-order synchronous dispatch
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

#[derive(Default)]
struct BusInner {
    listeners: Mutex<HashMap<String, Vec<(ListenerId, Listener)>>>,
    next_id: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener for `name`. Listeners for one name run in
    /// registration order.
    pub fn on<F>(&self, name: &str, listener: F) -> ListenerId
    where
        F: Fn(&EventEnvelope) + Send + Sync + 'static,
    {
        let id = ListenerId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        self.inner
            .listeners
            .lock()
            .entry(name.to_string())
            .or_default()
            .push((id, Arc::new(listener)));
        id
    }

    /// Remove a previously registered listener. Returns whether it was found.
    pub fn off(&self, name: &str, id: ListenerId) -> bool {
        let mut listeners = self.inner.listeners.lock();
        if let Some(entries) = listeners.get_mut(name) {
            let before = entries.len();
            entries.retain(|(entry_id, _)| *entry_id != id);
            return entries.len() < before;
        }
        false
    }

    /// Dispatch `payload` to all listeners registered for `name`.
    ///
    /// When no listener is registered for the name itself, listeners on
    /// [`UNHANDLED`] receive the envelope instead. Listeners on [`ANY`]
    /// always additionally run. The listener table lock is released before
    /// dispatch, so a listener may itself call `emit`.
    pub fn emit(&self, name: &str, payload: Value) {
        let envelope = EventEnvelope {
            name: name.to_string(),
            payload,
        };

        let (direct, wildcard) = {
            let listeners = self.inner.listeners.lock();
            let direct: Vec<Listener> = match listeners.get(name) {
                Some(entries) if !entries.is_empty() => {
                    entries.iter().map(|(_, l)| l.clone()).collect()
                }
                _ => listeners
                    .get(UNHANDLED)
                    .map(|entries| entries.iter().map(|(_, l)| l.clone()).collect())
                    .unwrap_or_default(),
            };
            let wildcard: Vec<Listener> = listeners
                .get(ANY)
                .map(|entries| entries.iter().map(|(_, l)| l.clone()).collect())
                .unwrap_or_default();
            (direct, wildcard)
        };

        for listener in direct.iter().chain(wildcard.iter()) {
            if catch_unwind(AssertUnwindSafe(|| listener(&envelope))).is_err() {
                warn!(event = %envelope.name, "Event listener panicked");
            }
        }
    }
}
