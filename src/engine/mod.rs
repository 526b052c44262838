//! Per-connection event-derivation engine
//!
//! One engine serves one page load: it owns the bus, the reconciler, the
//! watcher, the navigator and the recorder for that page, and processes the
//! bridge's signals strictly in arrival order. The only suspension points
//! are network-bound (panorama lookup, detached recording calls), so no
//! locking is needed across signals.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::warn;

use crate::app::AppState;
use crate::bus::{EventBus, ANY};
use crate::navigate::{Navigator, StreetViewLocator};
use crate::record::Recorder;
use crate::session::SessionReconciler;
use crate::watcher::{Pose, PositionWatcher};
use crate::ws::protocol::{ClientMsg, HotkeyAction, ServerMsg};

pub struct Engine {
    reconciler: SessionReconciler,
    watcher: PositionWatcher,
    navigator: Navigator<StreetViewLocator>,
    recorder: Arc<Recorder>,
    outbound: mpsc::UnboundedSender<ServerMsg>,
}

impl Engine {
    pub fn new(state: &AppState, outbound: mpsc::UnboundedSender<ServerMsg>) -> Self {
        let bus = EventBus::new();

        let recorder = Arc::new(Recorder::new(
            state.recorder_client.clone(),
            state.geocoder.clone(),
            state.config.travel_radius_m,
            state.config.bookmark_radius_m,
        ));
        recorder.register(&bus);

        // Mirror every derived event to the page's status overlay
        let mirror = outbound.clone();
        bus.on(ANY, move |env| {
            let _ = mirror.send(ServerMsg::Event {
                name: env.name.clone(),
                payload: env.payload.clone(),
            });
        });

        let locator = StreetViewLocator::new(
            &state.config.streetview_metadata_url,
            state.config.streetview_api_key.clone(),
        );

        Self {
            reconciler: SessionReconciler::new(bus.clone()),
            watcher: PositionWatcher::new(bus),
            navigator: Navigator::new(locator, state.config.pano_search_radius_m),
            recorder,
            outbound,
        }
    }

    /// Process one signal from the page bridge
    pub async fn handle(&mut self, msg: ClientMsg) {
        match msg {
            ClientMsg::NetworkCapture { url, method, body } => {
                self.reconciler.observe_network(&url, &method, &body);
            }
            ClientMsg::DomMarker { marker, next_data } => {
                self.reconciler.observe_dom_marker(marker, next_data.as_deref());
            }
            ClientMsg::PoseNotify { lat, lng, heading, pitch } => {
                let pose = Pose { lat, lng, heading, pitch };
                self.watcher.observe(pose, self.reconciler.session());
            }
            ClientMsg::RouteChange { path } => {
                self.reconciler.observe_route(&path);
            }
            ClientMsg::Hotkey { action } => self.handle_hotkey(action).await,
            ClientMsg::Ping { t } => {
                self.send(ServerMsg::Pong { t });
            }
        }
    }

    async fn handle_hotkey(&mut self, action: HotkeyAction) {
        match action {
            HotkeyAction::IncreaseDistance => {
                let meters = self.navigator.increase_distance();
                self.send(ServerMsg::DistanceIndicator { meters });
            }
            HotkeyAction::DecreaseDistance => {
                let meters = self.navigator.decrease_distance();
                self.send(ServerMsg::DistanceIndicator { meters });
            }
            HotkeyAction::TeleportForward => self.teleport(false).await,
            HotkeyAction::TeleportBackward => self.teleport(true).await,
            HotkeyAction::Bookmark => {
                let Some(pose) = self.watcher.pose() else {
                    return;
                };
                if self.recorder.bookmark(pose, self.reconciler.session()) {
                    self.send(ServerMsg::BookmarkSaved { lat: pose.lat, lng: pose.lng });
                }
            }
        }
    }

    async fn teleport(&mut self, backwards: bool) {
        let Some(pose) = self.watcher.pose() else {
            return;
        };

        match self
            .navigator
            .teleport(pose, self.navigator.distance(), backwards)
            .await
        {
            Ok(Some(dest)) => {
                self.send(ServerMsg::SetView {
                    lat: dest.lat,
                    lng: dest.lng,
                    heading: dest.heading,
                    pitch: dest.pitch,
                });
            }
            // Quiet miss: no panorama near the destination, view stays put
            Ok(None) => {}
            Err(e) => {
                warn!(error = %e, "Panorama lookup failed");
            }
        }
    }

    fn send(&self, msg: ServerMsg) {
        // Receiver gone means the connection is closing; nothing to do
        let _ = self.outbound.send(msg);
    }
}
