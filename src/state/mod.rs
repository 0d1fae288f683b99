//! Shared station state and the events it broadcasts.

/// Typed broadcast hub with cancellable subscriptions.
pub mod hub;
/// Match lifecycle, clock and scoring gate.
pub mod match_machine;
/// Channels, players and groups.
pub mod roster;

use std::sync::Arc;

use serde::Serialize;
use tokio::{
    sync::{Mutex, RwLock, watch},
    task::JoinHandle,
};
use utoipa::ToSchema;

use crate::{
    config::StationConfig,
    device::{DeviceStatus, detector::KickDetector, detector::KickEvent, serial::SerialWriter},
    sync::queue::OfflineQueue,
};

use self::{
    hub::EventHub,
    match_machine::{MatchCue, MatchSnapshot, MatchStateMachine, ScoredKick},
};

/// Shared handle passed to every handler and task.
pub type SharedState = Arc<AppState>;

const EVENT_CAPACITY: usize = 64;

/// Everything observers can be notified about.
#[derive(Debug, Clone)]
pub enum StationEvent {
    /// The match state changed.
    Match(MatchSnapshot),
    /// A transition requested an audio or presentation cue.
    Cue(MatchCue),
    /// The detector accepted a kick; `scored` is set when it counted.
    Kick {
        /// The detected kick.
        kick: KickEvent,
        /// Outcome when the match was playing.
        scored: Option<ScoredKick>,
    },
    /// The controller connection changed.
    Device(DeviceStatus),
    /// The remote store became reachable or unreachable.
    Connectivity {
        /// Whether flushes are allowed.
        online: bool,
    },
}

/// Event and station the scores are reported under.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct StationIdentity {
    /// Joined event, if any.
    pub event_id: Option<String>,
    /// Registered station id, if any.
    pub station_id: Option<String>,
}

/// Central application state wiring the pipeline components together.
pub struct AppState {
    config: StationConfig,
    identity: RwLock<StationIdentity>,
    machine: RwLock<MatchStateMachine>,
    detector: Mutex<KickDetector>,
    queue: OfflineQueue,
    events: EventHub<StationEvent>,
    device: watch::Sender<DeviceStatus>,
    device_enabled: watch::Sender<bool>,
    device_writer: RwLock<Option<SerialWriter>>,
    clock_task: Mutex<Option<JoinHandle<()>>>,
}

impl AppState {
    /// Build the state from configuration and an already opened queue.
    pub fn new(config: StationConfig, queue: OfflineQueue) -> SharedState {
        let (device, _rx) = watch::channel(DeviceStatus::Disconnected);
        let (device_enabled, _rx) = watch::channel(true);
        let identity = StationIdentity {
            event_id: config.event_id.clone(),
            station_id: config.station_id.clone(),
        };

        Arc::new(Self {
            machine: RwLock::new(MatchStateMachine::new(config.match_settings())),
            detector: Mutex::new(KickDetector::new(config.detector_settings())),
            identity: RwLock::new(identity),
            queue,
            events: EventHub::new(EVENT_CAPACITY),
            device,
            device_enabled,
            device_writer: RwLock::new(None),
            clock_task: Mutex::new(None),
            config,
        })
    }

    /// Configuration the station started with.
    pub fn config(&self) -> &StationConfig {
        &self.config
    }

    /// Current identity.
    pub async fn identity(&self) -> StationIdentity {
        self.identity.read().await.clone()
    }

    /// Adopt a new identity, e.g. after joining an event.
    pub async fn set_identity(&self, identity: StationIdentity) {
        *self.identity.write().await = identity;
    }

    /// The match state machine.
    pub fn machine(&self) -> &RwLock<MatchStateMachine> {
        &self.machine
    }

    /// The kick detector.
    pub fn detector(&self) -> &Mutex<KickDetector> {
        &self.detector
    }

    /// The durable score queue.
    pub fn queue(&self) -> &OfflineQueue {
        &self.queue
    }

    /// Hub carrying every [`StationEvent`].
    pub fn events(&self) -> &EventHub<StationEvent> {
        &self.events
    }

    /// Snapshot the match.
    pub async fn snapshot(&self) -> MatchSnapshot {
        self.machine.read().await.snapshot()
    }

    /// Current controller status.
    pub fn device_status(&self) -> DeviceStatus {
        self.device.borrow().clone()
    }

    /// Whether the operator wants the controller connected.
    pub fn device_enabled(&self) -> bool {
        *self.device_enabled.borrow()
    }

    /// Subscribe to operator connect/disconnect requests.
    pub fn device_enabled_watcher(&self) -> watch::Receiver<bool> {
        self.device_enabled.subscribe()
    }

    /// Ask the device task to keep the controller connected (`true`) or to let go of it.
    pub fn set_device_enabled(&self, enabled: bool) {
        self.device_enabled.send_replace(enabled);
    }

    /// Record and broadcast a controller status change.
    pub fn set_device_status(&self, status: DeviceStatus) {
        let changed = self.device.send_if_modified(|current| {
            let changed = *current != status;
            *current = status.clone();
            changed
        });
        if changed {
            self.events.publish(StationEvent::Device(status));
        }
    }

    /// Writer of the connected controller, if any.
    pub async fn device_writer(&self) -> Option<SerialWriter> {
        self.device_writer.read().await.clone()
    }

    /// Install or clear the controller writer.
    pub async fn set_device_writer(&self, writer: Option<SerialWriter>) {
        *self.device_writer.write().await = writer;
    }

    /// Slot holding the running clock task.
    pub fn clock_task(&self) -> &Mutex<Option<JoinHandle<()>>> {
        &self.clock_task
    }
}
