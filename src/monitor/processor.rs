//! Sole consumer of the event handoff: patches the state store one event at a time.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::syncthing_client::EventKind;

use super::events::StreamedEvent;
use super::handoff::HandoffReceiver;
use super::resync::ResyncHandle;
use super::state::StateStore;
use super::status::StatusPublisher;

/// What processing a single event did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    Ignored,
    /// Read against a model that has since been rebuilt.
    Stale,
    ResyncRequested,
}

pub struct EventProcessor {
    state: Arc<Mutex<StateStore>>,
    handoff: Arc<HandoffReceiver<StreamedEvent>>,
    resync: ResyncHandle,
    status: StatusPublisher,
}

impl EventProcessor {
    pub fn new(
        state: Arc<Mutex<StateStore>>,
        handoff: Arc<HandoffReceiver<StreamedEvent>>,
        resync: ResyncHandle,
        status: StatusPublisher,
    ) -> Self {
        Self {
            state,
            handoff,
            resync,
            status,
        }
    }

    pub async fn run(self) {
        while let Some(streamed) = self.handoff.recv().await {
            self.process(streamed).await;
        }
        debug!("Event handoff closed, processor stopping");
    }

    /// Apply one event under the state lock and republish the status if it changed anything.
    pub async fn process(&self, streamed: StreamedEvent) -> Outcome {
        let mut state = self.state.lock().await;
        let event = &streamed.event;

        if streamed.epoch != state.epoch() {
            debug!(
                id = event.id,
                event_epoch = streamed.epoch,
                epoch = state.epoch(),
                "Dropping event from before the last resync"
            );
            return Outcome::Stale;
        }

        let kind = match event.kind() {
            Ok(kind) => kind,
            Err(err) => {
                warn!(id = event.id, event_type = %event.event_type, error = ?err, "Malformed event");
                return Outcome::Ignored;
            }
        };

        let applied = match &kind {
            EventKind::FolderSummary { folder, summary } => {
                debug!(
                    folder = %folder,
                    need_files = summary.need_files,
                    global_files = summary.global_files,
                    need_deletes = summary.need_deletes,
                    "Folder summary"
                );
                state.apply_folder_summary(folder, summary)
            }
            EventKind::FolderCompletion {
                device,
                folder,
                completion,
            } => state.set_device_completion(device, folder, *completion),
            EventKind::DeviceConnected { device } => {
                info!(device = %device, "Device connected");
                state.set_connected(device, true)
            }
            EventKind::DeviceDisconnected { device } => {
                info!(device = %device, "Device disconnected");
                state.set_connected(device, false)
            }
            EventKind::ConfigSaved => {
                info!(id = event.id, "Got new config, resyncing");
                drop(state);
                self.resync.request(Some(event.id));
                return Outcome::ResyncRequested;
            }
            EventKind::Other => {
                debug!(
                    event_type = %event.event_type,
                    folder = ?event.folder_id(),
                    "Ignoring event"
                );
                return Outcome::Ignored;
            }
        };

        if !applied {
            warn!(id = event.id, kind = ?kind, "Event refers to an unknown folder or device");
            return Outcome::Ignored;
        }

        self.status.publish(&state);
        Outcome::Applied
    }
}
