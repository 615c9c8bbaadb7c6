//! Long-polling reader for the daemon's event stream.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::syncthing_client::{DaemonApi, SyncthingEvent};
use crate::types::MonitorError;

use super::handoff::{Delivery, HandoffSender};
use super::resync::ResyncHandle;

/// Pause between poll cycles, whatever their outcome.
pub const POLL_IDLE_DELAY: Duration = Duration::from_millis(500);

/// Guarded by the stream lock.
#[derive(Debug, Default)]
pub struct EventCursor {
    /// Id of the last event handed to the processor.
    pub since: u64,
    /// Bumped by every rebuild; events carry the epoch they were read in.
    pub epoch: u64,
}

/// An event tagged with the epoch of the model it was read against.
#[derive(Debug, Clone)]
pub struct StreamedEvent {
    pub epoch: u64,
    pub event: SyncthingEvent,
}

pub struct EventReader {
    api: Arc<dyn DaemonApi>,
    stream: Arc<Mutex<EventCursor>>,
    handoff: HandoffSender<StreamedEvent>,
}

impl EventReader {
    pub fn new(
        api: Arc<dyn DaemonApi>,
        stream: Arc<Mutex<EventCursor>>,
        handoff: HandoffSender<StreamedEvent>,
    ) -> Self {
        Self {
            api,
            stream,
            handoff,
        }
    }

    /// Fetch newly arrived events and hand them over one at a time.
    ///
    /// Holds the stream lock for the whole cycle. The cursor moves as each
    /// event is handed over, not when it is applied.
    pub async fn poll_once(&self) -> Result<usize, MonitorError> {
        let mut cursor = self.stream.lock().await;
        let events = self.api.events(cursor.since).await.map_err(|err| {
            warn!(since = cursor.since, error = ?err, "Events query failed");
            err
        })?;

        let count = events.len();
        for event in events {
            let id = event.id;
            let delivery = self
                .handoff
                .send(StreamedEvent {
                    epoch: cursor.epoch,
                    event,
                })
                .await
                .map_err(|_| MonitorError::HandoffClosed)?;
            cursor.since = id;
            match delivery {
                Delivery::Taken => debug!(id, "Sent event"),
                Delivery::Discarded => debug!(id, "Event discarded before processing"),
            }
        }
        Ok(count)
    }

    /// Poll forever, forcing a resync after every failed cycle.
    pub async fn run(self, resync: ResyncHandle) {
        loop {
            match self.poll_once().await {
                Ok(_) => {}
                Err(MonitorError::HandoffClosed) => {
                    warn!("Event processor is gone, stopping event reader");
                    return;
                }
                Err(_) => resync.resync_now().await,
            }
            sleep(POLL_IDLE_DELAY).await;
        }
    }
}
