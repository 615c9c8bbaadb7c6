//! State-reconciliation engine: resync controller, event reader/processor and rate sampler.

mod events;
mod handoff;
mod processor;
mod rates;
mod resync;
mod state;
mod status;

#[cfg(test)]
mod testing;

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::info;

use crate::config::Config;
use crate::surface::StatusSurface;
use crate::syncthing_client::DaemonApi;

pub use events::{EventCursor, EventReader, StreamedEvent, POLL_IDLE_DELAY};
pub use handoff::{handoff, Delivery, HandoffClosed, HandoffReceiver, HandoffSender};
pub use processor::{EventProcessor, Outcome};
pub use rates::{RateSample, RateSampler, TransferRates, RATE_INTERVAL};
pub use resync::{ResyncController, ResyncHandle, ResyncRequest, SyncPhase, RESYNC_BACKOFF};
pub use state::{
    folder_completion, Device, Folder, StateStore, PENDING_DELETES_COMPLETION,
    UNKNOWN_COMPLETION,
};
pub use status::{compute_status, StatusPublisher, SyncStatus, RATE_ACTIVITY_THRESHOLD};

/// Owns the shared state and the surface; [`Monitor::spawn`] starts every task.
pub struct Monitor {
    api: Arc<dyn DaemonApi>,
    surface: Arc<dyn StatusSurface>,
    state: Arc<Mutex<StateStore>>,
    stream: Arc<Mutex<EventCursor>>,
    rates: Arc<TransferRates>,
    use_rates: bool,
    daemon_url: String,
}

/// Running monitor. Dropping it leaves the tasks running; call [`MonitorHandle::shutdown`] to stop them.
pub struct MonitorHandle {
    resync: ResyncHandle,
    state: Arc<Mutex<StateStore>>,
    rates: Arc<TransferRates>,
    use_rates: bool,
    tasks: Vec<JoinHandle<()>>,
}

impl Monitor {
    pub fn new(api: Arc<dyn DaemonApi>, surface: Arc<dyn StatusSurface>, config: &Config) -> Self {
        Self {
            api,
            surface,
            state: Arc::new(Mutex::new(StateStore::new())),
            stream: Arc::new(Mutex::new(EventCursor::default())),
            rates: Arc::new(TransferRates::default()),
            use_rates: config.use_rates,
            daemon_url: config.url.clone(),
        }
    }

    pub fn spawn(self) -> MonitorHandle {
        info!(url = %self.daemon_url, use_rates = self.use_rates, "Starting monitor");

        let status = StatusPublisher::new(self.surface.clone(), self.rates.clone(), self.use_rates);
        let (events_tx, events_rx) = handoff::<StreamedEvent>();
        let events_rx = Arc::new(events_rx);

        let (controller, resync, requests) = ResyncController::new(
            self.api.clone(),
            self.state.clone(),
            self.stream.clone(),
            events_rx.clone(),
            status.clone(),
            self.daemon_url.clone(),
        );
        let processor = EventProcessor::new(
            self.state.clone(),
            events_rx,
            resync.clone(),
            status.clone(),
        );
        let reader = EventReader::new(self.api.clone(), self.stream.clone(), events_tx);
        let sampler = RateSampler::new(
            self.api.clone(),
            self.rates.clone(),
            self.state.clone(),
            status,
        );

        let reader_resync = resync.clone();
        let tasks = vec![
            tokio::spawn(controller.run(requests)),
            tokio::spawn(processor.run()),
            tokio::spawn(sampler.run()),
            tokio::spawn(async move {
                // The initial resync owns both locks before the first poll.
                reader_resync.resync_now().await;
                reader.run(reader_resync).await;
            }),
        ];

        MonitorHandle {
            resync,
            state: self.state,
            rates: self.rates,
            use_rates: self.use_rates,
            tasks,
        }
    }
}

impl MonitorHandle {
    pub fn resync(&self) -> &ResyncHandle {
        &self.resync
    }

    pub fn phase(&self) -> SyncPhase {
        self.resync.phase()
    }

    pub async fn wait_ready(&self) {
        self.resync.wait_ready().await;
    }

    /// Copy of the current model, taken under the state lock.
    pub async fn snapshot(&self) -> StateStore {
        self.state.lock().await.clone()
    }

    /// The status the surface was last given, recomputed from the current model and rates.
    pub async fn status(&self) -> SyncStatus {
        let state = self.state.lock().await;
        compute_status(&state, self.use_rates.then(|| self.rates.read()))
    }

    pub fn rates(&self) -> RateSample {
        self.rates.read()
    }

    pub fn shutdown(self) {
        for task in self.tasks {
            task.abort();
        }
    }
}
