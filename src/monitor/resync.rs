//! Full rebuild of the state store, retried until it succeeds.
//!
//! A resync holds the stream lock and then the state lock while it fetches the
//! start time and configuration and rebuilds the maps. It then releases both
//! so events can flow again, and fills in folder state, connection flags and
//! remote completion with one short state-lock section per fetch. Any failure
//! re-takes both locks, shows the error state, waits [`RESYNC_BACKOFF`] and
//! starts over.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch, Mutex, MutexGuard};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::syncthing_client::DaemonApi;
use crate::types::MonitorError;

use super::events::{EventCursor, StreamedEvent};
use super::handoff::HandoffReceiver;
use super::state::StateStore;
use super::status::StatusPublisher;

pub const RESYNC_BACKOFF: Duration = Duration::from_secs(5);

/// Lifecycle of the mirrored model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    Uninitialized,
    Resyncing,
    Ready,
    ErrorBackoff,
}

impl SyncPhase {
    pub fn can_transition_to(self, next: SyncPhase) -> bool {
        use SyncPhase::*;
        matches!(
            (self, next),
            (Uninitialized, Resyncing)
                | (Ready, Resyncing)
                | (Resyncing, Ready)
                | (Resyncing, ErrorBackoff)
                | (ErrorBackoff, Resyncing)
        )
    }
}

/// Why a resync was requested.
#[derive(Debug)]
pub struct ResyncRequest {
    /// Event id to record as the cursor (a `ConfigSaved` event).
    pub resume_from: Option<u64>,
    /// Signalled once both locks are held.
    pub locked: Option<oneshot::Sender<()>>,
}

/// Cheap handle used by other tasks to request resyncs and watch the phase.
#[derive(Clone)]
pub struct ResyncHandle {
    requests: mpsc::UnboundedSender<ResyncRequest>,
    phase: watch::Receiver<SyncPhase>,
}

impl ResyncHandle {
    /// Queue a resync and return immediately.
    pub fn request(&self, resume_from: Option<u64>) {
        let request = ResyncRequest {
            resume_from,
            locked: None,
        };
        if self.requests.send(request).is_err() {
            warn!("Resync controller is gone, dropping resync request");
        }
    }

    /// Queue a resync and wait until it owns the stream and state locks.
    pub async fn resync_now(&self) {
        let (locked, locked_rx) = oneshot::channel();
        let request = ResyncRequest {
            resume_from: None,
            locked: Some(locked),
        };
        if self.requests.send(request).is_err() {
            warn!("Resync controller is gone, dropping resync request");
            return;
        }
        let _ = locked_rx.await;
    }

    pub fn phase(&self) -> SyncPhase {
        *self.phase.borrow()
    }

    pub async fn wait_ready(&self) {
        let mut phase = self.phase.clone();
        let _ = phase.wait_for(|phase| *phase == SyncPhase::Ready).await;
    }
}

pub struct ResyncController {
    api: Arc<dyn DaemonApi>,
    state: Arc<Mutex<StateStore>>,
    stream: Arc<Mutex<EventCursor>>,
    handoff: Arc<HandoffReceiver<StreamedEvent>>,
    status: StatusPublisher,
    daemon_url: String,
    phase: watch::Sender<SyncPhase>,
    backoff: Duration,
}

impl ResyncController {
    pub fn new(
        api: Arc<dyn DaemonApi>,
        state: Arc<Mutex<StateStore>>,
        stream: Arc<Mutex<EventCursor>>,
        handoff: Arc<HandoffReceiver<StreamedEvent>>,
        status: StatusPublisher,
        daemon_url: impl Into<String>,
    ) -> (Self, ResyncHandle, mpsc::UnboundedReceiver<ResyncRequest>) {
        let (requests, requests_rx) = mpsc::unbounded_channel();
        let (phase, phase_rx) = watch::channel(SyncPhase::Uninitialized);
        let controller = Self {
            api,
            state,
            stream,
            handoff,
            status,
            daemon_url: daemon_url.into(),
            phase,
            backoff: RESYNC_BACKOFF,
        };
        let handle = ResyncHandle {
            requests,
            phase: phase_rx,
        };
        (controller, handle, requests_rx)
    }

    /// Serve resync requests one at a time until every handle is dropped.
    pub async fn run(self, mut requests: mpsc::UnboundedReceiver<ResyncRequest>) {
        while let Some(request) = requests.recv().await {
            self.resync(request).await;
        }
    }

    pub fn phase(&self) -> SyncPhase {
        *self.phase.borrow()
    }

    fn transition(&self, next: SyncPhase) {
        let current = self.phase();
        if current == next {
            return;
        }
        if !current.can_transition_to(next) {
            warn!(from = ?current, to = ?next, "Rejected resync phase transition");
            return;
        }
        debug!(from = ?current, to = ?next, "Resync phase");
        self.phase.send_replace(next);
    }

    /// Rebuild the model. Never fails: errors back off and start over.
    pub async fn resync(&self, request: ResyncRequest) {
        self.transition(SyncPhase::Resyncing);

        debug!("Waiting for stream lock");
        let mut stream = self.stream.lock().await;
        debug!("Waiting for state lock");
        let mut state = self.state.lock().await;

        if let Some(id) = request.resume_from {
            // The reader already moved past this id when it handed the event over.
            stream.since = stream.since.max(id);
        }
        if let Some(locked) = request.locked {
            let _ = locked.send(());
        }

        loop {
            match self.rebuild(&mut stream, &mut state).await {
                Ok(()) => {
                    drop(state);
                    drop(stream);

                    match self.populate().await {
                        Ok(()) => break,
                        Err(err) => {
                            warn!(error = ?err, "Failed to fetch current state");
                            stream = self.stream.lock().await;
                            state = self.state.lock().await;
                        }
                    }
                }
                Err(err) => warn!(error = ?err, "Failed to read Syncthing config"),
            }

            self.back_off(&mut state).await;
        }

        {
            let state = self.state.lock().await;
            self.status.publish(&state);
        }
        self.transition(SyncPhase::Ready);
        info!("Resync complete");
    }

    /// Called with both locks held; they stay held through the wait.
    async fn back_off(&self, state: &mut MutexGuard<'_, StateStore>) {
        self.transition(SyncPhase::ErrorBackoff);
        warn!(
            retry_in = ?self.backoff,
            epoch = state.epoch(),
            "Error getting Syncthing state, retrying"
        );
        self.status
            .surface()
            .set_error_state(&format!("Syncthing: no connection to {}", self.daemon_url));
        sleep(self.backoff).await;
        self.transition(SyncPhase::Resyncing);
    }

    /// Start time, configuration and version; runs under both locks.
    async fn rebuild(
        &self,
        stream: &mut EventCursor,
        state: &mut StateStore,
    ) -> Result<(), MonitorError> {
        let status = self.api.system_status().await?;
        if state.record_start_time(&status.start_time) {
            info!(
                start_time = %status.start_time,
                parsed = ?status.started_at(),
                "Syncthing (re)started"
            );
            stream.since = 0;
            let dropped = self.handoff.drain();
            if dropped > 0 {
                debug!(dropped, "Cleared events from previous daemon run");
            }
        }

        info!("Reading config from Syncthing");
        let config = self.api.system_config().await?;
        stream.epoch += 1;
        state.rebuild(&config, stream.epoch);
        info!(
            devices = state.devices().len(),
            folders = state.folders().len(),
            epoch = stream.epoch,
            "Rebuilt device and folder maps"
        );

        let version = self.api.system_version().await?;
        self.status
            .surface()
            .set_version_label(&format!("Syncthing: {}", version.version));

        let dropped = self.handoff.drain();
        if dropped > 0 {
            debug!(dropped, "Discarded stale queued events");
        }
        Ok(())
    }

    /// Fill in derived fields without holding the locks across network calls.
    async fn populate(&self) -> Result<(), MonitorError> {
        self.populate_folder_states().await?;
        self.populate_connections().await?;
        self.populate_remote_completion().await
    }

    async fn populate_folder_states(&self) -> Result<(), MonitorError> {
        let mut folder_ids: Vec<String> = self.state.lock().await.folders().keys().cloned().collect();
        folder_ids.sort();

        for folder_id in folder_ids {
            if !self.state.lock().await.folder_status_unknown(&folder_id) {
                debug!(folder = %folder_id, "Folder state already known from events, skipping");
                continue;
            }

            let status = self.api.folder_status(&folder_id).await?;
            let mut state = self.state.lock().await;
            if state.fill_folder_status(&folder_id, &status) {
                debug!(
                    folder = %folder_id,
                    need_files = status.need_files,
                    global_files = status.global_files,
                    state = %status.state,
                    "Fetched folder state"
                );
            }
            drop(state);
            // Let queued events run first; they may make the next query unnecessary.
            tokio::task::yield_now().await;
        }
        Ok(())
    }

    async fn populate_connections(&self) -> Result<(), MonitorError> {
        debug!("Getting connections");
        let connections = self.api.connections().await?;
        self.state.lock().await.apply_connections(&connections);
        Ok(())
    }

    async fn populate_remote_completion(&self) -> Result<(), MonitorError> {
        let pairs = self.state.lock().await.shared_pairs();

        for (folder_id, device_id) in pairs {
            {
                let state = self.state.lock().await;
                if !state.device_completion_unknown(&device_id, &folder_id) {
                    debug!(
                        device = %device_id,
                        folder = %folder_id,
                        "Completion already known from events, skipping"
                    );
                    continue;
                }
                // Only connected peers can report what they still need.
                if !state.device(&device_id).map(|d| d.connected).unwrap_or(false) {
                    continue;
                }
            }

            let completion = self.api.completion(&device_id, &folder_id).await?;
            self.state.lock().await.fill_device_completion(
                &device_id,
                &folder_id,
                completion.completion,
            );
            debug!(
                device = %device_id,
                folder = %folder_id,
                completion = completion.completion,
                "Fetched remote completion"
            );
            tokio::task::yield_now().await;
        }
        Ok(())
    }
}
