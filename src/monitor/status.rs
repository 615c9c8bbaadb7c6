//! Coarse tray status derived from the state store (or sampled rates).

use std::sync::Arc;

use tracing::debug;

use crate::surface::{StatusSurface, TrayIcon};

use super::rates::{RateSample, TransferRates};
use super::state::StateStore;

/// Bytes per second above which a direction counts as active in rate mode.
pub const RATE_ACTIVITY_THRESHOLD: f64 = 500.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncStatus {
    pub num_connected: usize,
    pub downloading: bool,
    pub uploading: bool,
}

impl SyncStatus {
    pub fn icon(&self) -> TrayIcon {
        match (self.num_connected, self.downloading, self.uploading) {
            (0, _, _) => TrayIcon::NotConnected,
            (_, false, false) => TrayIcon::Idle,
            (_, true, false) => TrayIcon::Downloading,
            (_, false, true) => TrayIcon::Uploading,
            (_, true, true) => TrayIcon::UploadingDownloading,
        }
    }

    pub fn connection_label(&self) -> String {
        format!("Connected to {} Devices", self.num_connected)
    }
}

/// Derive the status. With `rates`, activity comes from the sample instead of completion.
pub fn compute_status(store: &StateStore, rates: Option<RateSample>) -> SyncStatus {
    let mut downloading = store
        .folders()
        .values()
        .any(|folder| folder.completion < 100.0);

    let mut uploading = false;
    let mut num_connected = 0;
    for (id, device) in store.devices() {
        if !device.connected {
            continue;
        }
        num_connected += 1;
        for (folder, completion) in &device.folder_completion {
            if *completion < 100.0 {
                debug!(device = %id, folder = %folder, completion, "Peer behind");
                uploading = true;
            }
        }
    }

    if let Some(sample) = rates {
        downloading = sample.in_bytes_per_sec > RATE_ACTIVITY_THRESHOLD;
        uploading = sample.out_bytes_per_sec > RATE_ACTIVITY_THRESHOLD;
    }

    SyncStatus {
        num_connected,
        downloading,
        uploading,
    }
}

/// Recomputes the status and forwards it to the surface.
#[derive(Clone)]
pub struct StatusPublisher {
    surface: Arc<dyn StatusSurface>,
    rates: Arc<TransferRates>,
    use_rates: bool,
}

impl StatusPublisher {
    pub fn new(surface: Arc<dyn StatusSurface>, rates: Arc<TransferRates>, use_rates: bool) -> Self {
        Self {
            surface,
            rates,
            use_rates,
        }
    }

    pub fn surface(&self) -> &Arc<dyn StatusSurface> {
        &self.surface
    }

    pub fn use_rates(&self) -> bool {
        self.use_rates
    }

    /// Caller must hold the state lock for `store`.
    pub fn publish(&self, store: &StateStore) -> SyncStatus {
        let rates = self.use_rates.then(|| self.rates.read());
        let status = compute_status(store, rates);
        debug!(
            connected = status.num_connected,
            downloading = status.downloading,
            uploading = status.uploading,
            "Updating status"
        );
        self.surface.set_connection_label(&status.connection_label());
        self.surface.set_icon(status.icon());
        status
    }
}
