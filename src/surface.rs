//! Rendering surface the monitor reports to.
//!
//! The tray owns no sync logic: it only receives labels and an icon state.

use tracing::info;

/// Icon states shown by the tray.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrayIcon {
    Error,
    NotConnected,
    Idle,
    Downloading,
    Uploading,
    UploadingDownloading,
}

/// Sink for status updates. Calls are made synchronously from the monitor tasks.
pub trait StatusSurface: Send + Sync {
    fn set_version_label(&self, text: &str);
    fn set_connection_label(&self, text: &str);
    fn set_rate_label(&self, text: &str);
    fn set_icon(&self, icon: TrayIcon);

    /// Show an error message in the version slot and switch to the error icon.
    fn set_error_state(&self, text: &str) {
        self.set_version_label(text);
        self.set_icon(TrayIcon::Error);
    }
}

/// Surface that renders every update as a log line.
#[derive(Debug, Default)]
pub struct LogSurface;

impl StatusSurface for LogSurface {
    fn set_version_label(&self, text: &str) {
        info!(label = %text, "version");
    }

    fn set_connection_label(&self, text: &str) {
        info!(label = %text, "connections");
    }

    fn set_rate_label(&self, text: &str) {
        info!(label = %text, "rates");
    }

    fn set_icon(&self, icon: TrayIcon) {
        info!(icon = ?icon, "icon");
    }
}

pub fn format_rate(rate: f64) -> String {
    if rate < 1024.0 {
        format!("{:.2} B/s", rate)
    } else if rate < 1024.0 * 1024.0 {
        format!("{:.2} KiB/s", rate / 1024.0)
    } else {
        format!("{:.2} MiB/s", rate / (1024.0 * 1024.0))
    }
}

pub fn rate_label(in_rate: f64, out_rate: f64) -> String {
    format!("↓: {} ↑: {}", format_rate(in_rate), format_rate(out_rate))
}
