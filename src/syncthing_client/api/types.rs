use serde::Deserialize;
use serde_json::Value;

use crate::types::MonitorError;

use super::FolderSummary;

/// `/rest/system/config`, reduced to what the monitor tracks.
#[derive(Debug, Deserialize, Default)]
pub struct SyncthingConfig {
    #[serde(default)]
    pub folders: Vec<FolderConfig>,
    #[serde(default)]
    pub devices: Vec<DeviceConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FolderConfig {
    pub id: String,
    #[serde(default)]
    pub devices: Vec<FolderDevice>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FolderDevice {
    #[serde(rename = "deviceID")]
    pub device_id: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DeviceConfig {
    #[serde(rename = "deviceID")]
    pub device_id: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// One entry of the `/rest/events` stream. `data` is decoded lazily by [`SyncthingEvent::kind`].
#[derive(Debug, Clone, Deserialize)]
pub struct SyncthingEvent {
    pub id: u64,
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub time: String,
    #[serde(default)]
    pub data: Value,
}

/// The event types the monitor reacts to.
#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    FolderSummary {
        folder: String,
        summary: FolderSummary,
    },
    FolderCompletion {
        device: String,
        folder: String,
        completion: f64,
    },
    DeviceConnected {
        device: String,
    },
    DeviceDisconnected {
        device: String,
    },
    ConfigSaved,
    Other,
}

#[derive(Deserialize)]
struct FolderSummaryData {
    folder: String,
    #[serde(default)]
    summary: FolderSummary,
}

#[derive(Deserialize)]
struct FolderCompletionData {
    folder: String,
    device: String,
    #[serde(default)]
    completion: f64,
}

#[derive(Deserialize)]
struct DeviceData {
    id: String,
}

impl SyncthingEvent {
    /// Decode the type-specific payload.
    pub fn kind(&self) -> Result<EventKind, MonitorError> {
        let kind = match self.event_type.as_str() {
            "FolderSummary" => {
                let data: FolderSummaryData = serde_json::from_value(self.data.clone())?;
                EventKind::FolderSummary {
                    folder: data.folder,
                    summary: data.summary,
                }
            }
            "FolderCompletion" => {
                let data: FolderCompletionData = serde_json::from_value(self.data.clone())?;
                EventKind::FolderCompletion {
                    device: data.device,
                    folder: data.folder,
                    completion: data.completion,
                }
            }
            "DeviceConnected" => {
                let data: DeviceData = serde_json::from_value(self.data.clone())?;
                EventKind::DeviceConnected { device: data.id }
            }
            "DeviceDisconnected" => {
                let data: DeviceData = serde_json::from_value(self.data.clone())?;
                EventKind::DeviceDisconnected { device: data.id }
            }
            "ConfigSaved" => EventKind::ConfigSaved,
            _ => EventKind::Other,
        };
        Ok(kind)
    }

    pub fn folder_id(&self) -> Option<&str> {
        self.data.get("folder").and_then(|v| v.as_str())
    }
}
