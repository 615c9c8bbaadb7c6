use std::collections::HashMap;

use chrono::{DateTime, FixedOffset};
use serde::Deserialize;

/// `/rest/system/status`
#[derive(Debug, Clone, Deserialize)]
pub struct SystemStatus {
    #[serde(rename = "startTime")]
    pub start_time: String,
}

impl SystemStatus {
    pub fn started_at(&self) -> Option<DateTime<FixedOffset>> {
        DateTime::parse_from_rfc3339(&self.start_time).ok()
    }
}

/// `/rest/system/version`
#[derive(Debug, Clone, Deserialize)]
pub struct SystemVersion {
    pub version: String,
}

/// `/rest/system/connections`
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ConnectionsResponse {
    #[serde(default)]
    pub connections: HashMap<String, ConnectionState>,
    #[serde(default)]
    pub total: TransferTotals,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ConnectionState {
    #[serde(default)]
    pub connected: bool,
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferTotals {
    #[serde(default, rename = "inBytesTotal")]
    pub in_bytes_total: u64,
    #[serde(default, rename = "outBytesTotal")]
    pub out_bytes_total: u64,
}

/// Folder summary as returned by `/rest/db/status` and carried by `FolderSummary` events.
#[derive(Debug, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FolderSummary {
    #[serde(default)]
    pub need_files: u64,
    #[serde(default)]
    pub global_files: u64,
    #[serde(default)]
    pub need_deletes: u64,
    #[serde(default)]
    pub state: String,
}

/// `/rest/db/completion`
#[derive(Debug, Deserialize)]
pub struct RemoteCompletion {
    #[serde(default)]
    pub completion: f64,
}
