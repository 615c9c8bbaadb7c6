//! In-memory mirror of the daemon's devices and folders.

use std::collections::HashMap;

use tracing::warn;

use crate::syncthing_client::{ConnectionsResponse, FolderSummary, SyncthingConfig};

/// Marker for a completion value that has not been fetched or reported yet.
pub const UNKNOWN_COMPLETION: f64 = -1.0;

/// Completion shown for a folder while the daemon still reports pending deletions.
/// Not derived from the summary counts.
pub const PENDING_DELETES_COMPLETION: f64 = 95.0;

/// Label a folder carries until its state is fetched.
pub const INITIAL_FOLDER_STATE: &str = "invalid";

#[derive(Debug, Clone, PartialEq)]
pub struct Device {
    pub name: String,
    pub connected: bool,
    /// Remote completion per shared folder id.
    pub folder_completion: HashMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Folder {
    pub id: String,
    pub completion: f64,
    pub state: String,
    pub need_files: u64,
    pub shared_with: Vec<String>,
}

/// Device and folder maps plus the daemon start time they were built against.
///
/// `epoch` changes on every rebuild; events streamed against an older epoch
/// are stale.
#[derive(Debug, Clone, Default)]
pub struct StateStore {
    devices: HashMap<String, Device>,
    folders: HashMap<String, Folder>,
    start_time: Option<String>,
    epoch: u64,
}

/// `100 - 100*need/max(global,1)`, no further clamping.
pub fn folder_completion(need_files: u64, global_files: u64) -> f64 {
    100.0 - 100.0 * need_files as f64 / (global_files.max(1) as f64)
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn devices(&self) -> &HashMap<String, Device> {
        &self.devices
    }

    pub fn folders(&self) -> &HashMap<String, Folder> {
        &self.folders
    }

    pub fn device(&self, id: &str) -> Option<&Device> {
        self.devices.get(id)
    }

    pub fn folder(&self, id: &str) -> Option<&Folder> {
        self.folders.get(id)
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn start_time(&self) -> Option<&str> {
        self.start_time.as_deref()
    }

    /// Record the daemon start time; returns `true` if it differs from the previous one.
    pub fn record_start_time(&mut self, start_time: &str) -> bool {
        if self.start_time.as_deref() == Some(start_time) {
            return false;
        }
        self.start_time = Some(start_time.to_string());
        true
    }

    /// Replace both maps with fresh entities built from `config`.
    pub fn rebuild(&mut self, config: &SyncthingConfig, epoch: u64) {
        let mut devices: HashMap<String, Device> = config
            .devices
            .iter()
            .map(|device| {
                let entry = Device {
                    name: device
                        .name
                        .clone()
                        .filter(|name| !name.is_empty())
                        .unwrap_or_else(|| device.device_id.clone()),
                    connected: false,
                    folder_completion: HashMap::new(),
                };
                (device.device_id.clone(), entry)
            })
            .collect();

        let mut folders = HashMap::with_capacity(config.folders.len());
        for folder in &config.folders {
            let mut shared_with = Vec::with_capacity(folder.devices.len());
            for member in &folder.devices {
                let device = devices.entry(member.device_id.clone()).or_insert_with(|| {
                    warn!(
                        folder = %folder.id,
                        device = %member.device_id,
                        "Folder shared with a device missing from the device list"
                    );
                    Device {
                        name: member.device_id.clone(),
                        connected: false,
                        folder_completion: HashMap::new(),
                    }
                });
                device
                    .folder_completion
                    .insert(folder.id.clone(), UNKNOWN_COMPLETION);
                shared_with.push(member.device_id.clone());
            }
            folders.insert(
                folder.id.clone(),
                Folder {
                    id: folder.id.clone(),
                    completion: UNKNOWN_COMPLETION,
                    state: INITIAL_FOLDER_STATE.to_string(),
                    need_files: 0,
                    shared_with,
                },
            );
        }

        self.devices = devices;
        self.folders = folders;
        self.epoch = epoch;
    }

    /// Apply a `FolderSummary` event. Returns `false` for an unknown folder.
    pub fn apply_folder_summary(&mut self, folder_id: &str, summary: &FolderSummary) -> bool {
        let Some(folder) = self.folders.get_mut(folder_id) else {
            return false;
        };
        folder.need_files = summary.need_files;
        folder.state = summary.state.clone();
        folder.completion = if summary.need_deletes == 0 {
            folder_completion(summary.need_files, summary.global_files)
        } else {
            PENDING_DELETES_COMPLETION
        };
        true
    }

    /// Store a fetched folder status unless an event already filled it in.
    pub fn fill_folder_status(&mut self, folder_id: &str, status: &FolderSummary) -> bool {
        match self.folders.get_mut(folder_id) {
            Some(folder) if folder.completion == UNKNOWN_COMPLETION => {
                folder.need_files = status.need_files;
                folder.state = status.state.clone();
                folder.completion = folder_completion(status.need_files, status.global_files);
                true
            }
            _ => false,
        }
    }

    pub fn folder_status_unknown(&self, folder_id: &str) -> bool {
        self.folders
            .get(folder_id)
            .map(|folder| folder.completion == UNKNOWN_COMPLETION)
            .unwrap_or(false)
    }

    /// Set a device's completion for a folder verbatim (last write wins).
    pub fn set_device_completion(&mut self, device_id: &str, folder_id: &str, value: f64) -> bool {
        if !self.folders.contains_key(folder_id) {
            return false;
        }
        let Some(device) = self.devices.get_mut(device_id) else {
            return false;
        };
        device
            .folder_completion
            .insert(folder_id.to_string(), value);
        true
    }

    /// Store a fetched device completion unless an event already filled it in.
    pub fn fill_device_completion(&mut self, device_id: &str, folder_id: &str, value: f64) -> bool {
        if !self.device_completion_unknown(device_id, folder_id) {
            return false;
        }
        self.set_device_completion(device_id, folder_id, value)
    }

    pub fn device_completion_unknown(&self, device_id: &str, folder_id: &str) -> bool {
        self.devices
            .get(device_id)
            .and_then(|device| device.folder_completion.get(folder_id))
            .map(|value| *value == UNKNOWN_COMPLETION)
            .unwrap_or(false)
    }

    pub fn set_connected(&mut self, device_id: &str, connected: bool) -> bool {
        match self.devices.get_mut(device_id) {
            Some(device) => {
                device.connected = connected;
                true
            }
            None => false,
        }
    }

    /// Mark every device disconnected, then apply the reported connection flags.
    pub fn apply_connections(&mut self, connections: &ConnectionsResponse) {
        for device in self.devices.values_mut() {
            device.connected = false;
        }
        for (device_id, connection) in &connections.connections {
            if let Some(device) = self.devices.get_mut(device_id) {
                device.connected = connection.connected;
            }
        }
    }

    /// `(folder, device)` pairs in config order, used to walk remote completion.
    pub fn shared_pairs(&self) -> Vec<(String, String)> {
        let mut folder_ids: Vec<&String> = self.folders.keys().collect();
        folder_ids.sort();
        folder_ids
            .into_iter()
            .flat_map(|id| {
                self.folders[id]
                    .shared_with
                    .iter()
                    .map(move |device| (id.clone(), device.clone()))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config(value: serde_json::Value) -> SyncthingConfig {
        serde_json::from_value(value).unwrap()
    }

    fn two_device_config() -> SyncthingConfig {
        config(json!({
            "devices": [{"deviceID": "A", "name": "laptop"}, {"deviceID": "B", "name": ""}],
            "folders": [
                {"id": "docs", "devices": [{"deviceID": "A"}, {"deviceID": "B"}]},
                {"id": "photos", "devices": [{"deviceID": "B"}]}
            ]
        }))
    }

    #[test]
    fn completion_formula() {
        assert_eq!(folder_completion(0, 0), 100.0);
        assert_eq!(folder_completion(5, 10), 50.0);
        assert_eq!(folder_completion(10, 10), 0.0);
        // Only the divisor is guarded.
        assert_eq!(folder_completion(3, 0), -200.0);
    }

    #[test]
    fn rebuild_seeds_unknown_completion_for_every_share() {
        let mut store = StateStore::new();
        store.rebuild(&two_device_config(), 1);

        for folder in store.folders().values() {
            assert_eq!(folder.completion, UNKNOWN_COMPLETION);
            assert_eq!(folder.state, INITIAL_FOLDER_STATE);
            for device in &folder.shared_with {
                assert_eq!(
                    store.device(device).unwrap().folder_completion[&folder.id],
                    UNKNOWN_COMPLETION
                );
            }
        }
        for device in store.devices().values() {
            for folder in device.folder_completion.keys() {
                assert!(store.folder(folder).is_some());
            }
        }
        assert_eq!(store.device("A").unwrap().name, "laptop");
        assert_eq!(store.device("B").unwrap().name, "B");
        assert_eq!(store.folder("docs").unwrap().shared_with, vec!["A", "B"]);
    }

    #[test]
    fn rebuild_replaces_previous_entities() {
        let mut store = StateStore::new();
        store.rebuild(&two_device_config(), 1);
        store.set_connected("A", true);

        store.rebuild(
            &config(json!({
                "devices": [{"deviceID": "A"}, {"deviceID": "C"}],
                "folders": [{"id": "music", "devices": [{"deviceID": "C"}]}]
            })),
            2,
        );

        assert!(store.device("B").is_none());
        assert!(store.folder("docs").is_none());
        assert!(!store.device("A").unwrap().connected);
        assert!(store.device("A").unwrap().folder_completion.is_empty());
        assert_eq!(store.epoch(), 2);
    }

    #[test]
    fn undeclared_share_member_still_gets_a_device() {
        let mut store = StateStore::new();
        store.rebuild(
            &config(json!({
                "devices": [],
                "folders": [{"id": "docs", "devices": [{"deviceID": "GHOST"}]}]
            })),
            1,
        );
        assert_eq!(
            store.device("GHOST").unwrap().folder_completion["docs"],
            UNKNOWN_COMPLETION
        );
    }

    #[test]
    fn folder_summary_with_pending_deletes_is_pinned() {
        let mut store = StateStore::new();
        store.rebuild(&two_device_config(), 1);

        let summary = FolderSummary {
            need_files: 0,
            global_files: 10,
            need_deletes: 4,
            state: "syncing".to_string(),
        };
        assert!(store.apply_folder_summary("docs", &summary));
        let folder = store.folder("docs").unwrap();
        assert_eq!(folder.completion, PENDING_DELETES_COMPLETION);
        assert_eq!(folder.state, "syncing");

        let summary = FolderSummary {
            need_files: 5,
            global_files: 10,
            need_deletes: 0,
            state: "idle".to_string(),
        };
        assert!(store.apply_folder_summary("docs", &summary));
        assert_eq!(store.folder("docs").unwrap().completion, 50.0);
        assert_eq!(store.folder("docs").unwrap().need_files, 5);
        assert!(!store.apply_folder_summary("missing", &summary));
    }

    #[test]
    fn fill_never_overwrites_known_values() {
        let mut store = StateStore::new();
        store.rebuild(&two_device_config(), 1);

        assert!(store.set_device_completion("A", "docs", 100.0));
        assert!(!store.fill_device_completion("A", "docs", 10.0));
        assert_eq!(store.device("A").unwrap().folder_completion["docs"], 100.0);
        assert!(store.fill_device_completion("B", "docs", 10.0));

        let status = FolderSummary {
            need_files: 1,
            global_files: 4,
            ..Default::default()
        };
        assert!(store.fill_folder_status("docs", &status));
        assert_eq!(store.folder("docs").unwrap().completion, 75.0);
        assert!(!store.fill_folder_status("docs", &FolderSummary::default()));
        assert_eq!(store.folder("docs").unwrap().completion, 75.0);
    }

    #[test]
    fn negative_values_from_events_count_as_known() {
        let mut store = StateStore::new();
        store.rebuild(&two_device_config(), 1);

        let empty_with_needs = FolderSummary {
            need_files: 3,
            global_files: 0,
            ..Default::default()
        };
        assert!(store.apply_folder_summary("photos", &empty_with_needs));
        assert_eq!(store.folder("photos").unwrap().completion, -200.0);
        assert!(!store.folder_status_unknown("photos"));
        assert!(!store.fill_folder_status("photos", &FolderSummary::default()));
        assert_eq!(store.folder("photos").unwrap().completion, -200.0);

        assert!(store.set_device_completion("B", "docs", -5.0));
        assert!(!store.device_completion_unknown("B", "docs"));
        assert!(!store.fill_device_completion("B", "docs", 60.0));
        assert_eq!(store.device("B").unwrap().folder_completion["docs"], -5.0);
    }

    #[test]
    fn repeated_completion_is_last_write_wins() {
        let mut store = StateStore::new();
        store.rebuild(&two_device_config(), 1);

        store.set_device_completion("B", "photos", 40.0);
        store.set_device_completion("B", "photos", 40.0);
        assert_eq!(store.device("B").unwrap().folder_completion["photos"], 40.0);
        // A does not share photos, and unknown folders are rejected.
        assert!(!store.set_device_completion("A", "nope", 1.0));
    }

    #[test]
    fn connections_reset_before_apply() {
        let mut store = StateStore::new();
        store.rebuild(&two_device_config(), 1);
        store.set_connected("A", true);

        let connections: ConnectionsResponse = serde_json::from_value(json!({
            "connections": {"B": {"connected": true}, "STRANGER": {"connected": true}},
            "total": {}
        }))
        .unwrap();
        store.apply_connections(&connections);

        assert!(!store.device("A").unwrap().connected);
        assert!(store.device("B").unwrap().connected);
        assert!(store.device("STRANGER").is_none());
    }

    #[test]
    fn start_time_change_is_reported_once() {
        let mut store = StateStore::new();
        assert!(store.record_start_time("t1"));
        assert!(!store.record_start_time("t1"));
        assert!(store.record_start_time("t2"));
        assert_eq!(store.start_time(), Some("t2"));
    }

    #[test]
    fn shared_pairs_walk_folders_in_order() {
        let mut store = StateStore::new();
        store.rebuild(&two_device_config(), 1);
        assert_eq!(
            store.shared_pairs(),
            vec![
                ("docs".to_string(), "A".to_string()),
                ("docs".to_string(), "B".to_string()),
                ("photos".to_string(), "B".to_string()),
            ]
        );
    }
}
