//! In-memory daemon and surface used by the monitor tests.

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::Notify;

use crate::surface::{StatusSurface, TrayIcon};
use crate::syncthing_client::{
    ConnectionsResponse, DaemonApi, FolderSummary, RemoteCompletion, SyncthingConfig,
    SyncthingEvent, SystemStatus, SystemVersion, TransferTotals,
};
use crate::types::MonitorError;

pub fn event(id: u64, event_type: &str, data: Value) -> SyncthingEvent {
    SyncthingEvent {
        id,
        event_type: event_type.to_string(),
        time: "2024-01-01T00:00:00Z".to_string(),
        data,
    }
}

type Hook = Arc<dyn Fn() -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

#[derive(Default)]
struct Inner {
    start_time: String,
    version: String,
    config: Value,
    folder_status: HashMap<String, FolderSummary>,
    completion: HashMap<(String, String), f64>,
    connected: HashMap<String, bool>,
    totals: TransferTotals,
    events: VecDeque<Vec<SyncthingEvent>>,
    event_queries: Vec<u64>,
    failures: HashMap<&'static str, usize>,
    calls: HashMap<&'static str, usize>,
    folder_status_hook: Option<Hook>,
}

pub struct FakeDaemon {
    inner: Mutex<Inner>,
    new_events: Notify,
}

impl FakeDaemon {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                start_time: "2024-01-01T00:00:00Z".to_string(),
                version: "v1.27.0".to_string(),
                config: json!({"devices": [], "folders": []}),
                ..Default::default()
            }),
            new_events: Notify::new(),
        }
    }

    /// `docs` shared with PEER1 (connected, up to date) and PEER2 (offline),
    /// `photos` shared with PEER2 only.
    pub fn with_two_peers() -> Self {
        let daemon = Self::new();
        daemon.set_config(json!({
            "devices": [
                {"deviceID": "PEER1", "name": "laptop"},
                {"deviceID": "PEER2", "name": "phone"}
            ],
            "folders": [
                {"id": "docs", "devices": [{"deviceID": "PEER1"}, {"deviceID": "PEER2"}]},
                {"id": "photos", "devices": [{"deviceID": "PEER2"}]}
            ]
        }));
        {
            let mut inner = daemon.lock();
            inner.folder_status.insert(
                "docs".to_string(),
                FolderSummary {
                    need_files: 5,
                    global_files: 10,
                    need_deletes: 0,
                    state: "syncing".to_string(),
                },
            );
            inner.folder_status.insert(
                "photos".to_string(),
                FolderSummary {
                    need_files: 0,
                    global_files: 3,
                    need_deletes: 0,
                    state: "idle".to_string(),
                },
            );
            inner.connected.insert("PEER1".to_string(), true);
            inner.connected.insert("PEER2".to_string(), false);
            inner
                .completion
                .insert(("PEER1".to_string(), "docs".to_string()), 100.0);
        }
        daemon
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap()
    }

    pub fn set_start_time(&self, start_time: &str) {
        self.lock().start_time = start_time.to_string();
    }

    pub fn set_config(&self, config: Value) {
        self.lock().config = config;
    }

    pub fn set_folder_status(&self, folder: &str, summary: FolderSummary) {
        self.lock().folder_status.insert(folder.to_string(), summary);
    }

    pub fn set_totals(&self, totals: TransferTotals) {
        self.lock().totals = totals;
    }

    pub fn push_events(&self, batch: Vec<SyncthingEvent>) {
        self.lock().events.push_back(batch);
        self.new_events.notify_one();
    }

    /// Make the next `count` calls to `endpoint` fail.
    pub fn fail_next(&self, endpoint: &'static str, count: usize) {
        self.lock().failures.insert(endpoint, count);
    }

    /// Run `hook` once, during the next folder status query.
    pub fn on_folder_status<F>(&self, hook: F)
    where
        F: Fn() -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync + 'static,
    {
        self.lock().folder_status_hook = Some(Arc::new(hook));
    }

    pub fn calls_to(&self, endpoint: &str) -> usize {
        self.lock().calls.get(endpoint).copied().unwrap_or(0)
    }

    pub fn event_queries(&self) -> Vec<u64> {
        self.lock().event_queries.clone()
    }

    fn enter(&self, endpoint: &'static str) -> Result<(), MonitorError> {
        let mut inner = self.lock();
        *inner.calls.entry(endpoint).or_default() += 1;
        if let Some(remaining) = inner.failures.get_mut(endpoint) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(MonitorError::Syncthing(format!(
                    "{endpoint} returned 503 Service Unavailable"
                )));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl DaemonApi for FakeDaemon {
    async fn system_status(&self) -> Result<SystemStatus, MonitorError> {
        self.enter("system_status")?;
        Ok(SystemStatus {
            start_time: self.lock().start_time.clone(),
        })
    }

    async fn system_config(&self) -> Result<SyncthingConfig, MonitorError> {
        self.enter("system_config")?;
        let config = self.lock().config.clone();
        Ok(serde_json::from_value(config)?)
    }

    async fn system_version(&self) -> Result<SystemVersion, MonitorError> {
        self.enter("system_version")?;
        Ok(SystemVersion {
            version: self.lock().version.clone(),
        })
    }

    async fn connections(&self) -> Result<ConnectionsResponse, MonitorError> {
        self.enter("connections")?;
        let inner = self.lock();
        let connections: serde_json::Map<String, Value> = inner
            .connected
            .iter()
            .map(|(id, connected)| (id.clone(), json!({"connected": connected})))
            .collect();
        let body = json!({
            "connections": connections,
            "total": {
                "inBytesTotal": inner.totals.in_bytes_total,
                "outBytesTotal": inner.totals.out_bytes_total
            }
        });
        Ok(serde_json::from_value(body)?)
    }

    async fn folder_status(&self, folder: &str) -> Result<FolderSummary, MonitorError> {
        self.enter("folder_status")?;
        let hook = self.lock().folder_status_hook.take();
        if let Some(hook) = hook {
            hook().await;
        }
        self.lock()
            .folder_status
            .get(folder)
            .cloned()
            .ok_or_else(|| MonitorError::Syncthing(format!("no such folder {folder}")))
    }

    async fn completion(
        &self,
        device: &str,
        folder: &str,
    ) -> Result<RemoteCompletion, MonitorError> {
        self.enter("completion")?;
        let completion = self
            .lock()
            .completion
            .get(&(device.to_string(), folder.to_string()))
            .copied()
            .unwrap_or(0.0);
        Ok(RemoteCompletion { completion })
    }

    async fn events(&self, since: u64) -> Result<Vec<SyncthingEvent>, MonitorError> {
        self.enter("events")?;
        self.lock().event_queries.push(since);
        loop {
            let notified = self.new_events.notified();
            let batch = self.lock().events.pop_front();
            if let Some(batch) = batch {
                return Ok(batch.into_iter().filter(|e| e.id > since).collect());
            }
            if tokio::time::timeout(Duration::from_secs(60), notified)
                .await
                .is_err()
            {
                return Ok(Vec::new());
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceCall {
    Version(String),
    Connection(String),
    Rate(String),
    Icon(TrayIcon),
}

#[derive(Default)]
pub struct RecordingSurface {
    calls: Mutex<Vec<SurfaceCall>>,
}

impl RecordingSurface {
    pub fn calls(&self) -> Vec<SurfaceCall> {
        self.calls.lock().unwrap().clone()
    }

    fn push(&self, call: SurfaceCall) {
        self.calls.lock().unwrap().push(call);
    }
}

impl StatusSurface for RecordingSurface {
    fn set_version_label(&self, text: &str) {
        self.push(SurfaceCall::Version(text.to_string()));
    }

    fn set_connection_label(&self, text: &str) {
        self.push(SurfaceCall::Connection(text.to_string()));
    }

    fn set_rate_label(&self, text: &str) {
        self.push(SurfaceCall::Rate(text.to_string()));
    }

    fn set_icon(&self, icon: TrayIcon) {
        self.push(SurfaceCall::Icon(icon));
    }
}
