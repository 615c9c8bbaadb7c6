use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::Config;
use crate::types::MonitorError;

use super::api::{
    CompletionQuery, ConnectionsResponse, EventStreamQuery, FolderStatusQuery, FolderSummary,
    RemoteCompletion, SyncthingConfig, SyncthingEvent, SystemStatus, SystemVersion,
};
use super::helpers::load_api_key;

/// The subset of the Syncthing REST API the monitor consumes.
#[async_trait]
pub trait DaemonApi: Send + Sync {
    async fn system_status(&self) -> Result<SystemStatus, MonitorError>;
    async fn system_config(&self) -> Result<SyncthingConfig, MonitorError>;
    async fn system_version(&self) -> Result<SystemVersion, MonitorError>;
    async fn connections(&self) -> Result<ConnectionsResponse, MonitorError>;
    async fn folder_status(&self, folder: &str) -> Result<FolderSummary, MonitorError>;
    async fn completion(&self, device: &str, folder: &str)
        -> Result<RemoteCompletion, MonitorError>;
    /// Long-poll for events with an id greater than `since`.
    async fn events(&self, since: u64) -> Result<Vec<SyncthingEvent>, MonitorError>;
}

#[derive(Clone)]
pub struct SyncthingClient {
    api_key: String,
    http: Client,
    base_url: String,
    event_timeout: Duration,
}

impl SyncthingClient {
    /// Prepare an HTTP client for the configured Syncthing instance.
    pub async fn discover(config: &Config) -> Result<Self, MonitorError> {
        let api_key = load_api_key(config).await?;

        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs.max(1)))
            .danger_accept_invalid_certs(config.insecure)
            .build()
            .map_err(MonitorError::Http)?;

        Ok(Self {
            api_key,
            http,
            base_url: config.url.trim_end_matches('/').to_string(),
            event_timeout: Duration::from_secs(config.event_poll_timeout_secs.clamp(1, 300)),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get_json<T>(&self, path: &str) -> Result<T, MonitorError>
    where
        T: DeserializeOwned,
    {
        self.get_json_with_query(path, &(), None).await
    }

    async fn get_json_with_query<T, Q>(
        &self,
        path: &str,
        query: &Q,
        timeout: Option<Duration>,
    ) -> Result<T, MonitorError>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        let mut request = self
            .http
            .get(url)
            .header("X-API-Key", &self.api_key)
            .query(query);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await.map_err(MonitorError::Http)?;

        if !response.status().is_success() {
            return Err(MonitorError::Syncthing(format!(
                "{} returned {}",
                path,
                response.status()
            )));
        }

        response.json::<T>().await.map_err(MonitorError::Http)
    }
}

#[async_trait]
impl DaemonApi for SyncthingClient {
    async fn system_status(&self) -> Result<SystemStatus, MonitorError> {
        self.get_json("/rest/system/status").await
    }

    async fn system_config(&self) -> Result<SyncthingConfig, MonitorError> {
        self.get_json("/rest/system/config").await
    }

    async fn system_version(&self) -> Result<SystemVersion, MonitorError> {
        self.get_json("/rest/system/version").await
    }

    async fn connections(&self) -> Result<ConnectionsResponse, MonitorError> {
        self.get_json("/rest/system/connections").await
    }

    async fn folder_status(&self, folder: &str) -> Result<FolderSummary, MonitorError> {
        let query = FolderStatusQuery { folder };
        self.get_json_with_query("/rest/db/status", &query, None)
            .await
    }

    async fn completion(
        &self,
        device: &str,
        folder: &str,
    ) -> Result<RemoteCompletion, MonitorError> {
        let query = CompletionQuery { device, folder };
        self.get_json_with_query("/rest/db/completion", &query, None)
            .await
    }

    async fn events(&self, since: u64) -> Result<Vec<SyncthingEvent>, MonitorError> {
        let query = EventStreamQuery {
            since,
            timeout: self.event_timeout.as_secs(),
        };
        // The daemon holds the request open for up to `timeout` seconds.
        let deadline = self.event_timeout + Duration::from_secs(10);
        self.get_json_with_query("/rest/events", &query, Some(deadline))
            .await
    }
}
