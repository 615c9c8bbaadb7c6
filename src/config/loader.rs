use std::path::Path;

use serde_json::Value;
use tokio::fs;
use tracing::{info, warn};

use crate::types::MonitorError;

use super::{paths, Config, ConfigOverrides};

impl Config {
    /// Load configuration from config.json, then layer environment variables on top.
    /// Falls back to defaults if the file doesn't exist or can't be parsed
    pub async fn load(explicit: Option<&Path>) -> Self {
        let config = match Self::try_load(explicit).await {
            Ok(config) => config,
            Err(err) => {
                warn!(error = ?err, "Failed to load config.json, using defaults");
                Self::default()
            }
        };
        let config = config.with_env(|key| std::env::var(key).ok());
        info!(
            url = %config.url,
            use_rates = config.use_rates,
            insecure = config.insecure,
            "Loaded configuration"
        );
        config
    }

    async fn try_load(explicit: Option<&Path>) -> Result<Self, MonitorError> {
        let config_path = paths::get_config_path(explicit);

        if !config_path.exists() {
            warn!(path = %config_path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&config_path)
            .await
            .map_err(|err| MonitorError::Config(format!("Failed to read config file: {err}")))?;

        let value: Value = serde_json::from_str(&contents)
            .map_err(|err| MonitorError::Config(format!("Failed to parse config.json: {err}")))?;

        serde_json::from_value(value).map_err(|err| {
            MonitorError::Config(format!("Failed to deserialize config.json: {err}"))
        })
    }

    /// Apply `SYNCTHING_API_URL` / `SYNCTHING_API_KEY` as resolved by `lookup`.
    pub fn with_env<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = non_empty(lookup("SYNCTHING_API_URL")) {
            self.url = url;
        }
        if let Some(key) = non_empty(lookup("SYNCTHING_API_KEY")) {
            self.api_key = Some(key);
        }
        self
    }

    pub fn with_overrides(mut self, overrides: ConfigOverrides) -> Self {
        if let Some(url) = non_empty(overrides.url) {
            self.url = url;
        }
        if let Some(key) = non_empty(overrides.api_key) {
            self.api_key = Some(key);
        }
        self.insecure |= overrides.insecure;
        self.use_rates |= overrides.use_rates;
        self
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
