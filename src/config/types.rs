use serde::{Deserialize, Serialize};

/// Configuration for the Syncthing tray monitor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_url")]
    pub url: String,

    #[serde(default)]
    pub api_key: Option<String>,

    /// Skip TLS certificate verification for the daemon connection.
    #[serde(default)]
    pub insecure: bool,

    /// Derive upload/download activity from sampled transfer rates instead of completion.
    #[serde(default)]
    pub use_rates: bool,

    #[serde(default = "default_config_dir")]
    pub syncthing_config_dir: String,

    #[serde(default = "default_event_poll_timeout")]
    pub event_poll_timeout_secs: u64,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            url: default_url(),
            api_key: None,
            insecure: false,
            use_rates: false,
            syncthing_config_dir: default_config_dir(),
            event_poll_timeout_secs: default_event_poll_timeout(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

/// Values supplied on the command line; `None`/`false` leaves the loaded value alone.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub url: Option<String>,
    pub api_key: Option<String>,
    pub insecure: bool,
    pub use_rates: bool,
}

fn default_url() -> String {
    "http://localhost:8384".to_string()
}

fn default_config_dir() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.config/syncthing", home.trim_end_matches('/'))
}

fn default_event_poll_timeout() -> u64 {
    60
}

fn default_request_timeout() -> u64 {
    10
}
