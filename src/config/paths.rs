use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::Config;

impl Config {
    /// Get the full path to the Syncthing config XML file
    pub fn syncthing_config_xml_path(&self) -> String {
        let dir = self.syncthing_config_dir.trim_end_matches('/');
        format!("{}/config.xml", dir)
    }
}

/// Get the path to the config.json file
/// Uses the explicit path if given, otherwise looks next to the install root
pub(super) fn get_config_path(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }

    // Executable is at: app_root/bin/syncthing-tray
    // Config should be at: app_root/config.json
    if let Ok(exe_path) = std::env::current_exe() {
        debug!(path = %exe_path.display(), "Executable path detected");

        if let Some(app_root) = exe_path.parent().and_then(Path::parent) {
            let config_path = app_root.join("config.json");
            if config_path.exists() {
                debug!(path = %config_path.display(), "Using config next to install root");
                return config_path;
            }
        }
    }

    warn!("Using fallback: looking for config.json in current directory");
    PathBuf::from("config.json")
}
