use tokio::fs;

use crate::config::Config;
use crate::types::MonitorError;

/// Resolve the API key: configured value first, then the daemon's own config.xml.
pub async fn load_api_key(config: &Config) -> Result<String, MonitorError> {
    if let Some(value) = config.api_key.as_deref() {
        if !value.trim().is_empty() {
            return Ok(value.trim().to_string());
        }
    }

    let config_xml_path = config.syncthing_config_xml_path();
    let contents = fs::read_to_string(&config_xml_path)
        .await
        .map_err(|_| MonitorError::MissingApiKey)?;
    extract_api_key(&contents).ok_or(MonitorError::MissingApiKey)
}

fn extract_api_key(contents: &str) -> Option<String> {
    let start_tag = "<apikey>";
    let end_tag = "</apikey>";
    let start = contents.find(start_tag)? + start_tag.len();
    let rest = &contents[start..];
    let end = rest.find(end_tag)?;
    let key = rest[..end].trim();
    if key.is_empty() {
        None
    } else {
        Some(key.to_string())
    }
}
