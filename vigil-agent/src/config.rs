//! Agent configuration with cross-platform storage
//!
//! Handles:
//! - Server endpoint and device identity
//! - Heartbeat cadence and retry budget
//! - TOML file in the OS config directory, edited between runs

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    pub server_url: String,
    pub device_name: String,
    #[serde(default = "default_heartbeat_interval_secs")]
    pub heartbeat_interval_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: i64,
}

fn default_heartbeat_interval_secs() -> u64 {
    60
}

fn default_max_retries() -> i64 {
    3
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:8080/heartbeat".to_string(),
            device_name: default_device_name(),
            heartbeat_interval_secs: default_heartbeat_interval_secs(),
            max_retries: default_max_retries(),
        }
    }
}

/// Default device name from the system hostname, sanitized the way operators
/// expect to see it in the dashboard (no dashes or dots).
pub fn default_device_name() -> String {
    let name = hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_default();
    if name.is_empty() {
        "PC_Unknown".to_string()
    } else {
        name.replace(['-', '.'], "_")
    }
}

impl AgentConfig {
    /// Load config from OS-specific location
    pub async fn load() -> Result<Self> {
        let config_path = Self::config_file_path()?;
        let content = tokio::fs::read_to_string(&config_path).await?;
        let config: AgentConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save config to OS-specific location
    pub async fn save(&self) -> Result<()> {
        let config_path = Self::config_file_path()?;

        if let Some(parent) = config_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let content = toml::to_string_pretty(self)?;
        tokio::fs::write(&config_path, content).await?;
        Ok(())
    }

    /// Get OS-specific config file path
    pub fn config_file_path() -> Result<PathBuf> {
        let mut path = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;

        path.push("vigil-agent");
        path.push("config.toml");
        Ok(path)
    }

    /// Check if this is first-time setup
    pub fn is_first_time_setup() -> bool {
        Self::config_file_path()
            .map(|p| !p.exists())
            .unwrap_or(true)
    }

    /// A config is usable once both endpoint and identity are filled in.
    /// Anything else sends the operator back through the setup wizard.
    pub fn is_complete(&self) -> bool {
        !self.server_url.trim().is_empty() && !self.device_name.trim().is_empty()
    }

    /// Steady-state send interval; a zero in the file is clamped to 1s.
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AgentConfig::default();
        assert_eq!(config.heartbeat_interval_secs, 60);
        assert_eq!(config.max_retries, 3);
        assert!(config.is_complete());
    }

    #[test]
    fn test_config_file_path() {
        let path = AgentConfig::config_file_path().unwrap();
        assert!(path.to_string_lossy().contains("vigil-agent"));
        assert!(path.to_string_lossy().contains("config.toml"));
    }

    #[test]
    fn test_default_device_name_is_sanitized() {
        let name = default_device_name();
        assert!(!name.is_empty());
        assert!(!name.contains('-'));
        assert!(!name.contains('.'));
    }

    #[test]
    fn test_incomplete_config_detected() {
        let mut config = AgentConfig::default();
        config.device_name = "  ".to_string();
        assert!(!config.is_complete());
    }

    #[test]
    fn test_zero_interval_clamped() {
        let mut config = AgentConfig::default();
        config.heartbeat_interval_secs = 0;
        assert_eq!(config.heartbeat_interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_missing_optional_fields_use_defaults() {
        let config: AgentConfig = toml::from_str(
            "server_url = \"http://monitor.example:8080/heartbeat\"\ndevice_name = \"Store_01\"\n",
        )
        .unwrap();
        assert_eq!(config.heartbeat_interval_secs, 60);
        assert_eq!(config.max_retries, 3);
    }
}
