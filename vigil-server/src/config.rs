use serde::{Deserialize, Serialize};
use std::path::Path;
use time::Duration;
use tokio::fs;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_offline_threshold_secs")]
    pub offline_threshold_secs: u64,
    #[serde(default = "default_uptime_window_hours")]
    pub uptime_window_hours: u64,
    #[serde(default = "default_retention_days")]
    pub retention_days: u64,
    #[serde(default = "default_sweep_interval_hours")]
    pub sweep_interval_hours: u64,
    #[serde(default = "default_expected_interval_secs")]
    pub expected_interval_secs: u64,
}

fn default_listen_port() -> u16 {
    8080
}
fn default_data_dir() -> String {
    "./data".into()
}
fn default_offline_threshold_secs() -> u64 {
    300
}
fn default_uptime_window_hours() -> u64 {
    24
}
fn default_retention_days() -> u64 {
    7
}
fn default_sweep_interval_hours() -> u64 {
    24
}
fn default_expected_interval_secs() -> u64 {
    60
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_port: default_listen_port(),
            data_dir: default_data_dir(),
            offline_threshold_secs: default_offline_threshold_secs(),
            uptime_window_hours: default_uptime_window_hours(),
            retention_days: default_retention_days(),
            sweep_interval_hours: default_sweep_interval_hours(),
            expected_interval_secs: default_expected_interval_secs(),
        }
    }
}

impl ServerConfig {
    pub fn offline_threshold(&self) -> Duration {
        Duration::seconds(self.offline_threshold_secs as i64)
    }

    pub fn uptime_window(&self) -> Duration {
        Duration::hours(self.uptime_window_hours as i64)
    }

    pub fn retention_horizon(&self) -> Duration {
        Duration::days(self.retention_days as i64)
    }

    pub fn sweep_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.sweep_interval_hours.max(1) * 3600)
    }

    /// Seuil offline < 3x l'intervalle d'envoi attendu = statut qui clignote
    /// au moindre retard réseau. Signalé au chargement, jamais bloquant.
    pub fn is_flap_prone(&self) -> bool {
        self.offline_threshold_secs < self.expected_interval_secs.saturating_mul(3)
    }
}

pub async fn load_config() -> ServerConfig {
    let path = std::env::var("VIGIL_SERVER_CONFIG").unwrap_or_else(|_| "server.yaml".into());
    let cfg = if Path::new(&path).exists() {
        let txt = fs::read_to_string(&path).await.unwrap_or_default();
        if txt.trim().is_empty() {
            ServerConfig::default()
        } else {
            serde_yaml::from_str(&txt).unwrap_or_else(|e| {
                eprintln!("[server] config invalide: {e}");
                ServerConfig::default()
            })
        }
    } else {
        eprintln!("[server] pas de server.yaml, usage config par défaut");
        ServerConfig::default()
    };

    if cfg.is_flap_prone() {
        eprintln!(
            "[server] warning: offline_threshold_secs={} < 3x expected_interval_secs={}, status may flap",
            cfg.offline_threshold_secs, cfg.expected_interval_secs
        );
    }
    cfg
}
