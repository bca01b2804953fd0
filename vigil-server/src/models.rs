use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct HeartbeatIn {
    pub device_name: String,
    pub timestamp: Option<String>, // horloge client, ISO-8601 (gardée brute)
    pub mac_address: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HeartbeatAck {
    pub status: String,
    pub device_name: String,
    pub server_time: String, // RFC3339, heure de réception serveur
}

#[derive(Debug, Serialize)]
pub struct DeviceView {
    pub device_name: String,
    pub status: String,       // online / offline
    pub last_seen: String,    // relatif humain ("5 min ago")
    pub last_seen_at: String, // RFC3339
    pub uptime_pct: f64,      // fenêtre glissante, arrondi à 1 décimale
    pub total_heartbeats: u64,
    pub first_seen: String,
}

#[derive(Debug, Serialize)]
pub struct DeviceListing {
    pub total: usize,
    pub online: usize,
    pub offline: usize,
    pub devices: Vec<DeviceView>,
}
