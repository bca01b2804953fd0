/**
 * API REST VIGIL - Serveur HTTP principal
 *
 * RÔLE :
 * Ce module expose l'API du moniteur : ingestion des heartbeats poussés par
 * les agents et restitution de l'état du parc pour dashboard/CLI.
 *
 * FONCTIONNEMENT :
 * - Serveur Axum, routes : /health, /heartbeat, /devices, /devices/{name}
 * - Statut et uptime dérivés à chaque lecture depuis le store (jamais stockés)
 * - Gestion erreurs HTTP standardisée (400 payload invalide, 404 machine
 *   inconnue, 500 échec d'écriture — jamais d'acquittement sans write durable)
 *
 * UTILITÉ DANS VIGIL :
 * 🎯 POST /heartbeat : point d'entrée unique des agents du parc
 * 🎯 GET /devices : vue parc complète (statut, last seen, uptime, compteurs)
 * 🎯 Debug/administration : inspection de l'état en temps réel
 */

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use std::sync::Arc;
use time::{format_description::well_known::Rfc3339, Duration, OffsetDateTime};

use crate::config::ServerConfig;
use crate::models::{DeviceListing, DeviceView, HeartbeatAck, HeartbeatIn};
use crate::state::Shared;
use crate::status;
use crate::store::{DeviceMeta, HeartbeatStore};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<HeartbeatStore>,
    pub cfg: Shared<ServerConfig>,
}

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/heartbeat", post(ingest_heartbeat))
        .route("/devices", get(list_devices))
        .route("/devices/{name}", get(get_device))
        .with_state(app_state)
}

// POST /heartbeat (ingestion agent)
async fn ingest_heartbeat(
    State(app): State<AppState>,
    Json(hb): Json<HeartbeatIn>,
) -> Result<Json<HeartbeatAck>, (StatusCode, Json<serde_json::Value>)> {
    let device_name = hb.device_name.trim();
    if device_name.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": "device_name is required" })),
        ));
    }

    let now = OffsetDateTime::now_utc();
    match app.store.append(
        device_name,
        hb.timestamp.as_deref(),
        hb.mac_address.as_deref(),
        now,
    ) {
        Ok(_) => Ok(Json(HeartbeatAck {
            status: "success".to_string(),
            device_name: device_name.to_string(),
            server_time: now.format(&Rfc3339).unwrap_or_default(),
        })),
        Err(e) => {
            // write échoué = pas d'acquittement, l'agent retentera
            eprintln!("[server] heartbeat write failed for {device_name}: {e}");
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": e.to_string() })),
            ))
        }
    }
}

// GET /devices (vue parc complète)
async fn list_devices(State(app): State<AppState>) -> Json<DeviceListing> {
    let (threshold, window) = view_params(&app);
    let now = OffsetDateTime::now_utc();

    let devices: Vec<DeviceView> = app
        .store
        .snapshot_devices()
        .iter()
        .map(|meta| to_view(&app.store, meta, now, threshold, window))
        .collect();

    let online = devices.iter().filter(|d| d.status == "online").count();
    Json(DeviceListing {
        total: devices.len(),
        online,
        offline: devices.len() - online,
        devices,
    })
}

// GET /devices/{name} (détail ; 404 = machine jamais vue)
async fn get_device(
    State(app): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<DeviceView>, StatusCode> {
    let Some(meta) = app.store.device(&name) else {
        return Err(StatusCode::NOT_FOUND);
    };

    let (threshold, window) = view_params(&app);
    let now = OffsetDateTime::now_utc();
    Ok(Json(to_view(&app.store, &meta, now, threshold, window)))
}

/// Seuil et fenêtre relus à chaque requête depuis la config partagée.
fn view_params(app: &AppState) -> (Duration, Duration) {
    let cfg = app.cfg.lock();
    (cfg.offline_threshold(), cfg.uptime_window())
}

fn to_view(
    store: &HeartbeatStore,
    meta: &DeviceMeta,
    now: OffsetDateTime,
    threshold: Duration,
    window: Duration,
) -> DeviceView {
    let window_start = now - window;
    // un heartbeat antérieur à la fenêtre peut encore la couvrir sur au plus
    // `threshold`, d'où la marge sur la borne de lecture
    let events = store.events_for(&meta.device_name, window_start - threshold);
    let uptime = status::round_pct(status::uptime_pct(&events, window_start, now, threshold));

    DeviceView {
        device_name: meta.device_name.clone(),
        status: status::classify(meta.last_seen, now, threshold).as_str().to_string(),
        last_seen: status::human_relative(meta.last_seen, now),
        last_seen_at: meta.last_seen.format(&Rfc3339).unwrap_or_default(),
        uptime_pct: uptime,
        total_heartbeats: meta.total_heartbeats,
        first_seen: meta.first_seen.format(&Rfc3339).unwrap_or_default(),
    }
}
