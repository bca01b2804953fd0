/**
 * VIGIL SERVER - Point d'entrée du moniteur de parc
 *
 * RÔLE : Orchestration des modules : config, store, purge de rétention, API
 * HTTP. Reçoit les heartbeats poussés par les agents et restitue statut
 * online/offline + uptime dérivés à la lecture.
 *
 * ARCHITECTURE : ingestion append-only → store fichier JSON → dérivation
 * pure à la lecture. La purge tourne en tâche de fond indépendante.
 */

mod config;
mod http;
mod models;
mod retention;
mod state;
mod status;
mod store;

use crate::config::ServerConfig;
use crate::http::AppState;
use crate::state::{new_state, Shared};
use crate::store::HeartbeatStore;

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() {
    // Charger les variables d'environnement depuis .env (si présent)
    dotenvy::dotenv().ok();

    let cfg_loaded: ServerConfig = config::load_config().await;
    let cfg: Shared<ServerConfig> = new_state(cfg_loaded.clone());

    std::fs::create_dir_all(&cfg_loaded.data_dir).unwrap_or_else(|e| {
        eprintln!("[server] warning: failed to create data dir: {e}");
    });

    let store_path = Path::new(&cfg_loaded.data_dir).join("heartbeats.json");
    let store = match HeartbeatStore::new(store_path) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            eprintln!("[server] failed to open heartbeat store: {e}");
            std::process::exit(1);
        }
    };

    // purge de rétention en tâche de fond
    retention::spawn_retention_sweeper(store.clone(), cfg.clone());

    // fabrique l'état unique pour Axum
    let app_state = AppState { store, cfg };
    let app = http::build_router(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], cfg_loaded.listen_port));
    println!("[server] listening on http://{addr}");
    println!(
        "[server] offline threshold: {}s, uptime window: {}h, retention: {}d",
        cfg_loaded.offline_threshold_secs, cfg_loaded.uptime_window_hours, cfg_loaded.retention_days
    );
    let listener = TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
