/**
 * RETENTION SWEEPER - Purge périodique de l'historique des heartbeats
 *
 * RÔLE : Borne la croissance du stockage en supprimant les événements plus
 * vieux que l'horizon de rétention. Tâche de fond indépendante : un échec de
 * purge est loggé et retenté au cycle suivant, jamais propagé à l'ingestion
 * ni aux lectures.
 */

use std::sync::Arc;
use time::{format_description::well_known::Rfc3339, Duration, OffsetDateTime};
use tokio::task;

use crate::config::ServerConfig;
use crate::state::Shared;
use crate::store::HeartbeatStore;

/// Borne de purge : jamais en deçà de la fenêtre d'uptime, pour qu'une purge
/// ne tronque pas une requête d'uptime en cours sur la fenêtre glissante.
pub fn sweep_cutoff(
    now: OffsetDateTime,
    retention_horizon: Duration,
    uptime_window: Duration,
) -> OffsetDateTime {
    now - retention_horizon.max(uptime_window)
}

/// Démarre la purge périodique. L'horizon et la fenêtre sont relus à chaque
/// cycle depuis la config partagée (valeur changée = appliquée au prochain
/// passage).
pub fn spawn_retention_sweeper(store: Arc<HeartbeatStore>, cfg: Shared<ServerConfig>) {
    let interval = cfg.lock().sweep_interval();
    println!(
        "[retention] sweeper started (every {}h)",
        interval.as_secs() / 3600
    );

    task::spawn(async move {
        let mut ticker = tokio::time::interval(interval);

        loop {
            ticker.tick().await;

            let (horizon, window) = {
                let c = cfg.lock();
                (c.retention_horizon(), c.uptime_window())
            };
            let cutoff = sweep_cutoff(OffsetDateTime::now_utc(), horizon, window);

            match store.delete_older_than(cutoff) {
                Ok(0) => {}
                Ok(n) => println!(
                    "[retention] purged {} heartbeat(s) older than {}",
                    n,
                    cutoff.format(&Rfc3339).unwrap_or_default()
                ),
                Err(e) => eprintln!("[retention] sweep failed, retrying next cycle: {e}"),
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn cutoff_uses_retention_horizon_when_larger() {
        let now = datetime!(2026-01-08 0:00 UTC);
        let cutoff = sweep_cutoff(now, Duration::days(7), Duration::hours(24));
        assert_eq!(cutoff, now - Duration::days(7));
    }

    #[test]
    fn cutoff_never_truncates_uptime_window() {
        // horizon mal configuré plus court que la fenêtre : la fenêtre gagne
        let now = datetime!(2026-01-08 0:00 UTC);
        let cutoff = sweep_cutoff(now, Duration::hours(1), Duration::hours(24));
        assert_eq!(cutoff, now - Duration::hours(24));
    }

    #[test]
    fn sweep_keeps_events_inside_uptime_window() {
        let path = std::env::temp_dir().join(format!(
            "vigil-retention-test-{}.json",
            std::process::id()
        ));
        let _ = std::fs::remove_file(&path);
        let store = HeartbeatStore::new(path.clone()).unwrap();

        let now = datetime!(2026-01-08 0:00 UTC);
        store.append("pc", None, None, now - Duration::hours(2)).unwrap();
        store.append("pc", None, None, now - Duration::days(10)).unwrap();

        let cutoff = sweep_cutoff(now, Duration::hours(1), Duration::hours(24));
        let removed = store.delete_older_than(cutoff).unwrap();

        assert_eq!(removed, 1);
        assert_eq!(store.events_for("pc", now - Duration::days(30)).len(), 1);

        let _ = std::fs::remove_file(path);
    }
}
