/**
 * STATUS & UPTIME - Dérivation pure de l'état des machines
 *
 * RÔLE : Classification online/offline et pourcentage d'uptime, calculés à
 * chaque lecture depuis l'historique brut des heartbeats. Aucune valeur
 * dérivée n'est stockée : pas de cache à invalider, pas de second état de
 * vérité.
 *
 * MODÈLE : une machine est "en vie" après chaque heartbeat pendant au plus
 * `offline_threshold`. L'uptime est la couverture de la fenêtre par ces
 * intervalles de vie, pas un simple comptage de heartbeats reçus.
 */

use time::{Duration, OffsetDateTime};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceStatus {
    Online,
    Offline,
}

impl DeviceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceStatus::Online => "online",
            DeviceStatus::Offline => "offline",
        }
    }
}

/// Classification binaire. Borne inclusive : un silence exactement égal au
/// seuil reste ONLINE.
pub fn classify(
    last_seen: OffsetDateTime,
    now: OffsetDateTime,
    offline_threshold: Duration,
) -> DeviceStatus {
    if now - last_seen <= offline_threshold {
        DeviceStatus::Online
    } else {
        DeviceStatus::Offline
    }
}

/// Uptime par couverture d'intervalles sur `[window_start, window_end]`.
///
/// Chaque heartbeat ouvre un intervalle de vie : jusqu'au heartbeat suivant,
/// plafonné à `offline_threshold` (l'excédent d'un trou plus long compte
/// pour zéro). Le dernier intervalle court jusqu'à `window_end`, même
/// plafond. Un heartbeat antérieur à la fenêtre contribue sa portion qui
/// déborde dedans. Résultat non arrondi, borné à [0, 100].
pub fn uptime_pct(
    events: &[OffsetDateTime],
    window_start: OffsetDateTime,
    window_end: OffsetDateTime,
    offline_threshold: Duration,
) -> f64 {
    if window_end <= window_start {
        return 0.0;
    }

    let mut events: Vec<OffsetDateTime> =
        events.iter().copied().filter(|t| *t <= window_end).collect();
    events.sort();

    let mut covered = Duration::ZERO;
    for (i, &t) in events.iter().enumerate() {
        let raw = match events.get(i + 1) {
            Some(&next) => next - t,
            None => window_end - t,
        };
        let span = raw.min(offline_threshold);

        let start = t.max(window_start);
        let end = (t + span).min(window_end);
        if end > start {
            covered += end - start;
        }
    }

    let window = window_end - window_start;
    let pct = covered.as_seconds_f64() / window.as_seconds_f64() * 100.0;
    pct.clamp(0.0, 100.0)
}

/// Arrondi à une décimale, à appliquer uniquement à la frontière de
/// restitution (API), jamais dans les calculs intermédiaires.
pub fn round_pct(pct: f64) -> f64 {
    (pct * 10.0).round() / 10.0
}

/// Dernière vue en relatif humain pour le dashboard ("Just now", "5 min
/// ago", "2 hr ago", "3 days ago").
pub fn human_relative(last_seen: OffsetDateTime, now: OffsetDateTime) -> String {
    let elapsed = (now - last_seen).whole_seconds();
    if elapsed < 60 {
        "Just now".to_string()
    } else if elapsed < 3600 {
        format!("{} min ago", elapsed / 60)
    } else if elapsed < 86400 {
        format!("{} hr ago", elapsed / 3600)
    } else {
        format!("{} days ago", elapsed / 86400)
    }
}
