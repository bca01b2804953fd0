/**
 * HEARTBEAT STORE - Persistance de l'historique de vie des machines
 *
 * RÔLE :
 * Ce module stocke le flux brut des heartbeats reçus : un enregistrement
 * immuable par réception, plus une fiche par machine (première/dernière vue,
 * compteur à vie). Le statut et l'uptime ne sont JAMAIS stockés : ils sont
 * dérivés à la lecture depuis cet historique (voir status.rs).
 *
 * FONCTIONNEMENT :
 * - Stockage en fichier JSON unique (évoluera vers SQLite si besoin)
 * - Cache mémoire sous mutex, écriture disque synchrone à chaque append
 * - Un événement n'entre dans le cache qu'après écriture disque réussie :
 *   un write échoué ne doit jamais être acquitté au client
 * - Suppression uniquement en masse par la purge de rétention
 *
 * UTILITÉ DANS VIGIL :
 * 🎯 Ingestion POST /heartbeat : append + mise à jour fiche machine
 * 🎯 Dérivation statut/uptime : requêtes par machine sur une fenêtre
 * 🎯 Rétention : delete_older_than borne la croissance du fichier
 */

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use time::OffsetDateTime;
use uuid::Uuid;

/// Erreurs possibles lors des opérations sur le store
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Un heartbeat reçu. Immuable une fois écrit, ordonné par received_at
/// (heure serveur ; l'horodatage client est gardé brut pour diagnostic).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatEvent {
    pub id: String,
    pub device_name: String,
    pub received_at: OffsetDateTime,
    pub client_timestamp: Option<String>,
}

/// Fiche machine, créée implicitement au premier heartbeat accepté.
/// Survit à la purge de l'historique (compteur à vie, première vue).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceMeta {
    pub device_name: String,
    pub first_seen: OffsetDateTime,
    pub last_seen: OffsetDateTime,
    pub total_heartbeats: u64,
    pub mac_address: Option<String>,
}

/// Document persisté : fiches machines + flux d'événements.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoreDocument {
    devices: HashMap<String, DeviceMeta>,
    events: Vec<HeartbeatEvent>,
}

pub struct HeartbeatStore {
    storage_path: PathBuf,
    cache: Mutex<StoreDocument>,
}

impl HeartbeatStore {
    /// Ouvre (ou crée) le store au chemin donné et charge le cache mémoire.
    pub fn new<P: Into<PathBuf>>(storage_path: P) -> Result<Self, StoreError> {
        let path = storage_path.into();
        let store = Self {
            storage_path: path.clone(),
            cache: Mutex::new(StoreDocument::default()),
        };

        store.load_from_disk()?;
        {
            let doc = store.cache.lock();
            eprintln!(
                "[store] initialized at {:?} ({} devices, {} events)",
                path,
                doc.devices.len(),
                doc.events.len()
            );
        }
        Ok(store)
    }

    fn load_from_disk(&self) -> Result<(), StoreError> {
        if !self.storage_path.exists() {
            let empty = serde_json::to_string(&StoreDocument::default())?;
            fs::write(&self.storage_path, empty)?;
        }

        let content = fs::read_to_string(&self.storage_path)?;
        let doc: StoreDocument = serde_json::from_str(&content)?;

        *self.cache.lock() = doc;
        Ok(())
    }

    fn save_locked(&self, doc: &StoreDocument) -> Result<(), StoreError> {
        let json = serde_json::to_string(doc)?;
        fs::write(&self.storage_path, json)?;
        Ok(())
    }

    /// Enregistre un heartbeat : fiche machine mise à jour + événement
    /// ajouté. Le cache n'est modifié définitivement qu'après écriture
    /// disque réussie ; en cas d'échec la mutation est annulée et l'erreur
    /// remonte jusqu'au client HTTP.
    pub fn append(
        &self,
        device_name: &str,
        client_timestamp: Option<&str>,
        mac_address: Option<&str>,
        received_at: OffsetDateTime,
    ) -> Result<String, StoreError> {
        let event = HeartbeatEvent {
            id: Uuid::new_v4().to_string(),
            device_name: device_name.to_string(),
            received_at,
            client_timestamp: client_timestamp.map(str::to_string),
        };
        let id = event.id.clone();

        let mut doc = self.cache.lock();
        let previous_meta = doc.devices.get(device_name).cloned();

        let meta = doc
            .devices
            .entry(device_name.to_string())
            .or_insert_with(|| DeviceMeta {
                device_name: device_name.to_string(),
                first_seen: received_at,
                last_seen: received_at,
                total_heartbeats: 0,
                mac_address: None,
            });
        meta.last_seen = received_at;
        meta.total_heartbeats += 1;
        if let Some(mac) = mac_address {
            meta.mac_address = Some(mac.to_string());
        }
        doc.events.push(event);

        if let Err(e) = self.save_locked(&doc) {
            // rollback : pas d'acquittement sans donnée durable
            doc.events.pop();
            match previous_meta {
                Some(meta) => {
                    doc.devices.insert(device_name.to_string(), meta);
                }
                None => {
                    doc.devices.remove(device_name);
                }
            }
            return Err(e);
        }

        Ok(id)
    }

    /// Fiches machines triées par nom (ordre stable pour l'API de listing).
    pub fn snapshot_devices(&self) -> Vec<DeviceMeta> {
        let doc = self.cache.lock();
        let mut devices: Vec<DeviceMeta> = doc.devices.values().cloned().collect();
        devices.sort_by(|a, b| a.device_name.cmp(&b.device_name));
        devices
    }

    pub fn device(&self, device_name: &str) -> Option<DeviceMeta> {
        self.cache.lock().devices.get(device_name).cloned()
    }

    /// Horodatages de réception d'une machine depuis `since`, triés
    /// croissant. C'est l'entrée brute de l'agrégateur d'uptime.
    pub fn events_for(&self, device_name: &str, since: OffsetDateTime) -> Vec<OffsetDateTime> {
        let doc = self.cache.lock();
        let mut timestamps: Vec<OffsetDateTime> = doc
            .events
            .iter()
            .filter(|e| e.device_name == device_name && e.received_at >= since)
            .map(|e| e.received_at)
            .collect();
        timestamps.sort();
        timestamps
    }

    /// Purge en masse : supprime les événements STRICTEMENT plus vieux que
    /// `cutoff`. Les fiches machines ne sont jamais supprimées. Retourne le
    /// nombre d'événements purgés ; en cas d'échec disque le cache est
    /// restauré et la purge sera retentée au prochain cycle.
    pub fn delete_older_than(&self, cutoff: OffsetDateTime) -> Result<usize, StoreError> {
        let mut doc = self.cache.lock();
        let kept: Vec<HeartbeatEvent> = doc
            .events
            .iter()
            .filter(|e| e.received_at >= cutoff)
            .cloned()
            .collect();
        let removed = doc.events.len() - kept.len();
        if removed == 0 {
            return Ok(0);
        }

        let original = std::mem::replace(&mut doc.events, kept);
        if let Err(e) = self.save_locked(&doc) {
            doc.events = original;
            return Err(e);
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn temp_store(tag: &str) -> (HeartbeatStore, PathBuf) {
        let path = std::env::temp_dir().join(format!(
            "vigil-store-{}-{}.json",
            tag,
            std::process::id()
        ));
        let _ = fs::remove_file(&path);
        (HeartbeatStore::new(path.clone()).unwrap(), path)
    }

    #[test]
    fn append_creates_device_and_counts() {
        let (store, path) = temp_store("append");
        let t0 = datetime!(2026-01-01 10:00 UTC);

        store.append("Branch_01", Some("2026-01-01T10:00:00"), None, t0).unwrap();
        store
            .append("Branch_01", None, Some("aa:bb:cc:dd:ee:ff"), t0 + time::Duration::seconds(60))
            .unwrap();

        let meta = store.device("Branch_01").unwrap();
        assert_eq!(meta.total_heartbeats, 2);
        assert_eq!(meta.first_seen, t0);
        assert_eq!(meta.last_seen, t0 + time::Duration::seconds(60));
        assert_eq!(meta.mac_address.as_deref(), Some("aa:bb:cc:dd:ee:ff"));
        assert!(store.device("Branch_02").is_none());

        let _ = fs::remove_file(path);
    }

    #[test]
    fn events_for_filters_and_sorts() {
        let (store, path) = temp_store("events");
        let t0 = datetime!(2026-01-01 10:00 UTC);

        // insertion volontairement désordonnée
        store.append("pc", None, None, t0 + time::Duration::seconds(120)).unwrap();
        store.append("pc", None, None, t0).unwrap();
        store.append("pc", None, None, t0 + time::Duration::seconds(60)).unwrap();
        store.append("other", None, None, t0).unwrap();

        let events = store.events_for("pc", t0 + time::Duration::seconds(30));
        assert_eq!(
            events,
            vec![t0 + time::Duration::seconds(60), t0 + time::Duration::seconds(120)]
        );

        let _ = fs::remove_file(path);
    }

    #[test]
    fn delete_older_than_keeps_device_meta() {
        let (store, path) = temp_store("purge");
        let t0 = datetime!(2026-01-01 10:00 UTC);

        store.append("pc", None, None, t0).unwrap();
        store.append("pc", None, None, t0 + time::Duration::hours(1)).unwrap();

        let removed = store
            .delete_older_than(t0 + time::Duration::minutes(30))
            .unwrap();
        assert_eq!(removed, 1);

        // la fiche et son compteur à vie survivent à la purge
        let meta = store.device("pc").unwrap();
        assert_eq!(meta.total_heartbeats, 2);
        assert_eq!(store.events_for("pc", t0).len(), 1);

        // cutoff est strict : un événement pile sur la borne est conservé
        let removed = store
            .delete_older_than(t0 + time::Duration::hours(1))
            .unwrap();
        assert_eq!(removed, 0);

        let _ = fs::remove_file(path);
    }

    #[test]
    fn store_reloads_from_disk() {
        let (store, path) = temp_store("reload");
        let t0 = datetime!(2026-01-01 10:00 UTC);
        store.append("pc", None, None, t0).unwrap();
        drop(store);

        let reopened = HeartbeatStore::new(path.clone()).unwrap();
        assert_eq!(reopened.device("pc").unwrap().total_heartbeats, 1);
        assert_eq!(reopened.events_for("pc", t0).len(), 1);

        let _ = fs::remove_file(path);
    }

    #[test]
    fn failed_write_is_not_acknowledged() {
        let (store, path) = temp_store("rollback");
        let t0 = datetime!(2026-01-01 10:00 UTC);
        store.append("pc", None, None, t0).unwrap();

        // rend le chemin inécrivable : le fichier devient un répertoire
        fs::remove_file(&path).unwrap();
        fs::create_dir(&path).unwrap();

        let result = store.append("pc", None, None, t0 + time::Duration::seconds(60));
        assert!(result.is_err());

        // le cache ne garde aucune trace de l'append refusé
        assert_eq!(store.device("pc").unwrap().total_heartbeats, 1);
        assert_eq!(store.events_for("pc", t0).len(), 1);

        let _ = fs::remove_dir(&path);
    }
}
