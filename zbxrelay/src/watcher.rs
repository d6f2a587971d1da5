/**
 * CONFIG WATCHER - Rechargement à chaud
 *
 * RÔLE : Surveille la date de modification du fichier de réglages et de
 * monitems.json, recharge et republie en bloc ce qui a changé.
 *
 * - Un reload raté est loggé, l'ancienne photo reste en place
 * - Le niveau de log est réappliqué à chaque reload des réglages
 * - `bind` n'est pris en compte qu'au redémarrage
 */

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::task::JoinHandle;

use crate::catalog::MonitorCatalog;
use crate::config::{Overrides, Settings};
use crate::logging::LogHandle;
use crate::state::RelayState;

#[derive(Debug, Default, PartialEq)]
pub struct ReloadOutcome {
    pub settings_reloaded: bool,
    pub catalog_reloaded: bool,
}

pub struct ConfigWatcher {
    settings_path: Option<PathBuf>,
    overrides: Overrides,
    state: RelayState,
    log: Option<LogHandle>,
    settings_mtime: Option<SystemTime>,
    catalog_mtime: Option<SystemTime>,
}

impl ConfigWatcher {
    pub async fn new(settings_path: Option<PathBuf>, overrides: Overrides, state: RelayState) -> Self {
        let settings_mtime = match &settings_path {
            Some(path) => modified(path).await,
            None => None,
        };
        let catalog_mtime = modified(&state.settings.load().catalog_path()).await;
        Self { settings_path, overrides, state, log: None, settings_mtime, catalog_mtime }
    }

    pub fn with_log_handle(mut self, log: LogHandle) -> Self {
        self.log = Some(log);
        self
    }

    /// Un tour de vérification
    pub async fn poll_once(&mut self) -> ReloadOutcome {
        let mut outcome = ReloadOutcome::default();
        let mut force_catalog = false;

        if let Some(path) = self.settings_path.clone() {
            let mtime = modified(&path).await;
            if mtime.is_some() && mtime != self.settings_mtime {
                self.settings_mtime = mtime;
                if let Some(data_path_changed) = self.reload_settings(&path).await {
                    outcome.settings_reloaded = true;
                    force_catalog = data_path_changed;
                }
            }
        }

        let catalog_path = self.state.settings.load().catalog_path();
        let mtime = modified(&catalog_path).await;
        if force_catalog || (mtime.is_some() && mtime != self.catalog_mtime) {
            self.catalog_mtime = mtime;
            outcome.catalog_reloaded = self.reload_catalog(&catalog_path).await;
        }
        outcome
    }

    /// Retourne `Some(data_path a changé)` si les réglages ont été republiés
    async fn reload_settings(&self, path: &Path) -> Option<bool> {
        let overrides = Overrides { config: Some(path.to_path_buf()), ..self.overrides.clone() };
        // lecture YAML + recherche de fichiers : hors des workers tokio
        let loaded = match tokio::task::spawn_blocking(move || Settings::load(&overrides)).await {
            Ok(Ok(loaded)) => loaded,
            Ok(Err(e)) => {
                tracing::error!(?path, "settings reload failed, keeping previous: {e}");
                return None;
            }
            Err(e) => {
                tracing::error!(?path, "settings reload task failed: {e}");
                return None;
            }
        };
        loaded.log_notices();

        let current = self.state.settings.load();
        if loaded.settings.bind != current.bind {
            tracing::warn!(
                old = %current.bind,
                new = %loaded.settings.bind,
                "bind address change requires a restart"
            );
        }
        let data_path_changed = loaded.settings.data_path != current.data_path;
        if let Some(log) = &self.log {
            log.set_level(&loaded.settings);
        }
        self.state.settings.store(loaded.settings);
        tracing::info!(?path, "settings reloaded");
        Some(data_path_changed)
    }

    async fn reload_catalog(&self, path: &Path) -> bool {
        match MonitorCatalog::load_file(path).await {
            Ok(catalog) => {
                tracing::info!(?path, items = catalog.len(), "monitor catalog reloaded");
                self.state.catalog.store(catalog);
                true
            }
            Err(e) => {
                tracing::error!(?path, "catalog reload failed, keeping previous: {e}");
                false
            }
        }
    }

    /// Boucle de surveillance en tâche de fond
    pub fn spawn(mut self) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                let every = self.state.settings.load().reload_interval_secs;
                tokio::time::sleep(Duration::from_secs(every)).await;
                self.poll_once().await;
            }
        })
    }
}

async fn modified(path: &Path) -> Option<SystemTime> {
    tokio::fs::metadata(path).await.and_then(|m| m.modified()).ok()
}
