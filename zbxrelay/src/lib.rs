/**
 * ZBXRELAY - Relais agents Zabbix -> collecteur de métriques
 *
 * RÔLE : Se présente comme un serveur Zabbix aux agents (checks actifs,
 * réception des mesures) et comme un agent auprès du collecteur aval.
 *
 * ARCHITECTURE :
 * listener -> handler -> frame (décodage) -> [catalog | ingest -> forwarder]
 * -> frame (encodage) -> réponse -> fermeture
 */

pub mod catalog;
pub mod cli;
pub mod config;
pub mod forwarder;
pub mod frame;
pub mod handler;
pub mod ingest;
pub mod listener;
pub mod logging;
pub mod protocol;
pub mod state;
pub mod watcher;

pub use catalog::{MonitorCatalog, MonitorItem};
pub use config::Settings;
pub use state::RelayState;
