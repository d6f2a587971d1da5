/**
 * MONITOR DATA - Traitement des requêtes "agent data" / "sender data"
 *
 * FONCTIONNEMENT :
 * 1. Chaque mesure est résolue dans le catalogue (clé inconnue = item zéro)
 * 2. valeur collecteur = tronquer(valeur * base) vers zéro
 * 3. L'IP du paquet est celle du premier élément du lot
 * 4. Envoi au collecteur, comptage tout-ou-rien du lot
 * 5. Réponse "success" à l'agent avec le résumé processed/failed/total
 */

use serde::Serialize;
use std::time::{Duration, Instant};

use crate::catalog::MonitorCatalog;
use crate::config::Settings;
use crate::forwarder;
use crate::frame::encode_frame;
use crate::protocol::{AgentItem, CollectorPacket, InfoResponse};

/// Bilan d'un lot envoyé au collecteur
#[derive(Debug, Clone, PartialEq)]
pub struct ReportResult {
    pub processed: usize,
    pub failed: usize,
    pub total: usize,
    pub elapsed: Duration,
}

impl ReportResult {
    fn succeeded(total: usize) -> Self {
        Self { processed: total, failed: 0, total, elapsed: Duration::ZERO }
    }

    fn mark_failed(&mut self) {
        self.processed = 0;
        self.failed = self.total;
    }

    /// Le champ "seconds spent" est historiquement exprimé en millisecondes
    pub fn info(&self) -> String {
        format!(
            "processed: {}; failed: {}; total: {}; seconds spent: {:.6}",
            self.processed,
            self.failed,
            self.total,
            self.elapsed.as_secs_f64() * 1000.0
        )
    }
}

/// Troncature vers zéro ; `as` sature hors bornes et donne 0 pour NaN
pub fn scale(value: f64, base: f64) -> i64 {
    (value * base).trunc() as i64
}

pub fn build_packet(catalog: &MonitorCatalog, items: &[AgentItem]) -> CollectorPacket {
    let ip = items
        .first()
        .and_then(|item| item.host.clone())
        .unwrap_or_default();
    let data = items
        .iter()
        .map(|item| {
            let monitor = catalog.resolve(&item.key);
            (monitor.attr_id, scale(item.value, monitor.base))
        })
        .collect();
    CollectorPacket::numeric(ip, data)
}

/// Transforme le lot et l'envoie au collecteur configuré
pub async fn report_to_collector(
    catalog: &MonitorCatalog,
    settings: &Settings,
    items: &[AgentItem],
) -> ReportResult {
    let start = Instant::now();
    let mut result = ReportResult::succeeded(items.len());
    if items.is_empty() {
        tracing::debug!("empty batch, nothing to forward");
        return result;
    }

    let packet = build_packet(catalog, items);
    match serde_json::to_vec(&packet) {
        Ok(body) => {
            tracing::debug!(packet = %String::from_utf8_lossy(&body), "collector packet");
            let wire = if settings.collector_framing { encode_frame(&body) } else { body };
            match forwarder::forward(&settings.report_to, &wire).await {
                Ok(response) => {
                    tracing::debug!(
                        collector = %settings.report_to,
                        response = %String::from_utf8_lossy(&response),
                        "batch forwarded"
                    );
                }
                Err(e) => {
                    tracing::error!(collector = %settings.report_to, "report error: {e}");
                    result.mark_failed();
                }
            }
        }
        Err(e) => {
            tracing::error!("failed to encode collector packet: {e}");
            result.mark_failed();
        }
    }

    result.elapsed = start.elapsed();
    result
}

/// Réponse trame complète pour l'agent
pub async fn handle_monitor_data(
    catalog: &MonitorCatalog,
    settings: &Settings,
    items: &[AgentItem],
) -> Vec<u8> {
    let result = report_to_collector(catalog, settings, items).await;
    tracing::info!(
        processed = result.processed,
        failed = result.failed,
        total = result.total,
        "batch report"
    );
    let response = InfoResponse { response: "success".into(), info: result.info() };
    encode_frame(&to_json_or(&response, r#"{"response":"success"}"#))
}

/// Sérialise, ou retombe sur `fallback` en loggant l'erreur
pub fn to_json_or<T: Serialize>(value: &T, fallback: &str) -> Vec<u8> {
    serde_json::to_vec(value).unwrap_or_else(|e| {
        tracing::error!("failed to encode response: {e}");
        fallback.as_bytes().to_vec()
    })
}
