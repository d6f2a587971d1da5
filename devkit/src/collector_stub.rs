/*!
Collecteur factice pour tests sans vrai collecteur

Écoute en TCP sur un port éphémère, lit chaque paquet envoyé par le relais
(trame ZBXD ou JSON brut), l'enregistre, répond puis ferme la connexion.
*/

use anyhow::Result;
use serde_json::Value;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use crate::agent_client::ZBX_HEADER;

/// Forme attendue des paquets entrants
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CollectorMode {
    /// Trame ZBXD + longueur + JSON
    Framed,
    /// Document JSON nu
    Raw,
}

#[derive(Clone)]
pub struct MockCollector {
    addr: String,
    received: Arc<Mutex<Vec<Value>>>,
    task: Arc<JoinHandle<()>>,
}

impl MockCollector {
    /// Démarre un collecteur qui répond `reply` à chaque paquet
    pub async fn start(mode: CollectorMode, reply: &[u8]) -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?.to_string();
        let received = Arc::new(Mutex::new(Vec::new()));
        let reply = reply.to_vec();

        let sink = received.clone();
        let task = tokio::spawn(async move {
            loop {
                let Ok((stream, peer)) = listener.accept().await else {
                    continue;
                };
                let sink = sink.clone();
                let reply = reply.clone();
                tokio::spawn(async move {
                    match read_packet(stream, mode, &reply).await {
                        Ok(packet) => {
                            log::info!("📥 [MOCK] collector packet from {}: {}", peer, packet);
                            sink.lock().unwrap().push(packet);
                        }
                        Err(e) => log::warn!("⚠️ [MOCK] bad collector packet from {}: {}", peer, e),
                    }
                });
            }
        });

        log::info!("🎧 [MOCK] collector listening on {}", addr);
        Ok(Self { addr, received, task: Arc::new(task) })
    }

    pub fn addr(&self) -> String {
        self.addr.clone()
    }

    /// Tous les paquets reçus (pour assertions de tests)
    pub fn packets(&self) -> Vec<Value> {
        self.received.lock().unwrap().clone()
    }

    pub fn last_packet(&self) -> Option<Value> {
        self.received.lock().unwrap().last().cloned()
    }

    /// Attend au moins `count` paquets
    pub async fn wait_for_packets(&self, count: usize, timeout: Duration) -> Vec<Value> {
        crate::test_utils::wait_until(timeout, || self.received.lock().unwrap().len() >= count).await;
        self.packets()
    }

    pub fn clear(&self) {
        self.received.lock().unwrap().clear();
    }
}

impl Drop for MockCollector {
    fn drop(&mut self) {
        // dernier clone : on arrête l'écoute
        if Arc::strong_count(&self.task) == 1 {
            self.task.abort();
        }
    }
}

async fn read_packet(mut stream: TcpStream, mode: CollectorMode, reply: &[u8]) -> Result<Value> {
    let packet = match mode {
        CollectorMode::Framed => {
            let mut head = [0u8; 13];
            stream.read_exact(&mut head).await?;
            if &head[..5] != ZBX_HEADER {
                anyhow::bail!("bad header {:?}", &head[..5]);
            }
            let len = u32::from_le_bytes([head[5], head[6], head[7], head[8]]) as usize;
            let mut body = vec![0u8; len];
            stream.read_exact(&mut body).await?;
            serde_json::from_slice(&body)?
        }
        CollectorMode::Raw => {
            // pas de longueur : on lit jusqu'à obtenir un JSON complet
            let mut body = Vec::new();
            let mut chunk = [0u8; 4096];
            loop {
                let n = stream.read(&mut chunk).await?;
                if n == 0 {
                    anyhow::bail!("connection closed before a full JSON document");
                }
                body.extend_from_slice(&chunk[..n]);
                if let Ok(value) = serde_json::from_slice::<Value>(&body) {
                    break value;
                }
            }
        }
    };
    stream.write_all(reply).await?;
    stream.shutdown().await?;
    Ok(packet)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent_client::frame;

    async fn send(addr: &str, bytes: &[u8]) -> Vec<u8> {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(bytes).await.unwrap();
        let mut out = Vec::new();
        stream.read_to_end(&mut out).await.unwrap();
        out
    }

    #[tokio::test]
    async fn test_framed_packet_recorded() {
        let collector = MockCollector::start(CollectorMode::Framed, b"OK").await.unwrap();
        let reply = send(&collector.addr(), &frame(br#"{"type":"num","data":[[1,2]]}"#)).await;
        assert_eq!(reply, b"OK");

        let packets = collector.wait_for_packets(1, Duration::from_secs(2)).await;
        assert_eq!(packets[0]["data"][0][1], 2);
    }

    #[tokio::test]
    async fn test_raw_packet_recorded() {
        let collector = MockCollector::start(CollectorMode::Raw, b"").await.unwrap();
        send(&collector.addr(), br#"{"type":"num","ip":"1.2.3.4","data":[]}"#).await;

        let packets = collector.wait_for_packets(1, Duration::from_secs(2)).await;
        assert_eq!(packets[0]["ip"], "1.2.3.4");
        collector.clear();
        assert!(collector.last_packet().is_none());
    }
}
