/*!
Client agent factice

Parle le protocole des agents Zabbix : trame `ZBXD\x01` + longueur sur 8 octets
+ JSON. Permet d'envoyer des requêtes au relais et de décoder ses réponses.
*/

use anyhow::Result;
use serde_json::Value;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

pub const ZBX_HEADER: &[u8; 5] = b"ZBXD\x01";

/// Encapsule un payload dans une trame
pub fn frame(payload: &[u8]) -> Vec<u8> {
    let mut out = ZBX_HEADER.to_vec();
    out.extend_from_slice(&(payload.len() as u64).to_le_bytes());
    out.extend_from_slice(payload);
    out
}

/// Extrait le payload d'une trame complète en mémoire
pub fn unframe(bytes: &[u8]) -> Result<&[u8]> {
    if bytes.len() < 13 || &bytes[..5] != ZBX_HEADER {
        anyhow::bail!("not a ZBXD frame: {:?}", String::from_utf8_lossy(bytes));
    }
    let len = u32::from_le_bytes([bytes[5], bytes[6], bytes[7], bytes[8]]) as usize;
    let body = &bytes[13..];
    if body.len() != len {
        anyhow::bail!("frame length {} but {} payload bytes", len, body.len());
    }
    Ok(body)
}

/// Client agent factice
#[derive(Debug, Clone)]
pub struct AgentClient {
    addr: String,
    timeout: Duration,
}

impl AgentClient {
    pub fn new<S: Into<String>>(addr: S) -> Self {
        Self {
            addr: addr.into(),
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Envoie des octets bruts et lit tout jusqu'à fermeture par le relais
    pub async fn send_raw(&self, bytes: &[u8]) -> Result<Vec<u8>> {
        let exchange = async {
            let mut stream = TcpStream::connect(&self.addr).await?;
            stream.write_all(bytes).await?;
            let mut out = Vec::new();
            stream.read_to_end(&mut out).await?;
            Ok::<_, anyhow::Error>(out)
        };
        let out = tokio::time::timeout(self.timeout, exchange).await??;
        log::info!("📨 [AGENT] {} bytes sent, {} bytes received", bytes.len(), out.len());
        Ok(out)
    }

    /// Requête JSON encapsulée, réponse JSON décapsulée
    pub async fn request(&self, body: &Value) -> Result<Value> {
        let raw = self.send_raw(&frame(&serde_json::to_vec(body)?)).await?;
        let payload = unframe(&raw)?;
        Ok(serde_json::from_slice(payload)?)
    }
}

/// Helper pour créer des requêtes agent
pub struct RequestBuilder;

impl RequestBuilder {
    /// Crée une requête "active checks"
    pub fn active_checks<S: Into<String>>(host: S) -> Value {
        serde_json::json!({
            "request": "active checks",
            "host": host.into()
        })
    }

    /// Crée une mesure au format agent
    pub fn item<S: Into<String>>(host: S, key: S, value: Value) -> Value {
        serde_json::json!({
            "host": host.into(),
            "key": key.into(),
            "value": value,
            "clock": chrono::Utc::now().timestamp(),
            "ns": 0
        })
    }

    /// Crée une requête "agent data"
    pub fn agent_data(items: Vec<Value>) -> Value {
        serde_json::json!({
            "request": "agent data",
            "data": items,
            "clock": chrono::Utc::now().timestamp()
        })
    }

    /// Crée une requête "sender data"
    pub fn sender_data(items: Vec<Value>) -> Value {
        serde_json::json!({
            "request": "sender data",
            "data": items
        })
    }
}
