//! Schémas JSON échangés avec les agents et avec le collecteur.
//!
//! Le payload d'une trame agent est décodé en types stricts : un champ
//! manquant ou mal typé donne une `ProtocolError`, jamais une valeur zéro.

use serde::{Deserialize, Deserializer, Serialize};

pub const INVALID_REQUEST: &str = "Invalid request";

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("malformed request JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unknown request type: {0:?}")]
    UnknownRequest(String),
    #[error("request {0:?} carries no data array")]
    MissingData(String),
    #[error("first data item has no host")]
    MissingHost,
}

/// Requête agent, telle que lue sur le fil
#[derive(Debug, Deserialize)]
struct RawRequest {
    request: String,
    #[serde(default)]
    data: Option<Vec<AgentItem>>,
}

/// Mesure soumise par un agent. Les champs annexes (clock, ns, ...) sont ignorés.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct AgentItem {
    #[serde(default)]
    pub host: Option<String>,
    pub key: String,
    #[serde(deserialize_with = "numeric_value")]
    pub value: f64,
}

/// Requêtes reconnues
#[derive(Debug, PartialEq)]
pub enum AgentRequest {
    ActiveChecks,
    /// "agent data" ou "sender data"
    Submit(Vec<AgentItem>),
}

impl AgentRequest {
    pub fn parse(payload: &[u8]) -> Result<Self, ProtocolError> {
        let raw: RawRequest = serde_json::from_slice(payload)?;
        match raw.request.as_str() {
            "active checks" => Ok(AgentRequest::ActiveChecks),
            "agent data" | "sender data" => {
                let items = raw.data.ok_or_else(|| ProtocolError::MissingData(raw.request.clone()))?;
                if let Some(first) = items.first() {
                    if first.host.as_deref().map_or(true, str::is_empty) {
                        return Err(ProtocolError::MissingHost);
                    }
                }
                Ok(AgentRequest::Submit(items))
            }
            _ => Err(ProtocolError::UnknownRequest(raw.request)),
        }
    }
}

/// Les agents envoient souvent la valeur sous forme de chaîne
fn numeric_value<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumOrText {
        Num(f64),
        Text(String),
    }

    match NumOrText::deserialize(deserializer)? {
        NumOrText::Num(v) => Ok(v),
        NumOrText::Text(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| serde::de::Error::custom(format!("non numeric value {s:?}"))),
    }
}

/// Réponse à une soumission de mesures
#[derive(Debug, Serialize, Deserialize)]
pub struct InfoResponse {
    pub response: String,
    pub info: String,
}

/// Couple (attr_id, valeur mise à l'échelle), sérialisé en `[id, value]`
pub type CollectorMetric = (i64, i64);

/// Paquet envoyé au collecteur
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CollectorPacket {
    #[serde(rename = "type")]
    pub kind: String,
    pub mac: String,
    pub ip: String,
    pub data: Vec<CollectorMetric>,
}

impl CollectorPacket {
    pub fn numeric(ip: impl Into<String>, data: Vec<CollectorMetric>) -> Self {
        Self {
            kind: "num".to_string(),
            mac: String::new(),
            ip: ip.into(),
            data,
        }
    }
}
