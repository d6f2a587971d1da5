/**
 * MONITOR CATALOG - Table des items surveillés
 *
 * RÔLE : Associe une clé d'item Zabbix à son identifiant d'attribut côté
 * collecteur, son facteur d'échelle et ses indications de planification.
 *
 * FONCTIONNEMENT :
 * - Chargé depuis `monitems.json` (tableau d'items ou objet clé -> item)
 * - Validé au chargement (attr_id, delay, base strictement positifs)
 * - Publié comme photo immuable, remplacée en bloc au reload
 * - Sert la réponse "active checks" aux agents
 */

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::state::Snapshot;

pub const CATALOG_FILE: &str = "monitems.json";

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid catalog JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("item without key at index {0}")]
    MissingKey(usize),
    #[error("duplicate key: {0}")]
    DuplicateKey(String),
    #[error("key {key}: field mismatch with map key {map_key}")]
    KeyMismatch { key: String, map_key: String },
    #[error("key {key}: {field} must be > 0 (got {value})")]
    NotPositive { key: String, field: &'static str, value: f64 },
}

/// Un item surveillé. Valeur par défaut = item « zéro » (clé inconnue).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MonitorItem {
    #[serde(default)]
    pub key: String,
    pub attr_id: i64,
    pub delay: i64,
    #[serde(default)]
    pub lastlogsize: i64,
    #[serde(default)]
    pub mtime: i64,
    pub base: f64,
}

/// Forme d'un item dans le fichier (la clé s'appelle `zabbix_key` dans les
/// fichiers déployés)
#[derive(Debug, Deserialize)]
struct RawItem {
    #[serde(alias = "zabbix_key", default)]
    key: Option<String>,
    attr_id: i64,
    delay: i64,
    #[serde(default)]
    lastlogsize: i64,
    #[serde(default)]
    mtime: i64,
    base: f64,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawCatalog {
    List(Vec<RawItem>),
    Map(HashMap<String, RawItem>),
}

/// Entrée de la réponse "active checks"
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct ActiveCheck {
    pub key: String,
    pub delay: i64,
    pub lastlogsize: i64,
    pub mtime: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ActiveChecksResponse {
    pub response: String,
    pub data: Vec<ActiveCheck>,
}

#[derive(Debug, Clone, Default)]
pub struct MonitorCatalog {
    items: HashMap<String, MonitorItem>,
}

impl MonitorCatalog {
    pub fn new() -> Self {
        Self { items: HashMap::new() }
    }

    /// Construit et valide un catalogue à partir d'items déjà nommés
    pub fn from_items<I>(items: I) -> Result<Self, CatalogError>
    where
        I: IntoIterator<Item = MonitorItem>,
    {
        let mut catalog = Self::new();
        for item in items {
            validate_item(&item)?;
            if catalog.items.contains_key(&item.key) {
                return Err(CatalogError::DuplicateKey(item.key));
            }
            catalog.items.insert(item.key.clone(), item);
        }
        Ok(catalog)
    }

    pub fn from_json(text: &str) -> Result<Self, CatalogError> {
        let raw: RawCatalog = serde_json::from_str(text)?;
        let items = match raw {
            RawCatalog::List(list) => list
                .into_iter()
                .enumerate()
                .map(|(idx, raw)| {
                    let key = raw.key.clone().ok_or(CatalogError::MissingKey(idx))?;
                    Ok(raw.into_item(key))
                })
                .collect::<Result<Vec<_>, CatalogError>>()?,
            RawCatalog::Map(map) => map
                .into_iter()
                .map(|(map_key, raw)| match &raw.key {
                    Some(key) if *key != map_key => Err(CatalogError::KeyMismatch {
                        key: key.clone(),
                        map_key,
                    }),
                    _ => Ok(raw.into_item(map_key)),
                })
                .collect::<Result<Vec<_>, CatalogError>>()?,
        };
        Self::from_items(items)
    }

    pub async fn load_file<P: AsRef<Path>>(path: P) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let text = tokio::fs::read_to_string(path).await.map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    pub fn get(&self, key: &str) -> Option<&MonitorItem> {
        self.items.get(key)
    }

    /// Item pour une clé, ou item zéro (attr_id 0, base 0) si inconnue
    pub fn resolve(&self, key: &str) -> MonitorItem {
        match self.items.get(key) {
            Some(item) => item.clone(),
            None => {
                tracing::warn!(key, "unknown monitor key, forwarding a zeroed metric");
                MonitorItem::default()
            }
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> impl Iterator<Item = &MonitorItem> {
        self.items.values()
    }

    /// Liste des checks actifs pour les agents (ordre non garanti)
    pub fn active_checks(&self) -> ActiveChecksResponse {
        ActiveChecksResponse {
            response: "success".to_string(),
            data: self
                .items
                .iter()
                .map(|(key, item)| ActiveCheck {
                    key: key.clone(),
                    delay: item.delay,
                    lastlogsize: item.lastlogsize,
                    mtime: item.mtime,
                })
                .collect(),
        }
    }
}

impl RawItem {
    fn into_item(self, key: String) -> MonitorItem {
        MonitorItem {
            key,
            attr_id: self.attr_id,
            delay: self.delay,
            lastlogsize: self.lastlogsize,
            mtime: self.mtime,
            base: self.base,
        }
    }
}

fn validate_item(item: &MonitorItem) -> Result<(), CatalogError> {
    let checks = [
        ("attr_id", item.attr_id as f64),
        ("delay", item.delay as f64),
        ("base", item.base),
    ];
    for (field, value) in checks {
        // `!(v > 0)` attrape aussi NaN
        if !(value > 0.0) {
            return Err(CatalogError::NotPositive { key: item.key.clone(), field, value });
        }
    }
    Ok(())
}

/// Catalogue partagé entre toutes les connexions
pub type SharedCatalog = Snapshot<MonitorCatalog>;

#[cfg(test)]
mod tests {
    use super::*;

    const LIST_JSON: &str = r#"[
        {"zabbix_key": "cpu.util", "attr_id": 9, "delay": 60, "lastlogsize": 0, "mtime": 0, "base": 1.0},
        {"zabbix_key": "vfs.fs.size[/,pfree]", "attr_id": 12, "delay": 300, "lastlogsize": 0, "mtime": 0, "base": 100}
    ]"#;

    #[test]
    fn test_load_list_layout() {
        let catalog = MonitorCatalog::from_json(LIST_JSON).unwrap();
        assert_eq!(catalog.len(), 2);
        let item = catalog.get("vfs.fs.size[/,pfree]").unwrap();
        assert_eq!(item.attr_id, 12);
        assert_eq!(item.base, 100.0);
        let mut keys: Vec<&str> = catalog.items().map(|item| item.key.as_str()).collect();
        keys.sort();
        assert_eq!(keys, ["cpu.util", "vfs.fs.size[/,pfree]"]);
    }

    #[test]
    fn test_load_map_layout() {
        let json = r#"{"cpu.util": {"attr_id": 9, "delay": 60, "lastlogsize": 4, "mtime": 5, "base": 1.0}}"#;
        let catalog = MonitorCatalog::from_json(json).unwrap();
        let item = catalog.get("cpu.util").unwrap();
        assert_eq!(item.key, "cpu.util");
        assert_eq!((item.lastlogsize, item.mtime), (4, 5));
    }

    #[test]
    fn test_rejects_invalid_items() {
        let zero_base = r#"[{"key": "a", "attr_id": 1, "delay": 1, "base": 0}]"#;
        assert!(matches!(
            MonitorCatalog::from_json(zero_base),
            Err(CatalogError::NotPositive { field: "base", .. })
        ));

        let bad_attr = r#"{"a": {"attr_id": 0, "delay": 1, "base": 1}}"#;
        assert!(matches!(
            MonitorCatalog::from_json(bad_attr),
            Err(CatalogError::NotPositive { field: "attr_id", .. })
        ));

        let dup = r#"[{"key": "a", "attr_id": 1, "delay": 1, "base": 1},
                      {"zabbix_key": "a", "attr_id": 2, "delay": 1, "base": 1}]"#;
        assert!(matches!(MonitorCatalog::from_json(dup), Err(CatalogError::DuplicateKey(k)) if k == "a"));

        let mismatch = r#"{"a": {"key": "b", "attr_id": 1, "delay": 1, "base": 1}}"#;
        assert!(matches!(MonitorCatalog::from_json(mismatch), Err(CatalogError::KeyMismatch { .. })));

        let no_key = r#"[{"attr_id": 1, "delay": 1, "base": 1}]"#;
        assert!(matches!(MonitorCatalog::from_json(no_key), Err(CatalogError::MissingKey(0))));
    }

    #[test]
    fn test_resolve_unknown_key_is_zeroed() {
        let catalog = MonitorCatalog::from_json(LIST_JSON).unwrap();
        let item = catalog.resolve("not.there");
        assert_eq!(item.attr_id, 0);
        assert_eq!(item.base, 0.0);
        assert_eq!(catalog.resolve("cpu.util").attr_id, 9);
    }

    #[test]
    fn test_active_checks_listing() {
        let catalog = MonitorCatalog::from_json(LIST_JSON).unwrap();
        let listing = catalog.active_checks();
        assert_eq!(listing.response, "success");
        assert_eq!(listing.data.len(), catalog.len());
        for check in &listing.data {
            let item = catalog.get(&check.key).unwrap();
            assert_eq!(check.delay, item.delay);
        }
    }

    #[tokio::test]
    async fn test_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CATALOG_FILE);
        std::fs::write(&path, LIST_JSON).unwrap();
        assert_eq!(MonitorCatalog::load_file(&path).await.unwrap().len(), 2);

        let missing = MonitorCatalog::load_file(dir.path().join("nope.json")).await;
        assert!(matches!(missing, Err(CatalogError::Io { .. })));
    }
}
