/*!
Fixtures fichiers pour le relais

Crée un dossier temporaire contenant `monitems.json` (format déployé :
tableau d'items avec `zabbix_key`) et, si besoin, un `zbxrelay.yaml`.
*/

use anyhow::Result;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub struct RelayFixture {
    dir: TempDir,
    items: Vec<Value>,
}

impl RelayFixture {
    pub fn new() -> Result<Self> {
        Ok(Self {
            dir: tempfile::tempdir()?,
            items: Vec::new(),
        })
    }

    /// Ajoute un item au catalogue (écrit immédiatement)
    pub fn with_item(mut self, key: &str, attr_id: i64, delay: i64, base: f64) -> Result<Self> {
        self.items.push(serde_json::json!({
            "zabbix_key": key,
            "attr_id": attr_id,
            "delay": delay,
            "lastlogsize": 0,
            "mtime": 0,
            "base": base
        }));
        self.write_catalog()?;
        Ok(self)
    }

    /// Réécrit monitems.json avec le contenu donné tel quel
    pub fn write_catalog_raw(&self, body: &str) -> Result<PathBuf> {
        let path = self.catalog_path();
        std::fs::write(&path, body)?;
        Ok(path)
    }

    fn write_catalog(&self) -> Result<PathBuf> {
        self.write_catalog_raw(&serde_json::to_string_pretty(&self.items)?)
    }

    /// Écrit zbxrelay.yaml ; `data_path` pointe sur le dossier de la fixture
    pub fn write_config(&self, extra_yaml: &str) -> Result<PathBuf> {
        let path = self.dir.path().join("zbxrelay.yaml");
        let body = format!("data_path: {:?}\n{}", self.dir.path(), extra_yaml);
        std::fs::write(&path, body)?;
        Ok(path)
    }

    pub fn data_path(&self) -> &Path {
        self.dir.path()
    }

    pub fn catalog_path(&self) -> PathBuf {
        self.dir.path().join("monitems.json")
    }
}
