/**
 * CONFIGURATION - Réglages du relais
 *
 * Priorité croissante : valeurs par défaut < fichier YAML < variables
 * d'environnement ZBXRELAY_* < options de ligne de commande.
 *
 * Le fichier `zbxrelay.yaml` est cherché dans `.`, `$HOME` puis `/etc`,
 * sauf si un chemin explicite est donné (--config ou ZBXRELAY_CONFIG).
 */

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::catalog::CATALOG_FILE;

pub const CONFIG_FILE: &str = "zbxrelay.yaml";
pub const ENV_PREFIX: &str = "ZBXRELAY_";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config file {0:?} not found")]
    NotFound(PathBuf),
    #[error("failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid YAML in {path:?}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("invalid value for {field}: {value:?}")]
    Invalid { field: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Adresse d'écoute côté agents (host:port)
    pub bind: String,
    /// Adresse du collecteur (host:port)
    pub report_to: String,
    /// Dossier contenant monitems.json
    pub data_path: PathBuf,
    pub log_level: String,
    pub log_formatter: LogFormat,
    /// Force le niveau debug
    pub debug: bool,
    /// Paquets collecteur encapsulés dans une trame ZBXD
    pub collector_framing: bool,
    /// Réponse "Invalid request" encapsulée (sinon littéral brut)
    pub frame_invalid_request: bool,
    pub reload_interval_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:20051".into(),
            report_to: "127.0.0.1:6621".into(),
            data_path: PathBuf::from("."),
            log_level: "info".into(),
            log_formatter: LogFormat::Text,
            debug: false,
            collector_framing: true,
            frame_invalid_request: true,
            reload_interval_secs: 5,
        }
    }
}

/// Valeurs venant de la ligne de commande (prioritaires)
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub config: Option<PathBuf>,
    pub bind: Option<String>,
    pub report_to: Option<String>,
    pub data_path: Option<PathBuf>,
    pub log_level: Option<String>,
    pub log_formatter: Option<LogFormat>,
    pub debug: bool,
}

/// Réglages chargés + fichier d'origine (surveillé pour le reload)
#[derive(Debug, Clone)]
pub struct Loaded {
    pub settings: Settings,
    pub source: Option<PathBuf>,
}

impl Loaded {
    /// Anomalies non bloquantes, à journaliser une fois les logs initialisés
    pub fn notices(&self) -> Vec<String> {
        let mut notices = Vec::new();
        if self.source.is_none() {
            notices.push(format!("no {CONFIG_FILE} found, using defaults"));
        }
        if crate::logging::parse_level(&self.settings.log_level).is_none() {
            notices.push(format!(
                "invalid log_level {:?}, falling back to info",
                self.settings.log_level
            ));
        }
        notices
    }

    pub fn log_notices(&self) {
        for notice in self.notices() {
            tracing::warn!("{notice}");
        }
    }
}

impl Settings {
    pub fn load(overrides: &Overrides) -> Result<Loaded, ConfigError> {
        Self::load_with(overrides, |name| std::env::var(name).ok())
    }

    pub fn load_with<F>(overrides: &Overrides, env: F) -> Result<Loaded, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let explicit = overrides
            .config
            .clone()
            .or_else(|| env("ZBXRELAY_CONFIG").map(PathBuf::from));

        let source = match explicit {
            Some(path) if path.exists() => Some(path),
            Some(path) => return Err(ConfigError::NotFound(path)),
            None => search_config_file(env("HOME").map(PathBuf::from)),
        };

        let mut settings = match &source {
            Some(path) => Self::from_file(path)?,
            None => Settings::default(),
        };
        settings.apply_env(&env)?;
        settings.apply_overrides(overrides);
        settings.validate()?;
        Ok(Loaded { settings, source })
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let txt = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        if txt.trim().is_empty() {
            return Ok(Settings::default());
        }
        serde_yaml::from_str(&txt).map_err(|source| ConfigError::Yaml {
            path: path.to_path_buf(),
            source,
        })
    }

    fn apply_env<F>(&mut self, env: &F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| env(&format!("{ENV_PREFIX}{name}"));

        if let Some(v) = var("BIND") {
            self.bind = v;
        }
        if let Some(v) = var("REPORT_TO") {
            self.report_to = v;
        }
        if let Some(v) = var("DATA_PATH") {
            self.data_path = PathBuf::from(v);
        }
        if let Some(v) = var("LOG_LEVEL") {
            self.log_level = v;
        }
        if let Some(v) = var("LOG_FORMATTER") {
            self.log_formatter = match v.to_lowercase().as_str() {
                "json" => LogFormat::Json,
                "text" => LogFormat::Text,
                _ => return Err(ConfigError::Invalid { field: "log_formatter", value: v }),
            };
        }
        if let Some(v) = var("DEBUG") {
            self.debug = parse_bool(&v).ok_or(ConfigError::Invalid { field: "debug", value: v })?;
        }
        Ok(())
    }

    fn apply_overrides(&mut self, o: &Overrides) {
        if let Some(v) = &o.bind {
            self.bind = v.clone();
        }
        if let Some(v) = &o.report_to {
            self.report_to = v.clone();
        }
        if let Some(v) = &o.data_path {
            self.data_path = v.clone();
        }
        if let Some(v) = &o.log_level {
            self.log_level = v.clone();
        }
        if let Some(v) = o.log_formatter {
            self.log_formatter = v;
        }
        if o.debug {
            self.debug = true;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [("bind", &self.bind), ("report_to", &self.report_to)] {
            if value.rsplit_once(':').map_or(true, |(_, port)| port.parse::<u16>().is_err()) {
                return Err(ConfigError::Invalid { field, value: value.clone() });
            }
        }
        if self.reload_interval_secs == 0 {
            return Err(ConfigError::Invalid { field: "reload_interval_secs", value: "0".into() });
        }
        Ok(())
    }

    pub fn catalog_path(&self) -> PathBuf {
        self.data_path.join(CATALOG_FILE)
    }

    /// Niveau effectif (debug=true force "debug")
    pub fn effective_level(&self) -> &str {
        if self.debug {
            "debug"
        } else {
            &self.log_level
        }
    }

    /// Niveau à appliquer ; un nom inconnu retombe sur info
    pub fn level(&self) -> &'static str {
        crate::logging::parse_level(self.effective_level()).unwrap_or("info")
    }
}

fn search_config_file(home: Option<PathBuf>) -> Option<PathBuf> {
    let mut dirs = vec![PathBuf::from(".")];
    dirs.extend(home);
    dirs.push(PathBuf::from("/etc"));
    dirs.into_iter()
        .map(|dir| dir.join(CONFIG_FILE))
        .find(|path| path.is_file())
}

fn parse_bool(v: &str) -> Option<bool> {
    match v.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn write_config(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join(CONFIG_FILE);
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_defaults_are_valid() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.catalog_path(), PathBuf::from("./monitems.json"));
    }

    #[test]
    fn test_file_then_env_then_cli() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            dir.path(),
            "bind: \"127.0.0.1:30051\"\nreport_to: \"10.1.1.1:6621\"\nlog_level: warn\ncollector_framing: false\n",
        );

        let env: HashMap<&str, &str> =
            [("ZBXRELAY_REPORT_TO", "10.2.2.2:6621"), ("ZBXRELAY_LOG_FORMATTER", "JSON")].into();
        let overrides = Overrides {
            config: Some(path.clone()),
            log_level: Some("debug".into()),
            ..Default::default()
        };

        let loaded =
            Settings::load_with(&overrides, |k| env.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(loaded.source, Some(path));
        let s = loaded.settings;
        assert_eq!(s.bind, "127.0.0.1:30051");
        assert_eq!(s.report_to, "10.2.2.2:6621");
        assert_eq!(s.log_formatter, LogFormat::Json);
        assert_eq!(s.log_level, "debug");
        assert!(!s.collector_framing);
        assert!(s.frame_invalid_request);
    }

    #[test]
    fn test_config_path_from_env() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(dir.path(), "debug: true\n");
        let path_str = path.to_string_lossy().to_string();

        let loaded = Settings::load_with(&Overrides::default(), |k| {
            (k == "ZBXRELAY_CONFIG").then(|| path_str.clone())
        })
        .unwrap();
        assert_eq!(loaded.settings.effective_level(), "debug");
    }

    #[test]
    fn test_explicit_missing_file_is_error() {
        let overrides = Overrides {
            config: Some(PathBuf::from("/nonexistent/zbxrelay.yaml")),
            ..Default::default()
        };
        assert!(matches!(Settings::load_with(&overrides, no_env), Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_invalid_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(dir.path(), "report_to: \"nowhere\"\n");
        let overrides = Overrides { config: Some(path), ..Default::default() };
        assert!(matches!(
            Settings::load_with(&overrides, no_env),
            Err(ConfigError::Invalid { field: "report_to", .. })
        ));

        let bad_yaml = write_config(dir.path(), "bind: [unclosed\n");
        let overrides = Overrides { config: Some(bad_yaml), ..Default::default() };
        assert!(matches!(Settings::load_with(&overrides, no_env), Err(ConfigError::Yaml { .. })));

        let env_bool = Settings::load_with(&Overrides::default(), |k| {
            (k == "ZBXRELAY_DEBUG").then(|| "maybe".to_string())
        });
        assert!(matches!(env_bool, Err(ConfigError::Invalid { field: "debug", .. })));
    }

    #[test]
    fn test_unknown_log_level_falls_back_to_info() {
        let overrides = Overrides { log_level: Some("verbose".into()), ..Default::default() };
        let loaded = Settings::load_with(&overrides, |_| None).unwrap();
        assert_eq!(loaded.settings.log_level, "verbose");
        assert_eq!(loaded.settings.level(), "info");
        assert!(loaded
            .notices()
            .iter()
            .any(|n| n == "invalid log_level \"verbose\", falling back to info"));

        let debug = Settings { log_level: "verbose".into(), debug: true, ..Settings::default() };
        assert_eq!(debug.level(), "debug");
        assert_eq!(Settings { log_level: "WARNING".into(), ..Settings::default() }.level(), "warn");
    }

    #[test]
    fn test_missing_config_file_is_a_notice() {
        let defaults = Loaded { settings: Settings::default(), source: None };
        assert_eq!(defaults.notices(), vec![format!("no {CONFIG_FILE} found, using defaults")]);

        let dir = tempfile::tempdir().unwrap();
        let path = write_config(dir.path(), "log_level: error\n");
        let overrides = Overrides { config: Some(path), ..Default::default() };
        assert!(Settings::load_with(&overrides, no_env).unwrap().notices().is_empty());
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(dir.path(), "  \n");
        assert_eq!(Settings::from_file(&path).unwrap(), Settings::default());
    }
}
