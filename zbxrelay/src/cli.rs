use clap::Parser;
use std::path::PathBuf;

use crate::config::{LogFormat, Overrides};

/// Relais entre agents Zabbix et collecteur de métriques
#[derive(Parser, Debug)]
#[command(name = "zbxrelay", version, about)]
pub struct Args {
    /// Fichier de réglages YAML
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Vérifie réglages et catalogue puis quitte
    #[arg(long)]
    pub check: bool,

    /// Adresse d'écoute (host:port)
    #[arg(long)]
    pub bind: Option<String>,

    /// Adresse du collecteur (host:port)
    #[arg(long)]
    pub report_to: Option<String>,

    /// Dossier contenant monitems.json
    #[arg(long)]
    pub data_path: Option<PathBuf>,

    /// trace | debug | info | warn | error
    #[arg(long)]
    pub log_level: Option<String>,

    #[arg(long, value_enum)]
    pub log_formatter: Option<LogFormat>,

    /// Force le niveau debug
    #[arg(long)]
    pub debug: bool,
}

impl Args {
    pub fn overrides(&self) -> Overrides {
        Overrides {
            config: self.config.clone(),
            bind: self.bind.clone(),
            report_to: self.report_to.clone(),
            data_path: self.data_path.clone(),
            log_level: self.log_level.clone(),
            log_formatter: self.log_formatter,
            debug: self.debug,
        }
    }
}
