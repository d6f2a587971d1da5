//! Initialisation de `tracing` : texte ou JSON sur stdout, niveau rechargeable.

use tracing_subscriber::{fmt, prelude::*, reload, EnvFilter, Registry};

use crate::config::{LogFormat, Settings};

/// Accepte aussi les noms historiques (warning, fatal, panic)
pub fn parse_level(level: &str) -> Option<&'static str> {
    match level.trim().to_lowercase().as_str() {
        "trace" => Some("trace"),
        "debug" => Some("debug"),
        "info" => Some("info"),
        "warn" | "warning" => Some("warn"),
        "error" | "fatal" | "panic" => Some("error"),
        _ => None,
    }
}

/// Poignée pour changer le niveau à chaud
#[derive(Clone)]
pub struct LogHandle {
    handle: reload::Handle<EnvFilter, Registry>,
    /// RUST_LOG défini : il prime sur la config
    env_override: bool,
}

impl LogHandle {
    pub fn set_level(&self, settings: &Settings) {
        if self.env_override {
            tracing::debug!("RUST_LOG is set, ignoring configured log level");
            return;
        }
        let level = settings.level();
        match self.handle.reload(EnvFilter::new(level)) {
            Ok(()) => tracing::info!(level, "log level reloaded"),
            Err(e) => tracing::error!("failed to reload log level: {e}"),
        }
    }
}

pub fn init(settings: &Settings) -> anyhow::Result<LogHandle> {
    let (filter, env_override) = match EnvFilter::try_from_default_env() {
        Ok(filter) => (filter, true),
        Err(_) => {
            (EnvFilter::new(settings.level()), false)
        }
    };
    let (filter, handle) = reload::Layer::new(filter);

    let json = settings.log_formatter == LogFormat::Json;
    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| fmt::layer().json()))
        .with((!json).then(fmt::layer))
        .try_init()?;

    tracing::debug!(formatter = ?settings.log_formatter, "logging initialized");
    Ok(LogHandle { handle, env_override })
}
