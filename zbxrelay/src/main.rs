/**
 * ZBXRELAY - Point d'entrée
 *
 * RÔLE : Bootstrap : .env, options, réglages, logs, catalogue, surveillance
 * des fichiers, puis boucle d'acceptation jusqu'à Ctrl-C.
 *
 * Seuls l'échec du bind et l'échec du premier chargement du catalogue
 * arrêtent le processus.
 */

use anyhow::Context;
use clap::Parser;

use zbxrelay::cli::Args;
use zbxrelay::config::{Loaded, Settings};
use zbxrelay::watcher::ConfigWatcher;
use zbxrelay::{listener, logging, MonitorCatalog, RelayState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env optionnel
    dotenvy::dotenv().ok();

    let args = Args::parse();
    let overrides = args.overrides();
    let loaded = Settings::load(&overrides).context("invalid configuration")?;

    if args.check {
        return run_check(&loaded.settings).await;
    }

    let log = logging::init(&loaded.settings)?;
    loaded.log_notices();
    if let Some(path) = &loaded.source {
        tracing::info!(?path, "settings loaded");
    }
    let Loaded { settings, source } = loaded;

    let catalog_path = settings.catalog_path();
    let catalog = MonitorCatalog::load_file(&catalog_path)
        .await
        .with_context(|| format!("failed to load monitor catalog {catalog_path:?}"))?;
    tracing::info!(items = catalog.len(), path = ?catalog_path, "monitor catalog loaded");

    let bind = settings.bind.clone();
    let state = RelayState::new(catalog, settings);

    ConfigWatcher::new(source, overrides, state.clone())
        .await
        .with_log_handle(log)
        .spawn();

    let tcp = listener::bind(&bind)
        .await
        .with_context(|| format!("failed to listen on {bind}"))?;
    tracing::info!(
        addr = %tcp.local_addr().map(|a| a.to_string()).unwrap_or(bind),
        collector = %state.settings.load().report_to,
        "zbxrelay is running"
    );

    listener::serve(tcp, state, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for ctrl-c: {e}");
            std::future::pending::<()>().await;
        }
    })
    .await;
    Ok(())
}

/// --check : réglages et catalogue chargeables ?
async fn run_check(settings: &Settings) -> anyhow::Result<()> {
    let catalog = MonitorCatalog::load_file(settings.catalog_path())
        .await
        .context("monitor catalog check failed")?;
    println!(
        "zbxrelay is ok: {} monitor items, listening on {}, forwarding to {}",
        catalog.len(),
        settings.bind,
        settings.report_to
    );
    Ok(())
}
