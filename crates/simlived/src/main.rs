//! simlived — live simulation daemon.

use anyhow::{Context, Result};

use simlive_core::config::SimliveConfig;
use simlive_services::{Engines, SessionSettings, SessionStore};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Load config
    if let Err(e) = SimliveConfig::write_default_if_missing() {
        tracing::warn!(error = %e, "failed to write default config");
    }
    let config = SimliveConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to load config, using defaults");
        SimliveConfig::default()
    });

    let settings = SessionSettings::from_config(&config);
    settings
        .step
        .validate(settings.min_step_frequency)
        .context("invalid [stepping] defaults")?;

    tracing::info!(
        step_frequency = config.stepping.step_frequency,
        step_size = config.stepping.step_size,
        max_sessions = config.limits.max_sessions,
        "simlived starting"
    );

    let store = SessionStore::new(Engines::reference(config.layout.iterations), settings);

    // ── Shutdown channel ─────────────────────────────────────────────────────
    let (shutdown_tx, _) = tokio::sync::broadcast::channel::<()>(1);

    {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("shutdown signal received");
            let _ = shutdown.send(());
        });
    }

    // ── API server ───────────────────────────────────────────────────────────
    let api_task = {
        let state = simlive_api::ApiState::new(store.clone(), shutdown_tx.clone());
        let mut server_shutdown = shutdown_tx.subscribe();
        let bind = config.server.bind.clone();
        let port = config.server.port;
        tokio::spawn(async move {
            let shutdown = async move {
                let _ = server_shutdown.recv().await;
            };
            simlive_api::serve(state, &bind, port, shutdown).await
        })
    };

    // ── Wait for exit ────────────────────────────────────────────────────────
    let mut shutdown_rx = shutdown_tx.subscribe();

    tokio::select! {
        _ = shutdown_rx.recv() => tracing::info!("shutting down"),
        r = api_task => match r {
            Ok(Ok(())) => tracing::info!("API server stopped"),
            Ok(Err(e)) => return Err(e).context("API server failed"),
            Err(e) => tracing::error!("API task exited: {:?}", e),
        },
    }

    let open = store.len();
    store.shutdown_all().await;
    tracing::info!(sessions = open, "sessions closed");
    Ok(())
}
