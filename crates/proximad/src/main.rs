//! proximad: Proxima proximity signaling daemon.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tokio::net::TcpListener;

use proxima_core::config::ProximaConfig;
use proxima_services::{hub, SignalingHub};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Load config
    if let Err(e) = ProximaConfig::write_default_if_missing() {
        tracing::warn!(error = %e, "failed to write default config");
    }
    let config = ProximaConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to load config, using defaults");
        ProximaConfig::default()
    });
    tracing::info!(
        min_radius_km = config.proximity.min_radius_km,
        max_radius_km = config.proximity.max_radius_km,
        default_radius_km = config.proximity.default_radius_km,
        "proximad starting"
    );
    let config = Arc::new(config);

    let listen_addr = config.listen_addr();
    let listener = TcpListener::bind(&listen_addr)
        .await
        .with_context(|| format!("failed to bind {listen_addr}"))?;

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

    // ── Hub ──────────────────────────────────────────────────────────────────
    let signaling = SignalingHub::new(&config);
    let registry = signaling.registry();
    let stats = signaling.stats();
    let (hub_handle, commands) = hub::channel(config.limits.hub_queue_depth);

    let hub_task = tokio::spawn(signaling.run(commands, shutdown_tx.subscribe()));

    let server_task = {
        let state = proxima_api::ApiState {
            hub: hub_handle,
            registry: registry.clone(),
            stats: stats.clone(),
            config: config.clone(),
            started_at: Instant::now(),
        };
        tokio::spawn(proxima_api::serve(state, listener, shutdown_tx.subscribe()))
    };

    let stats_printer = {
        let registry = registry.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(30));
            loop {
                interval.tick().await;
                let delivery = stats.snapshot();
                tracing::info!(
                    clients = registry.len(),
                    located = registry.located_count(),
                    links = registry.link_count(),
                    delivered = delivery.delivered,
                    dropped = delivery.dropped,
                    relays = delivery.relays_forwarded,
                    "registry snapshot"
                );
            }
        })
    };

    // ── Wait for exit ────────────────────────────────────────────────────────

    let mut shutdown_rx = shutdown_tx.subscribe();

    tokio::select! {
        _ = shutdown_rx.recv() => tracing::info!("shutting down"),
        r = server_task        => tracing::error!("server exited: {:?}", r),
        r = stats_printer      => tracing::error!("stats printer exited: {:?}", r),
    }

    // Make sure the hub tears down the registry even if the server died first.
    let _ = shutdown_tx.send(());
    if let Err(e) = hub_task.await {
        tracing::error!(error = %e, "signaling hub panicked");
    }

    Ok(())
}
