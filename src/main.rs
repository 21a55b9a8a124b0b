use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;

use courtside::config::Config;
use courtside::engine::Engine;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let config = Config::from_env();
    courtside::observability::init(config.metrics_port)?;

    // Ensure data directory exists
    std::fs::create_dir_all(&config.data_dir)?;

    let engine = Arc::new(Engine::new(config.wal_path(), config.policy)?);
    if config.seed {
        courtside::seed::seed_demo_data(&engine).await?;
    }

    let compactor_engine = engine.clone();
    let threshold = config.compact_threshold;
    tokio::spawn(async move {
        courtside::compactor::run_compactor(compactor_engine, threshold).await;
    });

    let addr = config.listen_addr();
    let listener = TcpListener::bind(&addr).await?;
    info!("courtside listening on {addr}");
    info!("  data_dir: {}", config.data_dir.display());
    info!(
        "  overlap check on update: {}",
        config.policy.check_overlap_on_update
    );
    info!(
        "  metrics: {}",
        config
            .metrics_port
            .map_or("disabled".to_string(), |p| format!("http://0.0.0.0:{p}/metrics"))
    );

    axum::serve(listener, courtside::api::router(engine))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("courtside stopped");
    Ok(())
}

/// Resolves on ctrl-c or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(e) => {
                tracing::warn!("failed to register SIGTERM handler: {e}");
                ctrl_c.await.ok();
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
    }
    info!("shutdown signal received, draining requests");
}
