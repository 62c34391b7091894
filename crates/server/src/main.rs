mod bootstrap;
mod health;
mod llm;
mod routes;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::{info, warn};

use vendy_core::config::{AppConfig, LoadOptions};

fn init_logging(config: &AppConfig) {
    use tracing::Level;
    use vendy_core::config::LogFormat::*;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    // Config and logging come up before anything that can emit events.
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;

    health::spawn(
        &app.config.server.bind_address,
        app.config.server.health_check_port,
        app.db_pool.clone(),
    )
    .await?;

    let address = format!("{}:{}", app.config.server.bind_address, app.config.server.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;
    info!(
        event_name = "server_started",
        bind_address = %address,
        "webhook server listening"
    );

    let grace = Duration::from_secs(app.config.server.graceful_shutdown_secs);
    let shutdown = Arc::new(tokio::sync::Notify::new());
    let shutdown_signal = shutdown.clone();
    let server = axum::serve(listener, routes::router(app.state)).with_graceful_shutdown(
        async move {
            let _ = tokio::signal::ctrl_c().await;
            info!(event_name = "shutdown_requested", "draining in-flight requests");
            shutdown_signal.notify_waiters();
        },
    );

    tokio::select! {
        result = server => result?,
        _ = async {
            shutdown.notified().await;
            tokio::time::sleep(grace).await;
        } => {
            warn!(
                event_name = "shutdown_grace_elapsed",
                grace_secs = grace.as_secs(),
                "shutdown window elapsed before all requests finished"
            );
        }
    }

    app.db_pool.close().await;
    info!(event_name = "server_stopped", "webhook server stopped");
    Ok(())
}
