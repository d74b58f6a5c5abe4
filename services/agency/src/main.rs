use anyhow::Result;
use std::net::SocketAddr;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use agency::{Client, ClientError, Config, TcpConnector};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize structured logging with JSON formatting (configurable via env)
    let use_json = std::env::var("LOG_FORMAT")
        .unwrap_or_else(|_| "text".to_string())
        .eq_ignore_ascii_case("json");

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "agency=info".into());

    if use_json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    tracing::info!(
        service = "agency",
        version = env!("CARGO_PKG_VERSION"),
        log_format = if use_json { "json" } else { "text" },
        "Starting agency client"
    );

    let config = Config::load()?;
    tracing::info!(
        agency = %config.agency_id,
        server_address = %config.server_address,
        batch_max_amount = config.batch.max_amount,
        data_path = %config.batch.data_path,
        "Configuration loaded"
    );

    if let Some(port) = config.metrics_port {
        start_metrics_exporter(port)?;
    }

    let shutdown = CancellationToken::new();
    tokio::spawn(watch_signals(shutdown.clone()));

    let connector = TcpConnector::new(config.server_address.clone(), config.agency_id);
    let client = Client::new(config.clone(), connector, shutdown);

    match client.run().await {
        Ok(summary) => {
            metrics::gauge!("winners").set(summary.winners.len() as f64);
            info!(
                agency = %config.agency_id,
                batches_sent = summary.batches_sent,
                bets_sent = summary.bets_sent,
                winners = summary.winners.len(),
                "Winners received"
            );
            Ok(())
        }
        Err(e) if matches!(e.source, ClientError::Stopped) => {
            info!(phase = %e.phase, "Agency client stopped before completion");
            Ok(())
        }
        Err(e) => {
            error!(phase = %e.phase, batches_sent = e.batches_sent, error = %e.source, "Agency client failed");
            Err(e.into())
        }
    }
}

fn start_metrics_exporter(port: u16) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;

    tracing::info!("Agency metrics listening on {}", addr);
    Ok(())
}

/// Cancel `shutdown` on SIGINT or SIGTERM
async fn watch_signals(shutdown: CancellationToken) {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Could not install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        result = ctrl_c => {
            if let Err(e) = result {
                error!(error = %e, "Could not listen for ctrl-c");
                return;
            }
            info!(signal = "SIGINT", "Shutdown signal received");
        }
        _ = terminate => info!(signal = "SIGTERM", "Shutdown signal received"),
    }

    shutdown.cancel();
}
