use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tokio::sync::oneshot;
use tracing::{error, info, warn};

use gateway_resilience::{
    serve_metrics, Alert, AlertLevel, Config, ConnectionMonitor, ConnectionResilienceManager,
    ConnectionService, GatewaySession, PrometheusReporter, TcpGateway, TracingAlertNotifier,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse configuration
    let config = Config::parse();
    config.validate()?;

    // Initialize logging
    let filter = if config.verbose { "debug" } else { "info" };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .init();

    // Initialize metrics
    PrometheusReporter::init_metrics()?;

    info!("Starting gateway connection monitor");
    info!("  Gateway: {}", config.gateway_addr);
    info!("  Strategy: {:?}", config.reconnection_strategy);
    info!("  Health check interval: {}ms", config.health_check_interval_ms);
    info!("  Metrics port: {}", config.metrics_port);

    // Convert CLI config to domain configs
    let retry_policy = config.to_retry_policy()?;
    let settings = config.to_monitor_settings()?;

    // Create infrastructure implementations (dependency injection)
    let gateway = Arc::new(TcpGateway::new(
        config.gateway_addr.clone(),
        config.handshake_timeout(),
    ));
    let metrics_reporter = Arc::new(PrometheusReporter::new());
    let alerts = Arc::new(TracingAlertNotifier::new());

    // Create application services
    let manager = Arc::new(ConnectionResilienceManager::new(
        gateway.clone(),
        retry_policy,
        settings,
        metrics_reporter,
    ));
    let service = Arc::new(ConnectionService::new(
        ConnectionMonitor::new(manager),
        alerts,
    ));

    // Subscribe before the first login so its Connected event is alerted
    service.start().await?;

    if let Err(e) = gateway.login(&config.token).await {
        error!("Initial gateway login failed: {}", e);
        service
            .notify(
                Alert::new(
                    AlertLevel::Error,
                    "Service Startup Failed",
                    "Could not establish the initial gateway session",
                )
                .with_error(&e),
            )
            .await;
        service.stop().await?;
        return Err(e.into());
    }

    // Start metrics server
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let mut metrics_server = tokio::spawn(serve_metrics(
        config.metrics_port,
        Arc::clone(&service),
        async move {
            shutdown_rx.await.ok();
        },
    ));

    service
        .notify(Alert::new(
            AlertLevel::Info,
            "Service Started",
            "Gateway connection monitor is running",
        ))
        .await;

    // Wait for Ctrl+C, or for the metrics server to die on its own
    let server_finished = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            match signal {
                Ok(()) => info!("Received shutdown signal"),
                Err(e) => error!("Failed to listen for ctrl+c: {}", e),
            }
            false
        }
        result = &mut metrics_server => {
            match result {
                Ok(Ok(())) => warn!("Metrics server stopped unexpectedly"),
                Ok(Err(e)) => error!("Metrics server error: {}", e),
                Err(e) => error!("Metrics server task failed: {}", e),
            }
            true
        }
    };

    service.begin_shutdown();
    service
        .notify(Alert::new(
            AlertLevel::Info,
            "Service Shutting Down",
            "Gateway connection monitor is shutting down",
        ))
        .await;

    if let Err(e) = service.stop().await {
        error!("Failed to stop connection service: {}", e);
    }
    if let Err(e) = gateway.destroy().await {
        warn!("Failed to close gateway session: {}", e);
    }

    // Signal shutdown to metrics server
    let _ = shutdown_tx.send(());
    if !server_finished {
        match metrics_server.await {
            Ok(Err(e)) => error!("Metrics server error: {}", e),
            Err(e) => error!("Metrics server task failed: {}", e),
            Ok(Ok(())) => {}
        }
    }

    info!("Gateway connection monitor shutdown complete");
    Ok(())
}
