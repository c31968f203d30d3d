use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;
use std::time::UNIX_EPOCH;

use warp::http::StatusCode;
use warp::Filter;

use super::PrometheusReporter;
use crate::application::services::ConnectionService;
use crate::domain::entities::ConnectionStatus;

const SERVICE_NAME: &str = "gateway-resilience";

/// Health check response structure
#[derive(serde::Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
    version: &'static str,
}

#[derive(serde::Serialize)]
struct StatusResponse {
    connected: bool,
    last_connected_at_ms: Option<u64>,
    connected_for_secs: Option<u64>,
    reconnect_attempts: u32,
    last_error: Option<String>,
}

impl From<&ConnectionStatus> for StatusResponse {
    fn from(status: &ConnectionStatus) -> Self {
        Self {
            connected: status.is_connected(),
            last_connected_at_ms: status
                .last_connected_at()
                .and_then(|at| at.duration_since(UNIX_EPOCH).ok())
                .map(|since_epoch| since_epoch.as_millis() as u64),
            connected_for_secs: status.connected_for().map(|uptime| uptime.as_secs()),
            reconnect_attempts: status.reconnect_attempts(),
            last_error: status.last_error().map(ToString::to_string),
        }
    }
}

#[derive(serde::Serialize)]
struct ReconnectResponse {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn with_service(
    service: Arc<ConnectionService>,
) -> impl Filter<Extract = (Arc<ConnectionService>,), Error = Infallible> + Clone {
    warp::any().map(move || Arc::clone(&service))
}

async fn handle_reconnect(
    service: Arc<ConnectionService>,
) -> Result<impl warp::Reply, Infallible> {
    let (response, code) = match service.force_reconnect().await {
        Ok(success) => (
            ReconnectResponse {
                success,
                error: None,
            },
            StatusCode::OK,
        ),
        Err(e) => (
            ReconnectResponse {
                success: false,
                error: Some(e.to_string()),
            },
            StatusCode::SERVICE_UNAVAILABLE,
        ),
    };

    Ok(warp::reply::with_status(warp::reply::json(&response), code))
}

/// Serve metrics, probes and the operator endpoints until `shutdown` resolves
pub async fn serve_metrics<F>(
    port: u16,
    service: Arc<ConnectionService>,
    shutdown: F,
) -> Result<(), warp::Error>
where
    F: Future<Output = ()> + Send + 'static,
{
    // CORS configuration for browser access
    let cors = warp::cors()
        .allow_any_origin()
        .allow_methods(vec!["GET", "POST", "OPTIONS"])
        .allow_headers(vec!["Content-Type"]);

    let metrics_route = warp::path("metrics").map(|| {
        let body = PrometheusReporter::gather_metrics();
        warp::reply::with_header(body, "content-type", "text/plain; version=0.0.4; charset=utf-8")
    });

    let health_route = warp::path("health").map(|| {
        let response = HealthResponse {
            status: "healthy",
            service: SERVICE_NAME,
            version: env!("CARGO_PKG_VERSION"),
        };
        warp::reply::json(&response)
    });

    // Liveness probe endpoint (minimal check - is the process running?)
    let liveness_route =
        warp::path("livez").map(|| warp::reply::with_status("OK", StatusCode::OK));

    // Readiness follows the gateway connection
    let readiness_route = warp::path("readyz")
        .and(with_service(Arc::clone(&service)))
        .map(|service: Arc<ConnectionService>| {
            let (status, code) = if service.get_status().is_connected() {
                ("ready", StatusCode::OK)
            } else {
                ("not_ready", StatusCode::SERVICE_UNAVAILABLE)
            };
            let response = HealthResponse {
                status,
                service: SERVICE_NAME,
                version: env!("CARGO_PKG_VERSION"),
            };
            warp::reply::with_status(warp::reply::json(&response), code)
        });

    let status_route = warp::path("status")
        .and(warp::get())
        .and(with_service(Arc::clone(&service)))
        .map(|service: Arc<ConnectionService>| {
            warp::reply::json(&StatusResponse::from(&service.get_status()))
        });

    let reconnect_route = warp::path("reconnect")
        .and(warp::post())
        .and(with_service(service))
        .and_then(handle_reconnect);

    let routes = metrics_route
        .or(health_route)
        .or(liveness_route)
        .or(readiness_route)
        .or(status_route)
        .or(reconnect_route)
        .with(cors);

    let (addr, server) =
        warp::serve(routes).try_bind_with_graceful_shutdown(([0, 0, 0, 0], port), shutdown)?;

    tracing::info!("Metrics server listening on http://{}", addr);
    server.await;
    Ok(())
}
