use std::{future::Future, sync::Arc};

use axum::{
    Router,
    extract::{State, rejection::JsonRejection},
    http::{StatusCode, header},
    response::{IntoResponse, Json},
    routing::{get, post},
};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::{
    clients::health::HealthChecker,
    error::{AppError, ValidationError},
    gateway::Gateway,
    metrics,
    models::{health::HealthStatus, request::SendRequest, response::SendResponse},
};

pub struct AppState {
    health_checker: HealthChecker,
    gateway: Option<Gateway>,
}

impl AppState {
    pub fn new(health_checker: HealthChecker) -> Self {
        Self {
            health_checker,
            gateway: None,
        }
    }

    pub fn with_gateway(mut self, gateway: Gateway) -> Self {
        self.gateway = Some(gateway);
        self
    }
}

/// `/health` and `/metrics` for every role, plus `/send` when the state
/// carries a gateway. Without one, `/send` is not routed (404).
pub fn router(state: AppState) -> Router {
    let AppState {
        health_checker,
        gateway,
    } = state;

    let mut app = Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(prometheus_metrics))
        .with_state(Arc::new(health_checker));

    if let Some(gateway) = gateway {
        app = app.merge(
            Router::new()
                .route("/send", post(send_notification))
                .with_state(Arc::new(gateway)),
        );
    }

    app.layer(TraceLayer::new_for_http())
}

pub async fn run_api_server<F>(app: Router, port: u16, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = format!("0.0.0.0:{}", port);
    let listener = TcpListener::bind(&addr).await?;

    info!(address = %addr, "HTTP server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}

async fn send_notification(
    State(gateway): State<Arc<Gateway>>,
    payload: Result<Json<SendRequest>, JsonRejection>,
) -> Result<Json<SendResponse>, AppError> {
    let Json(request) = payload.map_err(|rejection| {
        metrics::record_request("rejected");
        ValidationError::MalformedBody(rejection.body_text())
    })?;

    let notification_id = gateway.submit(request).await?;

    Ok(Json(SendResponse::queued(notification_id)))
}

async fn health_check(State(health_checker): State<Arc<HealthChecker>>) -> impl IntoResponse {
    let health = health_checker.check_all().await;

    let status_code = match health.status {
        HealthStatus::Ok => StatusCode::OK,
        HealthStatus::Error => StatusCode::INTERNAL_SERVER_ERROR,
    };

    (status_code, Json(health))
}

async fn prometheus_metrics() -> impl IntoResponse {
    match metrics::encode_metrics() {
        Ok(output) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
            output,
        ),
        Err(e) => {
            error!(error = %e, "Failed to encode Prometheus metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(header::CONTENT_TYPE, "text/plain")],
                format!("Failed to encode metrics: {}", e),
            )
        }
    }
}
