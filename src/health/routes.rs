//! HTTP health endpoints.
//!
//! ```text
//! GET /health/live      200 while the process runs
//! GET /health/ready     200 when required contracts have bytecode, else 503
//! GET /health           200 unless a component is unhealthy, else 503
//! GET /health/detailed  same status rule, full component breakdown
//! ```

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};

use crate::health::service::HealthService;

pub fn health_router(service: Arc<HealthService>) -> Router {
    Router::new()
        .route("/health", get(basic))
        .route("/health/live", get(live))
        .route("/health/ready", get(ready))
        .route("/health/detailed", get(detailed))
        .with_state(service)
}

async fn live(State(service): State<Arc<HealthService>>) -> impl IntoResponse {
    Json(service.liveness())
}

async fn ready(State(service): State<Arc<HealthService>>) -> impl IntoResponse {
    let readiness = service.readiness().await;
    let status = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(readiness))
}

async fn basic(State(service): State<Arc<HealthService>>) -> impl IntoResponse {
    let health = service.basic().await;
    (serving_status(health.status.is_serving()), Json(health))
}

async fn detailed(State(service): State<Arc<HealthService>>) -> impl IntoResponse {
    let health = service.detailed().await;
    (serving_status(health.status.is_serving()), Json(health))
}

fn serving_status(serving: bool) -> StatusCode {
    if serving {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}
