//! Health and admin routes as served by the deployer's HTTP router.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;

use alloy::primitives::U256;
use common::{model_ready, Pipeline, MANAGER_ADDRESS, REGISTRY_ADDRESS};
use model_token_deployer::admin::AdminState;
use model_token_deployer::config::HealthConfig;
use model_token_deployer::lifecycle::build_http_router;

const API_KEY: &str = "test-key";

fn router(pipeline: &Pipeline) -> Router {
    let health = pipeline.health_service(&HealthConfig::default());
    let admin = AdminState {
        broker: pipeline.broker.clone(),
        queues: pipeline.queues.clone(),
        metrics: pipeline.metrics.clone(),
        api_key: API_KEY.to_string(),
    };
    build_http_router(health, Some(admin))
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    send(app, Request::get(uri).body(Body::empty()).unwrap()).await
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

#[tokio::test]
async fn test_liveness_always_ok() {
    let pipeline = Pipeline::new();
    pipeline.broker.set_unavailable(true);
    let app = router(&pipeline);

    let (status, body) = get(&app, "/health/live").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "alive");
}

#[tokio::test]
async fn test_readiness_follows_contract_bytecode() {
    let pipeline = Pipeline::new();
    let app = router(&pipeline);

    let (status, body) = get(&app, "/health/ready").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ready"], true);

    pipeline.chain.remove_code(MANAGER_ADDRESS);
    let (status, body) = get(&app, "/health/ready").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["ready"], false);
    assert_eq!(body["model_registry_deployed"], true);
    assert_eq!(body["token_manager_deployed"], false);

    pipeline.chain.remove_code(REGISTRY_ADDRESS);
    let (_, body) = get(&app, "/health/ready").await;
    assert_eq!(body["model_registry_deployed"], false);
}

#[tokio::test]
async fn test_detailed_health_reports_every_component() {
    let pipeline = Pipeline::new();
    pipeline.submit(&model_ready("m1", "HK1")).await;
    pipeline.step().await;
    let app = router(&pipeline);

    let (status, body) = get(&app, "/health/detailed").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    for component in ["broker", "chain", "contracts", "pipeline"] {
        assert_eq!(body["components"][component]["status"], "healthy", "{}", component);
    }
    assert_eq!(body["metrics"]["tokens_deployed"], 1);
    assert_eq!(body["components"]["broker"]["details"]["queue_depths"]["outbound"], 1);
}

#[tokio::test]
async fn test_broker_outage_is_unhealthy() {
    let pipeline = Pipeline::new();
    pipeline.broker.set_unavailable(true);
    let app = router(&pipeline);

    let (status, body) = get(&app, "/health").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "unhealthy");
    assert_eq!(body["components"]["broker"], "unhealthy");
}

#[tokio::test]
async fn test_low_balance_degrades_but_keeps_serving() {
    let pipeline = Pipeline::new();
    pipeline.chain.set_balance(U256::from(1_000u64));
    let app = router(&pipeline);

    let (status, body) = get(&app, "/health/detailed").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["components"]["chain"]["status"], "degraded");
    assert!(!body["alerts"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_admin_routes_require_key_and_replay_dead_letters() {
    let pipeline = Pipeline::with_max_retries(1);
    pipeline.chain.fail_deploys("nonce too low");
    pipeline.submit(&model_ready("m1", "HK1")).await;
    pipeline.step().await;
    assert_eq!(pipeline.dead_letters().len(), 1);
    let app = router(&pipeline);

    let (status, _) = get(&app, "/admin/dead-letters").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let request = Request::get("/admin/dead-letters")
        .header("Authorization", format!("Bearer {}", API_KEY))
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert_eq!(body["entries"][0]["originalMessage"]["model_id"], "m1");

    let request = Request::post("/admin/dead-letters/replay")
        .header("Authorization", format!("Bearer {}", API_KEY))
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["model_id"], "m1");

    assert!(pipeline.dead_letters().is_empty());
    let inbound = pipeline.inbound();
    assert_eq!(inbound.len(), 1);
    assert_eq!(inbound[0]["_retryCount"], 0);
}
