use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::config::QueueNames;
use crate::health::{MetricsSnapshot, PipelineMetrics};
use crate::queue::message::with_retry_count;
use crate::queue::{snapshot_depths, Broker, DeadLetterEntry, QueueDepthSnapshot, QueueError};

const DEFAULT_DEAD_LETTER_LIMIT: usize = 20;
const MAX_DEAD_LETTER_LIMIT: usize = 100;

#[derive(Clone)]
pub struct AdminState {
    pub broker: Arc<dyn Broker>,
    pub queues: QueueNames,
    pub metrics: Arc<PipelineMetrics>,
    pub api_key: String,
}

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub queue_depths: Option<QueueDepthSnapshot>,
    pub metrics: MetricsSnapshot,
}

#[derive(Debug, Deserialize)]
pub struct DeadLetterQuery {
    pub limit: Option<usize>,
}

#[derive(Serialize)]
pub struct DeadLetterList {
    pub queue: String,
    pub total: u64,
    /// Newest first. Entries that fail to parse are returned verbatim.
    pub entries: Vec<Value>,
}

#[derive(Serialize)]
pub struct ReplayResult {
    pub replayed: bool,
    pub model_id: Option<String>,
    pub failed_with: String,
}

/// Admin failures mapped to HTTP status codes.
#[derive(Debug)]
pub enum AdminError {
    Broker(QueueError),
    Empty,
    NotReplayable(String),
}

impl From<QueueError> for AdminError {
    fn from(error: QueueError) -> Self {
        AdminError::Broker(error)
    }
}

impl IntoResponse for AdminError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AdminError::Broker(e) => (StatusCode::SERVICE_UNAVAILABLE, e.to_string()),
            AdminError::Empty => (StatusCode::NOT_FOUND, "dead-letter queue is empty".to_string()),
            AdminError::NotReplayable(reason) => (StatusCode::UNPROCESSABLE_ENTITY, reason),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    let queue_depths = match snapshot_depths(state.broker.as_ref(), &state.queues).await {
        Ok(depths) => Some(depths),
        Err(e) => {
            tracing::warn!(error = %e, "Queue depths unavailable for status");
            None
        }
    };

    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: if queue_depths.is_some() { "operational" } else { "degraded" },
        queue_depths,
        metrics: state.metrics.snapshot(),
    })
}

pub async fn list_dead_letters(
    State(state): State<AdminState>,
    Query(query): Query<DeadLetterQuery>,
) -> Result<Json<DeadLetterList>, AdminError> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_DEAD_LETTER_LIMIT)
        .clamp(1, MAX_DEAD_LETTER_LIMIT);
    let queue = &state.queues.dead_letter;

    let total = state.broker.depth(queue).await?;
    let entries = state
        .broker
        .peek(queue, limit)
        .await?
        .into_iter()
        .map(|raw| serde_json::from_str(&raw).unwrap_or(Value::String(raw)))
        .collect();

    Ok(Json(DeadLetterList {
        queue: queue.clone(),
        total,
        entries,
    }))
}

/// Move the oldest dead-letter entry's original message back to inbound with
/// its retry counter reset.
pub async fn replay_dead_letter(State(state): State<AdminState>) -> Result<Json<ReplayResult>, AdminError> {
    let queues = &state.queues;
    let raw = state
        .broker
        .pop_oldest(&queues.dead_letter)
        .await?
        .ok_or(AdminError::Empty)?;

    let entry = match serde_json::from_str::<DeadLetterEntry>(&raw) {
        Ok(entry) if entry.original_message.is_object() => entry,
        Ok(_) | Err(_) => {
            state.broker.requeue_front(&queues.dead_letter, &raw).await?;
            return Err(AdminError::NotReplayable(
                "oldest dead-letter entry has no JSON object payload".to_string(),
            ));
        }
    };

    let payload = with_retry_count(&entry.original_message, 0);
    if let Err(e) = state.broker.enqueue(&queues.inbound, &payload.to_string()).await {
        state.broker.requeue_front(&queues.dead_letter, &raw).await?;
        return Err(AdminError::Broker(e));
    }

    let model_id = payload["model_id"].as_str().map(str::to_string);
    tracing::info!(model_id = ?model_id, previous_error = %entry.error, "Dead letter replayed");

    Ok(Json(ReplayResult {
        replayed: true,
        model_id,
        failed_with: entry.error,
    }))
}
