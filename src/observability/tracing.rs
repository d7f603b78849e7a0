//! Per-delivery spans.
//!
//! Every dequeued message is processed inside a span carrying a fresh delivery ID,
//! so the consumer, orchestrator and chain client log lines for one attempt can be
//! correlated even when the same model is redelivered.

use tracing::Span;
use uuid::Uuid;

/// Create the span for one delivery attempt.
pub fn delivery_span(queue: &str) -> Span {
    let delivery_id = Uuid::new_v4();
    tracing::info_span!("delivery", %delivery_id, queue, model_id = tracing::field::Empty)
}

/// Record the model ID on the current delivery span once the payload is parsed.
pub fn record_model_id(span: &Span, model_id: &str) {
    span.record("model_id", model_id);
}
