//! HTTP push endpoint.
//!
//! Push subscriptions deliver each message as a `POST` whose JSON body wraps
//! the message:
//!
//! ```json
//! {
//!   "message": {
//!     "attributes": {"jobrelay.io/pubsub.EventType": "jobrelay.io/pubsub.PeriodicJobEvent"},
//!     "data": "eyJuYW1lIjoibmlnaHRseS1idWlsZCJ9",
//!     "messageId": "1234"
//!   },
//!   "subscription": "projects/p/subscriptions/ci-triggers"
//! }
//! ```
//!
//! The response status settles the delivery: any 2xx acknowledges it, any
//! other status asks the transport to redeliver.

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Router;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::Deserialize;
use tracing::{debug, error, warn};

use crate::{ChannelEnvelope, Disposition, SubscriptionWorker};

#[derive(Clone)]
struct PushState {
    workers: Arc<HashMap<String, Arc<SubscriptionWorker>>>,
}

#[derive(Debug, Deserialize)]
struct PushRequest {
    message: PushMessage,
    #[serde(default)]
    subscription: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PushMessage {
    #[serde(default)]
    attributes: HashMap<String, String>,
    #[serde(default)]
    data: String,
    #[serde(default)]
    message_id: String,
}

/// Builds the push router for `workers`, keyed by subscription name.
///
/// Routes:
///
/// - `POST /push/{subscription}`: one delivery for `subscription`.
///   `204` when acknowledged, `503` when rejected, `404` for an unknown
///   subscription, `400` for a body that is not a push delivery. A delivery
///   whose data is not base64 is acknowledged without creating a job.
/// - `GET /healthz`: liveness, always `200 ok`.
pub fn router(workers: impl IntoIterator<Item = Arc<SubscriptionWorker>>) -> Router {
    let workers = workers
        .into_iter()
        .map(|worker| (worker.name().to_string(), worker))
        .collect();
    Router::new()
        .route("/push/{subscription}", post(receive_push))
        .route("/healthz", get(healthz))
        .with_state(PushState {
            workers: Arc::new(workers),
        })
}

async fn healthz() -> &'static str {
    "ok"
}

async fn receive_push(
    State(state): State<PushState>,
    Path(subscription): Path<String>,
    body: Bytes,
) -> StatusCode {
    let Some(worker) = state.workers.get(&subscription) else {
        warn!(subscription = %subscription, "Push delivery for unknown subscription");
        return StatusCode::NOT_FOUND;
    };

    let request: PushRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(err) => {
            warn!(subscription = %subscription, error = %err, "Malformed push delivery");
            return StatusCode::BAD_REQUEST;
        }
    };
    // Undecodable data is dispatched empty, so dispatch fails and the
    // delivery is still acknowledged.
    let payload = BASE64
        .decode(request.message.data.as_bytes())
        .unwrap_or_else(|err| {
            warn!(
                subscription = %subscription,
                message_id = %request.message.message_id,
                error = %err,
                "Push delivery data is not base64"
            );
            Vec::new()
        });
    debug!(
        subscription = %subscription,
        source = %request.subscription,
        message_id = %request.message.message_id,
        "Push delivery received"
    );

    let (envelope, settled) =
        ChannelEnvelope::new(request.message.message_id, request.message.attributes, payload);
    worker.process(envelope).await;

    match settled.await {
        Ok(Disposition::Acknowledged) => StatusCode::NO_CONTENT,
        Ok(Disposition::Rejected) => StatusCode::SERVICE_UNAVAILABLE,
        Err(_) => {
            error!(subscription = %subscription, "Push delivery was never settled");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}
