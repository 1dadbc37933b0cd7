// carelink-core/src/webhooks/mod.rs

pub mod ingest;
pub mod signature;

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
    Form, Router,
};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::Error;
pub use ingest::WebhookIngestionService;

/// Header the gateway puts its request signature in.
pub const SIGNATURE_HEADER: &str = "x-provider-signature";

/// Shared state for the webhook routes.
#[derive(Clone)]
pub struct WebhookState {
    pub ingestion: Arc<WebhookIngestionService>,
}

pub fn webhook_router(state: WebhookState) -> Router {
    Router::new()
        .route(ingest::INBOUND_PATH, post(handle_inbound))
        .route(ingest::STATUS_PATH, post(handle_status))
        .with_state(state)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
}

async fn handle_inbound(
    State(state): State<WebhookState>,
    headers: HeaderMap,
    Form(params): Form<BTreeMap<String, String>>,
) -> StatusCode {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());

    match state.ingestion.handle_inbound(&params, signature).await {
        Ok(()) => StatusCode::NO_CONTENT,
        Err(e) => error_status(&e),
    }
}

async fn handle_status(
    State(state): State<WebhookState>,
    headers: HeaderMap,
    Form(params): Form<BTreeMap<String, String>>,
) -> StatusCode {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());

    match state.ingestion.handle_status(&params, signature).await {
        Ok(()) => StatusCode::NO_CONTENT,
        Err(e) => error_status(&e),
    }
}

/// Collapses the error taxonomy onto the webhook HTTP contract. The
/// response body stays empty: an unauthenticated caller learns nothing
/// about our internals from a status code.
fn error_status(e: &Error) -> StatusCode {
    match e {
        Error::Unauthorized(_) | Error::Auth(_) => StatusCode::FORBIDDEN,
        Error::NotFound(_) => StatusCode::NOT_FOUND,
        Error::Validation(_) | Error::InvalidPhoneFormat(_) => StatusCode::BAD_REQUEST,
        other => {
            error!("Webhook handler failed: {:?}", other);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}
