//! JSON-over-HTTP surface.
//!
//! | Route                 | Success | Errors        |
//! |-----------------------|---------|---------------|
//! | `GET /api/feed`       | 200     | 400, 500      |
//! | `PUT /api/feed`       | 200     | 400, 404, 500 |
//! | `POST /api/publish`   | 201     | 400, 500      |
//! | `POST /api/generate`  | 200     | 400, 500      |
//!
//! Error bodies are `{"error", "reason"}` plus `"details"` for server-side
//! failures.

use crate::error::FeedError;
use crate::provider::ImageProvider;
use crate::service::FeedService;
use crate::store::RecordStore;
use crate::validate::ValidationError;
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;

type Shared<S, P> = Arc<FeedService<S, P>>;

/// Build the router over a shared service.
pub fn router<S, P>(service: Shared<S, P>) -> Router
where
    S: RecordStore + 'static,
    P: ImageProvider + 'static,
{
    Router::new()
        .route("/api/feed", get(get_feed::<S, P>).put(put_hearts::<S, P>))
        .route("/api/publish", post(publish::<S, P>))
        .route("/api/generate", post(generate::<S, P>))
        .route("/health", get(|| async { "OK" }))
        .with_state(service)
}

impl IntoResponse for FeedError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            log::error!("heartfeed: {self}");
        }

        let mut body = json!({
            "error": self.summary(),
            "reason": self.reason(),
        });
        if let Some(details) = self.details() {
            body["details"] = Value::from(details);
        }
        (status, Json(body)).into_response()
    }
}

async fn get_feed<S, P>(
    State(service): State<Shared<S, P>>,
    Query(params): Query<HashMap<String, String>>,
) -> Response
where
    S: RecordStore + 'static,
    P: ImageProvider + 'static,
{
    let result = blocking("Failed to fetch feed", move || {
        service.get_feed_from_params(
            params.get("page").map(String::as_str),
            params.get("limit").map(String::as_str),
        )
    })
    .await;
    respond(StatusCode::OK, result)
}

async fn put_hearts<S, P>(State(service): State<Shared<S, P>>, body: Bytes) -> Response
where
    S: RecordStore + 'static,
    P: ImageProvider + 'static,
{
    let body = match parse_body(&body) {
        Ok(body) => body,
        Err(e) => return e.into_response(),
    };
    let result = blocking("Failed to update hearts", move || service.update_hearts(&body)).await;
    respond(StatusCode::OK, result)
}

async fn publish<S, P>(State(service): State<Shared<S, P>>, body: Bytes) -> Response
where
    S: RecordStore + 'static,
    P: ImageProvider + 'static,
{
    let body = match parse_body(&body) {
        Ok(body) => body,
        Err(e) => return e.into_response(),
    };
    let result = blocking("Failed to publish image", move || service.publish(&body)).await;
    respond(StatusCode::CREATED, result)
}

async fn generate<S, P>(State(service): State<Shared<S, P>>, body: Bytes) -> Response
where
    S: RecordStore + 'static,
    P: ImageProvider + 'static,
{
    let body = match parse_body(&body) {
        Ok(body) => body,
        Err(e) => return e.into_response(),
    };
    let result = blocking("Failed to generate image", move || service.generate(&body)).await;
    respond(StatusCode::OK, result)
}

fn parse_body(body: &[u8]) -> Result<Value, FeedError> {
    serde_json::from_slice(body).map_err(|_| ValidationError::MalformedBody.into())
}

/// Run store and provider calls on the blocking pool.
async fn blocking<T, F>(summary: &'static str, f: F) -> Result<T, FeedError>
where
    F: FnOnce() -> Result<T, FeedError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .unwrap_or_else(|e| Err(FeedError::internal(summary, e)))
}

fn respond<T: Serialize>(status: StatusCode, result: Result<T, FeedError>) -> Response {
    match result {
        Ok(value) => (status, Json(value)).into_response(),
        Err(e) => e.into_response(),
    }
}
