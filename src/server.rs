//! HTTP surface of the exporter: `GET /metrics`, optionally behind Basic
//! authentication.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::http::StatusCode;
use axum::middleware;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;

use crate::auth::{require_basic_auth, BasicAuth};
use crate::encoding::text::encode;
use crate::encoding::TEXT_CONTENT_TYPE;
use crate::registry::Registry;

/// Path the exposition is served on.
pub const METRICS_PATH: &str = "/metrics";

/// State shared by all requests.
#[derive(Debug)]
pub struct AppState {
    /// Registry collected on every scrape.
    pub registry: Registry,
}

/// Builds the exporter router.
///
/// With `auth` set, requests to [`METRICS_PATH`] must carry matching Basic
/// credentials. Unknown paths answer 404 either way.
pub fn router(state: Arc<AppState>, auth: Option<BasicAuth>) -> Router {
    let router = Router::new()
        .route(METRICS_PATH, get(metrics_handler))
        .with_state(state);

    match auth {
        Some(auth) => router.route_layer(middleware::from_fn_with_state(
            Arc::new(auth),
            require_basic_auth,
        )),
        None => router,
    }
}

/// Collects the registry and answers with the text exposition.
pub async fn metrics_handler(State(state): State<Arc<AppState>>) -> Response {
    let families = state.registry.collect().await;

    let mut buffer = String::new();
    if let Err(error) = encode(&mut buffer, &families) {
        tracing::error!(%error, "failed to encode metrics");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, TEXT_CONTENT_TYPE)
        .body(Body::from(buffer))
        .unwrap_or_else(|error| {
            tracing::error!(%error, "failed to build metrics response");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        })
}
