mod error;
mod handlers;
mod params;
mod routes;

pub use error::ApiError;

use std::sync::Arc;
use std::time::Instant;

use axum::extract::{MatchedPath, Request};
use axum::middleware::Next;
use axum::response::Response;
use axum::Router;

use crate::engine::Engine;
use crate::observability;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
}

/// Build the HTTP router over `engine`.
pub fn router(engine: Arc<Engine>) -> Router {
    routes::routes(AppState { engine })
}

/// Records request count and latency per matched route.
async fn track_metrics(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_owned())
        .unwrap_or_else(|| "unmatched".to_owned());
    let method = req.method().to_string();

    let response = next.run(req).await;

    let status = observability::status_class(response.status().as_u16());
    metrics::counter!(
        observability::HTTP_REQUESTS_TOTAL,
        "method" => method.clone(),
        "route" => route.clone(),
        "status" => status,
    )
    .increment(1);
    metrics::histogram!(
        observability::HTTP_REQUEST_DURATION_SECONDS,
        "method" => method,
        "route" => route,
    )
    .record(start.elapsed().as_secs_f64());
    response
}
