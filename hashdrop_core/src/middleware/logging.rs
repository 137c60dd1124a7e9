//! Request logging middleware configuration

use axum::{body::Body, Router};
use http::{Request, Response};
use std::time::Duration;
use tower_http::classify::ServerErrorsFailureClass;
use tower_http::trace::TraceLayer;
use tracing::info_span;

/// Wraps every route of `router` in a request span with status-class logging.
pub fn apply_logging<S>(router: Router<S>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router.layer(
        TraceLayer::new_for_http()
            .make_span_with(|request: &Request<Body>| {
                info_span!(
                    "http_request",
                    method = %request.method(),
                    path = %request.uri().path(),
                )
            })
            .on_request(|request: &Request<Body>, _span: &tracing::Span| {
                tracing::debug!(
                    "started processing request {} {}",
                    request.method(),
                    request.uri().path()
                );
            })
            .on_response(|response: &Response<Body>, latency: Duration, _span: &tracing::Span| {
                let status = response.status();
                let latency_ms = latency.as_millis();

                if status.is_success() || status.is_redirection() {
                    tracing::info!(status = status.as_u16(), latency_ms, "request completed");
                } else if status.is_client_error() {
                    tracing::warn!(status = status.as_u16(), latency_ms, "client error response");
                } else {
                    tracing::error!(status = status.as_u16(), latency_ms, "server error response");
                }
            })
            .on_failure(
                |error: ServerErrorsFailureClass, latency: Duration, _span: &tracing::Span| {
                    tracing::error!(
                        latency_ms = latency.as_millis(),
                        error = ?error,
                        "request failed"
                    );
                },
            ),
    )
}
