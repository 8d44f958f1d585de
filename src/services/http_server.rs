//! HTTP server for the reviewer API.
//!
//! Wraps the API routes with request tracing, panic recovery and a
//! per-request timeout, and serves them until the shutdown token is
//! cancelled. A request that hits the timeout has its handler future
//! dropped, which rolls back any open transaction.

use crate::services::assignment::AssignmentService;
use crate::services::http_api::{api_routes, error_response, ApiState};
use axum::error_handling::HandleErrorLayer;
use axum::http::StatusCode;
use axum::response::Response;
use axum::{BoxError, Router};
use std::any::Any;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower::timeout::error::Elapsed;
use tower::timeout::TimeoutLayer;
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;

/// Build the full router with middleware applied.
pub fn build_router(service: AssignmentService, request_timeout: Duration) -> Router {
    with_middleware(api_routes().with_state(ApiState { service }), request_timeout)
}

fn with_middleware(router: Router, request_timeout: Duration) -> Router {
    router
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(middleware_error))
                .layer(TimeoutLayer::new(request_timeout)),
        )
        .layer(TraceLayer::new_for_http())
}

async fn middleware_error(err: BoxError) -> Response {
    if err.is::<Elapsed>() {
        log::warn!("[http] Request timed out");
        return error_response(
            StatusCode::GATEWAY_TIMEOUT,
            "TIMEOUT",
            "request timed out".to_string(),
        );
    }

    log::error!("[http] Middleware error: {}", err);
    error_response(
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        "internal server error".to_string(),
    )
}

fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    log::error!("[http] Handler panicked: {}", detail);

    error_response(
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        "internal server error".to_string(),
    )
}

/// Serve `router` on `listener` until `shutdown` is cancelled.
///
/// In-flight requests are allowed to finish after cancellation; the caller
/// bounds how long it waits for that.
pub async fn serve(
    listener: TcpListener,
    router: Router,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    let addr = listener.local_addr()?;
    log::info!("[http] Server listening on http://{}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            shutdown.cancelled().await;
        })
        .await?;

    log::info!("[http] Server stopped");
    Ok(())
}
