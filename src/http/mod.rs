//! HTTP REST adapter
//!
//! Depends only on core/. Routes the four endpoints onto the index
//! gateway via Axum.

pub mod error;
pub mod handlers;
pub mod middleware;

use std::any::Any;
use std::sync::Arc;

use axum::{
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use tower_http::{catch_panic::CatchPanicLayer, cors::CorsLayer};

use crate::core::backend::Backend;
use crate::core::error::MailgateError;
use crate::core::services::Services;

pub use handlers::*;

/// Build the API router over `services`
pub fn router<B: Backend>(services: Arc<Services<B>>) -> Router {
    let routes = Router::new()
        // Health check endpoint
        .route("/health", get(health_handler::<B>))
        // API v1 endpoints
        .route("/api/v1/search", get(search_handler::<B>))
        .route("/api/v1/email/:id", get(get_email_handler::<B>))
        .route("/api/v1/email/:id/tags/:tag", post(tag_email_handler::<B>));

    with_layers(routes).with_state(services)
}

/// Panic recovery, request logging and CORS, innermost first
fn with_layers<S>(routes: Router<S>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    routes
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(axum::middleware::from_fn(middleware::log_request))
        .layer(CorsLayer::permissive())
}

/// Turn a handler panic into the regular 500 error body
fn panic_response(payload: Box<dyn Any + Send + 'static>) -> Response {
    let detail = payload
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| payload.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");

    MailgateError::TaskFailed(format!("request handler panicked: {detail}")).into_response()
}
