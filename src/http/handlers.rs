//! HTTP request handlers for the mailgate API
//!
//! Implements handlers for the four endpoints: health, search, get
//! email, and tag email. Handlers validate path/query input, run the
//! gateway on the blocking pool, and forward its result.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{SecondsFormat, Utc};

use crate::core::backend::Backend;
use crate::core::error::{MailgateError, Result};
use crate::core::gateway::IndexGateway;
use crate::core::params::SearchParameters;
use crate::core::services::Services;
use crate::core::types::*;

/// Run a gateway call on tokio's blocking pool
///
/// Backend primitives block (process spawns, file locks), so they never
/// run on the async workers.
async fn run_blocking<B, T, F>(services: &Services<B>, call: F) -> Result<T>
where
    B: Backend,
    T: Send + 'static,
    F: FnOnce(&IndexGateway<B>) -> Result<T> + Send + 'static,
{
    let gateway = Arc::clone(&services.gateway);
    tokio::task::spawn_blocking(move || call(&gateway))
        .await
        .map_err(|e| MailgateError::TaskFailed(e.to_string()))?
}

fn require(value: &str, message: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(MailgateError::InvalidRequest(message.to_string()));
    }
    Ok(())
}

/// Health check handler
///
/// Always answers 200; the database field reports whether the notmuch
/// database could be opened.
pub async fn health_handler<B: Backend>(
    State(services): State<Arc<Services<B>>>,
) -> Json<HealthResponse> {
    let database = match run_blocking(&services, |gateway| gateway.check_connection()).await {
        Ok(()) => "ok".to_string(),
        Err(e) => format!("error: {e}"),
    };

    Json(HealthResponse {
        status: "up".to_string(),
        database,
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
    })
}

/// Search handler
///
/// # Errors
///
/// - `InvalidQuery`: `q` is missing or empty
/// - any gateway search error
pub async fn search_handler<B: Backend>(
    State(services): State<Arc<Services<B>>>,
    Query(req): Query<SearchRequest>,
) -> Result<Json<SearchResultSet>> {
    let params = SearchParameters::from_raw(
        req.q.as_deref(),
        req.limit.as_deref(),
        req.sort.as_deref(),
    )?;

    tracing::info!(
        query = %params.query(),
        sort_param = req.sort.as_deref().unwrap_or(""),
        sort = params.sort().as_str(),
        limit = params.limit(),
        "search request"
    );

    let results = run_blocking(&services, move |gateway| gateway.search(&params)).await?;
    Ok(Json(results))
}

/// Get email handler
///
/// # Errors
///
/// - `InvalidRequest`: empty message ID
/// - `EmailNotFound`: no message with this ID
/// - any gateway lookup error
pub async fn get_email_handler<B: Backend>(
    State(services): State<Arc<Services<B>>>,
    Path(message_id): Path<String>,
) -> Result<Json<EmailRecord>> {
    require(&message_id, "Message ID is required")?;

    let id = message_id.clone();
    let email = run_blocking(&services, move |gateway| gateway.get_by_id(&id)).await?;

    email
        .map(Json)
        .ok_or(MailgateError::EmailNotFound(message_id))
}

/// Tag email handler
///
/// # Errors
///
/// - `InvalidRequest`: empty message ID or tag
/// - `EmailNotFound`: no message with this ID
/// - any gateway tagging error
pub async fn tag_email_handler<B: Backend>(
    State(services): State<Arc<Services<B>>>,
    Path((message_id, tag)): Path<(String, String)>,
) -> Result<Json<EmailRecord>> {
    require(&message_id, "Message ID is required")?;
    require(&tag, "tag is required")?;

    let id = message_id.clone();
    let email = run_blocking(&services, move |gateway| gateway.tag_by_id(&id, &tag)).await?;

    email
        .map(Json)
        .ok_or(MailgateError::EmailNotFound(message_id))
}
