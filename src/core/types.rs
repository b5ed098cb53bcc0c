//! Core data types for mailgate.
//!
//! External-facing result shapes returned by the gateway and
//! serialized by the HTTP adapter.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single matched message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailRecord {
    /// Backend-assigned message identifier
    pub message_id: String,

    /// Thread the message belongs to
    pub thread_id: String,

    /// Message date (Unix epoch when the backend date is unusable)
    pub date: DateTime<Utc>,

    /// Raw `From` header
    pub from: String,

    /// Raw `Subject` header
    pub subject: String,

    /// Tags in backend iteration order
    pub tags: Vec<String>,

    /// Backend-local path of the message file
    pub filename: String,
}

/// Results of a search query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResultSet {
    /// Echo of the input query
    pub query: String,

    /// Total matches in the backend, independent of the limit
    pub count: u64,

    /// At most `limit` records
    pub results: Vec<EmailRecord>,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub database: String,
    pub version: String,
    /// RFC 3339 timestamp of the check
    pub timestamp: String,
}

/// Raw query-string parameters of a search request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchRequest {
    pub q: Option<String>,
    pub limit: Option<String>,
    pub sort: Option<String>,
}
