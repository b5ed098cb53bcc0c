//! mailgate - HTTP API over a notmuch email index
//!
//! Translates web requests into queries against an externally
//! maintained notmuch database and returns the results as JSON.
//!
//! # Architecture
//!
//! - **core**: Domain logic (protocol-agnostic)
//!   - config, error, types, xdg
//!   - params (limit/sort normalization)
//!   - backend (capability traits, notmuch CLI and in-memory backends)
//!   - mapper (native record to `EmailRecord`)
//!   - gateway (scoped health/search/get/tag operations)
//!   - services (shared service container)
//!
//! - **http**: REST API adapter (depends on core)
//!   - handlers, middleware, error responses
//!
//! # Endpoints
//!
//! - `GET /health`
//! - `GET /api/v1/search?q=&limit=&sort=`
//! - `GET /api/v1/email/:id`
//! - `POST /api/v1/email/:id/tags/:tag`

// Core domain logic (protocol-agnostic)
pub mod core;

// HTTP REST adapter
pub mod http;

// Re-export commonly used types for convenience
pub use crate::core::config::Config;
pub use crate::core::error::{MailgateError, Result};
pub use crate::core::gateway::IndexGateway;
pub use crate::core::params::{SearchParameters, SortOrder};
pub use crate::core::services::Services;
pub use crate::core::types::*;
