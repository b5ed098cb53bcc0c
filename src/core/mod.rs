//! Core domain logic (protocol-agnostic)
//!
//! This module contains all logic that is independent of the HTTP
//! transport.
//!
//! # Architecture
//!
//! - **config**: Configuration loading (TOML + environment)
//! - **error**: Error types and Result alias
//! - **types**: External result shapes
//! - **params**: Search parameter normalization
//! - **backend**: Capability interface to the notmuch index
//! - **mapper**: Native record to external record mapping
//! - **gateway**: Scoped backend operations
//! - **services**: Unified service container
//! - **xdg**: XDG directory handling

pub mod backend;
pub mod config;
pub mod error;
pub mod gateway;
pub mod mapper;
pub mod params;
pub mod services;
pub mod types;
pub mod xdg;

// Re-export key types for convenience
pub use config::Config;
pub use error::{MailgateError, Result};
pub use gateway::IndexGateway;
pub use services::Services;
