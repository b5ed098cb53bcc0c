//! Capability interface to the external notmuch index.
//!
//! The gateway only ever talks to a backend through these traits.
//! Every handle (database, query, message sequence, message) is an
//! owned value whose `Drop` releases the underlying resource, so each
//! acquisition is released exactly once on every exit path.
//!
//! Handles are dropped in reverse acquisition order: a message
//! sequence before its query, a query before its database.

use std::path::Path;

use thiserror::Error;

pub use crate::core::params::SortOrder;

pub mod cli;
pub mod memory;

pub use cli::NotmuchCli;
pub use memory::{Fault, HandleKind, MemoryBackend, MemoryMessage};

/// Diagnostic returned by a failed backend primitive
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct BackendError(pub String);

impl BackendError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Result type alias for backend primitives
pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// Mode a database handle is opened in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatabaseMode {
    ReadOnly,
    ReadWrite,
}

/// Entry point of a backend: opens database handles
pub trait Backend: Send + Sync + 'static {
    type Database: Database;

    /// Open the database at `path`
    fn open(&self, path: &Path, mode: DatabaseMode) -> BackendResult<Self::Database>;
}

/// An open database handle, released on drop
pub trait Database {
    type Message: NativeMessage;
    type Query: Query<Message = Self::Message>;

    /// Build a query, `None` when the backend refuses the query string
    fn create_query(&self, query: &str) -> Option<Self::Query>;

    /// Find a message by identifier, `Ok(None)` when it does not exist
    fn find_message(&self, message_id: &str) -> BackendResult<Option<Self::Message>>;
}

/// A query handle, released on drop
pub trait Query {
    type Message: NativeMessage;

    /// Lazy, finite, forward-only sequence of matches.
    ///
    /// A position yields `Ok(None)` when the backend has no record there
    /// (the message vanished since the query ran); consumers skip such
    /// positions. `Err` means the backend failed to load the record.
    type Messages: Iterator<Item = BackendResult<Option<Self::Message>>>;

    fn set_sort(&mut self, order: SortOrder);

    /// Execute the query
    fn search_messages(&mut self) -> BackendResult<Self::Messages>;

    /// Total number of matching messages
    fn count_messages(&mut self) -> BackendResult<u64>;
}

/// A native message record, released on drop
pub trait NativeMessage {
    type Tags: Iterator<Item = String>;

    fn message_id(&self) -> String;

    fn thread_id(&self) -> String;

    /// Message date in Unix epoch seconds
    fn date(&self) -> BackendResult<i64>;

    /// Header value by case-insensitive name, `None` when absent
    fn header(&self, name: &str) -> Option<String>;

    /// Current tags in backend order
    fn tags(&self) -> Self::Tags;

    fn filename(&self) -> String;

    /// Add a tag; requires a read-write database
    fn add_tag(&mut self, tag: &str) -> BackendResult<()>;
}
