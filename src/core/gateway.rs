//! Index gateway: the four operations exposed over the notmuch index.
//!
//! Every operation opens its own database handle and releases every
//! handle it acquired before returning, on success and on failure.
//! Backend failures are translated into [`MailgateError`] here and
//! nowhere else.

use std::path::{Path, PathBuf};

use crate::core::backend::{
    Backend, BackendError, BackendResult, Database, DatabaseMode, NativeMessage, Query,
};
use crate::core::error::{MailgateError, Result};
use crate::core::mapper::email_record;
use crate::core::params::SearchParameters;
use crate::core::types::{EmailRecord, SearchResultSet};

/// Wrap a backend diagnostic into one of the gateway error kinds
fn translate(kind: fn(String) -> MailgateError) -> impl Fn(BackendError) -> MailgateError {
    move |err| {
        tracing::warn!(error = %err, "notmuch backend call failed");
        kind(err.0)
    }
}

/// Gateway between request parameters and the backend primitives
pub struct IndexGateway<B: Backend> {
    backend: B,
    database_path: PathBuf,
}

impl<B: Backend> IndexGateway<B> {
    /// Create a gateway for the database at `database_path`
    pub fn new(backend: B, database_path: impl Into<PathBuf>) -> Self {
        Self {
            backend,
            database_path: database_path.into(),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn database_path(&self) -> &Path {
        &self.database_path
    }

    fn open(&self, mode: DatabaseMode) -> Result<B::Database> {
        self.backend
            .open(&self.database_path, mode)
            .map_err(translate(MailgateError::BackendUnavailable))
    }

    /// Check that the database can be opened read-only
    ///
    /// # Errors
    ///
    /// - `BackendUnavailable`: database could not be opened
    pub fn check_connection(&self) -> Result<()> {
        let _db = self.open(DatabaseMode::ReadOnly)?;
        Ok(())
    }

    /// Run a search and map at most `params.limit()` matches
    ///
    /// # Errors
    ///
    /// - `BackendUnavailable`: database could not be opened
    /// - `QueryConstructionFailed`: backend refused the query string
    /// - `QueryExecutionFailed`: backend failed to run the query or to
    ///   load a matched record
    /// - `CountFailed`: backend failed to count matches
    pub fn search(&self, params: &SearchParameters) -> Result<SearchResultSet> {
        tracing::debug!(
            query = %params.query(),
            limit = params.limit(),
            sort = params.sort().as_str(),
            "searching notmuch index"
        );

        let db = self.open(DatabaseMode::ReadOnly)?;

        let mut query = db.create_query(params.query()).ok_or_else(|| {
            MailgateError::QueryConstructionFailed(format!(
                "backend rejected query '{}'",
                params.query()
            ))
        })?;
        query.set_sort(params.sort());

        let messages = query
            .search_messages()
            .map_err(translate(MailgateError::QueryExecutionFailed))?;

        // A failed count fails the whole search, even if iteration would work
        let count = query
            .count_messages()
            .map_err(translate(MailgateError::CountFailed))?;

        // Positions without a record are skipped, not counted toward the
        // limit. A record that fails to load fails the search.
        let results = messages
            .filter_map(|slot| slot.transpose())
            .take(params.limit())
            .map(|slot| slot.map(|message| email_record(&message)))
            .collect::<BackendResult<Vec<EmailRecord>>>()
            .map_err(translate(MailgateError::QueryExecutionFailed))?;

        tracing::debug!(count, returned = results.len(), "search complete");

        Ok(SearchResultSet::new(params.query(), count, results))
    }

    /// Look up a single message
    ///
    /// Returns `Ok(None)` when no message has this identifier.
    ///
    /// # Errors
    ///
    /// - `InvalidRequest`: empty identifier
    /// - `BackendUnavailable`: database could not be opened
    /// - `LookupFailed`: backend lookup error
    pub fn get_by_id(&self, message_id: &str) -> Result<Option<EmailRecord>> {
        require_id(message_id)?;
        tracing::debug!(message_id, "looking up message");

        let db = self.open(DatabaseMode::ReadOnly)?;
        let message = db
            .find_message(message_id)
            .map_err(translate(MailgateError::LookupFailed))?;

        Ok(message.map(|message| email_record(&message)))
    }

    /// Add `tag` to a message and return it with its updated tags
    ///
    /// Returns `Ok(None)` without touching the index when no message
    /// has this identifier.
    ///
    /// # Errors
    ///
    /// - `InvalidRequest`: empty identifier
    /// - `BackendUnavailable`: database could not be opened for writing
    /// - `LookupFailed`: backend lookup error
    /// - `TagApplicationFailed`: backend rejected the tag
    pub fn tag_by_id(&self, message_id: &str, tag: &str) -> Result<Option<EmailRecord>> {
        require_id(message_id)?;
        tracing::debug!(message_id, tag, "tagging message");

        let db = self.open(DatabaseMode::ReadWrite)?;
        let Some(mut message) = db
            .find_message(message_id)
            .map_err(translate(MailgateError::LookupFailed))?
        else {
            return Ok(None);
        };

        message
            .add_tag(tag)
            .map_err(translate(MailgateError::TagApplicationFailed))?;

        tracing::info!(message_id, tag, "tag applied");
        Ok(Some(email_record(&message)))
    }
}

fn require_id(message_id: &str) -> Result<()> {
    if message_id.trim().is_empty() {
        return Err(MailgateError::InvalidRequest(
            "Message ID is required".to_string(),
        ));
    }
    Ok(())
}
