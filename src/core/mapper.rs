//! Mapping of native backend records to the external schema.

use chrono::{DateTime, Utc};

use crate::core::backend::NativeMessage;
use crate::core::types::{EmailRecord, SearchResultSet};

/// Build an [`EmailRecord`] from a native message
///
/// Missing headers become empty strings and an unusable date becomes
/// the Unix epoch. The tag sequence is drained completely.
pub fn email_record<M: NativeMessage>(message: &M) -> EmailRecord {
    let date = message
        .date()
        .ok()
        .and_then(|seconds| DateTime::<Utc>::from_timestamp(seconds, 0))
        .unwrap_or_default();

    EmailRecord {
        message_id: message.message_id(),
        thread_id: message.thread_id(),
        date,
        from: message.header("from").unwrap_or_default(),
        subject: message.header("subject").unwrap_or_default(),
        tags: message.tags().collect(),
        filename: message.filename(),
    }
}

impl SearchResultSet {
    pub fn new(query: impl Into<String>, count: u64, results: Vec<EmailRecord>) -> Self {
        Self {
            query: query.into(),
            count,
            results,
        }
    }
}
