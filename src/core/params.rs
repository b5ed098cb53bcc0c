//! Search parameter normalization.
//!
//! Raw request values are coerced here and nowhere else: a bad limit
//! falls back to the default, an unknown sort token falls back to
//! newest-first. Only a missing or blank query is rejected.

use serde::{Deserialize, Serialize};

use crate::core::error::{MailgateError, Result};

/// Result limit used when none (or garbage) is supplied
pub const DEFAULT_LIMIT: usize = 50;

/// Sort order applied to a backend query
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    OldestFirst,
    #[default]
    NewestFirst,
    #[serde(rename = "message_id")]
    ByIdentifier,
    Unsorted,
}

impl SortOrder {
    /// Parse a sort token, falling back to `NewestFirst`
    pub fn from_token(token: Option<&str>) -> Self {
        let Some(token) = token.map(str::trim) else {
            return Self::default();
        };

        if token.eq_ignore_ascii_case("oldest_first") {
            Self::OldestFirst
        } else if token.eq_ignore_ascii_case("message_id") {
            Self::ByIdentifier
        } else if token.eq_ignore_ascii_case("unsorted") {
            Self::Unsorted
        } else {
            Self::NewestFirst
        }
    }

    /// Wire token for this order
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OldestFirst => "oldest_first",
            Self::NewestFirst => "newest_first",
            Self::ByIdentifier => "message_id",
            Self::Unsorted => "unsorted",
        }
    }
}

/// Parse a limit, falling back to [`DEFAULT_LIMIT`]
///
/// Zero, negative and non-numeric inputs all yield the default.
pub fn parse_limit(raw: Option<&str>) -> usize {
    raw.and_then(|s| s.trim().parse::<usize>().ok())
        .filter(|&limit| limit > 0)
        .unwrap_or(DEFAULT_LIMIT)
}

/// Normalized input to a search
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchParameters {
    query: String,
    limit: usize,
    sort: SortOrder,
}

impl SearchParameters {
    /// Build parameters from raw request values
    ///
    /// # Errors
    ///
    /// - `InvalidQuery`: query is missing or blank
    pub fn from_raw(query: Option<&str>, limit: Option<&str>, sort: Option<&str>) -> Result<Self> {
        let query = query.unwrap_or_default();
        if query.trim().is_empty() {
            return Err(MailgateError::InvalidQuery(
                "Query parameter 'q' is required".to_string(),
            ));
        }

        Ok(Self {
            query: query.to_string(),
            limit: parse_limit(limit),
            sort: SortOrder::from_token(sort),
        })
    }

    /// Build parameters with an explicit limit and order
    pub fn new(query: impl Into<String>, limit: usize, sort: SortOrder) -> Result<Self> {
        let query = query.into();
        if query.trim().is_empty() {
            return Err(MailgateError::InvalidQuery(
                "Query cannot be empty".to_string(),
            ));
        }

        Ok(Self {
            query,
            limit: if limit == 0 { DEFAULT_LIMIT } else { limit },
            sort,
        })
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn sort(&self) -> SortOrder {
        self.sort
    }
}
