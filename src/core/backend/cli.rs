//! Backend driving the `notmuch` command-line tool.
//!
//! Each primitive is one or a few `notmuch` invocations with JSON output.
//! The database is selected through `NOTMUCH_DATABASE`, locking is left
//! to notmuch itself. Handles hold no OS resources, so their release is
//! trivial.
//!
//! Search results are paged: ids are fetched `PAGE_SIZE` at a time and
//! each page of records is loaded with one `show` and one thread
//! `search`, so a capped search never reads more than the pages it
//! consumes.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use super::{
    Backend, BackendError, BackendResult, Database, DatabaseMode, NativeMessage, Query, SortOrder,
};

/// Ids fetched, and records loaded, per notmuch call while iterating
pub const PAGE_SIZE: usize = 50;

/// Matches no message; tagging it only proves the database is writable
const WRITE_CHECK_TERM: &str = "id:\"mailgate-write-check@invalid\"";

/// Backend that shells out to `notmuch`
#[derive(Debug, Clone)]
pub struct NotmuchCli {
    binary: PathBuf,
}

impl NotmuchCli {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }
}

impl Default for NotmuchCli {
    fn default() -> Self {
        Self::new("notmuch")
    }
}

impl Backend for NotmuchCli {
    type Database = CliDatabase;

    fn open(&self, path: &Path, mode: DatabaseMode) -> BackendResult<CliDatabase> {
        if !path.is_dir() {
            return Err(BackendError::new(format!(
                "database path not found: {}",
                path.display()
            )));
        }

        let exec = Executor {
            binary: self.binary.clone(),
            database: path.to_path_buf(),
        };

        // Cheapest calls that force notmuch to open the database in `mode`
        match mode {
            DatabaseMode::ReadOnly => exec.run(&["count", "--", "*"])?,
            DatabaseMode::ReadWrite => {
                exec.run(&["tag", "+mailgate-write-check", "--", WRITE_CHECK_TERM])?
            }
        };

        Ok(CliDatabase {
            exec: Arc::new(exec),
            mode,
        })
    }
}

/// Runs notmuch subcommands against one database
#[derive(Debug)]
struct Executor {
    binary: PathBuf,
    database: PathBuf,
}

impl Executor {
    fn run(&self, args: &[&str]) -> BackendResult<String> {
        tracing::trace!(binary = %self.binary.display(), ?args, "running notmuch");

        let output = Command::new(&self.binary)
            .args(args)
            .env("NOTMUCH_DATABASE", &self.database)
            .output()
            .map_err(|e| {
                BackendError::new(format!("failed to run {}: {e}", self.binary.display()))
            })?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            Err(BackendError::new(if stderr.is_empty() {
                format!(
                    "notmuch {} exited with {}",
                    args.first().copied().unwrap_or_default(),
                    output.status
                )
            } else {
                stderr
            }))
        }
    }

    fn run_json<T: DeserializeOwned>(&self, args: &[&str]) -> BackendResult<T> {
        let stdout = self.run(args)?;
        serde_json::from_str(&stdout)
            .map_err(|e| BackendError::new(format!("unexpected notmuch output: {e}")))
    }

    /// Message ids matching `query`, one page or all of them
    fn search_ids(
        &self,
        query: &str,
        sort: SortOrder,
        page: Option<(usize, usize)>,
    ) -> BackendResult<Vec<String>> {
        // notmuch search only knows the two date orders
        let sort = match sort {
            SortOrder::OldestFirst => "--sort=oldest-first",
            _ => "--sort=newest-first",
        };

        let mut args = vec![
            "search".to_string(),
            "--format=json".to_string(),
            "--output=messages".to_string(),
            sort.to_string(),
        ];
        if let Some((offset, limit)) = page {
            args.push(format!("--offset={offset}"));
            args.push(format!("--limit={limit}"));
        }
        args.push("--".to_string());
        args.push(query.to_string());

        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        let ids: Vec<String> = self.run_json(&args)?;
        Ok(ids
            .into_iter()
            .map(|id| id.strip_prefix("id:").map(str::to_string).unwrap_or(id))
            .collect())
    }

    /// Load the records for `ids`, keyed by bare id
    ///
    /// Ids without a record are simply absent from the map.
    fn load(
        self: &Arc<Self>,
        ids: &[String],
        writable: bool,
    ) -> BackendResult<HashMap<String, CliMessage>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let term = ids
            .iter()
            .map(|id| id_term(id))
            .collect::<Vec<_>>()
            .join(" or ");

        let tree: Value = self.run_json(&[
            "show",
            "--format=json",
            "--body=false",
            "--entire-thread=false",
            "--",
            &term,
        ])?;
        let mut found = Vec::new();
        collect_messages(&tree, &mut found);
        if found.is_empty() {
            return Ok(HashMap::new());
        }

        let summaries: Vec<ThreadSummary> =
            self.run_json(&["search", "--format=json", "--output=summary", "--", &term])?;
        let threads = thread_index(&summaries);
        // Every match of the term lives in the one thread reported
        let only_thread = match summaries.as_slice() {
            [summary] => Some(summary.thread.clone()),
            _ => None,
        };

        let mut loaded = HashMap::with_capacity(found.len());
        for value in found {
            let shown: ShowMessage = serde_json::from_value(value.clone())
                .map_err(|e| BackendError::new(format!("unexpected notmuch output: {e}")))?;
            let thread_id = threads
                .get(&shown.id)
                .cloned()
                .or_else(|| only_thread.clone())
                .unwrap_or_default();

            loaded.insert(
                shown.id.clone(),
                CliMessage {
                    exec: Arc::clone(self),
                    message_id: shown.id,
                    thread_id,
                    timestamp: shown.timestamp,
                    headers: shown.headers,
                    tags: shown.tags,
                    filename: shown.filename.first(),
                    writable,
                },
            );
        }

        Ok(loaded)
    }

    /// Load one message, `Ok(None)` when nothing matches
    fn show(self: &Arc<Self>, message_id: &str, writable: bool) -> BackendResult<Option<CliMessage>> {
        let id = bare_id(message_id).to_string();
        let mut loaded = self.load(std::slice::from_ref(&id), writable)?;
        Ok(loaded.remove(&id))
    }
}

/// Open database handle
pub struct CliDatabase {
    exec: Arc<Executor>,
    mode: DatabaseMode,
}

impl Database for CliDatabase {
    type Message = CliMessage;
    type Query = CliQuery;

    fn create_query(&self, query: &str) -> Option<CliQuery> {
        if query.trim().is_empty() || query.contains('\0') {
            return None;
        }

        Some(CliQuery {
            exec: Arc::clone(&self.exec),
            query: query.to_string(),
            sort: SortOrder::default(),
            writable: self.mode == DatabaseMode::ReadWrite,
        })
    }

    fn find_message(&self, message_id: &str) -> BackendResult<Option<CliMessage>> {
        self.exec
            .show(message_id, self.mode == DatabaseMode::ReadWrite)
    }
}

/// Query handle
pub struct CliQuery {
    exec: Arc<Executor>,
    query: String,
    sort: SortOrder,
    writable: bool,
}

impl Query for CliQuery {
    type Message = CliMessage;
    type Messages = CliMessages;

    fn set_sort(&mut self, order: SortOrder) {
        self.sort = order;
    }

    /// Runs the first page eagerly so a failing query fails here
    fn search_messages(&mut self) -> BackendResult<CliMessages> {
        let mut messages = CliMessages {
            exec: Arc::clone(&self.exec),
            query: self.query.clone(),
            sort: self.sort,
            writable: self.writable,
            ids: VecDeque::new(),
            ready: VecDeque::new(),
            next_offset: Some(0),
        };

        if self.sort == SortOrder::ByIdentifier {
            // No identifier order in notmuch: fetch every id and sort here
            let mut ids = self.exec.search_ids(&self.query, self.sort, None)?;
            ids.sort();
            messages.ids = ids.into();
            messages.next_offset = None;
        } else {
            messages.fetch_page()?;
        }

        Ok(messages)
    }

    fn count_messages(&mut self) -> BackendResult<u64> {
        let stdout = self
            .exec
            .run(&["count", "--output=messages", "--", &self.query])?;
        stdout
            .trim()
            .parse()
            .map_err(|e| BackendError::new(format!("unexpected notmuch count output: {e}")))
    }
}

/// Lazy message sequence; ids and records are fetched a page at a time
pub struct CliMessages {
    exec: Arc<Executor>,
    query: String,
    sort: SortOrder,
    writable: bool,
    /// Fetched ids whose records are not loaded yet
    ids: VecDeque<String>,
    /// Loaded positions not yielded yet, `None` where the message vanished
    ready: VecDeque<Option<CliMessage>>,
    /// Offset of the next id page, `None` once notmuch ran dry
    next_offset: Option<usize>,
}

impl CliMessages {
    /// Fetch the next page of ids; false when there is none
    fn fetch_page(&mut self) -> BackendResult<bool> {
        let Some(offset) = self.next_offset else {
            return Ok(false);
        };

        let page = self
            .exec
            .search_ids(&self.query, self.sort, Some((offset, PAGE_SIZE)))?;
        self.next_offset = (page.len() == PAGE_SIZE).then_some(offset + PAGE_SIZE);

        let fetched = !page.is_empty();
        self.ids.extend(page);
        Ok(fetched)
    }

    /// Load the records for the next batch of fetched ids
    fn load_batch(&mut self) -> BackendResult<()> {
        let take = self.ids.len().min(PAGE_SIZE);
        let batch: Vec<String> = self.ids.drain(..take).collect();
        let mut loaded = self.exec.load(&batch, self.writable)?;

        for id in &batch {
            let message = loaded.remove(bare_id(id));
            if message.is_none() {
                tracing::debug!(message_id = %id, "message vanished during iteration");
            }
            self.ready.push_back(message);
        }
        Ok(())
    }

    fn advance(&mut self) -> BackendResult<bool> {
        if self.ids.is_empty() && !self.fetch_page()? {
            return Ok(false);
        }
        self.load_batch()?;
        Ok(true)
    }
}

impl Iterator for CliMessages {
    type Item = BackendResult<Option<CliMessage>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.ready.is_empty() {
            match self.advance() {
                Ok(true) => {}
                Ok(false) => return None,
                Err(err) => {
                    // The sequence ends after reporting the failure
                    self.ids.clear();
                    self.next_offset = None;
                    return Some(Err(err));
                }
            }
        }

        self.ready.pop_front().map(Ok)
    }
}

/// Message handle
pub struct CliMessage {
    exec: Arc<Executor>,
    message_id: String,
    thread_id: String,
    timestamp: Option<i64>,
    headers: HashMap<String, String>,
    tags: Vec<String>,
    filename: String,
    writable: bool,
}

impl NativeMessage for CliMessage {
    type Tags = std::vec::IntoIter<String>;

    fn message_id(&self) -> String {
        self.message_id.clone()
    }

    fn thread_id(&self) -> String {
        self.thread_id.clone()
    }

    fn date(&self) -> BackendResult<i64> {
        self.timestamp
            .ok_or_else(|| BackendError::new("message has no timestamp"))
    }

    fn header(&self, name: &str) -> Option<String> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.clone())
    }

    fn tags(&self) -> Self::Tags {
        self.tags.clone().into_iter()
    }

    fn filename(&self) -> String {
        self.filename.clone()
    }

    fn add_tag(&mut self, tag: &str) -> BackendResult<()> {
        if !self.writable {
            return Err(BackendError::new(
                "Attempt to write to a read-only database",
            ));
        }

        let change = format!("+{tag}");
        self.exec
            .run(&["tag", &change, "--", &id_term(&self.message_id)])?;

        if let Some(updated) = self.exec.show(&self.message_id, self.writable)? {
            self.tags = updated.tags;
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct ShowMessage {
    id: String,
    #[serde(default)]
    timestamp: Option<i64>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    headers: HashMap<String, String>,
    #[serde(default)]
    filename: FileNames,
}

/// Older notmuch versions emit a single filename, newer ones a list
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FileNames {
    One(String),
    Many(Vec<String>),
}

impl Default for FileNames {
    fn default() -> Self {
        FileNames::Many(Vec::new())
    }
}

impl FileNames {
    fn first(self) -> String {
        match self {
            FileNames::One(name) => name,
            FileNames::Many(names) => names.into_iter().next().unwrap_or_default(),
        }
    }
}

/// One thread of `notmuch search --output=summary`
#[derive(Debug, Deserialize)]
struct ThreadSummary {
    thread: String,
    /// Queries for the matched and unmatched messages of the thread
    #[serde(default)]
    query: Vec<Option<String>>,
}

/// Map each matched message id to its thread
fn thread_index(summaries: &[ThreadSummary]) -> HashMap<String, String> {
    let mut index = HashMap::new();
    for summary in summaries {
        let Some(Some(matched)) = summary.query.first() else {
            continue;
        };
        for id in ids_in_query(matched) {
            index.insert(id, summary.thread.clone());
        }
    }
    index
}

/// Ids named by a notmuch `id:a or id:"b"` query
fn ids_in_query(query: &str) -> Vec<String> {
    query
        .split(" or ")
        .map(|term| term.trim().trim_matches(|c| c == '(' || c == ')'))
        .filter_map(|term| term.strip_prefix("id:"))
        .map(|id| match id.strip_prefix('"').and_then(|id| id.strip_suffix('"')) {
            Some(quoted) => quoted.replace("\"\"", "\""),
            None => id.to_string(),
        })
        .collect()
}

/// Depth-first collection of the message objects in `notmuch show` output
fn collect_messages<'a>(value: &'a Value, found: &mut Vec<&'a Value>) {
    match value {
        Value::Object(map) if map.contains_key("id") => found.push(value),
        Value::Array(items) => {
            for item in items {
                collect_messages(item, found);
            }
        }
        _ => {}
    }
}

/// notmuch stores ids without angle brackets
fn bare_id(message_id: &str) -> &str {
    message_id
        .trim()
        .trim_start_matches('<')
        .trim_end_matches('>')
}

/// Quoted `id:` search term
fn id_term(message_id: &str) -> String {
    format!("id:\"{}\"", bare_id(message_id).replace('"', "\"\""))
}
