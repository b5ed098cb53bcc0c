//! In-memory backend.
//!
//! Holds seeded messages in process and understands a handful of
//! notmuch-style search terms (`*`, `tag:`, `id:`, `thread:`, `from:`,
//! `subject:` and bare words, all ANDed). Primitives can be made to
//! fail on demand, and every handle acquisition and release is counted
//! so callers can check that nothing leaks.
//!
//! Test double for the gateway and HTTP test suites.

use std::cmp::Reverse;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use super::{
    Backend, BackendError, BackendResult, Database, DatabaseMode, NativeMessage, Query, SortOrder,
};

/// Longest tag the in-memory backend accepts, in bytes
pub const MAX_TAG_LEN: usize = 200;

/// Kinds of handle tracked by the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandleKind {
    Database,
    Query,
    Messages,
    Message,
}

impl HandleKind {
    const ALL: [HandleKind; 4] = [
        HandleKind::Database,
        HandleKind::Query,
        HandleKind::Messages,
        HandleKind::Message,
    ];

    fn slot(self) -> usize {
        self as usize
    }
}

/// Primitive that can be forced to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fault {
    /// Any open
    Open,
    /// Read-write opens only
    OpenWrite,
    /// Query construction (yields no query)
    Query,
    Search,
    Count,
    /// Loading a record while iterating search results
    Load,
    Lookup,
    Tag,
}

/// A stored message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryMessage {
    pub message_id: String,
    pub thread_id: String,
    /// Epoch seconds, `None` makes the date accessor fail
    pub date: Option<i64>,
    pub from: Option<String>,
    pub subject: Option<String>,
    pub tags: Vec<String>,
    pub filename: String,
}

impl MemoryMessage {
    pub fn new(message_id: impl Into<String>, thread_id: impl Into<String>) -> Self {
        let message_id = message_id.into();
        let filename = format!("/mail/cur/{}", bare_id(&message_id));
        Self {
            message_id,
            thread_id: thread_id.into(),
            date: None,
            from: None,
            subject: None,
            tags: Vec::new(),
            filename,
        }
    }

    pub fn date(mut self, epoch_seconds: i64) -> Self {
        self.date = Some(epoch_seconds);
        self
    }

    pub fn from(mut self, from: impl Into<String>) -> Self {
        self.from = Some(from.into());
        self
    }

    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = filename.into();
        self
    }
}

#[derive(Default)]
struct Shared {
    messages: RwLock<Vec<MemoryMessage>>,
    faults: Mutex<HashMap<Fault, String>>,
    holes: Mutex<Vec<usize>>,
    writer: AtomicBool,
    acquired: [AtomicUsize; 4],
    released: [AtomicUsize; 4],
}

impl Shared {
    fn fault(&self, fault: Fault) -> Option<BackendError> {
        self.faults
            .lock()
            .ok()
            .and_then(|faults| faults.get(&fault).cloned())
            .map(BackendError)
    }

    fn acquire(&self, kind: HandleKind) {
        self.acquired[kind.slot()].fetch_add(1, Ordering::SeqCst);
    }

    fn release(&self, kind: HandleKind) {
        self.released[kind.slot()].fetch_add(1, Ordering::SeqCst);
    }

    fn read(&self) -> BackendResult<std::sync::RwLockReadGuard<'_, Vec<MemoryMessage>>> {
        self.messages
            .read()
            .map_err(|_| BackendError::new("message store poisoned"))
    }
}

/// In-memory backend with a handle ledger
#[derive(Clone, Default)]
pub struct MemoryBackend {
    shared: Arc<Shared>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a backend seeded with `messages`
    pub fn with_messages(messages: impl IntoIterator<Item = MemoryMessage>) -> Self {
        let backend = Self::new();
        for message in messages {
            backend.insert(message);
        }
        backend
    }

    pub fn insert(&self, message: MemoryMessage) {
        if let Ok(mut messages) = self.shared.messages.write() {
            messages.push(message);
        }
    }

    /// Snapshot of a stored message
    pub fn message(&self, message_id: &str) -> Option<MemoryMessage> {
        let messages = self.shared.read().ok()?;
        messages
            .iter()
            .find(|m| same_id(&m.message_id, message_id))
            .cloned()
    }

    /// Force `fault` to fail with `diagnostic` until cleared
    pub fn fail(&self, fault: Fault, diagnostic: impl Into<String>) {
        if let Ok(mut faults) = self.shared.faults.lock() {
            faults.insert(fault, diagnostic.into());
        }
    }

    pub fn clear_faults(&self) {
        if let Ok(mut faults) = self.shared.faults.lock() {
            faults.clear();
        }
    }

    /// Yield an empty position at each of `positions` in result sequences
    pub fn set_holes(&self, positions: impl IntoIterator<Item = usize>) {
        if let Ok(mut holes) = self.shared.holes.lock() {
            *holes = positions.into_iter().collect();
        }
    }

    pub fn acquired(&self, kind: HandleKind) -> usize {
        self.shared.acquired[kind.slot()].load(Ordering::SeqCst)
    }

    pub fn released(&self, kind: HandleKind) -> usize {
        self.shared.released[kind.slot()].load(Ordering::SeqCst)
    }

    /// Handles acquired but not yet released, across all kinds
    pub fn outstanding(&self) -> usize {
        HandleKind::ALL
            .iter()
            .map(|&kind| self.acquired(kind).saturating_sub(self.released(kind)))
            .sum()
    }

    /// True when every acquisition has exactly one release
    pub fn is_balanced(&self) -> bool {
        HandleKind::ALL
            .iter()
            .all(|&kind| self.acquired(kind) == self.released(kind))
    }

    /// True while a read-write database handle is open
    pub fn is_write_locked(&self) -> bool {
        self.shared.writer.load(Ordering::SeqCst)
    }
}

impl Backend for MemoryBackend {
    type Database = MemoryDatabase;

    fn open(&self, _path: &Path, mode: DatabaseMode) -> BackendResult<MemoryDatabase> {
        if let Some(err) = self.shared.fault(Fault::Open) {
            return Err(err);
        }

        if mode == DatabaseMode::ReadWrite {
            if let Some(err) = self.shared.fault(Fault::OpenWrite) {
                return Err(err);
            }
            if self
                .shared
                .writer
                .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                .is_err()
            {
                return Err(BackendError::new(
                    "Unable to acquire database write lock: database is locked",
                ));
            }
        }

        self.shared.acquire(HandleKind::Database);
        Ok(MemoryDatabase {
            shared: Arc::clone(&self.shared),
            mode,
        })
    }
}

/// Open database handle
pub struct MemoryDatabase {
    shared: Arc<Shared>,
    mode: DatabaseMode,
}

impl Drop for MemoryDatabase {
    fn drop(&mut self) {
        if self.mode == DatabaseMode::ReadWrite {
            self.shared.writer.store(false, Ordering::SeqCst);
        }
        self.shared.release(HandleKind::Database);
    }
}

impl Database for MemoryDatabase {
    type Message = MemoryMessageHandle;
    type Query = MemoryQuery;

    fn create_query(&self, query: &str) -> Option<MemoryQuery> {
        if self.shared.fault(Fault::Query).is_some() {
            return None;
        }

        let terms = query
            .split_whitespace()
            .map(Term::parse)
            .collect::<Option<Vec<_>>>()?;
        if terms.is_empty() {
            return None;
        }

        self.shared.acquire(HandleKind::Query);
        Some(MemoryQuery {
            shared: Arc::clone(&self.shared),
            terms,
            sort: SortOrder::default(),
            writable: self.mode == DatabaseMode::ReadWrite,
        })
    }

    fn find_message(&self, message_id: &str) -> BackendResult<Option<MemoryMessageHandle>> {
        if let Some(err) = self.shared.fault(Fault::Lookup) {
            return Err(err);
        }

        let index = self
            .shared
            .read()?
            .iter()
            .position(|m| same_id(&m.message_id, message_id));

        Ok(index.and_then(|index| {
            MemoryMessageHandle::load(
                &self.shared,
                index,
                self.mode == DatabaseMode::ReadWrite,
            )
        }))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Term {
    All,
    Tag(String),
    Id(String),
    Thread(String),
    From(String),
    Subject(String),
    Word(String),
}

impl Term {
    /// `None` for prefixes this backend does not understand
    fn parse(raw: &str) -> Option<Self> {
        if raw == "*" {
            return Some(Term::All);
        }

        match raw.split_once(':') {
            None => Some(Term::Word(raw.to_lowercase())),
            Some((prefix, value)) => {
                let value = value.trim_matches('"').to_string();
                match prefix {
                    "tag" => Some(Term::Tag(value)),
                    "id" => Some(Term::Id(value)),
                    "thread" => Some(Term::Thread(value)),
                    "from" => Some(Term::From(value.to_lowercase())),
                    "subject" => Some(Term::Subject(value.to_lowercase())),
                    _ => None,
                }
            }
        }
    }

    fn matches(&self, message: &MemoryMessage) -> bool {
        let from = message.from.as_deref().unwrap_or_default().to_lowercase();
        let subject = message.subject.as_deref().unwrap_or_default().to_lowercase();
        match self {
            Term::All => true,
            Term::Tag(tag) => message.tags.iter().any(|t| t == tag),
            Term::Id(id) => same_id(&message.message_id, id),
            Term::Thread(thread) => message.thread_id == *thread,
            Term::From(needle) => from.contains(needle),
            Term::Subject(needle) => subject.contains(needle),
            Term::Word(needle) => from.contains(needle) || subject.contains(needle),
        }
    }
}

/// Query handle
pub struct MemoryQuery {
    shared: Arc<Shared>,
    terms: Vec<Term>,
    sort: SortOrder,
    writable: bool,
}

impl MemoryQuery {
    fn matching(&self) -> BackendResult<Vec<usize>> {
        let messages = self.shared.read()?;
        let mut indices: Vec<usize> = messages
            .iter()
            .enumerate()
            .filter(|(_, m)| self.terms.iter().all(|term| term.matches(m)))
            .map(|(index, _)| index)
            .collect();

        let date = |index: &usize| messages[*index].date.unwrap_or(0);
        match self.sort {
            SortOrder::OldestFirst => indices.sort_by_key(date),
            SortOrder::NewestFirst => indices.sort_by_key(|index| Reverse(date(index))),
            SortOrder::ByIdentifier => {
                indices.sort_by(|a, b| messages[*a].message_id.cmp(&messages[*b].message_id))
            }
            SortOrder::Unsorted => {}
        }

        Ok(indices)
    }
}

impl Drop for MemoryQuery {
    fn drop(&mut self) {
        self.shared.release(HandleKind::Query);
    }
}

impl Query for MemoryQuery {
    type Message = MemoryMessageHandle;
    type Messages = MemoryMessages;

    fn set_sort(&mut self, order: SortOrder) {
        self.sort = order;
    }

    fn search_messages(&mut self) -> BackendResult<MemoryMessages> {
        if let Some(err) = self.shared.fault(Fault::Search) {
            return Err(err);
        }

        let holes = self
            .shared
            .holes
            .lock()
            .map(|holes| holes.clone())
            .unwrap_or_default();

        let mut slots = Vec::new();
        for index in self.matching()? {
            while holes.contains(&slots.len()) {
                slots.push(None);
            }
            slots.push(Some(index));
        }

        self.shared.acquire(HandleKind::Messages);
        Ok(MemoryMessages {
            shared: Arc::clone(&self.shared),
            slots: slots.into_iter(),
            writable: self.writable,
        })
    }

    fn count_messages(&mut self) -> BackendResult<u64> {
        if let Some(err) = self.shared.fault(Fault::Count) {
            return Err(err);
        }
        Ok(self.matching()?.len() as u64)
    }
}

/// Lazy message sequence; message handles are created on `next`
pub struct MemoryMessages {
    shared: Arc<Shared>,
    slots: std::vec::IntoIter<Option<usize>>,
    writable: bool,
}

impl Iterator for MemoryMessages {
    type Item = BackendResult<Option<MemoryMessageHandle>>;

    fn next(&mut self) -> Option<Self::Item> {
        let slot = self.slots.next()?;
        if let Some(err) = self.shared.fault(Fault::Load) {
            return Some(Err(err));
        }
        Some(Ok(slot.and_then(|index| {
            MemoryMessageHandle::load(&self.shared, index, self.writable)
        })))
    }
}

impl Drop for MemoryMessages {
    fn drop(&mut self) {
        self.shared.release(HandleKind::Messages);
    }
}

/// Message handle
pub struct MemoryMessageHandle {
    shared: Arc<Shared>,
    index: usize,
    record: MemoryMessage,
    writable: bool,
}

impl MemoryMessageHandle {
    fn load(shared: &Arc<Shared>, index: usize, writable: bool) -> Option<Self> {
        let record = shared.read().ok()?.get(index)?.clone();
        shared.acquire(HandleKind::Message);
        Some(Self {
            shared: Arc::clone(shared),
            index,
            record,
            writable,
        })
    }
}

impl Drop for MemoryMessageHandle {
    fn drop(&mut self) {
        self.shared.release(HandleKind::Message);
    }
}

impl NativeMessage for MemoryMessageHandle {
    type Tags = std::vec::IntoIter<String>;

    fn message_id(&self) -> String {
        self.record.message_id.clone()
    }

    fn thread_id(&self) -> String {
        self.record.thread_id.clone()
    }

    fn date(&self) -> BackendResult<i64> {
        self.record
            .date
            .ok_or_else(|| BackendError::new("message has no date"))
    }

    fn header(&self, name: &str) -> Option<String> {
        if name.eq_ignore_ascii_case("from") {
            self.record.from.clone()
        } else if name.eq_ignore_ascii_case("subject") {
            self.record.subject.clone()
        } else {
            None
        }
    }

    fn tags(&self) -> Self::Tags {
        self.shared
            .read()
            .ok()
            .and_then(|messages| messages.get(self.index).map(|m| m.tags.clone()))
            .unwrap_or_default()
            .into_iter()
    }

    fn filename(&self) -> String {
        self.record.filename.clone()
    }

    fn add_tag(&mut self, tag: &str) -> BackendResult<()> {
        if let Some(err) = self.shared.fault(Fault::Tag) {
            return Err(err);
        }
        if !self.writable {
            return Err(BackendError::new(
                "Attempt to write to a read-only database",
            ));
        }
        if tag.is_empty() {
            return Err(BackendError::new("Tag value cannot be empty"));
        }
        if tag.len() > MAX_TAG_LEN {
            return Err(BackendError::new(format!(
                "Tag value is too long (exceeds {MAX_TAG_LEN} bytes)"
            )));
        }

        let mut messages = self
            .shared
            .messages
            .write()
            .map_err(|_| BackendError::new("message store poisoned"))?;
        let stored = messages
            .get_mut(self.index)
            .ok_or_else(|| BackendError::new("message vanished"))?;
        if !stored.tags.iter().any(|t| t == tag) {
            stored.tags.push(tag.to_string());
        }
        self.record.tags = stored.tags.clone();
        Ok(())
    }
}

fn bare_id(id: &str) -> &str {
    id.trim().trim_start_matches('<').trim_end_matches('>')
}

/// Compare identifiers ignoring surrounding angle brackets
fn same_id(a: &str, b: &str) -> bool {
    bare_id(a) == bare_id(b)
}
