//! Event storage abstraction.
//!
//! The query side only needs to append, read back and clear events, so
//! pairing and aggregation can run against the SQLite database or the
//! in-memory store below.

use super::types::Event;
use crate::error::Result;
use std::collections::{BTreeSet, HashSet};
use std::sync::Mutex;

/// Append-only store of deduplicated access-log events.
///
/// Implementations serialize mutations against reads internally, so the
/// trait takes `&self` everywhere.
pub trait EventStore: Send + Sync {
    /// Stores `event` unless an identical one is already present.
    ///
    /// Returns `true` when the event was new.
    fn ingest(&self, event: &Event) -> Result<bool>;

    /// Records that a whole source has been ingested.
    fn mark_source_imported(&self, source: &str) -> Result<()>;

    fn is_source_imported(&self, source: &str) -> Result<bool>;

    /// All stored events, ordered by timestamp.
    fn all_events(&self) -> Result<Vec<Event>>;

    /// Distinct computer names in their original casing.
    fn all_computers(&self) -> Result<BTreeSet<String>>;

    /// Empties both the events and the imported-source list.
    fn clear(&self) -> Result<()>;

    /// Stored events satisfying `predicate`.
    fn events_matching(&self, predicate: &dyn Fn(&Event) -> bool) -> Result<Vec<Event>> {
        Ok(self
            .all_events()?
            .into_iter()
            .filter(|e| predicate(e))
            .collect())
    }
}

#[derive(Debug, Default)]
struct MemoryInner {
    events: Vec<Event>,
    seen: HashSet<Event>,
    sources: HashSet<String>,
}

/// Event store held entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryEventStore {
    inner: Mutex<MemoryInner>,
}

impl MemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a store pre-filled with `events` (duplicates dropped).
    pub fn with_events(events: impl IntoIterator<Item = Event>) -> Result<Self> {
        let store = Self::new();
        for event in events {
            store.ingest(&event)?;
        }
        Ok(store)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map(|i| i.events.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EventStore for MemoryEventStore {
    fn ingest(&self, event: &Event) -> Result<bool> {
        let mut inner = self.inner.lock()?;
        if !inner.seen.insert(event.clone()) {
            return Ok(false);
        }
        inner.events.push(event.clone());
        Ok(true)
    }

    fn mark_source_imported(&self, source: &str) -> Result<()> {
        self.inner.lock()?.sources.insert(source.to_string());
        Ok(())
    }

    fn is_source_imported(&self, source: &str) -> Result<bool> {
        Ok(self.inner.lock()?.sources.contains(source))
    }

    fn all_events(&self) -> Result<Vec<Event>> {
        let mut events = self.inner.lock()?.events.clone();
        events.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        Ok(events)
    }

    fn all_computers(&self) -> Result<BTreeSet<String>> {
        let inner = self.inner.lock()?;
        Ok(inner.events.iter().map(|e| e.computer.clone()).collect())
    }

    fn clear(&self) -> Result<()> {
        let mut inner = self.inner.lock()?;
        inner.events.clear();
        inner.seen.clear();
        inner.sources.clear();
        Ok(())
    }
}
