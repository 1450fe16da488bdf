//! Event storage, session pairing and aggregation.
//!
//! Sessions, rooms and aggregates are never stored: every query below
//! re-reads the events, so results always reflect the latest import.

pub mod aggregator;
pub mod event_store;
pub mod pairing;
pub mod ranked_view;
pub mod rooms;
pub mod types;

pub use event_store::{EventStore, MemoryEventStore};
pub use pairing::{pair_sessions, LogoffPairing, PairingRules};
pub use ranked_view::{
    AggregateKind, AggregateRequest, InvertOutcome, RankedAggregate, RankedEntry, RankedView,
};
pub use rooms::{group_by_room, group_events_by_room, normalize};
pub use types::*;

use crate::error::Result;
use std::collections::BTreeMap;

/// Paired sessions for the current store contents.
pub fn load_sessions(store: &dyn EventStore, rules: &PairingRules) -> Result<Vec<Session>> {
    let events = store.all_events()?;
    Ok(pair_sessions(&events, rules))
}

/// Room groups for the computers currently known.
pub fn load_rooms(store: &dyn EventStore) -> Result<RoomGroups> {
    Ok(group_by_room(store.all_computers()?))
}

/// Computers whose name contains `query`, ignoring case, upper-cased.
pub fn search_computers(store: &dyn EventStore, query: &str) -> Result<Vec<String>> {
    let query = query.to_lowercase();
    Ok(store
        .all_computers()?
        .into_iter()
        .filter(|c| c.to_lowercase().contains(&query))
        .map(|c| c.to_uppercase())
        .collect())
}

/// Rooms whose name contains `query`, ignoring case.
pub fn search_rooms(store: &dyn EventStore, query: &str) -> Result<RoomGroups> {
    let query = query.to_lowercase();
    Ok(load_rooms(store)?
        .into_iter()
        .filter(|(room, _)| room.to_lowercase().contains(&query))
        .collect())
}

/// Usage history of one computer, in hours per bucket.
pub fn computer_history(
    store: &dyn EventStore,
    rules: &PairingRules,
    computer: &str,
    period: Period,
) -> Result<Aggregate> {
    let sessions = load_sessions(store, rules)?;
    Ok(aggregator::computer_history(&sessions, computer, period))
}

/// Day, week and month usage for every computer.
pub fn time_by_bucket(
    store: &dyn EventStore,
    rules: &PairingRules,
) -> Result<BTreeMap<String, TimeBuckets>> {
    let sessions = load_sessions(store, rules)?;
    Ok(aggregator::time_by_bucket(&sessions))
}

/// Monthly usage of one room, or `None` for an unknown room.
pub fn room_history(
    store: &dyn EventStore,
    rules: &PairingRules,
    room: &str,
) -> Result<Option<Aggregate>> {
    let events = store.all_events()?;
    let sessions = pair_sessions(&events, rules);
    let rooms = group_events_by_room(&events);
    Ok(aggregator::monthly_usage_per_room(&sessions, &rooms).remove(room.trim()))
}
