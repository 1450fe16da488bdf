//! Statistics aggregation utilities.
//!
//! Provides functions for computing usage aggregates from paired
//! sessions and raw events. Sums keep full precision; rounding to two
//! decimals happens once, on the way out.

use super::types::{round2, Aggregate, Event, Period, RoomGroups, Session, TimeBuckets};
use crate::error::{Result, UsageError};
use std::collections::{BTreeMap, BTreeSet, HashMap};

const PERIODS: [Period; 3] = [Period::Day, Period::Week, Period::Month];

/// Total session seconds per computer.
fn seconds_per_computer(sessions: &[Session]) -> BTreeMap<&str, f64> {
    let mut totals: BTreeMap<&str, f64> = BTreeMap::new();
    for session in sessions {
        *totals.entry(session.computer.as_str()).or_default() += session.duration_secs;
    }
    totals
}

/// Member computer to room lookup.
fn room_lookup(rooms: &RoomGroups) -> HashMap<&str, &str> {
    rooms
        .iter()
        .flat_map(|(room, computers)| computers.iter().map(move |c| (c.as_str(), room.as_str())))
        .collect()
}

/// Total session seconds per room. Every room is present, even idle ones.
fn seconds_per_room(sessions: &[Session], rooms: &RoomGroups) -> BTreeMap<String, f64> {
    let lookup = room_lookup(rooms);
    let mut totals: BTreeMap<String, f64> = rooms.keys().map(|r| (r.clone(), 0.0)).collect();

    for session in sessions {
        if let Some(room) = lookup.get(session.computer.as_str()) {
            if let Some(total) = totals.get_mut(*room) {
                *total += session.duration_secs;
            }
        }
    }

    totals
}

/// Normalizes totals to percentages of their grand total.
fn to_percentages<'a, I>(totals: I) -> Result<Aggregate>
where
    I: IntoIterator<Item = (&'a str, f64)> + Clone,
{
    let grand_total: f64 = totals.clone().into_iter().map(|(_, v)| v).sum();
    if grand_total <= 0.0 {
        return Err(UsageError::EmptyDataset);
    }

    Ok(totals
        .into_iter()
        .map(|(label, v)| (label.to_string(), round2(v / grand_total * 100.0)))
        .collect())
}

/// Share of total usage per computer, in percent.
///
/// Fails with `EmptyDataset` when no session time was recorded.
pub fn computer_utilization_percent(sessions: &[Session]) -> Result<Aggregate> {
    let totals = seconds_per_computer(sessions);
    to_percentages(totals.iter().map(|(c, v)| (*c, *v)))
}

/// Distinct users with at least one LOGON, per computer.
///
/// Reads LOGON events directly; no matching LOGOFF is required.
pub fn distinct_users_per_computer(events: &[Event]) -> Aggregate {
    let mut users: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    for event in events.iter().filter(|e| e.is_logon()) {
        users
            .entry(event.computer.as_str())
            .or_default()
            .insert(event.user.as_str());
    }

    users
        .into_iter()
        .map(|(computer, set)| (computer.to_string(), set.len() as f64))
        .collect()
}

/// Users per room, as the sum of each member computer's distinct users.
///
/// A user seen on two computers of the same room counts twice.
pub fn users_per_room(events: &[Event], rooms: &RoomGroups) -> Aggregate {
    let per_computer = distinct_users_per_computer(events);

    rooms
        .iter()
        .map(|(room, computers)| {
            let count: f64 = computers
                .iter()
                .filter_map(|c| per_computer.get(c))
                .sum();
            (room.clone(), count)
        })
        .collect()
}

/// Total usage per room, in hours.
pub fn time_per_room(sessions: &[Session], rooms: &RoomGroups) -> Aggregate {
    seconds_per_room(sessions, rooms)
        .into_iter()
        .map(|(room, secs)| (room, round2(secs / 3600.0)))
        .collect()
}

/// Share of total usage per room, in percent.
///
/// Fails with `EmptyDataset` when the rooms saw no session time.
pub fn percent_per_room(sessions: &[Session], rooms: &RoomGroups) -> Result<Aggregate> {
    let totals = seconds_per_room(sessions, rooms);
    to_percentages(totals.iter().map(|(r, v)| (r.as_str(), *v)))
}

/// Unrounded session seconds per bucket key of `period`.
fn seconds_by_bucket<'a, I>(sessions: I, period: Period) -> BTreeMap<String, f64>
where
    I: IntoIterator<Item = &'a Session>,
{
    let mut totals: BTreeMap<String, f64> = BTreeMap::new();
    for session in sessions {
        *totals.entry(period.bucket_key(&session.start)).or_default() += session.duration_secs;
    }
    totals
}

fn to_hours(seconds: BTreeMap<String, f64>) -> Aggregate {
    seconds
        .into_iter()
        .map(|(key, secs)| (key, round2(secs / 3600.0)))
        .collect()
}

/// Day, week and month usage per computer, bucketed on session start.
pub fn time_by_bucket(sessions: &[Session]) -> BTreeMap<String, TimeBuckets> {
    let mut per_computer: BTreeMap<&str, Vec<&Session>> = BTreeMap::new();
    for session in sessions {
        per_computer
            .entry(session.computer.as_str())
            .or_default()
            .push(session);
    }

    per_computer
        .into_iter()
        .map(|(computer, own)| {
            let mut buckets = TimeBuckets::default();
            for period in PERIODS {
                *buckets.get_mut(period) = to_hours(seconds_by_bucket(own.iter().copied(), period));
            }
            (computer.to_string(), buckets)
        })
        .collect()
}

/// Usage history of a single computer for one period, in hours.
///
/// The computer is matched case-insensitively, so case variants of one
/// name share a history. An unknown computer yields an empty history.
pub fn computer_history(sessions: &[Session], computer: &str, period: Period) -> Aggregate {
    let wanted = computer.trim().to_lowercase();
    let matching = sessions
        .iter()
        .filter(|s| s.computer.to_lowercase() == wanted);

    to_hours(seconds_by_bucket(matching, period))
}

/// Monthly usage per room, in hours. Idle rooms map to an empty history.
pub fn monthly_usage_per_room(
    sessions: &[Session],
    rooms: &RoomGroups,
) -> BTreeMap<String, Aggregate> {
    let lookup = room_lookup(rooms);
    let mut members: BTreeMap<&str, Vec<&Session>> =
        rooms.keys().map(|r| (r.as_str(), Vec::new())).collect();

    for session in sessions {
        let Some(room) = lookup.get(session.computer.as_str()) else {
            continue;
        };
        if let Some(own) = members.get_mut(*room) {
            own.push(session);
        }
    }

    members
        .into_iter()
        .map(|(room, own)| {
            let months = to_hours(seconds_by_bucket(own, Period::Month));
            (room.to_string(), months)
        })
        .collect()
}
