//! LOGON/LOGOFF pairing.
//!
//! Turns the raw event stream into sessions. Each LOGON is closed by the
//! earliest LOGOFF strictly after it for the same computer and user.
//! Sessions longer than the configured cutoff (a forgotten logoff) and
//! LOGONs that never close are dropped without error.

use super::types::{Event, EventKind, Session};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

/// Longest plausible session, in seconds.
pub const MAX_SESSION_SECS: i64 = 86_400;

/// How LOGOFFs are shared between LOGONs of the same computer and user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogoffPairing {
    /// Every LOGON takes the earliest later LOGOFF, even one already
    /// closing another LOGON. Two LOGONs before a single LOGOFF both end
    /// at that LOGOFF.
    #[default]
    Shared,

    /// Greedy earliest-available match: a LOGOFF closes at most one
    /// LOGON. A LOGOFF matched to a LOGON whose session exceeds the
    /// cutoff is still spent.
    Exclusive,
}

impl FromStr for LogoffPairing {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "shared" => Ok(LogoffPairing::Shared),
            "exclusive" => Ok(LogoffPairing::Exclusive),
            other => Err(format!("unknown logoff pairing: {other}")),
        }
    }
}

/// Pairing parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairingRules {
    pub mode: LogoffPairing,
    pub max_session_secs: i64,
}

impl Default for PairingRules {
    fn default() -> Self {
        Self {
            mode: LogoffPairing::Shared,
            max_session_secs: MAX_SESSION_SECS,
        }
    }
}

#[derive(Default)]
struct Partition {
    logons: Vec<NaiveDateTime>,
    logoffs: Vec<NaiveDateTime>,
}

/// Pairs events into sessions, ordered by start time.
pub fn pair_sessions(events: &[Event], rules: &PairingRules) -> Vec<Session> {
    let mut partitions: HashMap<(&str, &str), Partition> = HashMap::new();

    for event in events {
        let partition = partitions
            .entry((event.computer.as_str(), event.user.as_str()))
            .or_default();
        match event.kind {
            EventKind::Logon => partition.logons.push(event.timestamp),
            EventKind::Logoff => partition.logoffs.push(event.timestamp),
        }
    }

    let mut sessions = Vec::new();
    let mut dropped = 0usize;

    for ((computer, user), mut partition) in partitions {
        partition.logons.sort_unstable();
        partition.logoffs.sort_unstable();

        // Index of the first LOGOFF not yet spent (exclusive mode only).
        let mut next_free = 0usize;

        for &start in &partition.logons {
            let first_later = partition.logoffs.partition_point(|&t| t <= start);
            let idx = match rules.mode {
                LogoffPairing::Shared => first_later,
                LogoffPairing::Exclusive => first_later.max(next_free),
            };

            let Some(&end) = partition.logoffs.get(idx) else {
                dropped += 1;
                continue;
            };
            if rules.mode == LogoffPairing::Exclusive {
                next_free = idx + 1;
            }

            let duration = (end - start).num_seconds();
            if !(0..=rules.max_session_secs).contains(&duration) {
                dropped += 1;
                continue;
            }

            sessions.push(Session {
                computer: computer.to_string(),
                user: user.to_string(),
                start,
                end,
                duration_secs: duration as f64,
            });
        }
    }

    sessions.sort_by(|a, b| {
        a.start
            .cmp(&b.start)
            .then_with(|| a.computer.cmp(&b.computer))
            .then_with(|| a.user.cmp(&b.user))
    });

    tracing::debug!(
        sessions = sessions.len(),
        dropped,
        mode = ?rules.mode,
        "Paired sessions"
    );

    sessions
}
