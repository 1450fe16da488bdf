//! Data types for access-log usage tracking.
//!
//! Defines the stored event record, the derived session and the
//! aggregate shapes the query side hands out.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::UsageError;

/// Storage format for event timestamps (second resolution, no zone).
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Kind of an access-log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventKind {
    Logon,
    Logoff,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Logon => "LOGON",
            EventKind::Logoff => "LOGOFF",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LOGON" | "LOGON." => Ok(EventKind::Logon),
            "LOGOFF" => Ok(EventKind::Logoff),
            other => Err(format!("unknown event kind: {other}")),
        }
    }
}

/// A single LOGON or LOGOFF record.
///
/// Two events are the same event when all four fields match; the store
/// keeps at most one copy.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Event {
    pub kind: EventKind,

    /// Wall-clock time as written in the log.
    pub timestamp: NaiveDateTime,

    /// Computer name in its original casing.
    pub computer: String,

    pub user: String,
}

impl Event {
    pub fn new(kind: EventKind, timestamp: NaiveDateTime, computer: &str, user: &str) -> Self {
        Self {
            kind,
            timestamp,
            computer: computer.to_string(),
            user: user.to_string(),
        }
    }

    pub fn is_logon(&self) -> bool {
        self.kind == EventKind::Logon
    }
}

/// A LOGON paired with its closing LOGOFF.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Session {
    pub computer: String,
    pub user: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub duration_secs: f64,
}

impl Session {
    pub fn duration_hours(&self) -> f64 {
        self.duration_secs / 3600.0
    }
}

/// Label to value mapping produced by every aggregate query.
///
/// Iteration order is the label order, which is also the tie-break
/// order once ranked.
pub type Aggregate = BTreeMap<String, f64>;

/// Room name to member computers, in the order the computers were seen.
pub type RoomGroups = BTreeMap<String, Vec<String>>;

/// Time bucket granularity for usage histories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    Day,
    Week,
    Month,
}

impl Period {
    /// Bucket key for a timestamp.
    ///
    /// Weeks are Monday-based weeks of the year (`00`..`53`).
    pub fn bucket_key(self, ts: &NaiveDateTime) -> String {
        match self {
            Period::Day => ts.format("%Y-%m-%d").to_string(),
            Period::Week => ts.format("%Y-%W").to_string(),
            Period::Month => ts.format("%Y-%m").to_string(),
        }
    }
}

impl FromStr for Period {
    type Err = UsageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "day" | "jour" => Ok(Period::Day),
            "week" | "semaine" => Ok(Period::Week),
            "month" | "mois" => Ok(Period::Month),
            _ => Err(UsageError::InvalidPeriod(s.to_string())),
        }
    }
}

/// Day, week and month usage for one computer, in hours.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TimeBuckets {
    pub day: Aggregate,
    pub week: Aggregate,
    pub month: Aggregate,
}

impl TimeBuckets {
    pub fn get(&self, period: Period) -> &Aggregate {
        match period {
            Period::Day => &self.day,
            Period::Week => &self.week,
            Period::Month => &self.month,
        }
    }

    pub(crate) fn get_mut(&mut self, period: Period) -> &mut Aggregate {
        match period {
            Period::Day => &mut self.day,
            Period::Week => &mut self.week,
            Period::Month => &mut self.month,
        }
    }
}

/// Rounds to two decimals for display.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
