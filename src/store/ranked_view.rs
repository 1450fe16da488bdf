//! Sorted, capped presentation of aggregates.
//!
//! [`RankedView`] remembers which aggregate was shown last together with
//! the sort direction and result cap, so that inverting the order or
//! changing the cap re-runs that aggregate against the current events.

use super::aggregator;
use super::event_store::EventStore;
use super::pairing::{pair_sessions, PairingRules};
use super::rooms::group_events_by_room;
use super::types::Aggregate;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroUsize;
use std::str::FromStr;

/// Value-sorted aggregates that can be ranked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AggregateKind {
    ComputerUsage,
    UsersPerComputer,
    UsersPerRoom,
    TimePerRoom,
    PercentPerRoom,
}

impl AggregateKind {
    pub const ALL: [AggregateKind; 5] = [
        AggregateKind::ComputerUsage,
        AggregateKind::UsersPerComputer,
        AggregateKind::UsersPerRoom,
        AggregateKind::TimePerRoom,
        AggregateKind::PercentPerRoom,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AggregateKind::ComputerUsage => "computer-usage",
            AggregateKind::UsersPerComputer => "users-per-computer",
            AggregateKind::UsersPerRoom => "users-per-room",
            AggregateKind::TimePerRoom => "time-per-room",
            AggregateKind::PercentPerRoom => "percent-per-room",
        }
    }

    /// Unit of the values, for display.
    pub fn unit(self) -> &'static str {
        match self {
            AggregateKind::ComputerUsage | AggregateKind::PercentPerRoom => "percent",
            AggregateKind::UsersPerComputer | AggregateKind::UsersPerRoom => "users",
            AggregateKind::TimePerRoom => "hours",
        }
    }
}

impl fmt::Display for AggregateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AggregateKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        AggregateKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| format!("unknown aggregate: {s}"))
    }
}

/// An aggregate together with the parameters it was computed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregateRequest {
    pub kind: AggregateKind,
    pub rules: PairingRules,
}

impl AggregateRequest {
    pub fn new(kind: AggregateKind, rules: PairingRules) -> Self {
        Self { kind, rules }
    }

    /// Computes the aggregate from the current store contents.
    pub fn compute(&self, store: &dyn EventStore) -> Result<Aggregate> {
        let events = store.all_events()?;

        match self.kind {
            AggregateKind::ComputerUsage => {
                aggregator::computer_utilization_percent(&pair_sessions(&events, &self.rules))
            }
            AggregateKind::UsersPerComputer => {
                Ok(aggregator::distinct_users_per_computer(&events))
            }
            AggregateKind::UsersPerRoom => {
                let rooms = group_events_by_room(&events);
                Ok(aggregator::users_per_room(&events, &rooms))
            }
            AggregateKind::TimePerRoom => {
                let rooms = group_events_by_room(&events);
                let sessions = pair_sessions(&events, &self.rules);
                Ok(aggregator::time_per_room(&sessions, &rooms))
            }
            AggregateKind::PercentPerRoom => {
                let rooms = group_events_by_room(&events);
                let sessions = pair_sessions(&events, &self.rules);
                aggregator::percent_per_room(&sessions, &rooms)
            }
        }
    }
}

/// One ranked row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedEntry {
    pub label: String,
    pub value: f64,
}

/// A ranked aggregate ready for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedAggregate {
    pub kind: AggregateKind,
    pub unit: &'static str,
    pub descending: bool,
    pub limit: Option<usize>,
    pub entries: Vec<RankedEntry>,
}

/// Result of [`RankedView::invert`].
#[derive(Debug, Clone, PartialEq)]
pub enum InvertOutcome {
    /// No rankable aggregate has been shown yet.
    NothingToInvert,
    Redisplayed(RankedAggregate),
}

/// Sort direction, result cap and last shown aggregate.
#[derive(Debug, Clone)]
pub struct RankedView {
    descending: bool,
    limit: Option<NonZeroUsize>,
    last: Option<AggregateRequest>,
}

impl Default for RankedView {
    fn default() -> Self {
        Self::new(None)
    }
}

impl RankedView {
    /// Creates a view sorting in descending order.
    pub fn new(limit: Option<NonZeroUsize>) -> Self {
        Self {
            descending: true,
            limit,
            last: None,
        }
    }

    /// Sorts by value and keeps the first `limit` rows.
    ///
    /// The sort is stable: equal values keep the aggregate's label order
    /// in both directions.
    pub fn apply(
        aggregate: &Aggregate,
        descending: bool,
        limit: Option<NonZeroUsize>,
    ) -> Vec<(String, f64)> {
        let mut rows: Vec<(String, f64)> = aggregate
            .iter()
            .map(|(label, value)| (label.clone(), *value))
            .collect();

        rows.sort_by(|a, b| {
            let ord = a.1.total_cmp(&b.1);
            if descending {
                ord.reverse()
            } else {
                ord
            }
        });

        if let Some(limit) = limit {
            rows.truncate(limit.get());
        }
        rows
    }

    pub fn descending(&self) -> bool {
        self.descending
    }

    pub fn limit(&self) -> Option<NonZeroUsize> {
        self.limit
    }

    pub fn last_request(&self) -> Option<&AggregateRequest> {
        self.last.as_ref()
    }

    /// Computes `request`, remembers it and returns it ranked.
    pub fn show(
        &mut self,
        store: &dyn EventStore,
        request: AggregateRequest,
    ) -> Result<RankedAggregate> {
        self.last = Some(request);
        let aggregate = request.compute(store)?;

        let entries = Self::apply(&aggregate, self.descending, self.limit)
            .into_iter()
            .map(|(label, value)| RankedEntry { label, value })
            .collect();

        Ok(RankedAggregate {
            kind: request.kind,
            unit: request.kind.unit(),
            descending: self.descending,
            limit: self.limit.map(NonZeroUsize::get),
            entries,
        })
    }

    /// Flips the sort order and recomputes the last shown aggregate.
    pub fn invert(&mut self, store: &dyn EventStore) -> Result<InvertOutcome> {
        let Some(request) = self.last else {
            tracing::debug!("Invert requested before any ranked aggregate");
            return Ok(InvertOutcome::NothingToInvert);
        };

        self.descending = !self.descending;
        self.show(store, request).map(InvertOutcome::Redisplayed)
    }

    /// Changes the result cap and recomputes the last shown aggregate,
    /// if there is one.
    pub fn set_limit(
        &mut self,
        store: &dyn EventStore,
        limit: Option<NonZeroUsize>,
    ) -> Result<Option<RankedAggregate>> {
        self.limit = limit;
        match self.last {
            Some(request) => self.show(store, request).map(Some),
            None => Ok(None),
        }
    }

    /// Forgets the last aggregate, e.g. after a history was displayed.
    pub fn forget_last(&mut self) {
        self.last = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::UsageError;
    use crate::store::event_store::MemoryEventStore;
    use crate::store::types::{Event, EventKind};
    use std::collections::BTreeSet;
    use chrono::{NaiveDate, NaiveDateTime};

    fn at(h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    fn sample_aggregate() -> Aggregate {
        [("a", 3.0), ("b", 1.0), ("c", 2.0), ("d", 5.0)]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect()
    }

    fn labels(rows: &[(String, f64)]) -> Vec<&str> {
        rows.iter().map(|(l, _)| l.as_str()).collect()
    }

    fn session_store() -> MemoryEventStore {
        MemoryEventStore::with_events([
            Event::new(EventKind::Logon, at(8), "PC1", "alice"),
            Event::new(EventKind::Logoff, at(11), "PC1", "alice"),
            Event::new(EventKind::Logon, at(8), "PC2", "bob"),
            Event::new(EventKind::Logoff, at(9), "PC2", "bob"),
        ])
        .unwrap()
    }

    fn usage_request() -> AggregateRequest {
        AggregateRequest::new(AggregateKind::ComputerUsage, PairingRules::default())
    }

    #[test]
    fn test_apply_sorts_and_limits() {
        let agg = sample_aggregate();

        let desc = RankedView::apply(&agg, true, None);
        assert_eq!(labels(&desc), vec!["d", "a", "c", "b"]);

        let top2 = RankedView::apply(&agg, true, NonZeroUsize::new(2));
        assert_eq!(labels(&top2), vec!["d", "a"]);

        let asc = RankedView::apply(&agg, false, NonZeroUsize::new(10));
        assert_eq!(labels(&asc), vec!["b", "c", "a", "d"]);
    }

    #[test]
    fn test_apply_reverse_matches_ascending() {
        let agg = sample_aggregate();

        let mut desc = RankedView::apply(&agg, true, None);
        desc.reverse();

        assert_eq!(desc, RankedView::apply(&agg, false, None));
    }

    #[test]
    fn test_apply_ties_keep_label_order() {
        let agg: Aggregate = [("x", 1.0), ("y", 1.0), ("z", 2.0)]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();

        assert_eq!(labels(&RankedView::apply(&agg, true, None)), vec!["z", "x", "y"]);
        assert_eq!(labels(&RankedView::apply(&agg, false, None)), vec!["x", "y", "z"]);
    }

    #[test]
    fn test_invert_without_aggregate() {
        let store = MemoryEventStore::new();
        let mut view = RankedView::default();

        let outcome = view.invert(&store).unwrap();

        assert_eq!(outcome, InvertOutcome::NothingToInvert);
        assert!(view.descending());
    }

    #[test]
    fn test_invert_recomputes_from_store() {
        let store = session_store();
        let mut view = RankedView::default();

        let shown = view.show(&store, usage_request()).unwrap();
        assert_eq!(shown.entries[0].label, "PC1");
        assert_eq!(shown.entries[0].value, 75.0);

        // New data arrives between show and invert.
        store
            .ingest(&Event::new(EventKind::Logon, at(12), "PC3", "carol"))
            .unwrap();
        store
            .ingest(&Event::new(EventKind::Logoff, at(16), "PC3", "carol"))
            .unwrap();

        let InvertOutcome::Redisplayed(inverted) = view.invert(&store).unwrap() else {
            panic!("expected a redisplayed aggregate");
        };
        assert!(!inverted.descending);
        let order: Vec<_> = inverted.entries.iter().map(|e| e.label.as_str()).collect();
        assert_eq!(order, vec!["PC2", "PC1", "PC3"]);
        assert_eq!(inverted.entries[2].value, 50.0);
    }

    #[test]
    fn test_set_limit_reapplies_last() {
        let store = session_store();
        let mut view = RankedView::default();

        assert_eq!(view.set_limit(&store, NonZeroUsize::new(1)).unwrap(), None);

        view.show(&store, usage_request()).unwrap();
        let limited = view
            .set_limit(&store, NonZeroUsize::new(1))
            .unwrap()
            .unwrap();
        assert_eq!(limited.entries.len(), 1);
        assert_eq!(limited.limit, Some(1));

        let unbounded = view.set_limit(&store, None).unwrap().unwrap();
        assert_eq!(unbounded.entries.len(), 2);
    }

    #[test]
    fn test_limit_persists_across_requests() {
        let store = session_store();
        let mut view = RankedView::new(NonZeroUsize::new(1));

        let users = view
            .show(
                &store,
                AggregateRequest::new(AggregateKind::UsersPerComputer, PairingRules::default()),
            )
            .unwrap();
        assert_eq!(users.entries.len(), 1);

        let usage = view.show(&store, usage_request()).unwrap();
        assert_eq!(usage.entries.len(), 1);
    }

    #[test]
    fn test_forget_last() {
        let store = session_store();
        let mut view = RankedView::default();
        view.show(&store, usage_request()).unwrap();

        view.forget_last();

        assert_eq!(view.invert(&store).unwrap(), InvertOutcome::NothingToInvert);
    }

    #[test]
    fn test_empty_store_percent_is_empty_dataset() {
        let store = MemoryEventStore::new();
        let mut view = RankedView::default();

        let err = view.show(&store, usage_request()).unwrap_err();

        assert!(matches!(err, UsageError::EmptyDataset));
        assert!(view.last_request().is_some());
    }

    #[test]
    fn test_room_aggregates() {
        let store = MemoryEventStore::with_events([
            Event::new(EventKind::Logon, at(8), "PC-A-01", "alice"),
            Event::new(EventKind::Logoff, at(10), "PC-A-01", "alice"),
            Event::new(EventKind::Logon, at(8), "PC-A-02", "bob"),
            Event::new(EventKind::Logoff, at(9), "PC-A-02", "bob"),
            Event::new(EventKind::Logon, at(8), "PC-B-01", "alice"),
            Event::new(EventKind::Logoff, at(9), "PC-B-01", "alice"),
        ])
        .unwrap();
        let rules = PairingRules::default();

        let hours = AggregateRequest::new(AggregateKind::TimePerRoom, rules)
            .compute(&store)
            .unwrap();
        assert_eq!(hours["PC-A"], 3.0);
        assert_eq!(hours["PC-B"], 1.0);

        let percent = AggregateRequest::new(AggregateKind::PercentPerRoom, rules)
            .compute(&store)
            .unwrap();
        assert_eq!(percent["PC-A"], 75.0);

        let users = AggregateRequest::new(AggregateKind::UsersPerRoom, rules)
            .compute(&store)
            .unwrap();
        assert_eq!(users["PC-A"], 2.0);
        assert_eq!(users["PC-B"], 1.0);
    }

    /// Reports a computer that has no events yet, as a concurrent import
    /// landing between two reads would.
    struct LaggingStore(MemoryEventStore);

    impl EventStore for LaggingStore {
        fn ingest(&self, event: &Event) -> Result<bool> {
            self.0.ingest(event)
        }

        fn mark_source_imported(&self, source: &str) -> Result<()> {
            self.0.mark_source_imported(source)
        }

        fn is_source_imported(&self, source: &str) -> Result<bool> {
            self.0.is_source_imported(source)
        }

        fn all_events(&self) -> Result<Vec<Event>> {
            self.0.all_events()
        }

        fn all_computers(&self) -> Result<BTreeSet<String>> {
            let mut computers = self.0.all_computers()?;
            computers.insert("PC-Z-01".to_string());
            Ok(computers)
        }

        fn clear(&self) -> Result<()> {
            self.0.clear()
        }
    }

    #[test]
    fn test_room_aggregates_use_one_snapshot() {
        let store = LaggingStore(session_store());

        for kind in [
            AggregateKind::UsersPerRoom,
            AggregateKind::TimePerRoom,
            AggregateKind::PercentPerRoom,
        ] {
            let aggregate = AggregateRequest::new(kind, PairingRules::default())
                .compute(&store)
                .unwrap();
            assert!(!aggregate.contains_key("PC-Z"), "{kind} saw PC-Z");
            assert!(aggregate.contains_key("PC1"), "{kind} missed PC1");
        }
    }

    #[test]
    fn test_kind_parse() {
        for kind in AggregateKind::ALL {
            assert_eq!(kind.as_str().parse::<AggregateKind>().unwrap(), kind);
        }
        assert!("bogus".parse::<AggregateKind>().is_err());
    }
}
