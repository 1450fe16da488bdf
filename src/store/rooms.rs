//! Room inference from computer names.
//!
//! Computers in the same room share a name once their workstation
//! number is stripped: `PC-A-01` and `PC-A-02` both live in `PC-A`.

use super::types::{Event, RoomGroups};
use std::collections::BTreeSet;
use once_cell::sync::Lazy;
use regex::Regex;

/// Trailing `-Wnn` workstation suffix, or a trailing digit run that
/// starts a word.
static WORKSTATION_SUFFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(-W\d{2,}|\b\d+)$").expect("workstation suffix pattern is valid")
});

/// Returns the room name for a computer.
///
/// May be empty when the whole name is a workstation number.
pub fn normalize(computer: &str) -> String {
    let stripped = WORKSTATION_SUFFIX.replace(computer, "");
    let stripped = stripped.strip_suffix('-').unwrap_or(&stripped);
    stripped.to_string()
}

/// Groups computers by room, keeping singleton rooms.
///
/// Computers whose room name is empty are left out.
pub fn group_by_room<I>(computers: I) -> RoomGroups
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    let mut rooms = RoomGroups::new();

    for computer in computers {
        let computer = computer.as_ref();
        let room = normalize(computer);
        if room.is_empty() {
            tracing::trace!(computer, "Computer has no room name");
            continue;
        }
        rooms.entry(room).or_default().push(computer.to_string());
    }

    rooms
}

/// Groups the computers that appear in `events`.
pub fn group_events_by_room(events: &[Event]) -> RoomGroups {
    let computers: BTreeSet<&str> = events.iter().map(|e| e.computer.as_str()).collect();
    group_by_room(computers)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_workstation_suffix() {
        assert_eq!(normalize("PC-SALLE1-W03"), "PC-SALLE1");
        assert_eq!(normalize("PC-SALLE1-W07"), normalize("PC-SALLE1-W03"));
        assert_eq!(normalize("pc-salle1-w12"), "pc-salle1");
        assert_eq!(normalize("LAB-W123"), "LAB");
    }

    #[test]
    fn test_normalize_numeric_suffix() {
        assert_eq!(normalize("PC-A-01"), "PC-A");
        assert_eq!(normalize("PC-A 7"), "PC-A ");
        assert_eq!(normalize("123"), "");
    }

    #[test]
    fn test_normalize_leaves_plain_names() {
        assert_eq!(normalize("PC-ISOLATED"), "PC-ISOLATED");
        assert_eq!(normalize(&normalize("PC-ISOLATED")), "PC-ISOLATED");
        // Digits glued to letters are part of the room name.
        assert_eq!(normalize("PC1"), "PC1");
        // A single digit after -W is glued to the W.
        assert_eq!(normalize("LAB-W1"), "LAB-W1");
    }

    #[test]
    fn test_normalize_strips_one_trailing_dash() {
        assert_eq!(normalize("ROOM-"), "ROOM");
        assert_eq!(normalize("ROOM--"), "ROOM-");
    }

    #[test]
    fn test_group_by_room() {
        let rooms = group_by_room(["PC-A-01", "PC-A-02", "PC-B-01"]);

        assert_eq!(rooms.len(), 2);
        assert_eq!(rooms["PC-A"], vec!["PC-A-01", "PC-A-02"]);
        assert_eq!(rooms["PC-B"], vec!["PC-B-01"]);
    }

    #[test]
    fn test_group_by_room_drops_empty_names() {
        let rooms = group_by_room(vec!["42".to_string(), "KIOSK".to_string()]);

        assert_eq!(rooms.len(), 1);
        assert_eq!(rooms["KIOSK"], vec!["KIOSK"]);
    }

    #[test]
    fn test_group_events_by_room_dedups_computers() {
        use crate::store::types::EventKind;
        use chrono::NaiveDate;

        let at = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap();
        let events = [
            Event::new(EventKind::Logon, at, "PC-A-02", "bob"),
            Event::new(EventKind::Logon, at, "PC-A-01", "alice"),
            Event::new(EventKind::Logoff, at, "PC-A-01", "alice"),
        ];

        let rooms = group_events_by_room(&events);

        assert_eq!(rooms.len(), 1);
        assert_eq!(rooms["PC-A"], vec!["PC-A-01", "PC-A-02"]);
    }
}
