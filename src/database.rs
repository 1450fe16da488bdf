//! SQLite database for persistent event storage.
//!
//! Holds the deduplicated access-log events, the list of sources already
//! imported and the runtime configuration.

use chrono::{NaiveDateTime, Utc};
use rusqlite::{params, types::Type, Connection, Row};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::error::Result;
use crate::store::event_store::EventStore;
use crate::store::types::{Event, EventKind, TIMESTAMP_FORMAT};

/// Default configuration rows: key, value, description.
const DEFAULT_CONFIG: [(&str, &str, &str); 4] = [
    (
        "max_session_secs",
        "86400",
        "Sessions longer than this are treated as a forgotten logoff (seconds)",
    ),
    (
        "logoff_pairing",
        "shared",
        "shared: a LOGOFF may close several LOGONs; exclusive: at most one",
    ),
    (
        "display_limit",
        "none",
        "Initial number of ranked rows shown (none for all)",
    ),
    ("server_port", "13234", "HTTP API port"),
];

/// Database wrapper with thread-safe connection.
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Opens or creates the database at the default location.
    ///
    /// Creates `<data dir>/labmon/usage.db` if it doesn't exist.
    pub fn open() -> Result<Self> {
        Self::open_at(&Self::default_path())
    }

    /// Opens or creates the database at `db_path`.
    pub fn open_at(db_path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).ok();
        }

        tracing::info!(path = ?db_path, "Opening database");

        let conn = Connection::open(db_path)?;

        // Enable WAL mode for better crash safety
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.init_schema()?;

        Ok(db)
    }

    /// Opens an in-memory database (for testing).
    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.init_schema()?;
        Ok(db)
    }

    /// Returns the default database path.
    pub fn default_path() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("labmon")
            .join("usage.db")
    }

    /// Initializes the database schema.
    fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock()?;

        conn.execute_batch(
            r#"
            -- Access-log events, one row per distinct record
            CREATE TABLE IF NOT EXISTS events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                event TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                computer TEXT NOT NULL,
                user TEXT NOT NULL,
                UNIQUE(event, timestamp, computer, user)
            );

            -- Sources already ingested in full
            CREATE TABLE IF NOT EXISTS imported_sources (
                source TEXT PRIMARY KEY,
                imported_at TEXT NOT NULL
            );

            -- Configuration settings
            CREATE TABLE IF NOT EXISTS config (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                description TEXT,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_events_computer ON events(computer);
            CREATE INDEX IF NOT EXISTS idx_events_timestamp ON events(timestamp);
            CREATE INDEX IF NOT EXISTS idx_events_pairing
                ON events(computer, user, event, timestamp);
            "#,
        )?;

        // Seed missing config keys
        let now = Utc::now().to_rfc3339();
        let mut seeded = 0;
        for (key, value, description) in DEFAULT_CONFIG {
            seeded += conn.execute(
                "INSERT OR IGNORE INTO config (key, value, description, updated_at) VALUES (?1, ?2, ?3, ?4)",
                params![key, value, description, &now],
            )?;
        }
        if seeded > 0 {
            tracing::info!("Added {} default config settings", seeded);
        }

        tracing::debug!("Database schema initialized");
        Ok(())
    }

    /// Number of stored events.
    pub fn event_count(&self) -> Result<i64> {
        let conn = self.conn.lock()?;
        Ok(conn.query_row("SELECT COUNT(*) FROM events", [], |row| row.get(0))?)
    }

    /// Events whose kind, timestamp, computer or user contains `query`.
    pub fn search_events(&self, query: &str, order: EventOrder) -> Result<Vec<StoredEvent>> {
        let conn = self.conn.lock()?;
        let pattern = format!("%{}%", query);
        let sql = format!(
            "SELECT id, event, timestamp, computer, user FROM events
             WHERE event LIKE ?1 OR timestamp LIKE ?1 OR computer LIKE ?1 OR user LIKE ?1
             ORDER BY {}",
            order.order_by()
        );
        let mut stmt = conn.prepare(&sql)?;

        let rows = stmt.query_map(params![pattern], |row| {
            Ok(StoredEvent {
                id: row.get(0)?,
                event: event_from_row(row, 1)?,
            })
        })?;

        Ok(rows.collect::<rusqlite::Result<Vec<StoredEvent>>>()?)
    }

    // === Config Methods ===

    /// Gets a configuration value by key.
    pub fn get_config(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn.lock()?;
        match conn.query_row(
            "SELECT value FROM config WHERE key = ?1",
            params![key],
            |row| row.get(0),
        ) {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Sets a configuration value.
    pub fn set_config(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn.lock()?;
        let now = Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO config (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, &now],
        )?;
        Ok(())
    }

    /// Gets all config settings.
    pub fn get_all_config(&self) -> Result<Vec<(String, String, Option<String>)>> {
        let conn = self.conn.lock()?;
        let mut stmt = conn.prepare("SELECT key, value, description FROM config ORDER BY key")?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?;
        let settings = rows.collect::<rusqlite::Result<Vec<(String, String, Option<String>)>>>()?;
        Ok(settings)
    }
}

impl EventStore for Database {
    fn ingest(&self, event: &Event) -> Result<bool> {
        let conn = self.conn.lock()?;
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO events (event, timestamp, computer, user) VALUES (?1, ?2, ?3, ?4)",
            params![
                event.kind.as_str(),
                event.timestamp.format(TIMESTAMP_FORMAT).to_string(),
                event.computer,
                event.user,
            ],
        )?;
        Ok(inserted > 0)
    }

    fn mark_source_imported(&self, source: &str) -> Result<()> {
        let conn = self.conn.lock()?;
        conn.execute(
            "INSERT OR IGNORE INTO imported_sources (source, imported_at) VALUES (?1, ?2)",
            params![source, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    fn is_source_imported(&self, source: &str) -> Result<bool> {
        let conn = self.conn.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM imported_sources WHERE source = ?1",
            params![source],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn all_events(&self) -> Result<Vec<Event>> {
        let conn = self.conn.lock()?;
        let mut stmt = conn.prepare(
            "SELECT event, timestamp, computer, user FROM events ORDER BY timestamp, id",
        )?;
        let rows = stmt.query_map([], |row| event_from_row(row, 0))?;
        Ok(rows.collect::<rusqlite::Result<Vec<Event>>>()?)
    }

    fn all_computers(&self) -> Result<BTreeSet<String>> {
        let conn = self.conn.lock()?;
        let mut stmt = conn.prepare("SELECT DISTINCT computer FROM events")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        Ok(rows.collect::<rusqlite::Result<BTreeSet<String>>>()?)
    }

    fn clear(&self) -> Result<()> {
        let mut conn = self.conn.lock()?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM events", [])?;
        tx.execute("DELETE FROM imported_sources", [])?;
        tx.commit()?;
        tracing::info!("Event store cleared");
        Ok(())
    }
}

/// Reads `event, timestamp, computer, user` starting at column `first`.
fn event_from_row(row: &Row<'_>, first: usize) -> rusqlite::Result<Event> {
    let kind: String = row.get(first)?;
    let kind = kind.parse::<EventKind>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(first, Type::Text, e.into())
    })?;

    let timestamp: String = row.get(first + 1)?;
    let timestamp = NaiveDateTime::parse_from_str(&timestamp, TIMESTAMP_FORMAT).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(first + 1, Type::Text, Box::new(e))
    })?;

    Ok(Event {
        kind,
        timestamp,
        computer: row.get(first + 2)?,
        user: row.get(first + 3)?,
    })
}

/// Sort order for event searches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventOrder {
    #[default]
    Date,
    User,
    Computer,
}

impl EventOrder {
    fn order_by(self) -> &'static str {
        match self {
            EventOrder::Date => "timestamp, id",
            EventOrder::User => "user, timestamp, id",
            EventOrder::Computer => "computer, timestamp, id",
        }
    }
}

/// An event with its storage row id.
#[derive(Debug, Clone, Serialize)]
pub struct StoredEvent {
    pub id: i64,
    #[serde(flatten)]
    pub event: Event,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn event(kind: EventKind, h: u32, computer: &str, user: &str) -> Event {
        let ts = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap();
        Event::new(kind, ts, computer, user)
    }

    #[test]
    fn test_create_database() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(db.event_count().unwrap(), 0);
    }

    #[test]
    fn test_ingest_and_read_back() {
        let db = Database::open_in_memory().unwrap();
        let logoff = event(EventKind::Logoff, 10, "PC1", "alice");
        let logon = event(EventKind::Logon, 8, "PC1", "alice");

        assert!(db.ingest(&logoff).unwrap());
        assert!(db.ingest(&logon).unwrap());

        let events = db.all_events().unwrap();
        assert_eq!(events, vec![logon, logoff]);
    }

    #[test]
    fn test_duplicate_ingest_is_noop() {
        let db = Database::open_in_memory().unwrap();
        let e = event(EventKind::Logon, 8, "PC1", "alice");

        assert!(db.ingest(&e).unwrap());
        assert!(!db.ingest(&e).unwrap());
        assert_eq!(db.event_count().unwrap(), 1);

        // Same instant, other kind: a distinct event.
        assert!(db.ingest(&event(EventKind::Logoff, 8, "PC1", "alice")).unwrap());
        assert_eq!(db.event_count().unwrap(), 2);
    }

    #[test]
    fn test_imported_sources_and_clear() {
        let db = Database::open_in_memory().unwrap();
        db.ingest(&event(EventKind::Logon, 8, "PC1", "alice")).unwrap();
        db.mark_source_imported("/logs/a.log").unwrap();
        db.mark_source_imported("/logs/a.log").unwrap();

        assert!(db.is_source_imported("/logs/a.log").unwrap());
        assert!(!db.is_source_imported("/logs/b.log").unwrap());

        db.clear().unwrap();

        assert_eq!(db.event_count().unwrap(), 0);
        assert!(!db.is_source_imported("/logs/a.log").unwrap());
    }

    #[test]
    fn test_all_computers_distinct() {
        let db = Database::open_in_memory().unwrap();
        db.ingest(&event(EventKind::Logon, 8, "Pc-A-01", "alice")).unwrap();
        db.ingest(&event(EventKind::Logoff, 9, "Pc-A-01", "alice")).unwrap();
        db.ingest(&event(EventKind::Logon, 8, "PC-B-01", "bob")).unwrap();

        let computers = db.all_computers().unwrap();
        assert_eq!(computers.len(), 2);
        assert!(computers.contains("Pc-A-01"));
    }

    #[test]
    fn test_search_events() {
        let db = Database::open_in_memory().unwrap();
        db.ingest(&event(EventKind::Logon, 8, "PC1", "alice")).unwrap();
        db.ingest(&event(EventKind::Logon, 9, "PC2", "bob")).unwrap();

        let found = db.search_events("ali", EventOrder::Date).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].event.user, "alice");

        assert_eq!(db.search_events("2024-01-01", EventOrder::Date).unwrap().len(), 2);
        assert!(db.search_events("nobody", EventOrder::Date).unwrap().is_empty());
    }

    #[test]
    fn test_search_events_order() {
        let db = Database::open_in_memory().unwrap();
        db.ingest(&event(EventKind::Logon, 8, "PC2", "carol")).unwrap();
        db.ingest(&event(EventKind::Logon, 9, "PC3", "alice")).unwrap();
        db.ingest(&event(EventKind::Logon, 10, "PC1", "bob")).unwrap();

        let users = |order: EventOrder| -> Vec<String> {
            db.search_events("", order)
                .unwrap()
                .into_iter()
                .map(|e| e.event.user)
                .collect()
        };

        assert_eq!(users(EventOrder::Date), ["carol", "alice", "bob"]);
        assert_eq!(users(EventOrder::User), ["alice", "bob", "carol"]);
        assert_eq!(users(EventOrder::Computer), ["bob", "carol", "alice"]);
    }

    #[test]
    fn test_config_defaults_and_update() {
        let db = Database::open_in_memory().unwrap();

        assert_eq!(
            db.get_config("max_session_secs").unwrap().as_deref(),
            Some("86400")
        );
        assert_eq!(db.get_config("missing").unwrap(), None);

        db.set_config("logoff_pairing", "exclusive").unwrap();
        assert_eq!(
            db.get_config("logoff_pairing").unwrap().as_deref(),
            Some("exclusive")
        );
        assert_eq!(db.get_all_config().unwrap().len(), DEFAULT_CONFIG.len());
    }
}
