//! Shared application state for the HTTP server.

use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::broadcast;

use crate::config::EngineConfig;
use crate::database::Database;
use crate::error::Result;
use crate::store::{PairingRules, RankedView};

/// Application state shared across all handlers.
pub struct AppState {
    /// Event store backing every query.
    pub db: Arc<Database>,

    /// Settings loaded at startup.
    pub config: EngineConfig,

    /// Sort order, cap and last ranked aggregate, shared by all clients.
    view: Mutex<RankedView>,

    /// Broadcast channel for WebSocket updates.
    pub broadcast_tx: broadcast::Sender<String>,
}

impl AppState {
    /// Creates new app state with the given broadcast sender.
    pub fn new(
        db: Arc<Database>,
        config: EngineConfig,
        broadcast_tx: broadcast::Sender<String>,
    ) -> Self {
        Self {
            db,
            config,
            view: Mutex::new(RankedView::new(config.display_limit)),
            broadcast_tx,
        }
    }

    pub fn rules(&self) -> PairingRules {
        self.config.pairing_rules()
    }

    /// Locks the ranked view.
    pub fn view(&self) -> Result<MutexGuard<'_, RankedView>> {
        Ok(self.view.lock()?)
    }

    /// Subscribe to the broadcast channel.
    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.broadcast_tx.subscribe()
    }

    /// Sends an update to all connected WebSocket clients.
    pub fn broadcast_update(&self, update_type: &str, data: &impl serde::Serialize) {
        let message = serde_json::json!({
            "type": update_type,
            "data": data,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });
        if let Ok(json) = serde_json::to_string(&message) {
            // No receivers is fine: nobody is listening yet.
            let _ = self.broadcast_tx.send(json);
        }
    }
}

#[cfg(test)]
impl AppState {
    /// State over an empty in-memory database with default settings.
    pub(crate) fn in_memory() -> Arc<Self> {
        let db = Database::open_in_memory().expect("in-memory database");
        let (tx, _) = broadcast::channel(16);
        Arc::new(Self::new(Arc::new(db), EngineConfig::default(), tx))
    }

    /// Stores a LOGON/LOGOFF pair on 2024-01-01.
    pub(crate) fn seed_session(&self, computer: &str, user: &str, from_h: u32, to_h: u32) {
        use crate::store::{Event, EventKind, EventStore};

        let at = |h: u32| {
            chrono::NaiveDate::from_ymd_opt(2024, 1, 1)
                .and_then(|d| d.and_hms_opt(h, 0, 0))
                .expect("valid test time")
        };
        self.db
            .ingest(&Event::new(EventKind::Logon, at(from_h), computer, user))
            .expect("ingest logon");
        self.db
            .ingest(&Event::new(EventKind::Logoff, at(to_h), computer, user))
            .expect("ingest logoff");
    }
}
