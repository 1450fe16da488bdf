//! Runtime configuration loaded from the database `config` table.

use serde::Serialize;
use std::num::NonZeroUsize;
use std::str::FromStr;

use crate::database::Database;
use crate::error::Result;
use crate::store::pairing::{LogoffPairing, PairingRules, MAX_SESSION_SECS};

/// Default HTTP API port.
pub const DEFAULT_PORT: u16 = 13234;

/// Display caps offered to clients.
pub const LIMIT_CHOICES: [Option<usize>; 4] = [Some(20), Some(50), Some(100), None];

/// Settings the engine reads on startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EngineConfig {
    pub max_session_secs: i64,
    pub logoff_pairing: LogoffPairing,
    pub display_limit: Option<NonZeroUsize>,
    pub server_port: u16,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_session_secs: MAX_SESSION_SECS,
            logoff_pairing: LogoffPairing::Shared,
            display_limit: None,
            server_port: DEFAULT_PORT,
        }
    }
}

impl EngineConfig {
    /// Reads the config table, keeping defaults for missing or bad values.
    pub fn load(db: &Database) -> Result<Self> {
        let defaults = Self::default();

        let config = Self {
            max_session_secs: match read(db, "max_session_secs", defaults.max_session_secs)? {
                secs if secs < 0 => {
                    tracing::warn!(secs, "Ignoring negative max_session_secs");
                    defaults.max_session_secs
                }
                secs => secs,
            },
            logoff_pairing: read(db, "logoff_pairing", defaults.logoff_pairing)?,
            display_limit: match db.get_config("display_limit")? {
                Some(value) => parse_limit(&value).unwrap_or_else(|| {
                    tracing::warn!(value = %value, "Ignoring invalid display_limit");
                    defaults.display_limit
                }),
                None => defaults.display_limit,
            },
            server_port: read(db, "server_port", defaults.server_port)?,
        };

        tracing::debug!(?config, "Loaded engine config");
        Ok(config)
    }

    pub fn pairing_rules(&self) -> PairingRules {
        PairingRules {
            mode: self.logoff_pairing,
            max_session_secs: self.max_session_secs,
        }
    }
}

fn read<T: FromStr>(db: &Database, key: &str, default: T) -> Result<T> {
    let Some(value) = db.get_config(key)? else {
        return Ok(default);
    };

    match value.trim().parse::<T>() {
        Ok(parsed) => Ok(parsed),
        Err(_) => {
            tracing::warn!(key, value = %value, "Ignoring unparseable config value");
            Ok(default)
        }
    }
}

/// Parses a display cap: `none`/`all` for unbounded, else a positive count.
///
/// Returns `None` when the text is neither.
pub fn parse_limit(value: &str) -> Option<Option<NonZeroUsize>> {
    match value.trim().to_lowercase().as_str() {
        "none" | "all" | "" => Some(None),
        other => other.parse::<NonZeroUsize>().ok().map(Some),
    }
}
