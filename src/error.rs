//! Error types for the usage engine.

use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the store, the aggregator and the import path.
///
/// Unmatched LOGONs, out-of-bound sessions and duplicate events are not
/// errors: they are dropped from the statistics without a trace here.
#[derive(Error, Debug)]
pub enum UsageError {
    /// The backing event store is unreachable or corrupt.
    #[error("storage error: {0}")]
    Storage(String),

    /// A percentage was requested over a dataset with zero total usage.
    #[error("no usage recorded, nothing to show")]
    EmptyDataset,

    /// A history request named a period other than day, week or month.
    #[error("invalid period '{0}', expected day, week or month")]
    InvalidPeriod(String),

    /// A log source could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl UsageError {
    /// Short machine-readable kind, used in API error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Storage(_) => "storage_error",
            Self::EmptyDataset => "empty_dataset",
            Self::InvalidPeriod(_) => "invalid_period",
            Self::Io { .. } => "io_error",
        }
    }
}

impl From<rusqlite::Error> for UsageError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Storage(e.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for UsageError {
    fn from(_: std::sync::PoisonError<T>) -> Self {
        Self::Storage("store lock poisoned".to_string())
    }
}

pub type Result<T> = std::result::Result<T, UsageError>;
