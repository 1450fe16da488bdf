//! LabMon - lab computer usage from access logs.
//!
//! Reads LOGON/LOGOFF events from workstation access logs, pairs them
//! into sessions and reports usage per computer, per room and over time.

pub mod config;
pub mod database;
pub mod error;
pub mod ingest;
pub mod server;
pub mod store;

pub use error::{Result, UsageError};
